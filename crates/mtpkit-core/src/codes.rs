//! The 16-bit code enumerations defined by PTP/MTP.
//!
//! Every enum keeps an `Other(u16)` escape so unknown vendor codes survive a
//! decode/encode round trip instead of being rejected at the wire boundary.

macro_rules! wire_codes {
    (
        $(#[$doc:meta])*
        $name:ident {
            $($(#[$vdoc:meta])* $variant:ident = $value:literal,)*
        }
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vdoc])* $variant,)*
            /// A code this implementation does not name.
            Other(u16),
        }

        impl $name {
            pub fn from_u16(raw: u16) -> Self {
                match raw {
                    $($value => Self::$variant,)*
                    other => Self::Other(other),
                }
            }

            pub fn to_u16(self) -> u16 {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Other(other) => other,
                }
            }
        }

        impl From<u16> for $name {
            fn from(raw: u16) -> Self {
                Self::from_u16(raw)
            }
        }
    };
}

wire_codes! {
    /// Container type field of the 12-byte header.
    ContainerType {
        Command = 1,
        Data = 2,
        Response = 3,
        Event = 4,
    }
}

wire_codes! {
    /// MTP operation codes. Vendor (MTPZ/Zune) codes sit in 0x9000..=0x92FF
    /// and are gated on trusted-app authentication.
    OperationCode {
        GetDeviceInfo = 0x1001,
        OpenSession = 0x1002,
        CloseSession = 0x1003,
        GetStorageIds = 0x1004,
        GetStorageInfo = 0x1005,
        GetNumObjects = 0x1006,
        GetObjectHandles = 0x1007,
        GetObjectInfo = 0x1008,
        GetObject = 0x1009,
        GetThumb = 0x100A,
        DeleteObject = 0x100B,
        SendObjectInfo = 0x100C,
        SendObject = 0x100D,
        GetDevicePropDesc = 0x1014,
        GetDevicePropValue = 0x1015,
        SetDevicePropValue = 0x1016,
        MoveObject = 0x1019,
        GetPartialObject = 0x101B,
        GetObjectPropsSupported = 0x9801,
        GetObjectPropDesc = 0x9802,
        GetObjectPropValue = 0x9803,
        SetObjectPropValue = 0x9804,
        GetObjectPropList = 0x9805,
        SendObjectPropList = 0x9806,
        GetObjectReferences = 0x9810,
        SetObjectReferences = 0x9811,

        // Trusted-app handshake
        GetCertificate = 0x9101,
        SendHostCertificate = 0x9102,
        GetChallenge = 0x9103,
        SendChallengeResponse = 0x9104,

        // Wireless provisioning (reverse-engineered from captures)
        PrepareWifiConfiguration = 0x9224,
        GetWifiNetworkList = 0x9226,
        SetWifiConfiguration = 0x9227,
        CommitWifiConfiguration = 0x9228,
        RegisterTrackContext = 0x922A,
        FinishWirelessEnable = 0x922B,
        SetWirelessSyncState = 0x9230,
    }
}

wire_codes! {
    /// MTP response codes.
    ResponseCode {
        Ok = 0x2001,
        GeneralError = 0x2002,
        SessionNotOpen = 0x2003,
        InvalidTransactionId = 0x2004,
        OperationNotSupported = 0x2005,
        ParameterNotSupported = 0x2006,
        IncompleteTransfer = 0x2007,
        InvalidStorageId = 0x2008,
        InvalidObjectHandle = 0x2009,
        DevicePropNotSupported = 0x200A,
        InvalidObjectFormatCode = 0x200B,
        StoreFull = 0x200C,
        ObjectWriteProtected = 0x200D,
        StoreReadOnly = 0x200E,
        AccessDenied = 0x200F,
        NoThumbnailPresent = 0x2010,
        PartialDeletion = 0x2012,
        StoreNotAvailable = 0x2013,
        SpecificationByFormatUnsupported = 0x2014,
        NoValidObjectInfo = 0x2015,
        DeviceBusy = 0x2019,
        InvalidParentObject = 0x201A,
        InvalidDevicePropFormat = 0x201B,
        InvalidDevicePropValue = 0x201C,
        InvalidParameter = 0x201D,
        SessionAlreadyOpen = 0x201E,
        TransactionCancelled = 0x201F,
        InvalidObjectPropCode = 0xA801,
        InvalidObjectPropFormat = 0xA802,
        InvalidObjectPropValue = 0xA803,
        InvalidObjectReference = 0xA804,
        GroupNotSupported = 0xA805,
        InvalidDataset = 0xA806,
        ObjectTooLarge = 0xA809,
    }
}

impl ResponseCode {
    /// Codes that abort the session or must be surfaced to the caller as-is.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            ResponseCode::InvalidStorageId
                | ResponseCode::StoreNotAvailable
                | ResponseCode::AccessDenied
                | ResponseCode::InvalidObjectHandle
                | ResponseCode::TransactionCancelled
        )
    }
}

wire_codes! {
    /// Asynchronous event codes delivered on the interrupt pipe.
    EventCode {
        CancelTransaction = 0x4001,
        ObjectAdded = 0x4002,
        ObjectRemoved = 0x4003,
        StoreAdded = 0x4004,
        StoreRemoved = 0x4005,
        DevicePropChanged = 0x4006,
        ObjectInfoChanged = 0x4007,
        DeviceInfoChanged = 0x4008,
        RequestObjectTransfer = 0x4009,
        StoreFull = 0x400A,
        StorageInfoChanged = 0x400C,
        ObjectPropChanged = 0xC801,
    }
}

wire_codes! {
    /// Object format codes. `Association` is the directory format; audio
    /// codec formats mark tracks.
    ObjectFormat {
        Undefined = 0x3000,
        Association = 0x3001,
        Script = 0x3002,
        Executable = 0x3003,
        Text = 0x3004,
        Html = 0x3005,
        Aiff = 0x3007,
        Wav = 0x3008,
        Mp3 = 0x3009,
        Avi = 0x300A,
        Mpeg = 0x300B,
        Asf = 0x300C,
        ExifJpeg = 0x3801,
        Bmp = 0x3804,
        Gif = 0x3807,
        Png = 0x380B,
        Tiff = 0x380D,
        UndefinedFirmware = 0xB802,
        UndefinedAudio = 0xB900,
        Wma = 0xB901,
        Ogg = 0xB902,
        Aac = 0xB903,
        Audible = 0xB904,
        Flac = 0xB906,
        UndefinedVideo = 0xB980,
        Wmv = 0xB981,
        Mp4 = 0xB982,
        /// Zune metadata artist object.
        Artist = 0xB218,
        UndefinedCollection = 0xBA00,
        AbstractMultimediaAlbum = 0xBA01,
        AbstractImageAlbum = 0xBA02,
        AbstractAudioAlbum = 0xBA03,
        AbstractVideoAlbum = 0xBA04,
        AbstractAudioVideoPlaylist = 0xBA05,
        AbstractAudioPlaylist = 0xBA09,
        AbstractVideoPlaylist = 0xBA0A,
        WplPlaylist = 0xBA10,
        M3uPlaylist = 0xBA11,
    }
}

impl ObjectFormat {
    /// Directories are "associations" in MTP terms.
    pub fn is_association(self) -> bool {
        self == ObjectFormat::Association
    }

    /// True for formats the library treats as audio tracks.
    pub fn is_audio(self) -> bool {
        matches!(
            self,
            ObjectFormat::Aiff
                | ObjectFormat::Wav
                | ObjectFormat::Mp3
                | ObjectFormat::UndefinedAudio
                | ObjectFormat::Wma
                | ObjectFormat::Ogg
                | ObjectFormat::Aac
                | ObjectFormat::Audible
                | ObjectFormat::Flac
        )
    }
}

wire_codes! {
    /// Object property codes. The 0xDA81..=0xDAFF window holds Zune vendor
    /// properties.
    ObjectPropertyCode {
        StorageId = 0xDC01,
        ObjectFormat = 0xDC02,
        ProtectionStatus = 0xDC03,
        ObjectSize = 0xDC04,
        AssociationType = 0xDC05,
        AssociationDesc = 0xDC06,
        ObjectFilename = 0xDC07,
        DateCreated = 0xDC08,
        DateModified = 0xDC09,
        Keywords = 0xDC0A,
        ParentObject = 0xDC0B,
        Hidden = 0xDC0D,
        PersistentUniqueObjectId = 0xDC41,
        Name = 0xDC44,
        Artist = 0xDC46,
        DateAuthored = 0xDC47,
        Description = 0xDC48,
        RepresentativeSampleFormat = 0xDC81,
        RepresentativeSampleSize = 0xDC82,
        RepresentativeSampleHeight = 0xDC83,
        RepresentativeSampleWidth = 0xDC84,
        RepresentativeSampleData = 0xDC86,
        Track = 0xDC8B,
        Genre = 0xDC8C,
        AlbumName = 0xDC9A,
        AlbumArtist = 0xDC9B,
        /// Zune 16-byte artist GUID.
        ZuneGuid = 0xDA97,
        /// Zune artist reference on albums and tracks.
        ArtistId = 0xDA9C,
        /// Zune collection id, always written as zero.
        ZuneCollectionId = 0xDAB0,
    }
}

impl ObjectPropertyCode {
    /// Wildcard used by GetObjectPropList to request every property.
    pub const ALL: u32 = 0xFFFF_FFFF;
}

wire_codes! {
    /// Device property codes. 0xD2xx are Zune vendor properties.
    DevicePropertyCode {
        BatteryLevel = 0x5001,
        DeviceFriendlyName = 0xD402,
        SynchronizationPartner = 0xD401,
        /// Wireless configuration status, polled after provisioning.
        WirelessConfigStatus = 0xD217,
        /// Partnership GUID written during Zune pairing.
        ZunePartnershipGuid = 0xD220,
    }
}

wire_codes! {
    /// Data type codes used by property descriptions and property lists.
    DataType {
        Undefined = 0x0000,
        Int8 = 0x0001,
        Uint8 = 0x0002,
        Int16 = 0x0003,
        Uint16 = 0x0004,
        Int32 = 0x0005,
        Uint32 = 0x0006,
        Int64 = 0x0007,
        Uint64 = 0x0008,
        Int128 = 0x0009,
        Uint128 = 0x000A,
        ArrayInt8 = 0x4001,
        ArrayUint8 = 0x4002,
        ArrayInt16 = 0x4003,
        ArrayUint16 = 0x4004,
        ArrayInt32 = 0x4005,
        ArrayUint32 = 0x4006,
        ArrayInt64 = 0x4007,
        ArrayUint64 = 0x4008,
        ArrayInt128 = 0x4009,
        ArrayUint128 = 0x400A,
        String = 0xFFFF,
    }
}

impl DataType {
    /// Fixed scalar width in bytes, or None for strings and arrays.
    pub fn scalar_width(self) -> Option<usize> {
        match self {
            DataType::Int8 | DataType::Uint8 => Some(1),
            DataType::Int16 | DataType::Uint16 => Some(2),
            DataType::Int32 | DataType::Uint32 => Some(4),
            DataType::Int64 | DataType::Uint64 => Some(8),
            DataType::Int128 | DataType::Uint128 => Some(16),
            _ => None,
        }
    }

    /// Element width for array types, or None otherwise.
    pub fn array_element_width(self) -> Option<usize> {
        let raw = self.to_u16();
        if raw & 0x4000 != 0 {
            DataType::from_u16(raw & !0x4000).scalar_width()
        } else {
            None
        }
    }
}

wire_codes! {
    /// Association (directory) subtype.
    AssociationType {
        GenericFolder = 0x0001,
    }
}

impl Default for ObjectFormat {
    fn default() -> Self {
        ObjectFormat::Undefined
    }
}

impl Default for AssociationType {
    fn default() -> Self {
        AssociationType::Other(0)
    }
}
