//! Identifier newtypes for the MTP object graph.

use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#010x}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

id_type! {
    /// Device-scoped handle to a file, association, artist, album, or track.
    ObjectId
}

id_type! {
    /// Top-level storage volume on the device.
    StorageId
}

id_type! {
    /// Client-chosen nonzero value established by OpenSession.
    SessionId
}

id_type! {
    /// Per-session monotonically increasing counter.
    TransactionId
}

impl ObjectId {
    /// Parent-of-root sentinel ("device root").
    pub const ROOT: ObjectId = ObjectId(0x0000_0000);
    /// Wildcard: all objects / any parent.
    pub const ALL: ObjectId = ObjectId(0xFFFF_FFFF);
}

impl StorageId {
    /// Selector addressing every storage on the device.
    pub const ALL: StorageId = StorageId(0xFFFF_FFFF);
}

impl TransactionId {
    /// Reserved for the session-open transaction.
    pub const SESSION_OPEN: TransactionId = TransactionId(0);

    /// Next transaction id, skipping the reserved zero on wrap.
    pub fn next(self) -> TransactionId {
        match self.0.wrapping_add(1) {
            0 => TransactionId(1),
            n => TransactionId(n),
        }
    }
}
