//! Device, storage, and object information models.
//!
//! These mirror the standard PTP datasets. Decoding from the wire lives in
//! `mtpkit-ptp`; this crate only defines the models and capability queries.

use crate::codes::{
    AssociationType, DevicePropertyCode, EventCode, ObjectFormat, OperationCode,
};
use crate::ids::{ObjectId, StorageId};

/// Parsed GetDeviceInfo dataset.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub standard_version: u16,
    pub vendor_extension_id: u32,
    pub vendor_extension_version: u16,
    pub vendor_extension_desc: String,
    pub functional_mode: u16,
    pub operations_supported: Vec<OperationCode>,
    pub events_supported: Vec<EventCode>,
    pub device_properties_supported: Vec<DevicePropertyCode>,
    pub capture_formats: Vec<ObjectFormat>,
    pub playback_formats: Vec<ObjectFormat>,
    pub manufacturer: String,
    pub model: String,
    pub device_version: String,
    pub serial_number: String,
}

impl DeviceInfo {
    pub fn supports_operation(&self, op: OperationCode) -> bool {
        self.operations_supported.contains(&op)
    }

    pub fn supports_event(&self, event: EventCode) -> bool {
        self.events_supported.contains(&event)
    }

    pub fn supports_device_property(&self, prop: DevicePropertyCode) -> bool {
        self.device_properties_supported.contains(&prop)
    }

    /// Playback formats are what the device will accept as object formats.
    pub fn supports_format(&self, format: ObjectFormat) -> bool {
        self.playback_formats.contains(&format)
    }
}

/// Parsed GetStorageInfo dataset.
#[derive(Debug, Clone, Default)]
pub struct StorageInfo {
    pub storage_type: u16,
    pub filesystem_type: u16,
    pub access_capability: u16,
    pub max_capacity: u64,
    pub free_space_bytes: u64,
    pub free_space_objects: u32,
    pub description: String,
    pub volume_label: String,
}

impl StorageInfo {
    /// Read-only access capability values per the PTP spec.
    pub fn is_writable(&self) -> bool {
        self.access_capability == 0
    }
}

/// Parsed GetObjectInfo dataset.
#[derive(Debug, Clone, Default)]
pub struct ObjectInfo {
    pub storage: StorageId,
    pub format: ObjectFormat,
    pub protection_status: u16,
    /// Truncated to 32 bits on the wire; 0xFFFFFFFF means "4 GiB or larger".
    pub object_size: u32,
    pub thumb_format: ObjectFormat,
    pub thumb_size: u32,
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub image_depth: u32,
    pub parent: ObjectId,
    pub association_type: AssociationType,
    pub association_desc: u32,
    pub sequence_number: u32,
    pub filename: String,
    pub capture_date: String,
    pub modification_date: String,
    pub keywords: String,
}

impl ObjectInfo {
    /// Dataset for a fresh file upload.
    pub fn for_upload(filename: impl Into<String>, format: ObjectFormat, size: u32) -> Self {
        Self {
            format,
            object_size: size,
            filename: filename.into(),
            ..Default::default()
        }
    }

    /// Dataset for a new directory.
    pub fn for_directory(name: impl Into<String>) -> Self {
        Self {
            format: ObjectFormat::Association,
            association_type: AssociationType::GenericFolder,
            filename: name.into(),
            ..Default::default()
        }
    }

    pub fn is_association(&self) -> bool {
        self.format.is_association()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_info() -> DeviceInfo {
        DeviceInfo {
            operations_supported: vec![
                OperationCode::OpenSession,
                OperationCode::GetObjectPropList,
                OperationCode::SendObjectPropList,
            ],
            events_supported: vec![EventCode::ObjectAdded],
            playback_formats: vec![ObjectFormat::Mp3, ObjectFormat::AbstractAudioAlbum],
            device_properties_supported: vec![DevicePropertyCode::DeviceFriendlyName],
            ..Default::default()
        }
    }

    #[test]
    fn capability_queries() {
        let info = device_info();
        assert!(info.supports_operation(OperationCode::GetObjectPropList));
        assert!(!info.supports_operation(OperationCode::GetThumb));
        assert!(info.supports_event(EventCode::ObjectAdded));
        assert!(!info.supports_event(EventCode::StoreFull));
        assert!(info.supports_format(ObjectFormat::AbstractAudioAlbum));
        assert!(!info.supports_format(ObjectFormat::Artist));
        assert!(info.supports_device_property(DevicePropertyCode::DeviceFriendlyName));
    }

    #[test]
    fn directory_info_is_association() {
        let info = ObjectInfo::for_directory("Music");
        assert!(info.is_association());
        assert_eq!(info.association_type, AssociationType::GenericFolder);
        assert_eq!(info.filename, "Music");
    }

    #[test]
    fn upload_info_carries_size() {
        let info = ObjectInfo::for_upload("hello.txt", ObjectFormat::Text, 6);
        assert_eq!(info.object_size, 6);
        assert!(!info.is_association());
    }

    #[test]
    fn storage_writability() {
        let mut storage = StorageInfo::default();
        assert!(storage.is_writable());
        storage.access_capability = 1; // read-only
        assert!(!storage.is_writable());
    }
}
