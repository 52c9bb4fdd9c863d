//! Codecs for the standard PTP datasets.

use crate::wire::{Reader, Writer};
use mtpkit_core::codes::{
    AssociationType, DevicePropertyCode, EventCode, ObjectFormat, OperationCode,
};
use mtpkit_core::ids::{ObjectId, StorageId};
use mtpkit_core::info::{DeviceInfo, ObjectInfo, StorageInfo};
use mtpkit_core::Result;

/// Decode a GetDeviceInfo payload.
pub fn decode_device_info(data: &[u8]) -> Result<DeviceInfo> {
    let mut r = Reader::new(data);
    let standard_version = r.u16()?;
    let vendor_extension_id = r.u32()?;
    let vendor_extension_version = r.u16()?;
    let vendor_extension_desc = r.string()?;
    let functional_mode = r.u16()?;
    let operations_supported = r
        .array_u16()?
        .into_iter()
        .map(OperationCode::from_u16)
        .collect();
    let events_supported = r.array_u16()?.into_iter().map(EventCode::from_u16).collect();
    let device_properties_supported = r
        .array_u16()?
        .into_iter()
        .map(DevicePropertyCode::from_u16)
        .collect();
    let capture_formats = r.array_u16()?.into_iter().map(ObjectFormat::from_u16).collect();
    let playback_formats = r.array_u16()?.into_iter().map(ObjectFormat::from_u16).collect();
    let manufacturer = r.string()?;
    let model = r.string()?;
    let device_version = r.string()?;
    let serial_number = r.string()?;

    Ok(DeviceInfo {
        standard_version,
        vendor_extension_id,
        vendor_extension_version,
        vendor_extension_desc,
        functional_mode,
        operations_supported,
        events_supported,
        device_properties_supported,
        capture_formats,
        playback_formats,
        manufacturer,
        model,
        device_version,
        serial_number,
    })
}

/// Decode a GetStorageInfo payload.
pub fn decode_storage_info(data: &[u8]) -> Result<StorageInfo> {
    let mut r = Reader::new(data);
    Ok(StorageInfo {
        storage_type: r.u16()?,
        filesystem_type: r.u16()?,
        access_capability: r.u16()?,
        max_capacity: r.u64()?,
        free_space_bytes: r.u64()?,
        free_space_objects: r.u32()?,
        description: r.string()?,
        volume_label: r.string()?,
    })
}

/// Decode a GetObjectInfo payload.
pub fn decode_object_info(data: &[u8]) -> Result<ObjectInfo> {
    let mut r = Reader::new(data);
    Ok(ObjectInfo {
        storage: StorageId::new(r.u32()?),
        format: ObjectFormat::from_u16(r.u16()?),
        protection_status: r.u16()?,
        object_size: r.u32()?,
        thumb_format: ObjectFormat::from_u16(r.u16()?),
        thumb_size: r.u32()?,
        thumb_width: r.u32()?,
        thumb_height: r.u32()?,
        image_width: r.u32()?,
        image_height: r.u32()?,
        image_depth: r.u32()?,
        parent: ObjectId::new(r.u32()?),
        association_type: AssociationType::from_u16(r.u16()?),
        association_desc: r.u32()?,
        sequence_number: r.u32()?,
        filename: r.string()?,
        capture_date: r.string()?,
        modification_date: r.string()?,
        keywords: r.string()?,
    })
}

/// Encode an ObjectInfo dataset for SendObjectInfo.
pub fn encode_object_info(info: &ObjectInfo) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.u32(info.storage.raw());
    w.u16(info.format.to_u16());
    w.u16(info.protection_status);
    w.u32(info.object_size);
    w.u16(info.thumb_format.to_u16());
    w.u32(info.thumb_size);
    w.u32(info.thumb_width);
    w.u32(info.thumb_height);
    w.u32(info.image_width);
    w.u32(info.image_height);
    w.u32(info.image_depth);
    w.u32(info.parent.raw());
    w.u16(info.association_type.to_u16());
    w.u32(info.association_desc);
    w.u32(info.sequence_number);
    w.string(&info.filename)?;
    w.string(&info.capture_date)?;
    w.string(&info.modification_date)?;
    w.string(&info.keywords)?;
    Ok(w.into_inner())
}
