//! # mtpkit-core
//!
//! Core types, traits, and error definitions shared across all mtpkit crates.
//!
//! This crate provides:
//! - Identifier newtypes (object, storage, session, transaction)
//! - The 16-bit wire code enumerations (operations, responses, events,
//!   formats, properties, data types)
//! - Device, storage, and object information models with capability queries
//! - Byte source/sink traits used by data-phase streaming
//! - Common error types

pub mod codes;
pub mod error;
pub mod ids;
pub mod info;
pub mod stream;

pub use codes::{
    AssociationType, ContainerType, DataType, DevicePropertyCode, EventCode, ObjectFormat,
    ObjectPropertyCode, OperationCode, ResponseCode,
};
pub use error::{
    AuthenticationError, CryptoError, Error, ProtocolError, Result, TransportError,
};
pub use ids::{ObjectId, SessionId, StorageId, TransactionId};
pub use info::{DeviceInfo, ObjectInfo, StorageInfo};
pub use stream::{ByteSink, ByteSource, FileSink, FileSource, VecSink, VecSource};
