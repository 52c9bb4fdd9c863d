//! # mtpkit-ptp
//!
//! PTP container codec and the MTP session layer.
//!
//! This crate provides:
//! - Little-endian wire reader/writer with the MTP typed codecs
//! - Container framing (Command, Data, Response, Event) with phase
//!   discipline and streamed data phases
//! - Property-list encoding and tolerant parsing
//! - Standard dataset codecs (DeviceInfo, StorageInfo, ObjectInfo)
//! - `Session`: operation dispatch, transaction ids, retry policy,
//!   cancellation, and the asynchronous event queue

pub mod container;
pub mod datasets;
pub mod event;
pub mod proplist;
pub mod session;
pub mod wire;

pub use container::{Container, ResponseContainer, CONTAINER_HEADER_LEN};
pub use event::{Event, EventQueue, EventReceiver};
pub use proplist::{PropertyEntry, PropertyListBuilder, PropertyValue};
pub use session::{SendObjectPropListOutcome, Session, SharedSession};
