//! # mtpkit-client
//!
//! High-level facade over the session layer: connect to a device and work
//! with its storages through filesystem-like operations (list, read, write,
//! delete, rename, mkdir) with path resolution.

mod client;
mod config;

pub use client::{DirEntry, MtpClient};
pub use config::ClientConfig;
