//! The high-level client.

use crate::config::ClientConfig;
use mtpkit_core::codes::{ObjectFormat, ObjectPropertyCode};
use mtpkit_core::ids::{ObjectId, SessionId, StorageId};
use mtpkit_core::info::{ObjectInfo, StorageInfo};
use mtpkit_core::stream::{ByteSink, ByteSource};
use mtpkit_core::{DeviceInfo, Error, Result};
use mtpkit_ptp::{EventReceiver, Session, SharedSession};
use mtpkit_usb::{select_device, MtpTransport, UsbTransport};
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One directory listing entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub id: ObjectId,
    pub name: String,
    pub format: ObjectFormat,
    pub is_dir: bool,
    pub size: u64,
    pub modified: String,
}

/// High-level MTP client bound to one device.
pub struct MtpClient {
    session: SharedSession,
}

impl MtpClient {
    /// Enumerate, select, open, and bring up a session.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let entry = select_device(config.device_selector.as_deref()).await?;
        info!(
            vid = format_args!("{:04x}", entry.vendor_id()),
            pid = format_args!("{:04x}", entry.product_id()),
            "opening device"
        );
        let transport = UsbTransport::open(&entry).await?;
        Self::connect_with_transport(Box::new(transport)).await
    }

    /// Bring up a session over an already-open transport. Used directly by
    /// tests and by callers with their own device selection.
    pub async fn connect_with_transport(transport: Box<dyn MtpTransport>) -> Result<Self> {
        // Any nonzero value works; random ids keep stale-session collisions
        // across host restarts unlikely.
        let session_id = SessionId::new(rand::thread_rng().gen_range(1..=u32::MAX));
        let session = Session::open(transport, session_id).await?;
        Ok(Self { session: Arc::new(Mutex::new(session)) })
    }

    /// Shared session handle for the library and trusted-app layers.
    pub fn session(&self) -> SharedSession {
        self.session.clone()
    }

    pub async fn device_info(&self) -> DeviceInfo {
        self.session.lock().await.device_info().clone()
    }

    /// All storages with their info datasets.
    pub async fn storages(&self) -> Result<Vec<(StorageId, StorageInfo)>> {
        let mut session = self.session.lock().await;
        let ids = session.get_storage_ids().await?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let info = session.get_storage_info(id).await?;
            out.push((id, info));
        }
        Ok(out)
    }

    /// Event stream handle.
    pub async fn events(&self) -> EventReceiver {
        self.session.lock().await.events()
    }

    /// Pump pending device events into the stream.
    pub async fn poll_events(&self) {
        self.session.lock().await.poll_events().await;
    }

    /// Cancel the in-flight operation, if any.
    pub async fn cancel(&self) -> Result<()> {
        self.session.lock().await.cancel().await
    }

    /// Close the session cleanly.
    pub async fn close(&self) -> Result<()> {
        self.session.lock().await.close().await
    }

    // ------------------------------------------------------------------
    // Path resolution
    // ------------------------------------------------------------------

    /// Walk `path` from the storage root. Empty path resolves to the root
    /// sentinel.
    pub async fn resolve(&self, storage: StorageId, path: &str) -> Result<ObjectId> {
        let mut session = self.session.lock().await;
        let mut current = ObjectId::ROOT;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = Self::child_by_name(&mut session, storage, current, component)
                .await?
                .ok_or_else(|| Error::NotFound(path.to_string()))?;
        }
        Ok(current)
    }

    async fn child_by_name(
        session: &mut Session,
        storage: StorageId,
        parent: ObjectId,
        name: &str,
    ) -> Result<Option<ObjectId>> {
        let children = session.get_object_handles(storage, None, parent).await?;
        for child in children {
            let filename = session
                .get_object_string_property(child, ObjectPropertyCode::ObjectFilename)
                .await?;
            if filename == name {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Filesystem-like operations
    // ------------------------------------------------------------------

    /// List the direct children of a directory path.
    pub async fn list_dir(&self, storage: StorageId, path: &str) -> Result<Vec<DirEntry>> {
        let parent = self.resolve(storage, path).await?;
        let mut session = self.session.lock().await;
        let children = session.get_object_handles(storage, None, parent).await?;
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            let info = session.get_object_info(child).await?;
            out.push(DirEntry {
                id: child,
                name: info.filename.clone(),
                format: info.format,
                is_dir: info.is_association(),
                size: info.object_size as u64,
                modified: info.modification_date,
            });
        }
        Ok(out)
    }

    /// Recursive, depth-first listing of a subtree: each directory is
    /// followed immediately by its own children.
    pub async fn list_recursive(&self, storage: StorageId, path: &str) -> Result<Vec<DirEntry>> {
        let root = self.resolve(storage, path).await?;
        let mut session = self.session.lock().await;
        let mut out = Vec::new();
        Self::walk(&mut session, storage, root, &mut out).await?;
        Ok(out)
    }

    fn walk<'a>(
        session: &'a mut Session,
        storage: StorageId,
        parent: ObjectId,
        out: &'a mut Vec<DirEntry>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for child in session.get_object_handles(storage, None, parent).await? {
                let info = session.get_object_info(child).await?;
                let is_dir = info.is_association();
                out.push(DirEntry {
                    id: child,
                    name: info.filename.clone(),
                    format: info.format,
                    is_dir,
                    size: info.object_size as u64,
                    modified: info.modification_date,
                });
                if is_dir {
                    Self::walk(session, storage, child, out).await?;
                }
            }
            Ok(())
        })
    }

    /// Download an object into `sink`.
    pub async fn read_file(&self, storage: StorageId, path: &str, sink: &mut dyn ByteSink) -> Result<()> {
        let object = self.resolve(storage, path).await?;
        self.session.lock().await.get_object(object, sink).await
    }

    /// Whole file in memory.
    pub async fn read_file_bytes(&self, storage: StorageId, path: &str) -> Result<Vec<u8>> {
        let object = self.resolve(storage, path).await?;
        self.session.lock().await.get_object_bytes(object).await
    }

    /// Upload a file into the directory at `dir_path`.
    pub async fn write_file(
        &self,
        storage: StorageId,
        dir_path: &str,
        filename: &str,
        format: ObjectFormat,
        source: &mut dyn ByteSource,
    ) -> Result<ObjectId> {
        let parent = self.resolve(storage, dir_path).await?;
        let size = source.total_hint().unwrap_or(0);
        let info = ObjectInfo {
            storage,
            parent,
            ..ObjectInfo::for_upload(filename, format, size.min(u32::MAX as u64) as u32)
        };

        let mut session = self.session.lock().await;
        let object = session.send_object_info(storage, parent, &info).await?;
        session.send_object(source).await?;
        debug!(%object, filename, size, "uploaded");
        Ok(object)
    }

    /// Delete the object at `path`. Deleting a directory removes the whole
    /// subtree.
    pub async fn delete(&self, storage: StorageId, path: &str) -> Result<()> {
        let object = self.resolve(storage, path).await?;
        self.session.lock().await.delete_object(object).await
    }

    /// Rename the object at `path` in place.
    pub async fn rename(&self, storage: StorageId, path: &str, new_name: &str) -> Result<()> {
        let object = self.resolve(storage, path).await?;
        self.session
            .lock()
            .await
            .set_object_string_property(object, ObjectPropertyCode::ObjectFilename, new_name)
            .await
    }

    /// Create a directory at `path` (the parent must exist). Returns the
    /// existing object when the directory is already there.
    pub async fn mkdir(&self, storage: StorageId, path: &str) -> Result<ObjectId> {
        let (dir_path, name) = match path.trim_end_matches('/').rsplit_once('/') {
            Some((dir, name)) => (dir, name),
            None => ("", path.trim_end_matches('/')),
        };
        if name.is_empty() {
            return Err(Error::NotFound("empty directory name".into()));
        }

        let parent = self.resolve(storage, dir_path).await?;
        let mut session = self.session.lock().await;
        if let Some(existing) =
            Self::child_by_name(&mut session, storage, parent, name).await?
        {
            return Ok(existing);
        }
        session.create_directory(name, parent, storage).await
    }

    /// Move an object under a new parent directory.
    pub async fn move_object(
        &self,
        storage: StorageId,
        path: &str,
        new_dir_path: &str,
    ) -> Result<()> {
        let object = self.resolve(storage, path).await?;
        let new_parent = self.resolve(storage, new_dir_path).await?;
        self.session
            .lock()
            .await
            .move_object(object, storage, new_parent)
            .await
    }
}
