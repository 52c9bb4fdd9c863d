//! The MTP session: operation dispatch, transaction ids, retry policy,
//! cancellation, and typed operation wrappers.
//!
//! Exactly one transaction is in flight per session. Every operation is a
//! thin wrapper over a single `dispatch` entry point taking a command
//! descriptor and a data-phase direction.

use crate::container::{self, DataPhase, ResponseContainer};
use crate::datasets;
use crate::event::{Event, EventQueue, EventReceiver};
use crate::wire::{Reader, Writer};
use mtpkit_core::codes::{
    DevicePropertyCode, ObjectFormat, ObjectPropertyCode, OperationCode, ResponseCode,
};
use mtpkit_core::error::ProtocolError;
use mtpkit_core::ids::{ObjectId, SessionId, StorageId, TransactionId};
use mtpkit_core::info::{DeviceInfo, ObjectInfo};
use mtpkit_core::stream::{ByteSink, ByteSource, VecSink, VecSource};
use mtpkit_core::{Error, Result, StorageInfo};
use mtpkit_usb::MtpTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default per-operation timeout.
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);
/// Extended timeout for whole-object data phases.
const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_secs(600);
/// How long to drain the pipe after a cancel request.
const CANCEL_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);
/// Poll window for the interrupt pipe when pumping events.
const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(20);
/// Event queue depth before the oldest event is dropped.
const EVENT_QUEUE_CAPACITY: usize = 64;
/// Backoff schedule for retryable response codes.
const RETRY_BACKOFF: [Duration; 3] = [
    Duration::from_millis(200),
    Duration::from_millis(400),
    Duration::from_millis(800),
];

/// Shared handle used by the library and trusted-app layers.
pub type SharedSession = Arc<Mutex<Session>>;

/// Result of SendObjectPropList: where the device created the object.
#[derive(Debug, Clone, Copy)]
pub struct SendObjectPropListOutcome {
    pub storage: StorageId,
    pub parent: ObjectId,
    pub object: ObjectId,
}

/// Tagged command descriptor handed to `dispatch`.
struct Command {
    code: OperationCode,
    params: Vec<u32>,
}

impl Command {
    fn new(code: OperationCode, params: &[u32]) -> Self {
        Self { code, params: params.to_vec() }
    }
}

/// Direction of the optional data phase.
enum DataDir<'a> {
    None,
    In(&'a mut dyn ByteSink),
    Out(&'a mut dyn ByteSource),
}

/// One open MTP session over a claimed USB interface.
pub struct Session {
    transport: Box<dyn MtpTransport>,
    session_id: SessionId,
    last_txid: TransactionId,
    device_info: DeviceInfo,
    op_timeout: Duration,
    data_timeout: Duration,
    events: EventQueue,
    open: bool,
    poisoned: bool,
}

impl Session {
    /// Fetch device info and open a session with the given id.
    ///
    /// A stale session left by a crashed client is closed and reopened.
    pub async fn open(mut transport: Box<dyn MtpTransport>, session_id: SessionId) -> Result<Self> {
        debug_assert_ne!(session_id.raw(), 0, "session id must be nonzero");

        // GetDeviceInfo is legal outside a session and uses transaction 0.
        container::send_command(
            transport.as_mut(),
            OperationCode::GetDeviceInfo,
            TransactionId::SESSION_OPEN,
            &[],
            DEFAULT_OP_TIMEOUT,
        )
        .await?;
        let mut sink = VecSink::new();
        let device_info = match container::receive_data(transport.as_mut(), &mut sink, DEFAULT_OP_TIMEOUT).await? {
            DataPhase::Data { .. } => {
                let response = container::receive_response(transport.as_mut(), DEFAULT_OP_TIMEOUT).await?;
                if response.code != ResponseCode::Ok {
                    return Err(Error::Mtp(response.code));
                }
                datasets::decode_device_info(&sink.into_inner())?
            }
            DataPhase::Response(response) => return Err(Error::Mtp(response.code)),
        };
        debug!(
            manufacturer = %device_info.manufacturer,
            model = %device_info.model,
            "device info fetched"
        );

        let mut session = Self {
            transport,
            session_id,
            last_txid: TransactionId::SESSION_OPEN,
            device_info,
            op_timeout: DEFAULT_OP_TIMEOUT,
            data_timeout: DEFAULT_DATA_TIMEOUT,
            events: EventQueue::new(EVENT_QUEUE_CAPACITY),
            open: false,
            poisoned: false,
        };
        session.open_session().await?;
        Ok(session)
    }

    async fn open_session(&mut self) -> Result<()> {
        for attempt in 0..2 {
            container::send_command(
                self.transport.as_mut(),
                OperationCode::OpenSession,
                TransactionId::SESSION_OPEN,
                &[self.session_id.raw()],
                self.op_timeout,
            )
            .await?;
            let response =
                container::receive_response(self.transport.as_mut(), self.op_timeout).await?;
            match response.code {
                ResponseCode::Ok => {
                    self.open = true;
                    self.last_txid = TransactionId::SESSION_OPEN;
                    return Ok(());
                }
                ResponseCode::SessionAlreadyOpen if attempt == 0 => {
                    debug!("stale session on device, closing and reopening");
                    container::send_command(
                        self.transport.as_mut(),
                        OperationCode::CloseSession,
                        TransactionId::SESSION_OPEN,
                        &[],
                        self.op_timeout,
                    )
                    .await?;
                    let _ = container::receive_response(self.transport.as_mut(), self.op_timeout)
                        .await?;
                }
                code => return Err(Error::Mtp(code)),
            }
        }
        Err(Error::Mtp(ResponseCode::SessionAlreadyOpen))
    }

    /// Cached device info from session bring-up.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn is_open(&self) -> bool {
        self.open && !self.poisoned
    }

    /// Override the per-operation timeout.
    pub fn set_operation_timeout(&mut self, timeout: Duration) {
        self.op_timeout = timeout;
    }

    /// Override the whole-object data-phase timeout.
    pub fn set_data_timeout(&mut self, timeout: Duration) {
        self.data_timeout = timeout;
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Run one transaction. Retryable response codes are retried with
    /// backoff unless the transaction carried a data-OUT phase (the source
    /// cannot be replayed).
    async fn dispatch(
        &mut self,
        cmd: Command,
        mut data: DataDir<'_>,
        data_timeout: Duration,
    ) -> Result<ResponseContainer> {
        if self.poisoned {
            return Err(ProtocolError::SessionInvalidated.into());
        }

        let can_retry = !matches!(&data, DataDir::Out(_));
        let mut attempt = 0usize;
        loop {
            let result = self.run_transaction(&cmd, &mut data, data_timeout).await;
            match result {
                Err(ref e) if e.is_retryable() && can_retry && attempt < RETRY_BACKOFF.len() => {
                    debug!(
                        code = format_args!("{:#06x}", cmd.code.to_u16()),
                        attempt, "retrying after busy response"
                    );
                    tokio::time::sleep(RETRY_BACKOFF[attempt]).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.invalidates_session() {
                        self.poisoned = true;
                    }
                    return Err(e);
                }
                Ok(response) => return Ok(response),
            }
        }
    }

    async fn run_transaction(
        &mut self,
        cmd: &Command,
        data: &mut DataDir<'_>,
        data_timeout: Duration,
    ) -> Result<ResponseContainer> {
        let txid = self.last_txid.next();
        self.last_txid = txid;

        container::send_command(
            self.transport.as_mut(),
            cmd.code,
            txid,
            &cmd.params,
            self.op_timeout,
        )
        .await?;

        match data {
            DataDir::None => {}
            DataDir::Out(source) => {
                container::send_data(self.transport.as_mut(), cmd.code, txid, &mut **source, data_timeout)
                    .await?;
            }
            DataDir::In(sink) => {
                match container::receive_data(self.transport.as_mut(), &mut **sink, data_timeout).await? {
                    DataPhase::Data { txid: data_txid, .. } => {
                        if data_txid != txid {
                            return Err(ProtocolError::TransactionMismatch {
                                expected: txid,
                                got: data_txid,
                            }
                            .into());
                        }
                    }
                    // Device skipped the data phase; its response is final.
                    DataPhase::Response(response) => return self.accept(response, txid),
                }
            }
        }

        let response = container::receive_response(self.transport.as_mut(), self.op_timeout).await?;
        self.accept(response, txid)
    }

    /// Validate a response against the outstanding command.
    fn accept(&mut self, response: ResponseContainer, txid: TransactionId) -> Result<ResponseContainer> {
        if response.txid != txid {
            self.poisoned = true;
            return Err(ProtocolError::TransactionMismatch { expected: txid, got: response.txid }.into());
        }
        match response.code {
            ResponseCode::Ok => Ok(response),
            ResponseCode::SessionNotOpen | ResponseCode::InvalidTransactionId => {
                self.poisoned = true;
                Err(Error::Mtp(response.code))
            }
            ResponseCode::TransactionCancelled => Err(Error::Cancelled),
            code => Err(Error::Mtp(code)),
        }
    }

    /// Run a data-IN operation and collect the payload in memory.
    async fn transact_in(&mut self, cmd: Command) -> Result<Vec<u8>> {
        let mut sink = VecSink::new();
        self.dispatch(cmd, DataDir::In(&mut sink), self.op_timeout).await?;
        Ok(sink.into_inner())
    }

    // ------------------------------------------------------------------
    // Session lifetime
    // ------------------------------------------------------------------

    /// Close the session. Further operations fail until a new session is
    /// opened.
    pub async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.dispatch(Command::new(OperationCode::CloseSession, &[]), DataDir::None, self.op_timeout)
            .await?;
        self.open = false;
        Ok(())
    }

    /// Cancel the outstanding transaction: send the class control request,
    /// then drain the pipe until the device acknowledges with
    /// TransactionCancelled or the drain window closes.
    pub async fn cancel(&mut self) -> Result<()> {
        let txid = self.last_txid;
        self.transport.cancel_transaction(txid).await?;

        let deadline = tokio::time::Instant::now() + CANCEL_DRAIN_TIMEOUT;
        loop {
            if tokio::time::Instant::now() >= deadline {
                self.poisoned = true;
                return Err(mtpkit_core::error::TransportError::Timeout.into());
            }
            let mut sink = VecSink::new();
            match container::receive_data(self.transport.as_mut(), &mut sink, Duration::from_millis(200)).await {
                Ok(DataPhase::Response(response))
                    if response.code == ResponseCode::TransactionCancelled =>
                {
                    debug!(%txid, "transaction cancelled");
                    return Ok(());
                }
                Ok(_) => continue,
                Err(Error::Transport(mtpkit_core::error::TransportError::Timeout)) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Reset the MTP function and clear the invalidated state.
    pub async fn reset(&mut self) -> Result<()> {
        self.transport.device_reset().await?;
        self.poisoned = false;
        self.open = false;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Consumer handle for the asynchronous event stream.
    pub fn events(&self) -> EventReceiver {
        self.events.receiver()
    }

    /// Drain whatever is pending on the interrupt pipe into the event queue.
    pub async fn poll_events(&mut self) {
        while self.pump_events_once().await {}
    }

    async fn pump_events_once(&mut self) -> bool {
        match self.transport.interrupt_read(EVENT_POLL_TIMEOUT).await {
            Ok(Some(bytes)) => match Event::parse(&bytes, self.session_id) {
                Ok(event) => {
                    debug!(code = ?event.code, "device event");
                    self.events.push(event);
                    true
                }
                Err(e) => {
                    warn!("discarding malformed event: {e}");
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                warn!("interrupt read failed: {e}");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Storage and object-graph operations
    // ------------------------------------------------------------------

    pub async fn get_storage_ids(&mut self) -> Result<Vec<StorageId>> {
        let data = self
            .transact_in(Command::new(OperationCode::GetStorageIds, &[]))
            .await
            .map_err(|e| {
                if matches!(e, Error::Mtp(ResponseCode::InvalidStorageId) | Error::Protocol(_)) {
                    warn!("storage listing failed; device may be locked or in charge-only mode");
                }
                e
            })?;
        let ids = Reader::new(&data).array_u32()?;
        Ok(ids.into_iter().map(StorageId::new).collect())
    }

    pub async fn get_storage_info(&mut self, storage: StorageId) -> Result<StorageInfo> {
        let data = self
            .transact_in(Command::new(OperationCode::GetStorageInfo, &[storage.raw()]))
            .await?;
        datasets::decode_storage_info(&data)
    }

    /// Direct children of `parent`, optionally filtered by format. Passing
    /// `ObjectId::ALL` as parent selects every object in the storage.
    pub async fn get_object_handles(
        &mut self,
        storage: StorageId,
        format: Option<ObjectFormat>,
        parent: ObjectId,
    ) -> Result<Vec<ObjectId>> {
        let data = self
            .transact_in(Command::new(
                OperationCode::GetObjectHandles,
                &[
                    storage.raw(),
                    format.map(|f| f.to_u16() as u32).unwrap_or(0),
                    parent.raw(),
                ],
            ))
            .await?;
        let handles = Reader::new(&data).array_u32()?;
        Ok(handles.into_iter().map(ObjectId::new).collect())
    }

    pub async fn get_object_info(&mut self, object: ObjectId) -> Result<ObjectInfo> {
        let data = self
            .transact_in(Command::new(OperationCode::GetObjectInfo, &[object.raw()]))
            .await?;
        datasets::decode_object_info(&data)
    }

    /// Stream an object's payload into `sink`.
    pub async fn get_object(&mut self, object: ObjectId, sink: &mut dyn ByteSink) -> Result<()> {
        let timeout = self.data_timeout;
        self.dispatch(
            Command::new(OperationCode::GetObject, &[object.raw()]),
            DataDir::In(sink),
            timeout,
        )
        .await?;
        Ok(())
    }

    /// Whole object in memory; only for small payloads.
    pub async fn get_object_bytes(&mut self, object: ObjectId) -> Result<Vec<u8>> {
        let mut sink = VecSink::new();
        self.get_object(object, &mut sink).await?;
        Ok(sink.into_inner())
    }

    pub async fn get_partial_object(
        &mut self,
        object: ObjectId,
        offset: u32,
        max_bytes: u32,
    ) -> Result<Vec<u8>> {
        self.transact_in(Command::new(
            OperationCode::GetPartialObject,
            &[object.raw(), offset, max_bytes],
        ))
        .await
    }

    pub async fn get_thumb(&mut self, object: ObjectId) -> Result<Vec<u8>> {
        self.transact_in(Command::new(OperationCode::GetThumb, &[object.raw()]))
            .await
    }

    /// Delete an object. Deleting an association removes its whole subtree.
    pub async fn delete_object(&mut self, object: ObjectId) -> Result<()> {
        self.dispatch(
            Command::new(OperationCode::DeleteObject, &[object.raw(), 0]),
            DataDir::None,
            self.op_timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn move_object(
        &mut self,
        object: ObjectId,
        storage: StorageId,
        new_parent: ObjectId,
    ) -> Result<()> {
        self.dispatch(
            Command::new(
                OperationCode::MoveObject,
                &[object.raw(), storage.raw(), new_parent.raw()],
            ),
            DataDir::None,
            self.op_timeout,
        )
        .await?;
        Ok(())
    }

    /// Announce an upload; the new object id comes back in the response.
    /// `SendObject` must follow as the next data operation.
    pub async fn send_object_info(
        &mut self,
        storage: StorageId,
        parent: ObjectId,
        info: &ObjectInfo,
    ) -> Result<ObjectId> {
        let payload = datasets::encode_object_info(info)?;
        let mut source = VecSource::new(payload);
        let response = self
            .dispatch(
                Command::new(OperationCode::SendObjectInfo, &[storage.raw(), parent.raw()]),
                DataDir::Out(&mut source),
                self.op_timeout,
            )
            .await?;
        response
            .params
            .get(2)
            .copied()
            .map(ObjectId::new)
            .ok_or_else(|| {
                ProtocolError::MalformedContainer(
                    "SendObjectInfo response missing the new object handle".into(),
                )
                .into()
            })
    }

    /// Send the payload bytes announced by the preceding SendObjectInfo or
    /// SendObjectPropList.
    pub async fn send_object(&mut self, source: &mut dyn ByteSource) -> Result<()> {
        let timeout = self.data_timeout;
        self.dispatch(
            Command::new(OperationCode::SendObject, &[]),
            DataDir::Out(source),
            timeout,
        )
        .await?;
        Ok(())
    }

    /// Create a directory ("association") under `parent`.
    pub async fn create_directory(
        &mut self,
        name: &str,
        parent: ObjectId,
        storage: StorageId,
    ) -> Result<ObjectId> {
        let info = ObjectInfo::for_directory(name);
        let object = self.send_object_info(storage, parent, &info).await?;
        debug!(%object, name, "created directory");
        Ok(object)
    }

    // ------------------------------------------------------------------
    // Device properties
    // ------------------------------------------------------------------

    pub async fn get_device_prop_desc(&mut self, prop: DevicePropertyCode) -> Result<Vec<u8>> {
        self.transact_in(Command::new(
            OperationCode::GetDevicePropDesc,
            &[prop.to_u16() as u32],
        ))
        .await
    }

    pub async fn get_device_prop_value(&mut self, prop: DevicePropertyCode) -> Result<Vec<u8>> {
        self.transact_in(Command::new(
            OperationCode::GetDevicePropValue,
            &[prop.to_u16() as u32],
        ))
        .await
    }

    pub async fn set_device_prop_value(
        &mut self,
        prop: DevicePropertyCode,
        value: &[u8],
    ) -> Result<()> {
        let mut source = VecSource::new(value.to_vec());
        self.dispatch(
            Command::new(OperationCode::SetDevicePropValue, &[prop.to_u16() as u32]),
            DataDir::Out(&mut source),
            self.op_timeout,
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Object properties
    // ------------------------------------------------------------------

    pub async fn get_object_props_supported(
        &mut self,
        format: ObjectFormat,
    ) -> Result<Vec<ObjectPropertyCode>> {
        let data = self
            .transact_in(Command::new(
                OperationCode::GetObjectPropsSupported,
                &[format.to_u16() as u32],
            ))
            .await?;
        let codes = Reader::new(&data).array_u16()?;
        Ok(codes.into_iter().map(ObjectPropertyCode::from_u16).collect())
    }

    pub async fn get_object_prop_desc(
        &mut self,
        prop: ObjectPropertyCode,
        format: ObjectFormat,
    ) -> Result<Vec<u8>> {
        self.transact_in(Command::new(
            OperationCode::GetObjectPropDesc,
            &[prop.to_u16() as u32, format.to_u16() as u32],
        ))
        .await
    }

    pub async fn get_object_prop_value(
        &mut self,
        object: ObjectId,
        prop: ObjectPropertyCode,
    ) -> Result<Vec<u8>> {
        self.transact_in(Command::new(
            OperationCode::GetObjectPropValue,
            &[object.raw(), prop.to_u16() as u32],
        ))
        .await
    }

    pub async fn get_object_string_property(
        &mut self,
        object: ObjectId,
        prop: ObjectPropertyCode,
    ) -> Result<String> {
        let data = self.get_object_prop_value(object, prop).await?;
        Reader::new(&data).string()
    }

    /// Integer property decoded by its wire width.
    pub async fn get_object_integer_property(
        &mut self,
        object: ObjectId,
        prop: ObjectPropertyCode,
    ) -> Result<u64> {
        let data = self.get_object_prop_value(object, prop).await?;
        let mut r = Reader::new(&data);
        match data.len() {
            1 => Ok(r.u8()? as u64),
            2 => Ok(r.u16()? as u64),
            4 => Ok(r.u32()? as u64),
            8 => r.u64(),
            n => Err(ProtocolError::MalformedDataset(format!(
                "integer property with {n}-byte payload"
            ))
            .into()),
        }
    }

    pub async fn set_object_prop_value(
        &mut self,
        object: ObjectId,
        prop: ObjectPropertyCode,
        value: &[u8],
    ) -> Result<()> {
        let mut source = VecSource::new(value.to_vec());
        self.dispatch(
            Command::new(
                OperationCode::SetObjectPropValue,
                &[object.raw(), prop.to_u16() as u32],
            ),
            DataDir::Out(&mut source),
            self.op_timeout,
        )
        .await?;
        Ok(())
    }

    pub async fn set_object_string_property(
        &mut self,
        object: ObjectId,
        prop: ObjectPropertyCode,
        value: &str,
    ) -> Result<()> {
        let mut w = Writer::new();
        w.string(value)?;
        self.set_object_prop_value(object, prop, &w.into_inner()).await
    }

    pub async fn set_object_u32_property(
        &mut self,
        object: ObjectId,
        prop: ObjectPropertyCode,
        value: u32,
    ) -> Result<()> {
        self.set_object_prop_value(object, prop, &value.to_le_bytes()).await
    }

    /// Set a property whose type is an array of u8 (cover art).
    pub async fn set_object_property_as_array(
        &mut self,
        object: ObjectId,
        prop: ObjectPropertyCode,
        value: &[u8],
    ) -> Result<()> {
        let mut w = Writer::new();
        w.array_u8(value);
        self.set_object_prop_value(object, prop, &w.into_inner()).await
    }

    /// Raw GetObjectPropList payload; parse with [`crate::proplist::parse`].
    pub async fn get_object_prop_list(
        &mut self,
        object: ObjectId,
        format: Option<ObjectFormat>,
        property: u32,
        group: u32,
        depth: u32,
    ) -> Result<Vec<u8>> {
        self.transact_in(Command::new(
            OperationCode::GetObjectPropList,
            &[
                object.raw(),
                format.map(|f| f.to_u16() as u32).unwrap_or(0),
                property,
                group,
                depth,
            ],
        ))
        .await
    }

    /// Create an object from a property list. The object's payload bytes
    /// follow with [`Session::send_object`].
    pub async fn send_object_prop_list(
        &mut self,
        storage: StorageId,
        parent: ObjectId,
        format: ObjectFormat,
        object_size: u64,
        prop_list: &[u8],
    ) -> Result<SendObjectPropListOutcome> {
        let mut source = VecSource::new(prop_list.to_vec());
        let response = self
            .dispatch(
                Command::new(
                    OperationCode::SendObjectPropList,
                    &[
                        storage.raw(),
                        parent.raw(),
                        format.to_u16() as u32,
                        (object_size >> 32) as u32,
                        object_size as u32,
                    ],
                ),
                DataDir::Out(&mut source),
                self.op_timeout,
            )
            .await?;
        match response.params.as_slice() {
            [storage, parent, object, ..] => Ok(SendObjectPropListOutcome {
                storage: StorageId::new(*storage),
                parent: ObjectId::new(*parent),
                object: ObjectId::new(*object),
            }),
            _ => Err(ProtocolError::MalformedContainer(
                "SendObjectPropList response missing the new object handle".into(),
            )
            .into()),
        }
    }

    pub async fn get_object_references(&mut self, object: ObjectId) -> Result<Vec<ObjectId>> {
        let data = self
            .transact_in(Command::new(OperationCode::GetObjectReferences, &[object.raw()]))
            .await?;
        let refs = Reader::new(&data).array_u32()?;
        Ok(refs.into_iter().map(ObjectId::new).collect())
    }

    pub async fn set_object_references(
        &mut self,
        object: ObjectId,
        references: &[ObjectId],
    ) -> Result<()> {
        let raw: Vec<u32> = references.iter().map(|r| r.raw()).collect();
        let mut w = Writer::new();
        w.array_u32(&raw);
        let mut source = VecSource::new(w.into_inner());
        self.dispatch(
            Command::new(OperationCode::SetObjectReferences, &[object.raw()]),
            DataDir::Out(&mut source),
            self.op_timeout,
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Vendor operations (used by the trusted-app layer)
    // ------------------------------------------------------------------

    /// Vendor operation with a data-IN phase.
    pub async fn vendor_in(
        &mut self,
        code: OperationCode,
        params: &[u32],
    ) -> Result<Vec<u8>> {
        self.transact_in(Command::new(code, params)).await
    }

    /// Vendor operation with a data-OUT phase.
    pub async fn vendor_out(
        &mut self,
        code: OperationCode,
        params: &[u32],
        data: &[u8],
    ) -> Result<()> {
        let mut source = VecSource::new(data.to_vec());
        self.dispatch(Command::new(code, params), DataDir::Out(&mut source), self.op_timeout)
            .await?;
        Ok(())
    }

    /// Vendor operation with no data phase; returns the response parameters.
    pub async fn vendor_plain(&mut self, code: OperationCode, params: &[u32]) -> Result<Vec<u32>> {
        let response = self
            .dispatch(Command::new(code, params), DataDir::None, self.op_timeout)
            .await?;
        Ok(response.params)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.open && !self.poisoned {
            // Async close cannot run here; a well-behaved caller closes first.
            warn!(session = %self.session_id, "session dropped without CloseSession");
        }
    }
}
