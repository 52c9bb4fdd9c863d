//! PTP container framing and bulk-pipe phase I/O.
//!
//! Every bulk message is a container: u32 total length, u16 type, u16 code,
//! u32 transaction id, then payload. A Data container's length advertises the
//! whole data phase, which may span many USB transfers.

use mtpkit_core::codes::{ContainerType, OperationCode, ResponseCode};
use mtpkit_core::error::ProtocolError;
use mtpkit_core::ids::TransactionId;
use mtpkit_core::stream::{ByteSink, ByteSource};
use mtpkit_core::Result;
use mtpkit_usb::MtpTransport;
use std::time::Duration;
use tracing::trace;

/// Size of the container header.
pub const CONTAINER_HEADER_LEN: usize = 12;

/// Chunk size for streamed data phases; kept a multiple of every legal bulk
/// max packet size so intermediate writes never end a transfer early.
const IO_CHUNK: usize = 64 * 1024;

/// A whole container held in memory. Data phases are streamed instead and
/// never pass through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub kind: ContainerType,
    pub code: u16,
    pub txid: TransactionId,
    pub payload: Vec<u8>,
}

impl Container {
    pub fn command(code: OperationCode, txid: TransactionId, params: &[u32]) -> Self {
        debug_assert!(params.len() <= 5);
        let mut payload = Vec::with_capacity(params.len() * 4);
        for p in params {
            payload.extend_from_slice(&p.to_le_bytes());
        }
        Self { kind: ContainerType::Command, code: code.to_u16(), txid, payload }
    }

    pub fn response(code: ResponseCode, txid: TransactionId, params: &[u32]) -> Self {
        let mut payload = Vec::with_capacity(params.len() * 4);
        for p in params {
            payload.extend_from_slice(&p.to_le_bytes());
        }
        Self { kind: ContainerType::Response, code: code.to_u16(), txid, payload }
    }

    pub fn data(code: u16, txid: TransactionId, payload: Vec<u8>) -> Self {
        Self { kind: ContainerType::Data, code, txid, payload }
    }

    pub fn encode(&self) -> Vec<u8> {
        let total = CONTAINER_HEADER_LEN + self.payload.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&self.kind.to_u16().to_le_bytes());
        out.extend_from_slice(&self.code.to_le_bytes());
        out.extend_from_slice(&self.txid.raw().to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = ContainerHeader::parse(bytes)?;
        let total = header.length as usize;
        if bytes.len() < total {
            return Err(ProtocolError::MalformedContainer(format!(
                "container advertises {total} bytes, {} received",
                bytes.len()
            ))
            .into());
        }
        Ok(Self {
            kind: header.kind,
            code: header.code,
            txid: header.txid,
            payload: bytes[CONTAINER_HEADER_LEN..total].to_vec(),
        })
    }

    /// Payload interpreted as up to five u32 parameters.
    pub fn params(&self) -> Vec<u32> {
        self.payload
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}

/// Parsed 12-byte header.
#[derive(Debug, Clone, Copy)]
pub struct ContainerHeader {
    pub length: u32,
    pub kind: ContainerType,
    pub code: u16,
    pub txid: TransactionId,
}

impl ContainerHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONTAINER_HEADER_LEN {
            return Err(ProtocolError::MalformedContainer(format!(
                "header needs {CONTAINER_HEADER_LEN} bytes, got {}",
                bytes.len()
            ))
            .into());
        }
        let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if (length as usize) < CONTAINER_HEADER_LEN {
            return Err(ProtocolError::MalformedContainer(format!(
                "length field {length} shorter than header"
            ))
            .into());
        }
        Ok(Self {
            length,
            kind: ContainerType::from_u16(u16::from_le_bytes([bytes[4], bytes[5]])),
            code: u16::from_le_bytes([bytes[6], bytes[7]]),
            txid: TransactionId::new(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]])),
        })
    }
}

/// A Response container with its parameters decoded.
#[derive(Debug, Clone)]
pub struct ResponseContainer {
    pub code: ResponseCode,
    pub txid: TransactionId,
    pub params: Vec<u32>,
}

/// What arrived when a data-IN phase was expected.
pub enum DataPhase {
    /// A Data container was streamed into the sink.
    Data { code: u16, txid: TransactionId, len: u64 },
    /// The device skipped the data phase and responded immediately.
    Response(ResponseContainer),
}

/// Send one Command container.
pub async fn send_command(
    transport: &mut dyn MtpTransport,
    code: OperationCode,
    txid: TransactionId,
    params: &[u32],
    timeout: Duration,
) -> Result<()> {
    let container = Container::command(code, txid, params);
    trace!(code = format_args!("{:#06x}", container.code), %txid, ?params, "-> command");
    transport.bulk_write(&container.encode(), timeout).await
}

/// Send a data-OUT phase, streaming from `source`.
///
/// Every intermediate bulk write is a multiple of the max packet size; the
/// final write is the short tail, followed by a ZLP when the total wire
/// length divides evenly into packets.
pub async fn send_data(
    transport: &mut dyn MtpTransport,
    code: OperationCode,
    txid: TransactionId,
    source: &mut dyn ByteSource,
    timeout: Duration,
) -> Result<u64> {
    let max_packet = transport.max_packet_size();

    // The length field must be known up front; a source without a hint gets
    // drained to memory first.
    let mut buffered: Option<Vec<u8>> = None;
    let total = match source.total_hint() {
        Some(total) => total,
        None => {
            let mut all = Vec::new();
            let mut chunk = vec![0u8; IO_CHUNK];
            loop {
                let n = source.read(&mut chunk).await?;
                if n == 0 {
                    break;
                }
                all.extend_from_slice(&chunk[..n]);
            }
            let total = all.len() as u64;
            buffered = Some(all);
            total
        }
    };

    let wire_len = total + CONTAINER_HEADER_LEN as u64;
    trace!(code = format_args!("{:#06x}", code.to_u16()), %txid, total, "-> data");

    let mut pending = Vec::with_capacity(IO_CHUNK + max_packet);
    pending.extend_from_slice(&(wire_len as u32).to_le_bytes());
    pending.extend_from_slice(&ContainerType::Data.to_u16().to_le_bytes());
    pending.extend_from_slice(&code.to_u16().to_le_bytes());
    pending.extend_from_slice(&txid.raw().to_le_bytes());

    let mut sent = 0u64;
    let mut chunk = vec![0u8; IO_CHUNK];
    loop {
        let n = match &mut buffered {
            Some(all) => {
                let n = (all.len() as u64 - sent).min(IO_CHUNK as u64) as usize;
                chunk[..n].copy_from_slice(&all[sent as usize..sent as usize + n]);
                n
            }
            None => source.read(&mut chunk).await?,
        };
        if n == 0 {
            break;
        }
        sent += n as u64;
        pending.extend_from_slice(&chunk[..n]);

        // Flush whole packets, keep the ragged tail for the next round.
        let aligned = pending.len() - pending.len() % max_packet;
        if aligned > 0 {
            transport.bulk_write(&pending[..aligned], timeout).await?;
            pending.drain(..aligned);
        }
    }

    if sent != total {
        return Err(ProtocolError::MalformedContainer(format!(
            "data source produced {sent} bytes, header advertised {total}"
        ))
        .into());
    }

    if !pending.is_empty() {
        transport.bulk_write(&pending, timeout).await?;
    } else {
        // Transfer ended exactly on a packet boundary.
        transport.bulk_write(&[], timeout).await?;
    }
    Ok(total)
}

/// Receive the data-IN phase of a transaction, streaming payload into `sink`.
///
/// Returns the Response container directly when the device skipped the data
/// phase (typically on error).
pub async fn receive_data(
    transport: &mut dyn MtpTransport,
    sink: &mut dyn ByteSink,
    timeout: Duration,
) -> Result<DataPhase> {
    let max_packet = transport.max_packet_size();
    let mut first = vec![0u8; max_packet.max(CONTAINER_HEADER_LEN)];
    let mut filled = 0usize;
    while filled < CONTAINER_HEADER_LEN {
        let n = transport.bulk_read(&mut first[filled..], timeout).await?;
        if n == 0 {
            return Err(ProtocolError::MalformedContainer("empty transfer in place of header".into()).into());
        }
        filled += n;
    }

    let header = ContainerHeader::parse(&first[..filled])?;
    match header.kind {
        ContainerType::Response => {
            let container = collect_remainder(transport, &first[..filled], header, timeout).await?;
            Ok(DataPhase::Response(ResponseContainer {
                code: ResponseCode::from_u16(container.code),
                txid: container.txid,
                params: container.params(),
            }))
        }
        ContainerType::Data => {
            let total = header.length as u64 - CONTAINER_HEADER_LEN as u64;
            trace!(code = format_args!("{:#06x}", header.code), txid = %header.txid, total, "<- data");
            sink.set_total(total);

            let mut received = (filled - CONTAINER_HEADER_LEN) as u64;
            if received > total {
                // Some devices round the advertised size down; trust the header.
                received = total;
            }
            sink.write(&first[CONTAINER_HEADER_LEN..CONTAINER_HEADER_LEN + received as usize])
                .await?;

            let mut chunk = vec![0u8; IO_CHUNK];
            while received < total {
                let want = ((total - received) as usize).min(IO_CHUNK);
                let n = transport.bulk_read(&mut chunk[..want.max(max_packet)], timeout).await?;
                if n == 0 {
                    return Err(mtpkit_core::error::TransportError::ShortRead {
                        wanted: total as usize,
                        got: received as usize,
                    }
                    .into());
                }
                let useful = n.min((total - received) as usize);
                sink.write(&chunk[..useful]).await?;
                received += useful as u64;
            }
            Ok(DataPhase::Data { code: header.code, txid: header.txid, len: total })
        }
        other => Err(ProtocolError::UnexpectedPhase { got: other, phase: "data" }.into()),
    }
}

/// Receive a Response container.
pub async fn receive_response(
    transport: &mut dyn MtpTransport,
    timeout: Duration,
) -> Result<ResponseContainer> {
    let max_packet = transport.max_packet_size();
    let mut first = vec![0u8; max_packet.max(CONTAINER_HEADER_LEN)];
    let mut filled = 0usize;
    while filled < CONTAINER_HEADER_LEN {
        let n = transport.bulk_read(&mut first[filled..], timeout).await?;
        if n == 0 {
            return Err(ProtocolError::MalformedContainer("empty transfer in place of header".into()).into());
        }
        filled += n;
    }

    let header = ContainerHeader::parse(&first[..filled])?;
    if header.kind != ContainerType::Response {
        return Err(ProtocolError::UnexpectedPhase { got: header.kind, phase: "response" }.into());
    }
    let container = collect_remainder(transport, &first[..filled], header, timeout).await?;
    let response = ResponseContainer {
        code: ResponseCode::from_u16(container.code),
        txid: container.txid,
        params: container.params(),
    };
    trace!(code = ?response.code, txid = %response.txid, "<- response");
    Ok(response)
}

/// Finish reading a small container whose header (and possibly part of the
/// payload) already arrived.
async fn collect_remainder(
    transport: &mut dyn MtpTransport,
    first: &[u8],
    header: ContainerHeader,
    timeout: Duration,
) -> Result<Container> {
    let total = header.length as usize;
    let mut bytes = first[..first.len().min(total)].to_vec();
    while bytes.len() < total {
        let mut chunk = vec![0u8; total - bytes.len()];
        let n = transport.bulk_read(&mut chunk, timeout).await?;
        if n == 0 {
            return Err(mtpkit_core::error::TransportError::ShortRead {
                wanted: total,
                got: bytes.len(),
            }
            .into());
        }
        bytes.extend_from_slice(&chunk[..n]);
    }
    Container::decode(&bytes)
}
