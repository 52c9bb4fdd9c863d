//! A container-level fake device for the conformance suite.
//!
//! The fake implements `MtpTransport` and answers bulk traffic like a small
//! MTP device: an object tree, property lists, references, and the vendor
//! trusted-app window. State sits behind a shared handle so tests can
//! inspect it after handing the transport to the client.

use async_trait::async_trait;
use mtpkit_core::codes::{ContainerType, ObjectFormat, ResponseCode};
use mtpkit_core::error::TransportError;
use mtpkit_core::ids::TransactionId;
use mtpkit_core::Result;
use mtpkit_ptp::proplist::{self, PropertyValue};
use mtpkit_ptp::wire::Writer;
use mtpkit_ptp::Container;
use mtpkit_usb::MtpTransport;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STORAGE: u32 = 0x0001_0001;
const ROOT: u32 = 0;
const ALL: u32 = 0xFFFF_FFFF;

const ASSOCIATION: u16 = 0x3001;
const PROP_FILENAME: u16 = 0xDC07;
const PROP_NAME: u16 = 0xDC44;
const PROP_ARTIST: u16 = 0xDC46;
const PROP_ARTIST_ID: u16 = 0xDA9C;

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub storage: u32,
    pub parent: u32,
    pub format: u16,
    pub name: String,
    pub data: Vec<u8>,
    /// Wire-encoded property values by property code.
    pub props: HashMap<u16, Vec<u8>>,
    pub refs: Vec<u32>,
}

struct PendingCommand {
    code: u16,
    txid: u32,
    params: Vec<u32>,
}

#[derive(Default)]
pub struct Inner {
    pub objects: BTreeMap<u32, FakeObject>,
    next_handle: u32,
    session: Option<u32>,
    rx: Vec<u8>,
    tx: VecDeque<Vec<u8>>,
    interrupt: VecDeque<Vec<u8>>,
    awaiting_data: Option<PendingCommand>,
    awaiting_object_data: Option<u32>,
    device_props: HashMap<u16, Vec<u8>>,
    /// Configuration knobs.
    pub artist_format_supported: bool,
    pub album_props: Vec<u16>,
    pub reject_challenge: bool,
    pub wifi_scan: Vec<u8>,
    /// Observability for assertions.
    pub command_log: Vec<(u16, u32, Vec<u32>)>,
    pub vendor_log: Vec<u16>,
    pub created_dirs: Vec<String>,
    pub cancelled: Vec<u32>,
}

#[derive(Clone)]
pub struct FakeDevice(pub Arc<Mutex<Inner>>);

impl FakeDevice {
    pub fn new() -> Self {
        let inner = Inner {
            next_handle: 0x100,
            artist_format_supported: true,
            album_props: vec![PROP_NAME, 0xDC47, 0xDC86],
            wifi_scan: Vec::new(),
            ..Default::default()
        };
        Self(Arc::new(Mutex::new(inner)))
    }

    pub fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().unwrap()
    }

    /// Seed an object directly into the tree.
    pub fn add_object(&self, handle: u32, parent: u32, format: u16, name: &str, data: &[u8]) {
        let mut inner = self.lock();
        inner.objects.insert(
            handle,
            FakeObject {
                storage: STORAGE,
                parent,
                format,
                name: name.to_string(),
                data: data.to_vec(),
                props: HashMap::new(),
                refs: Vec::new(),
            },
        );
        inner.next_handle = inner.next_handle.max(handle + 1);
    }

    /// A certificate blob carrying an RSA modulus at the size marker.
    pub fn install_certificate(&self, modulus: &[u8; 128]) {
        let mut cert = vec![0x02, 0x01, 0x01, 0x00, 0x00];
        cert.extend_from_slice(&[0x55; 32]);
        cert.extend_from_slice(&[0x00, 0x80]);
        cert.extend_from_slice(modulus);
        cert.extend_from_slice(&[0x01, 0x00, 0x01]);
        cert.extend_from_slice(&[0x66; 48]);
        self.lock().device_props.insert(0x9101, cert);
    }
}

impl Inner {
    /// Queue one interrupt transfer (an Event container).
    pub fn push_interrupt(&mut self, data: Vec<u8>) {
        self.interrupt.push_back(data);
    }

    fn reply(&mut self, container: Vec<u8>) {
        self.tx.push_back(container);
    }

    fn respond(&mut self, code: ResponseCode, txid: u32, params: &[u32]) {
        self.reply(Container::response(code, TransactionId::new(txid), params).encode());
    }

    fn respond_data(&mut self, code: u16, txid: u32, payload: Vec<u8>) {
        self.reply(Container::data(code, TransactionId::new(txid), payload).encode());
        self.respond(ResponseCode::Ok, txid, &[]);
    }

    fn consume_rx(&mut self) {
        loop {
            if self.rx.len() < 12 {
                return;
            }
            let length = u32::from_le_bytes([self.rx[0], self.rx[1], self.rx[2], self.rx[3]]) as usize;
            if self.rx.len() < length {
                return;
            }
            let container: Vec<u8> = self.rx.drain(..length).collect();
            let kind = u16::from_le_bytes([container[4], container[5]]);
            let code = u16::from_le_bytes([container[6], container[7]]);
            let txid = u32::from_le_bytes([container[8], container[9], container[10], container[11]]);
            let payload = &container[12..];

            if kind == ContainerType::Command.to_u16() {
                let params: Vec<u32> = payload
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                self.command_log.push((code, txid, params.clone()));
                if expects_data_out(code) {
                    self.awaiting_data = Some(PendingCommand { code, txid, params });
                } else {
                    self.execute(code, txid, &params, &[]);
                }
            } else if kind == ContainerType::Data.to_u16() {
                let pending = self.awaiting_data.take().expect("data phase without command");
                assert_eq!(pending.txid, txid, "data phase txid mismatch");
                let params = pending.params.clone();
                let payload = payload.to_vec();
                self.execute(pending.code, txid, &params, &payload);
            } else {
                panic!("host sent unexpected container type {kind}");
            }
        }
    }

    fn execute(&mut self, code: u16, txid: u32, params: &[u32], data: &[u8]) {
        if (0x9100..0x9300).contains(&code) {
            self.vendor_log.push(code);
        }
        match code {
            // GetDeviceInfo
            0x1001 => {
                let payload = self.device_info_payload();
                self.respond_data(code, txid, payload);
            }
            // OpenSession
            0x1002 => {
                if self.session.is_some() {
                    self.respond(ResponseCode::SessionAlreadyOpen, txid, &[]);
                } else {
                    self.session = Some(params[0]);
                    self.respond(ResponseCode::Ok, txid, &[]);
                }
            }
            // CloseSession
            0x1003 => {
                self.session = None;
                self.respond(ResponseCode::Ok, txid, &[]);
            }
            // GetStorageIDs
            0x1004 => {
                let mut w = Writer::new();
                w.array_u32(&[STORAGE]);
                self.respond_data(code, txid, w.into_inner());
            }
            // GetStorageInfo
            0x1005 => {
                let mut w = Writer::new();
                w.u16(0x0003);
                w.u16(0x0002);
                w.u16(0x0000);
                w.u64(8 << 30);
                w.u64(5 << 30);
                w.u32(0xFFFF_FFFF);
                w.string("internal storage").unwrap();
                w.string("Fake Player").unwrap();
                self.respond_data(code, txid, w.into_inner());
            }
            // GetObjectHandles
            0x1007 => {
                let parent = params[2];
                if parent != ALL && parent != ROOT && !self.objects.contains_key(&parent) {
                    self.respond(ResponseCode::InvalidObjectHandle, txid, &[]);
                    return;
                }
                let format = params[1] as u16;
                let handles: Vec<u32> = self
                    .objects
                    .iter()
                    .filter(|(_, o)| parent == ALL || o.parent == parent)
                    .filter(|(_, o)| format == 0 || o.format == format)
                    .map(|(h, _)| *h)
                    .collect();
                let mut w = Writer::new();
                w.array_u32(&handles);
                self.respond_data(code, txid, w.into_inner());
            }
            // GetObjectInfo
            0x1008 => match self.objects.get(&params[0]) {
                None => self.respond(ResponseCode::InvalidObjectHandle, txid, &[]),
                Some(object) => {
                    let mut w = Writer::new();
                    w.u32(object.storage);
                    w.u16(object.format);
                    w.u16(0);
                    w.u32(object.data.len() as u32);
                    w.u16(0);
                    for _ in 0..6 {
                        w.u32(0);
                    }
                    w.u32(object.parent);
                    w.u16(if object.format == ASSOCIATION { 1 } else { 0 });
                    w.u32(0);
                    w.u32(0);
                    w.string(&object.name).unwrap();
                    w.string("").unwrap();
                    w.string("20240101T000000").unwrap();
                    w.string("").unwrap();
                    self.respond_data(code, txid, w.into_inner());
                }
            },
            // GetObject
            0x1009 => match self.objects.get(&params[0]) {
                None => self.respond(ResponseCode::InvalidObjectHandle, txid, &[]),
                Some(object) => {
                    let data = object.data.clone();
                    self.respond_data(code, txid, data);
                }
            },
            // DeleteObject
            0x100B => {
                if !self.objects.contains_key(&params[0]) {
                    self.respond(ResponseCode::InvalidObjectHandle, txid, &[]);
                    return;
                }
                self.delete_recursive(params[0]);
                self.respond(ResponseCode::Ok, txid, &[]);
            }
            // SendObjectInfo
            0x100C => {
                let info = mtpkit_ptp::datasets::decode_object_info(data).expect("object info");
                let handle = self.next_handle;
                self.next_handle += 1;
                if info.format.to_u16() == ASSOCIATION {
                    self.created_dirs.push(info.filename.clone());
                }
                self.objects.insert(
                    handle,
                    FakeObject {
                        storage: params[0],
                        parent: params[1],
                        format: info.format.to_u16(),
                        name: info.filename.clone(),
                        data: Vec::new(),
                        props: HashMap::new(),
                        refs: Vec::new(),
                    },
                );
                self.awaiting_object_data = Some(handle);
                self.respond(ResponseCode::Ok, txid, &[params[0], params[1], handle]);
            }
            // SendObject
            0x100D => {
                if let Some(handle) = self.awaiting_object_data.take() {
                    if let Some(object) = self.objects.get_mut(&handle) {
                        object.data = data.to_vec();
                    }
                }
                self.respond(ResponseCode::Ok, txid, &[]);
            }
            // GetDevicePropValue
            0x1015 => {
                let value = self.device_props.get(&(params[0] as u16)).cloned().unwrap_or_default();
                self.respond_data(code, txid, value);
            }
            // SetDevicePropValue
            0x1016 => {
                self.device_props.insert(params[0] as u16, data.to_vec());
                self.respond(ResponseCode::Ok, txid, &[]);
            }
            // GetObjectPropsSupported
            0x9801 => {
                let props = if params[0] as u16 == ObjectFormat::AbstractAudioAlbum.to_u16() {
                    self.album_props.clone()
                } else {
                    vec![PROP_FILENAME, PROP_NAME]
                };
                let mut w = Writer::new();
                w.array_u16(&props);
                self.respond_data(code, txid, w.into_inner());
            }
            // GetObjectPropDesc
            0x9802 => self.respond_data(code, txid, Vec::new()),
            // GetObjectPropValue
            0x9803 => {
                let handle = params[0];
                let prop = params[1] as u16;
                match self.objects.get(&handle) {
                    None => self.respond(ResponseCode::InvalidObjectHandle, txid, &[]),
                    Some(object) => match self.prop_value(object, prop) {
                        Some(value) => self.respond_data(code, txid, value),
                        None => self.respond(ResponseCode::InvalidObjectPropCode, txid, &[]),
                    },
                }
            }
            // SetObjectPropValue
            0x9804 => {
                let handle = params[0];
                let prop = params[1] as u16;
                match self.objects.get_mut(&handle) {
                    None => self.respond(ResponseCode::InvalidObjectHandle, txid, &[]),
                    Some(object) => {
                        object.props.insert(prop, data.to_vec());
                        if prop == PROP_FILENAME {
                            let mut r = mtpkit_ptp::wire::Reader::new(data);
                            if let Ok(name) = r.string() {
                                object.name = name;
                            }
                        }
                        self.respond(ResponseCode::Ok, txid, &[]);
                    }
                }
            }
            // GetObjectPropList
            0x9805 => {
                let handle = params[0];
                let format = params[1] as u16;
                let prop = params[2] as u16;
                let scope: Vec<(u32, &FakeObject)> = if format == ASSOCIATION {
                    let parent = if handle == 0 { ROOT } else { handle };
                    self.objects
                        .iter()
                        .filter(|(_, o)| o.parent == parent && o.format == ASSOCIATION)
                        .map(|(h, o)| (*h, o))
                        .collect()
                } else {
                    self.objects
                        .iter()
                        .filter(|(_, o)| format == 0 || o.format == format)
                        .map(|(h, o)| (*h, o))
                        .collect()
                };
                let mut body = Writer::new();
                let mut count = 0u32;
                for (h, object) in scope {
                    let Some(value) = self.prop_value(object, prop) else { continue };
                    body.u32(h);
                    body.u16(prop);
                    body.u16(0xFFFF); // string
                    body.bytes(&value);
                    count += 1;
                }
                let mut w = Writer::new();
                w.u32(count);
                w.bytes(&body.into_inner());
                self.respond_data(code, txid, w.into_inner());
            }
            // SendObjectPropList
            0x9806 => {
                let entries = proplist::parse(data).expect("prop list");
                let mut name = String::new();
                let mut props = HashMap::new();
                for entry in &entries {
                    let raw = encode_prop(&entry.value);
                    let code = entry.property.to_u16();
                    if code == PROP_FILENAME {
                        if let Some(s) = entry.value.as_str() {
                            name = s.to_string();
                        }
                    }
                    props.insert(code, raw);
                }
                // Firmwares materialise the artist name string on objects
                // created with an ArtistId reference; mirror that.
                if let Some(artist_id) = entries
                    .iter()
                    .find(|e| e.property.to_u16() == PROP_ARTIST_ID)
                    .and_then(|e| e.value.as_u32())
                {
                    if let Some(artist) = self.objects.get(&artist_id) {
                        let encoded = artist.props.get(&PROP_NAME).cloned().unwrap_or_else(|| {
                            let mut w = Writer::new();
                            w.string(&artist.name).unwrap();
                            w.into_inner()
                        });
                        props.entry(PROP_ARTIST).or_insert(encoded);
                    }
                }
                let handle = self.next_handle;
                self.next_handle += 1;
                self.objects.insert(
                    handle,
                    FakeObject {
                        storage: params[0],
                        parent: params[1],
                        format: params[2] as u16,
                        name,
                        data: Vec::new(),
                        props,
                        refs: Vec::new(),
                    },
                );
                self.awaiting_object_data = Some(handle);
                self.respond(ResponseCode::Ok, txid, &[params[0], params[1], handle]);
            }
            // GetObjectReferences
            0x9810 => {
                let refs = self
                    .objects
                    .get(&params[0])
                    .map(|o| o.refs.clone())
                    .unwrap_or_default();
                let mut w = Writer::new();
                w.array_u32(&refs);
                self.respond_data(code, txid, w.into_inner());
            }
            // SetObjectReferences
            0x9811 => {
                let mut r = mtpkit_ptp::wire::Reader::new(data);
                let refs = r.array_u32().expect("references payload");
                match self.objects.get_mut(&params[0]) {
                    None => self.respond(ResponseCode::InvalidObjectHandle, txid, &[]),
                    Some(object) => {
                        object.refs = refs;
                        self.respond(ResponseCode::Ok, txid, &[]);
                    }
                }
            }
            // Trusted app: GetCertificate
            0x9101 => {
                let cert = self.device_props.get(&0x9101).cloned().unwrap_or_default();
                self.respond_data(code, txid, cert);
            }
            // SendHostCertificate
            0x9102 => self.respond(ResponseCode::Ok, txid, &[]),
            // GetChallenge
            0x9103 => {
                let mut payload = vec![0xD7u8; 16]; // device nonce
                payload.extend_from_slice(&[0x5Au8; 20]); // salt
                self.respond_data(code, txid, payload);
            }
            // SendChallengeResponse
            0x9104 => {
                assert_eq!(data.len(), 16 + 128, "host nonce + signature");
                if self.reject_challenge {
                    self.respond(ResponseCode::AccessDenied, txid, &[]);
                } else {
                    self.respond(ResponseCode::Ok, txid, &[]);
                }
            }
            // GetWifiNetworkList
            0x9226 => {
                let scan = self.wifi_scan.clone();
                self.respond_data(code, txid, scan);
            }
            // SetWifiConfiguration
            0x9227 => {
                assert_eq!(data.len(), 324, "wifi profile must be 324 bytes");
                self.respond(ResponseCode::Ok, txid, &[]);
            }
            // Remaining vendor ops have no data phase and always succeed.
            0x9224 | 0x9228 | 0x922A | 0x922B | 0x9230 => {
                self.respond(ResponseCode::Ok, txid, &[]);
            }
            other => panic!("fake device: unimplemented operation {other:#06x}"),
        }
    }

    fn prop_value(&self, object: &FakeObject, prop: u16) -> Option<Vec<u8>> {
        if let Some(value) = object.props.get(&prop) {
            return Some(value.clone());
        }
        match prop {
            PROP_FILENAME | PROP_NAME => {
                let mut w = Writer::new();
                w.string(&object.name).unwrap();
                Some(w.into_inner())
            }
            _ => None,
        }
    }

    fn delete_recursive(&mut self, handle: u32) {
        let children: Vec<u32> = self
            .objects
            .iter()
            .filter(|(_, o)| o.parent == handle)
            .map(|(h, _)| *h)
            .collect();
        for child in children {
            self.delete_recursive(child);
        }
        self.objects.remove(&handle);
    }

    fn device_info_payload(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u16(100);
        w.u32(6);
        w.u16(100);
        w.string("microsoft.com: 1.0; microsoft.com/WMPPD: 11.0").unwrap();
        w.u16(0);
        w.array_u16(&[
            0x1001, 0x1002, 0x1003, 0x1004, 0x1005, 0x1007, 0x1008, 0x1009, 0x100B, 0x100C,
            0x100D, 0x1015, 0x1016, 0x9801, 0x9802, 0x9803, 0x9804, 0x9805, 0x9806, 0x9810,
            0x9811, 0x9101, 0x9102, 0x9103, 0x9104,
        ]);
        w.array_u16(&[0x4002, 0x4003, 0x4006, 0x400A]);
        w.array_u16(&[0xD402]);
        w.array_u16(&[]);
        let mut formats = vec![0x3001, 0x3004, 0x3009, 0xBA03];
        if self.artist_format_supported {
            formats.push(0xB218);
        }
        w.array_u16(&formats);
        w.string("Acme").unwrap();
        w.string("Fake Player").unwrap();
        w.string("1.0").unwrap();
        w.string("FAKE0001").unwrap();
        w.into_inner()
    }
}

fn expects_data_out(code: u16) -> bool {
    matches!(
        code,
        0x100C | 0x100D | 0x1016 | 0x9804 | 0x9806 | 0x9811 | 0x9102 | 0x9104 | 0x9227 | 0x922A
    )
}

fn encode_prop(value: &PropertyValue) -> Vec<u8> {
    let mut w = Writer::new();
    match value {
        PropertyValue::U8(v) => {
            w.u8(*v);
        }
        PropertyValue::U16(v) => {
            w.u16(*v);
        }
        PropertyValue::U32(v) => {
            w.u32(*v);
        }
        PropertyValue::U64(v) => {
            w.u64(*v);
        }
        PropertyValue::U128(v) => {
            w.u128(v);
        }
        PropertyValue::Str(s) => {
            w.string(s).unwrap();
        }
        other => panic!("fake device: unencodable property {other:?}"),
    }
    w.into_inner()
}

#[async_trait]
impl MtpTransport for FakeDevice {
    fn max_packet_size(&self) -> usize {
        512
    }

    async fn bulk_read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut inner = self.lock();
        let mut chunk = inner.tx.pop_front().ok_or(TransportError::Timeout)?;
        if chunk.len() > buf.len() {
            let rest = chunk.split_off(buf.len());
            inner.tx.push_front(rest);
        }
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    async fn bulk_write(&mut self, data: &[u8], _timeout: Duration) -> Result<()> {
        let mut inner = self.lock();
        inner.rx.extend_from_slice(data);
        inner.consume_rx();
        Ok(())
    }

    async fn interrupt_read(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        Ok(self.lock().interrupt.pop_front())
    }

    async fn cancel_transaction(&mut self, txid: TransactionId) -> Result<()> {
        let mut inner = self.lock();
        inner.cancelled.push(txid.raw());
        // The device abandons whatever was queued and acknowledges.
        inner.tx.clear();
        inner.awaiting_data = None;
        let ack = Container::response(ResponseCode::TransactionCancelled, txid, &[]).encode();
        inner.tx.push_back(ack);
        Ok(())
    }

    async fn device_status(&mut self) -> Result<u16> {
        Ok(0x2001)
    }

    async fn device_reset(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.tx.clear();
        inner.rx.clear();
        inner.session = None;
        Ok(())
    }

    async fn clear_halt_in(&mut self) -> Result<()> {
        Ok(())
    }

    async fn clear_halt_out(&mut self) -> Result<()> {
        Ok(())
    }
}
