//! Little-endian wire reader/writer with the MTP typed codecs.
//!
//! Strings are a u8 code-unit count (including the trailing NUL) followed by
//! UTF-16LE code units; arrays are a u32 element count followed by elements;
//! dates are 15-character `YYYYMMDDThhmmss` strings.

use chrono::NaiveDateTime;
use mtpkit_core::error::ProtocolError;
use mtpkit_core::Result;

/// Cursor over received payload bytes. Every accessor fails with
/// `ProtocolError` on truncation instead of panicking.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::MalformedDataset(format!(
                "wanted {n} bytes, {} left",
                self.remaining()
            ))
            .into());
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("slice len checked")))
    }

    pub fn u128(&mut self) -> Result<[u8; 16]> {
        let b = self.take(16)?;
        Ok(b.try_into().expect("slice len checked"))
    }

    /// UTF-16LE string: u8 count of code units including the trailing NUL;
    /// count 0 means empty.
    pub fn string(&mut self) -> Result<String> {
        let count = self.u8()? as usize;
        if count == 0 {
            return Ok(String::new());
        }
        let mut units = Vec::with_capacity(count);
        for _ in 0..count {
            units.push(self.u16()?);
        }
        // Drop the trailing NUL; tolerate devices that omit it.
        if units.last() == Some(&0) {
            units.pop();
        }
        String::from_utf16(&units)
            .map_err(|_| ProtocolError::MalformedDataset("invalid UTF-16 string".into()).into())
    }

    pub fn array_u8(&mut self) -> Result<Vec<u8>> {
        let count = self.u32()? as usize;
        Ok(self.take(count)?.to_vec())
    }

    pub fn array_u16(&mut self) -> Result<Vec<u16>> {
        let count = self.u32()? as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.u16()?);
        }
        Ok(out)
    }

    pub fn array_u32(&mut self) -> Result<Vec<u32>> {
        let count = self.u32()? as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.u32()?);
        }
        Ok(out)
    }
}

/// Builder for outgoing payload bytes.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    pub fn u128(&mut self, v: &[u8; 16]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(v);
        self
    }

    /// Encode a string per the MTP codec. Fails when the encoded form would
    /// exceed the 255-code-unit count field.
    pub fn string(&mut self, s: &str) -> Result<&mut Self> {
        if s.is_empty() {
            self.buf.push(0);
            return Ok(self);
        }
        let units: Vec<u16> = s.encode_utf16().collect();
        let count = units.len() + 1; // trailing NUL
        if count > u8::MAX as usize {
            return Err(ProtocolError::StringTooLong(units.len()).into());
        }
        self.buf.push(count as u8);
        for unit in units {
            self.buf.extend_from_slice(&unit.to_le_bytes());
        }
        self.buf.extend_from_slice(&0u16.to_le_bytes());
        Ok(self)
    }

    pub fn array_u8(&mut self, values: &[u8]) -> &mut Self {
        self.u32(values.len() as u32);
        self.buf.extend_from_slice(values);
        self
    }

    pub fn array_u16(&mut self, values: &[u16]) -> &mut Self {
        self.u32(values.len() as u32);
        for v in values {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
        self
    }

    pub fn array_u32(&mut self, values: &[u32]) -> &mut Self {
        self.u32(values.len() as u32);
        for v in values {
            self.buf.extend_from_slice(&v.to_le_bytes());
        }
        self
    }
}

/// Format a timestamp as the 15-character MTP date string.
pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y%m%dT%H%M%S").to_string()
}

/// Parse an MTP date string, tolerating the optional trailing timezone or
/// tenths-of-second suffix some firmwares append.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.get(..15)?;
    NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S").ok()
}

/// Date string for a bare release year.
pub fn format_year(year: i32) -> String {
    format!("{year:04}0101T000000")
}

/// Year from an MTP date string.
pub fn parse_year(s: &str) -> Option<i32> {
    parse_datetime(s).map(|dt| {
        use chrono::Datelike;
        dt.year()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    mod scalars {
        use super::*;

        #[test]
        fn little_endian_round_trip() {
            let mut w = Writer::new();
            w.u8(0xAB).u16(0x1234).u32(0xDEAD_BEEF).u64(0x0102_0304_0506_0708);
            let bytes = w.into_inner();
            assert_eq!(&bytes[1..3], &[0x34, 0x12]);

            let mut r = Reader::new(&bytes);
            assert_eq!(r.u8().unwrap(), 0xAB);
            assert_eq!(r.u16().unwrap(), 0x1234);
            assert_eq!(r.u32().unwrap(), 0xDEAD_BEEF);
            assert_eq!(r.u64().unwrap(), 0x0102_0304_0506_0708);
            assert!(r.is_empty());
        }

        #[test]
        fn truncated_read_errors() {
            let mut r = Reader::new(&[0x01, 0x02]);
            assert!(r.u32().is_err());
        }

        #[test]
        fn u128_round_trip() {
            let value = [7u8; 16];
            let mut w = Writer::new();
            w.u128(&value);
            let bytes = w.into_inner();
            let mut r = Reader::new(&bytes);
            assert_eq!(r.u128().unwrap(), value);
        }
    }

    mod strings {
        use super::*;

        #[test]
        fn round_trip() {
            let mut w = Writer::new();
            w.string("hello.txt").unwrap();
            let bytes = w.into_inner();
            // 1 count byte + (9 chars + NUL) * 2
            assert_eq!(bytes.len(), 1 + 2 * 10);
            assert_eq!(bytes[0], 10);

            let mut r = Reader::new(&bytes);
            assert_eq!(r.string().unwrap(), "hello.txt");
        }

        #[test]
        fn empty_string_is_one_zero_byte() {
            let mut w = Writer::new();
            w.string("").unwrap();
            assert_eq!(w.into_inner(), vec![0]);

            let mut r = Reader::new(&[0]);
            assert_eq!(r.string().unwrap(), "");
        }

        #[test]
        fn non_ascii_round_trip() {
            let mut w = Writer::new();
            w.string("Björk Début 東京").unwrap();
            let bytes = w.into_inner();
            let mut r = Reader::new(&bytes);
            assert_eq!(r.string().unwrap(), "Björk Début 東京");
        }

        #[test]
        fn encoded_length_formula() {
            // encoded length = 1 + 2 * (len + 1) for BMP strings
            for s in ["a", "abc", "hello world"] {
                let mut w = Writer::new();
                w.string(s).unwrap();
                assert_eq!(w.len(), 1 + 2 * (s.len() + 1));
            }
        }

        #[test]
        fn max_length_enforced() {
            let long = "x".repeat(254);
            let mut w = Writer::new();
            assert!(w.string(&long).is_ok());

            let too_long = "x".repeat(255);
            let mut w = Writer::new();
            assert!(w.string(&too_long).is_err());
        }

        #[test]
        fn missing_terminator_tolerated() {
            // count 2, "A" followed by a non-NUL unit
            let bytes = [2, 0x41, 0x00, 0x42, 0x00];
            let mut r = Reader::new(&bytes);
            assert_eq!(r.string().unwrap(), "AB");
        }
    }

    mod arrays {
        use super::*;

        #[test]
        fn u32_array_round_trip() {
            let mut w = Writer::new();
            w.array_u32(&[0x10, 0x20, 0x30]);
            let bytes = w.into_inner();
            assert_eq!(bytes.len(), 4 + 12);

            let mut r = Reader::new(&bytes);
            assert_eq!(r.array_u32().unwrap(), vec![0x10, 0x20, 0x30]);
        }

        #[test]
        fn empty_array() {
            let mut w = Writer::new();
            w.array_u16(&[]);
            let bytes = w.into_inner();
            let mut r = Reader::new(&bytes);
            assert_eq!(r.array_u16().unwrap(), Vec::<u16>::new());
        }

        #[test]
        fn truncated_array_errors() {
            // Claims 4 elements, carries 1
            let bytes = [4, 0, 0, 0, 0xAA, 0xBB];
            let mut r = Reader::new(&bytes);
            assert!(r.array_u16().is_err());
        }
    }

    mod dates {
        use super::*;

        #[test]
        fn round_trip() {
            let dt = parse_datetime("20240311T142530").unwrap();
            assert_eq!(format_datetime(dt), "20240311T142530");
        }

        #[test]
        fn trailing_suffix_tolerated() {
            assert!(parse_datetime("20240311T142530.5").is_some());
            assert!(parse_datetime("20240311T142530Z").is_some());
        }

        #[test]
        fn garbage_rejected() {
            assert!(parse_datetime("not a date at all").is_none());
            assert!(parse_datetime("2024").is_none());
        }

        #[test]
        fn year_formatting() {
            assert_eq!(format_year(1994), "19940101T000000");
            assert_eq!(parse_year("19940101T000000"), Some(1994));
        }
    }
}
