use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::StoreError;

/// Opaque resumption token handed to consumers.
///
/// Orders by `(publish_timestamp, sequence_id)` first, which is the
/// message-table key order; the payload part locates overflow payload rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MessageId {
    publish_timestamp: i64,
    sequence_id: u16,
    write_timestamp: i64,
    payload_sequence_id: u16,
}

impl MessageId {
    /// Size of the raw wire form: `i64 + u16 + i64 + u16`.
    pub const RAW_ID_SIZE: usize = 20;

    pub fn new(
        publish_timestamp: i64,
        sequence_id: u16,
        write_timestamp: i64,
        payload_sequence_id: u16,
    ) -> Self {
        Self { publish_timestamp, sequence_id, write_timestamp, payload_sequence_id }
    }

    /// Id of a message-table entry; the payload part is zero.
    pub fn from_publish(publish_timestamp: i64, sequence_id: u16) -> Self {
        Self::new(publish_timestamp, sequence_id, 0, 0)
    }

    pub fn publish_timestamp(&self) -> i64 {
        self.publish_timestamp
    }

    pub fn sequence_id(&self) -> u16 {
        self.sequence_id
    }

    pub fn write_timestamp(&self) -> i64 {
        self.write_timestamp
    }

    pub fn payload_sequence_id(&self) -> u16 {
        self.payload_sequence_id
    }

    /// Write the raw id into `buf[offset..offset + RAW_ID_SIZE]`, returning the end offset.
    pub fn put_raw_id(
        publish_timestamp: i64,
        sequence_id: u16,
        write_timestamp: i64,
        payload_sequence_id: u16,
        buf: &mut [u8],
        offset: usize,
    ) -> Result<usize, StoreError> {
        let Some(out) = offset
            .checked_add(Self::RAW_ID_SIZE)
            .and_then(|end| buf.get_mut(offset..end))
        else {
            return Err(StoreError::logic(format!(
                "buffer of {} bytes cannot hold a message id at offset {offset}",
                buf.len()
            )));
        };
        out[0..8].copy_from_slice(&publish_timestamp.to_be_bytes());
        out[8..10].copy_from_slice(&sequence_id.to_be_bytes());
        out[10..18].copy_from_slice(&write_timestamp.to_be_bytes());
        out[18..20].copy_from_slice(&payload_sequence_id.to_be_bytes());
        Ok(offset + Self::RAW_ID_SIZE)
    }

    pub fn to_raw(&self) -> [u8; Self::RAW_ID_SIZE] {
        let mut raw = [0u8; Self::RAW_ID_SIZE];
        raw[0..8].copy_from_slice(&self.publish_timestamp.to_be_bytes());
        raw[8..10].copy_from_slice(&self.sequence_id.to_be_bytes());
        raw[10..18].copy_from_slice(&self.write_timestamp.to_be_bytes());
        raw[18..20].copy_from_slice(&self.payload_sequence_id.to_be_bytes());
        raw
    }

    pub fn from_raw(raw: &[u8]) -> Result<Self, StoreError> {
        if raw.len() != Self::RAW_ID_SIZE {
            return Err(StoreError::format(format!(
                "message id must be {} bytes, got {}",
                Self::RAW_ID_SIZE,
                raw.len()
            )));
        }
        let i64_at = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&raw[at..at + 8]);
            i64::from_be_bytes(b)
        };
        let u16_at = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]);
        Ok(Self::new(i64_at(0), u16_at(8), i64_at(10), u16_at(18)))
    }
}

/// Base64url (no padding) of the raw form.
impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.to_raw()))
    }
}

impl FromStr for MessageId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|e| StoreError::format(format!("message id '{s}': {e}")))?;
        MessageId::from_raw(&raw)
    }
}
