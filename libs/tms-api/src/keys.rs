//! Row-key encoding shared by every table and backend.
//!
//! A row key is `topic bytes ++ fixed-width big-endian fields`. The topic part
//! has variable length, so fixed-width fields are always decoded as a suffix,
//! with offsets computed from the end of the key.

use crate::error::StoreError;

const I64_LEN: usize = 8;
const U16_LEN: usize = 2;

/// Width of the message-table suffix: `be64(publish_ts) ++ be16(seq)`.
pub const MESSAGE_KEY_SUFFIX_LEN: usize = I64_LEN + U16_LEN;

/// Width of the payload-table suffix: `be64(write_ptr) ++ be64(write_ts) ++ be16(seq)`.
pub const PAYLOAD_KEY_SUFFIX_LEN: usize = 2 * I64_LEN + U16_LEN;

/// `topic ++ be64(publish_ts) ++ be16(seq)`.
pub fn encode_message_key(topic: &[u8], publish_ts: i64, seq: u16) -> Vec<u8> {
    let mut key = Vec::with_capacity(topic.len() + MESSAGE_KEY_SUFFIX_LEN);
    key.extend_from_slice(topic);
    key.extend_from_slice(&publish_ts.to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// Scan start for "first message at or after `start_time`".
pub fn encode_message_time_key(topic: &[u8], start_time: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(topic.len() + I64_LEN);
    key.extend_from_slice(topic);
    key.extend_from_slice(&start_time.to_be_bytes());
    key
}

/// `topic ++ be64(write_ptr) ++ be64(write_ts) ++ be16(seq)`.
pub fn encode_payload_key(topic: &[u8], write_ptr: i64, write_ts: i64, seq: u16) -> Vec<u8> {
    let mut key = encode_payload_prefix(topic, write_ptr);
    key.reserve(I64_LEN + U16_LEN);
    key.extend_from_slice(&write_ts.to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

/// `topic ++ be64(write_ptr)`: the whole key range of one transaction.
pub fn encode_payload_prefix(topic: &[u8], write_ptr: i64) -> Vec<u8> {
    let mut key = Vec::with_capacity(topic.len() + PAYLOAD_KEY_SUFFIX_LEN);
    key.extend_from_slice(topic);
    key.extend_from_slice(&write_ptr.to_be_bytes());
    key
}

/// `(publish_ts, seq)` from a message-table row key.
pub fn decode_message_key(row: &[u8]) -> Result<(i64, u16), StoreError> {
    if row.len() < MESSAGE_KEY_SUFFIX_LEN {
        return Err(StoreError::format(format!(
            "message row key too short: {} bytes",
            row.len()
        )));
    }
    let seq_at = row.len() - U16_LEN;
    let ts_at = seq_at - I64_LEN;
    Ok((read_i64(row, ts_at), read_u16(row, seq_at)))
}

/// `(write_ptr, write_ts, seq)` from a payload-table row key.
pub fn decode_payload_key(row: &[u8]) -> Result<(i64, i64, u16), StoreError> {
    if row.len() < PAYLOAD_KEY_SUFFIX_LEN {
        return Err(StoreError::format(format!(
            "payload row key too short: {} bytes",
            row.len()
        )));
    }
    let seq_at = row.len() - U16_LEN;
    let ts_at = seq_at - I64_LEN;
    let ptr_at = ts_at - I64_LEN;
    Ok((read_i64(row, ptr_at), read_i64(row, ts_at), read_u16(row, seq_at)))
}

/// Decode a big-endian i64 column value (transaction write pointer).
pub fn decode_i64(value: &[u8]) -> Result<i64, StoreError> {
    let arr: [u8; I64_LEN] = value.try_into().map_err(|_| {
        StoreError::format(format!("expected {I64_LEN} bytes, got {}", value.len()))
    })?;
    Ok(i64::from_be_bytes(arr))
}

/// Exclusive upper bound of a scan over every key starting with `prefix`.
///
/// Drops trailing `0xff` bytes and increments the last remaining byte.
/// `None` when the prefix is all `0xff` (scan to the end of the table).
pub fn stop_key_for_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let last = prefix.iter().rposition(|b| *b != 0xff)?;
    let mut stop = prefix[..=last].to_vec();
    stop[last] += 1;
    Some(stop)
}

/// Treat `key` as a big-endian unsigned integer and add one, keeping its width.
///
/// `None` on overflow (all bytes `0xff`): no key of the same width follows.
pub fn increment_key(key: &[u8]) -> Option<Vec<u8>> {
    let mut out = key.to_vec();
    for b in out.iter_mut().rev() {
        if *b == 0xff {
            *b = 0;
        } else {
            *b += 1;
            return Some(out);
        }
    }
    None
}

fn read_i64(buf: &[u8], at: usize) -> i64 {
    let mut arr = [0u8; I64_LEN];
    arr.copy_from_slice(&buf[at..at + I64_LEN]);
    i64::from_be_bytes(arr)
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}
