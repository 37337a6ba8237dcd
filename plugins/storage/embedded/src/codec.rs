//! Row value layout: `u32` column count, then per column a `u16`-prefixed
//! family, a `u16`-prefixed qualifier and a `u32`-prefixed value.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tms_api::{Column, Row, StoreError};

pub(crate) fn encode_columns(columns: &BTreeMap<Column, Bytes>) -> Result<Bytes, StoreError> {
    let size: usize = columns
        .iter()
        .map(|(c, v)| 8 + c.family.len() + c.qualifier.len() + v.len())
        .sum();
    let mut buf = BytesMut::with_capacity(4 + size);
    buf.put_u32(len_u32(columns.len(), "column count")?);
    for (column, value) in columns {
        buf.put_u16(len_u16(column.family.len(), "family")?);
        buf.put_slice(&column.family);
        buf.put_u16(len_u16(column.qualifier.len(), "qualifier")?);
        buf.put_slice(&column.qualifier);
        buf.put_u32(len_u32(value.len(), "value")?);
        buf.put_slice(value);
    }
    Ok(buf.freeze())
}

pub(crate) fn decode_columns(mut data: &[u8]) -> Result<BTreeMap<Column, Bytes>, StoreError> {
    let count = take_u32(&mut data, "column count")?;
    let mut columns = BTreeMap::new();
    for _ in 0..count {
        let family_len = take_u16(&mut data, "family length")? as usize;
        let family = take_bytes(&mut data, family_len, "family")?;
        let qualifier_len = take_u16(&mut data, "qualifier length")? as usize;
        let qualifier = take_bytes(&mut data, qualifier_len, "qualifier")?;
        let value_len = take_u32(&mut data, "value length")? as usize;
        let value = take_bytes(&mut data, value_len, "value")?;
        columns.insert(Column::new(family, qualifier), value);
    }
    if data.has_remaining() {
        return Err(StoreError::format(format!(
            "{} trailing bytes after row columns",
            data.remaining()
        )));
    }
    Ok(columns)
}

pub(crate) fn decode_row(key: &[u8], value: &[u8]) -> Result<Row, StoreError> {
    let mut row = Row::new(Bytes::copy_from_slice(key));
    row.columns = decode_columns(value)
        .map_err(|e| e.with_context(format!("row {}", hex(key))))?;
    Ok(row)
}

fn len_u16(len: usize, what: &str) -> Result<u16, StoreError> {
    u16::try_from(len).map_err(|_| StoreError::format(format!("{what} too long: {len} bytes")))
}

fn len_u32(len: usize, what: &str) -> Result<u32, StoreError> {
    u32::try_from(len).map_err(|_| StoreError::format(format!("{what} too long: {len}")))
}

fn take_u16(data: &mut &[u8], what: &str) -> Result<u16, StoreError> {
    if data.remaining() < 2 {
        return Err(StoreError::format(format!("truncated {what}")));
    }
    Ok(data.get_u16())
}

fn take_u32(data: &mut &[u8], what: &str) -> Result<u32, StoreError> {
    if data.remaining() < 4 {
        return Err(StoreError::format(format!("truncated {what}")));
    }
    Ok(data.get_u32())
}

fn take_bytes(data: &mut &[u8], len: usize, what: &str) -> Result<Bytes, StoreError> {
    if data.remaining() < len {
        return Err(StoreError::format(format!(
            "truncated {what}: need {len} bytes, have {}",
            data.remaining()
        )));
    }
    Ok(data.copy_to_bytes(len))
}

fn hex(key: &[u8]) -> String {
    key.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_survive_encoding() {
        let mut columns = BTreeMap::new();
        columns.insert(Column::new("d", "p"), Bytes::from_static(b"payload"));
        columns.insert(Column::new("d", "t"), Bytes::from_static(&7i64.to_be_bytes()));
        let encoded = encode_columns(&columns).unwrap();
        assert_eq!(decode_columns(&encoded).unwrap(), columns);
    }

    #[test]
    fn empty_value_column_is_kept() {
        let mut columns = BTreeMap::new();
        columns.insert(Column::new("d", "p"), Bytes::new());
        let encoded = encode_columns(&columns).unwrap();
        let decoded = decode_columns(&encoded).unwrap();
        assert_eq!(decoded.get(&Column::new("d", "p")), Some(&Bytes::new()));
    }

    #[test]
    fn truncated_input_is_a_format_error() {
        let mut columns = BTreeMap::new();
        columns.insert(Column::new("d", "p"), Bytes::from_static(b"payload"));
        let encoded = encode_columns(&columns).unwrap();
        let err = decode_row(b"k", &encoded[..encoded.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), tms_api::ErrorKind::Format);
        assert!(err.message().contains("row 6b"));
    }
}
