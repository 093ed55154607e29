//! Schema Registry wire format
//!
//! ```text
//! ┌──────────┬────────────────────┬─────────────────────────────┐
//! │ 0x00     │ schema id (u32 BE) │ payload                     │
//! └──────────┴────────────────────┴─────────────────────────────┘
//!   1 byte     4 bytes
//! ```
//!
//! Protobuf payloads start with a message-index array locating the message
//! type inside its file descriptor.

use crate::error::{SerdeError, SerdeResult};
use bytes::{Buf, BufMut, BytesMut};
use schema_registry_client::SchemaId;

/// First byte of every framed message
pub const MAGIC_BYTE: u8 = 0x00;

/// Magic byte plus schema id
pub const HEADER_LEN: usize = 5;

/// Upper bound on the number of entries in a message-index array
pub const MAX_MESSAGE_INDEXES: i64 = 100_000;

/// Write the magic byte and big-endian schema id
pub fn write_header(buf: &mut BytesMut, schema_id: SchemaId) {
    buf.put_u8(MAGIC_BYTE);
    buf.put_u32(schema_id.as_u32());
}

/// Split a framed message into its schema id and payload
///
/// Rejects anything shorter than a header plus one payload byte, and any
/// message whose first byte is not [`MAGIC_BYTE`].
pub fn parse_header(data: &[u8]) -> SerdeResult<(SchemaId, &[u8])> {
    if data.len() <= HEADER_LEN {
        return Err(SerdeError::Framing(format!(
            "Expecting data framing of length 6 bytes or more but total data size is {} bytes. \
             This message was not produced with a Confluent Schema Registry serializer",
            data.len()
        )));
    }

    let mut buf = data;
    let magic = buf.get_u8();
    if magic != MAGIC_BYTE {
        return Err(SerdeError::Framing(format!(
            "Unknown magic byte 0x{:02x}. This message was not produced with a Confluent \
             Schema Registry serializer",
            magic
        )));
    }

    let schema_id = SchemaId::new(buf.get_u32());
    Ok((schema_id, buf))
}

/// Zig-zag map a signed value onto an unsigned one
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Write a base-128 varint
pub fn encode_varint(buf: &mut BytesMut, mut value: u64) {
    while value & !0x7f != 0 {
        buf.put_u8(((value & 0x7f) | 0x80) as u8);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a base-128 varint, advancing `buf`
pub fn decode_varint(buf: &mut &[u8]) -> SerdeResult<u64> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    for _ in 0..10 {
        if !buf.has_remaining() {
            return Err(SerdeError::Decode(
                "Unexpected EOF while reading index".to_string(),
            ));
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(SerdeError::Decode("varint too long".to_string()))
}

fn write_index(buf: &mut BytesMut, value: i64, zigzag: bool) {
    let raw = if zigzag {
        zigzag_encode(value)
    } else {
        value as u64
    };
    encode_varint(buf, raw);
}

fn read_index(buf: &mut &[u8], zigzag: bool) -> SerdeResult<i64> {
    let raw = decode_varint(buf)?;
    Ok(if zigzag { zigzag_decode(raw) } else { raw as i64 })
}

/// Write a Protobuf message-index array
///
/// `[0]` (the first top-level message) is written as a single `0x00`;
/// anything else is a length followed by the indexes, all as varints.
pub fn encode_message_indexes(buf: &mut BytesMut, indexes: &[i64], zigzag: bool) {
    if indexes == [0] {
        buf.put_u8(0x00);
        return;
    }

    write_index(buf, indexes.len() as i64, zigzag);
    for &index in indexes {
        write_index(buf, index, zigzag);
    }
}

/// Read a Protobuf message-index array, advancing `buf`
pub fn decode_message_indexes(buf: &mut &[u8], zigzag: bool) -> SerdeResult<Vec<i64>> {
    let size = read_index(buf, zigzag)?;
    if !(0..=MAX_MESSAGE_INDEXES).contains(&size) {
        return Err(SerdeError::Decode(format!(
            "Invalid Protobuf msgidx array length {}",
            size
        )));
    }

    if size == 0 {
        return Ok(vec![0]);
    }

    (0..size).map(|_| read_index(buf, zigzag)).collect()
}
