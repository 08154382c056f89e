use crate::error::AvroplanErr;
use integer_encoding::VarIntReader;
use integer_encoding::VarIntWriter;
use std::io::{Error, ErrorKind, Read, Write};
use std::str;

pub(crate) fn decode_int<R: Read>(reader: &mut R) -> Result<i32, AvroplanErr> {
    reader.read_varint().map_err(AvroplanErr::DecodeFailed)
}

pub(crate) fn decode_long<R: Read>(reader: &mut R) -> Result<i64, AvroplanErr> {
    reader.read_varint().map_err(AvroplanErr::DecodeFailed)
}

pub(crate) fn decode_float<R: Read>(reader: &mut R) -> Result<f32, AvroplanErr> {
    use byteorder::{LittleEndian, ReadBytesExt};
    reader
        .read_f32::<LittleEndian>()
        .map_err(AvroplanErr::DecodeFailed)
}

pub(crate) fn decode_double<R: Read>(reader: &mut R) -> Result<f64, AvroplanErr> {
    use byteorder::{LittleEndian, ReadBytesExt};
    reader
        .read_f64::<LittleEndian>()
        .map_err(AvroplanErr::DecodeFailed)
}

pub(crate) fn decode_boolean<R: Read>(reader: &mut R) -> Result<bool, AvroplanErr> {
    let mut buf = [0u8; 1];
    reader
        .read_exact(&mut buf)
        .map_err(AvroplanErr::DecodeFailed)?;
    match buf {
        [0x00] => Ok(false),
        [0x01] => Ok(true),
        _ => Err(AvroplanErr::DecodeFailed(Error::new(
            ErrorKind::InvalidData,
            "expecting a 0x00 or 0x01 as a byte for boolean value",
        ))),
    }
}

pub(crate) fn decode_string<R: Read>(reader: &mut R) -> Result<String, AvroplanErr> {
    let buf = decode_bytes(reader)?;
    let s = str::from_utf8(&buf).map_err(|_e| {
        let err = Error::new(ErrorKind::InvalidData, "failed decoding string from bytes");
        AvroplanErr::DecodeFailed(err)
    })?;
    Ok(s.to_string())
}

pub(crate) fn decode_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>, AvroplanErr> {
    let len: i64 = reader.read_varint().map_err(AvroplanErr::DecodeFailed)?;
    let mut byte_buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut byte_buf)
        .map_err(AvroplanErr::DecodeFailed)?;
    Ok(byte_buf)
}

// Consumes exactly `len` bytes without materializing them.
pub(crate) fn skip_raw_bytes<R: Read>(reader: &mut R, len: u64) -> Result<(), AvroplanErr> {
    let copied = std::io::copy(&mut reader.by_ref().take(len), &mut std::io::sink())
        .map_err(AvroplanErr::DecodeFailed)?;
    if copied != len {
        return Err(AvroplanErr::DecodeFailed(Error::new(
            ErrorKind::UnexpectedEof,
            "stream ended while skipping a value",
        )));
    }
    Ok(())
}

pub(crate) fn encode_int<W: Write>(value: i32, writer: &mut W) -> Result<(), AvroplanErr> {
    writer
        .write_varint(value)
        .map(|_| ())
        .map_err(AvroplanErr::EncodeFailed)
}

pub(crate) fn encode_long<W: Write>(value: i64, writer: &mut W) -> Result<(), AvroplanErr> {
    writer
        .write_varint(value)
        .map(|_| ())
        .map_err(AvroplanErr::EncodeFailed)
}

pub(crate) fn encode_float<W: Write>(value: f32, writer: &mut W) -> Result<(), AvroplanErr> {
    use byteorder::{LittleEndian, WriteBytesExt};
    writer
        .write_f32::<LittleEndian>(value)
        .map_err(AvroplanErr::EncodeFailed)
}

pub(crate) fn encode_double<W: Write>(value: f64, writer: &mut W) -> Result<(), AvroplanErr> {
    use byteorder::{LittleEndian, WriteBytesExt};
    writer
        .write_f64::<LittleEndian>(value)
        .map_err(AvroplanErr::EncodeFailed)
}

pub(crate) fn encode_raw_bytes<W: Write>(value: &[u8], writer: &mut W) -> Result<(), AvroplanErr> {
    writer.write_all(value).map_err(AvroplanErr::EncodeFailed)
}

// Strings and bytes share the same length-prefixed framing on the wire.
pub(crate) fn encode_len_prefixed<W: Write>(
    value: &[u8],
    writer: &mut W,
) -> Result<(), AvroplanErr> {
    encode_long(value.len() as i64, writer)?;
    encode_raw_bytes(value, writer)
}
