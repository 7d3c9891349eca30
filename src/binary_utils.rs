use std::io::{self, Cursor, Read};

use crate::error::{ExtractError, Result};

pub fn read_u8(cursor: &mut Cursor<&[u8]>) -> io::Result<u8> {
    if cursor.position() >= cursor.get_ref().len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "End of buffer reached",
        ));
    }

    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_i8(cursor: &mut Cursor<&[u8]>) -> io::Result<i8> {
    read_u8(cursor).map(|b| b as i8)
}

pub fn read_u16_le(cursor: &mut Cursor<&[u8]>) -> io::Result<u16> {
    if cursor.position() + 1 >= cursor.get_ref().len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "End of buffer reached or not enough bytes for u16",
        ));
    }

    let mut buf = [0u8; 2];
    cursor.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_i16_le(cursor: &mut Cursor<&[u8]>) -> io::Result<i16> {
    read_u16_le(cursor).map(|v| v as i16)
}

pub fn read_bytes(cursor: &mut Cursor<&[u8]>, length: usize) -> io::Result<Vec<u8>> {
    if cursor.position() + (length as u64) > cursor.get_ref().len() as u64 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("Not enough bytes remaining for read_bytes({})", length),
        ));
    }

    let mut buffer = vec![0u8; length];
    cursor.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Encoding of a single field inside a fixed-size record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16Le,
    I16Le,
    U32Le,
    U16Be,
    U32Be,
    Bytes(usize),
}

impl FieldKind {
    pub const fn width(self) -> usize {
        match self {
            FieldKind::U8 => 1,
            FieldKind::U16Le | FieldKind::I16Le | FieldKind::U16Be => 2,
            FieldKind::U32Le | FieldKind::U32Be => 4,
            FieldKind::Bytes(n) => n,
        }
    }
}

/// A named field at a fixed byte offset.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, offset: usize, kind: FieldKind) -> Self {
        Field { name, offset, kind }
    }
}

/// Fixed-size binary record layout. Every format in the crate declares its
/// structural constants in one of these.
#[derive(Debug)]
pub struct RecordLayout {
    pub name: &'static str,
    pub size: usize,
}

impl RecordLayout {
    pub const fn new(name: &'static str, size: usize) -> Self {
        RecordLayout { name, size }
    }

    /// Borrows `size` bytes at `offset` as a record of this layout.
    pub fn at<'a>(&'static self, data: &'a [u8], offset: usize) -> Result<Record<'a>> {
        let end = offset.checked_add(self.size).filter(|&end| end <= data.len());
        match end {
            Some(end) => Ok(Record {
                layout: self,
                bytes: &data[offset..end],
            }),
            None => Err(ExtractError::format(
                self.name,
                format!(
                    "record of {} bytes at offset {} exceeds buffer of {} bytes",
                    self.size,
                    offset,
                    data.len()
                ),
            )),
        }
    }

    /// Iterates over consecutive records, ignoring a trailing partial record.
    pub fn iter<'a>(&'static self, data: &'a [u8]) -> impl Iterator<Item = Record<'a>> + 'a {
        data.chunks_exact(self.size).map(move |bytes| Record {
            layout: self,
            bytes,
        })
    }
}

/// One record borrowed from a buffer, read field by field.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    layout: &'static RecordLayout,
    bytes: &'a [u8],
}

impl<'a> Record<'a> {
    fn slice(&self, field: &Field, expected: FieldKind) -> Result<&'a [u8]> {
        if field.kind != expected {
            return Err(ExtractError::format(
                self.layout.name,
                format!("field {} is {:?}, read as {:?}", field.name, field.kind, expected),
            ));
        }
        let end = field.offset + field.kind.width();
        if end > self.bytes.len() {
            return Err(ExtractError::format(
                self.layout.name,
                format!("field {} lies outside the record", field.name),
            ));
        }
        Ok(&self.bytes[field.offset..end])
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn u8(&self, field: &Field) -> Result<u8> {
        Ok(self.slice(field, FieldKind::U8)?[0])
    }

    pub fn u16(&self, field: &Field) -> Result<u16> {
        let b = self.slice(field, field.kind)?;
        match field.kind {
            FieldKind::U16Le => Ok(u16::from_le_bytes([b[0], b[1]])),
            FieldKind::U16Be => Ok(u16::from_be_bytes([b[0], b[1]])),
            other => Err(self.kind_mismatch(field, other)),
        }
    }

    pub fn i16(&self, field: &Field) -> Result<i16> {
        let b = self.slice(field, FieldKind::I16Le)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&self, field: &Field) -> Result<u32> {
        let b = self.slice(field, field.kind)?;
        match field.kind {
            FieldKind::U32Le => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            FieldKind::U32Be => Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            other => Err(self.kind_mismatch(field, other)),
        }
    }

    pub fn raw(&self, field: &Field) -> Result<&'a [u8]> {
        match field.kind {
            FieldKind::Bytes(_) => self.slice(field, field.kind),
            other => Err(self.kind_mismatch(field, other)),
        }
    }

    /// Fails with a format error naming the field unless it holds `expected`.
    pub fn expect_u8(&self, field: &Field, expected: u8) -> Result<u8> {
        let value = self.u8(field)?;
        if value != expected {
            return Err(ExtractError::format(
                self.layout.name,
                format!(
                    "field {} is {}, expected {}",
                    field.name, value, expected
                ),
            ));
        }
        Ok(value)
    }

    pub fn expect_raw(&self, field: &Field, expected: &[u8]) -> Result<()> {
        let value = self.raw(field)?;
        if value != expected {
            return Err(ExtractError::format(
                self.layout.name,
                format!("field {} is {:02X?}, expected {:02X?}", field.name, value, expected),
            ));
        }
        Ok(())
    }

    /// Reads a 16-bit count field and rejects zero.
    pub fn nonzero_u16(&self, field: &Field) -> Result<u16> {
        let value = self.u16(field)?;
        if value == 0 {
            return Err(ExtractError::format(
                self.layout.name,
                format!("count field {} is zero", field.name),
            ));
        }
        Ok(value)
    }

    fn kind_mismatch(&self, field: &Field, kind: FieldKind) -> ExtractError {
        ExtractError::format(
            self.layout.name,
            format!("field {} has unsupported kind {:?} for this read", field.name, kind),
        )
    }
}

/// Text stored in a fixed-width, NUL or space padded field.
pub fn fixed_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    static PAIR: RecordLayout = RecordLayout::new("pair record", 6);
    const FIRST: Field = Field::new("first", 0, FieldKind::U16Le);
    const SECOND: Field = Field::new("second", 2, FieldKind::U32Be);
    const TAG: Field = Field::new("tag", 0, FieldKind::U8);

    #[test]
    fn reads_fields_at_declared_offsets() {
        let data = [0x34, 0x12, 0x00, 0x00, 0x01, 0x02];
        let record = PAIR.at(&data, 0).unwrap();
        assert_eq!(record.u16(&FIRST).unwrap(), 0x1234);
        assert_eq!(record.u32(&SECOND).unwrap(), 0x0102);
    }

    #[test]
    fn record_past_end_is_a_format_error() {
        let data = [0u8; 8];
        let err = PAIR.at(&data, 4).unwrap_err();
        assert!(err.to_string().contains("pair record"));
    }

    #[test]
    fn constant_mismatch_names_the_field() {
        let data = [7u8, 0, 0, 0, 0, 0];
        let record = PAIR.at(&data, 0).unwrap();
        let err = record.expect_u8(&TAG, 5).unwrap_err();
        assert!(err.to_string().contains("field tag is 7, expected 5"));
    }

    #[test]
    fn zero_count_is_rejected() {
        let data = [0u8; 6];
        let record = PAIR.at(&data, 0).unwrap();
        assert!(record.nonzero_u16(&FIRST).is_err());
    }

    #[test]
    fn fixed_str_stops_at_nul() {
        assert_eq!(fixed_str(b"EXPLODE.RAW\0"), "EXPLODE.RAW");
        assert_eq!(fixed_str(b"NO FILE     "), "NO FILE");
    }

    #[test]
    fn cursor_readers_report_eof() {
        let data: &[u8] = &[1, 2, 3];
        let mut cursor = Cursor::new(data);
        assert_eq!(read_u16_le(&mut cursor).unwrap(), 0x0201);
        assert!(read_u16_le(&mut cursor).is_err());
        assert_eq!(read_i8(&mut cursor).unwrap(), 3);
    }
}
