use std::io::Write;

use tracing::debug;

use bpl_types::{Object, ObjectTable, Slot};

use crate::error::EncodeResult;
use crate::marker::{self, width_for, write_be, Marker, MAGIC};
use crate::trailer::Trailer;

/// Serializes an [`ObjectTable`] into the binary property-list format.
///
/// Encoding is all-or-nothing: the table is validated before the header is
/// written, and the whole file is built in memory because the trailer can
/// only be written once every offset is known.
#[derive(Clone, Copy, Debug)]
pub struct Encoder {
    compact_reals: bool,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            compact_reals: true,
        }
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write reals that survive a round trip through `f32` as 4 bytes.
    /// When disabled every real is written as 8 bytes.
    pub fn compact_reals(mut self, enabled: bool) -> Self {
        self.compact_reals = enabled;
        self
    }

    /// Encode the table into a new buffer.
    pub fn encode(&self, table: &ObjectTable) -> EncodeResult<Vec<u8>> {
        table.validate()?;

        let count = table.len() as u64;
        // Fixed for the whole file before any object is written.
        let ref_width = width_for(count);

        let mut buf = Vec::with_capacity(marker::HEADER_LEN + table.len() * 8);
        buf.extend_from_slice(&MAGIC);

        let mut offsets = Vec::with_capacity(table.len());
        for (_, object) in table.iter() {
            offsets.push(buf.len() as u64);
            self.write_object(&mut buf, object, ref_width);
        }

        let offset_table_offset = buf.len() as u64;
        let offset_width = width_for(offset_table_offset);
        for offset in &offsets {
            write_be(&mut buf, *offset, offset_width);
        }

        let trailer = Trailer {
            sort_version: 0,
            offset_width,
            ref_width,
            object_count: count,
            root: table.root().index() as u64,
            offset_table_offset,
        };
        buf.extend_from_slice(&trailer.to_bytes());

        debug!(
            objects = count,
            ref_width,
            offset_width,
            bytes = buf.len(),
            "encoded property list"
        );
        Ok(buf)
    }

    /// Encode the table and write it to `out` in one call.
    /// Returns the number of bytes written.
    pub fn encode_to<W: Write>(&self, table: &ObjectTable, mut out: W) -> EncodeResult<usize> {
        let bytes = self.encode(table)?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(bytes.len())
    }

    fn write_object(&self, buf: &mut Vec<u8>, object: &Object, ref_width: u8) {
        match object {
            Object::Null => buf.push(marker::NULL),
            Object::Bool(b) => buf.push(Marker::Bool(*b).to_byte()),
            Object::Integer(i) => write_int(buf, *i),
            Object::Real(r) => self.write_real(buf, *r),
            Object::Date(d) => {
                buf.push(marker::DATE);
                buf.extend_from_slice(&d.plist_secs().to_be_bytes());
            }
            Object::Data(bytes) => {
                write_size(buf, marker::DATA, bytes.len());
                buf.extend_from_slice(bytes);
            }
            Object::String(s) => write_string(buf, s),
            Object::Uid(uid) => {
                let width = width_for(uid.get());
                buf.push(
                    Marker::Uid {
                        width: usize::from(width),
                    }
                    .to_byte(),
                );
                write_be(buf, uid.get(), width);
            }
            Object::Array(items) => write_refs(buf, marker::ARRAY, items, ref_width),
            Object::Set(items) => write_refs(buf, marker::SET, items, ref_width),
            Object::Dict(entries) => {
                write_size(buf, marker::DICT, entries.len());
                for (key, _) in entries {
                    write_be(buf, key.index() as u64, ref_width);
                }
                for (_, value) in entries {
                    write_be(buf, value.index() as u64, ref_width);
                }
            }
        }
    }

    fn write_real(&self, buf: &mut Vec<u8>, value: f64) {
        let narrow = value as f32;
        if self.compact_reals && !value.is_nan() && f64::from(narrow).to_bits() == value.to_bits() {
            buf.push(Marker::Real { width: 4 }.to_byte());
            buf.extend_from_slice(&narrow.to_be_bytes());
        } else {
            buf.push(Marker::Real { width: 8 }.to_byte());
            buf.extend_from_slice(&value.to_be_bytes());
        }
    }
}

/// Encode `table` with the default [`Encoder`].
pub fn encode(table: &ObjectTable) -> EncodeResult<Vec<u8>> {
    Encoder::new().encode(table)
}

/// Signed integers: negatives always take 8 bytes since narrower widths
/// are read back as unsigned.
fn write_int(buf: &mut Vec<u8>, value: i64) {
    if value < 0 {
        buf.push(Marker::Integer { width: 8 }.to_byte());
        buf.extend_from_slice(&value.to_be_bytes());
    } else {
        write_uint(buf, value as u64);
    }
}

fn write_uint(buf: &mut Vec<u8>, value: u64) {
    if value > i64::MAX as u64 {
        buf.push(Marker::Integer { width: 16 }.to_byte());
        buf.extend_from_slice(&u128::from(value).to_be_bytes());
        return;
    }
    let width = width_for(value);
    buf.push(
        Marker::Integer {
            width: usize::from(width),
        }
        .to_byte(),
    );
    write_be(buf, value, width);
}

/// Marker with the count in the low nibble, or 0xF plus an integer object.
fn write_size(buf: &mut Vec<u8>, tag: u8, count: usize) {
    if count < usize::from(marker::SIZE_FOLLOWS) {
        buf.push(tag | count as u8);
    } else {
        buf.push(tag | marker::SIZE_FOLLOWS);
        write_uint(buf, count as u64);
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    if s.is_ascii() {
        write_size(buf, marker::ASCII_STRING, s.len());
        buf.extend_from_slice(s.as_bytes());
    } else {
        let units: Vec<u16> = s.encode_utf16().collect();
        write_size(buf, marker::UTF16_STRING, units.len());
        for unit in units {
            buf.extend_from_slice(&unit.to_be_bytes());
        }
    }
}

fn write_refs(buf: &mut Vec<u8>, tag: u8, items: &[Slot], ref_width: u8) {
    write_size(buf, tag, items.len());
    for item in items {
        write_be(buf, item.index() as u64, ref_width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use bpl_types::{Date, Uid};

    /// Bytes of the single object of a one-object table.
    fn object_bytes(object: Object) -> Vec<u8> {
        let table = ObjectTable::new(vec![object], Slot(0));
        let bytes = encode(&table).unwrap();
        bytes[8..bytes.len() - 32 - 1].to_vec()
    }

    #[test]
    fn integer_widths() {
        assert_eq!(object_bytes(Object::Integer(0)), vec![0x10, 0x00]);
        assert_eq!(object_bytes(Object::Integer(255)), vec![0x10, 0xFF]);
        assert_eq!(object_bytes(Object::Integer(256)), vec![0x11, 0x01, 0x00]);
        assert_eq!(
            object_bytes(Object::Integer(100_000)),
            vec![0x12, 0x00, 0x01, 0x86, 0xA0]
        );
        assert_eq!(
            object_bytes(Object::Integer(1 << 40)),
            vec![0x13, 0, 0, 1, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn negative_integers_use_eight_bytes() {
        assert_eq!(
            object_bytes(Object::Integer(-1)),
            vec![0x13, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn reals_pick_smallest_precision() {
        assert_eq!(object_bytes(Object::Real(1.5)), vec![0x22, 0x3F, 0xC0, 0x00, 0x00]);
        let mut expected = vec![0x23];
        expected.extend_from_slice(&0.1f64.to_be_bytes());
        assert_eq!(object_bytes(Object::Real(0.1)), expected);
    }

    #[test]
    fn nan_is_written_wide() {
        let bytes = object_bytes(Object::Real(f64::NAN));
        assert_eq!(bytes[0], 0x23);
        assert_eq!(bytes.len(), 9);
    }

    #[test]
    fn compact_reals_can_be_disabled() {
        let table = ObjectTable::new(vec![Object::Real(1.5)], Slot(0));
        let bytes = Encoder::new().compact_reals(false).encode(&table).unwrap();
        assert_eq!(bytes[8], 0x23);
    }

    #[test]
    fn dates_are_eight_byte_floats() {
        let bytes = object_bytes(Object::Date(Date::from_plist_secs(0.0)));
        assert_eq!(bytes, vec![0x33, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn ascii_string() {
        assert_eq!(object_bytes(Object::String("AAC".into())), b"\x53AAC".to_vec());
    }

    #[test]
    fn non_ascii_string_is_utf16() {
        assert_eq!(
            object_bytes(Object::String("é".into())),
            vec![0x61, 0x00, 0xE9]
        );
        // Outside the BMP: one char, two code units.
        assert_eq!(
            object_bytes(Object::String("😀".into())),
            vec![0x62, 0xD8, 0x3D, 0xDE, 0x00]
        );
    }

    #[test]
    fn long_string_uses_explicit_count() {
        let s = "Export Media Destination";
        let bytes = object_bytes(Object::String(s.into()));
        assert_eq!(&bytes[0..3], &[0x5F, 0x10, s.len() as u8]);
        assert_eq!(&bytes[3..], s.as_bytes());
    }

    #[test]
    fn fourteen_fits_nibble_fifteen_does_not() {
        let bytes = object_bytes(Object::Data(vec![0; 14]));
        assert_eq!(bytes[0], 0x4E);
        let bytes = object_bytes(Object::Data(vec![0; 15]));
        assert_eq!(&bytes[0..3], &[0x4F, 0x10, 0x0F]);
    }

    #[test]
    fn uid_widths() {
        assert_eq!(object_bytes(Object::Uid(Uid(29))), vec![0x80, 29]);
        assert_eq!(object_bytes(Object::Uid(Uid(300))), vec![0x81, 0x01, 0x2C]);
        assert_eq!(
            object_bytes(Object::Uid(Uid(1 << 20))),
            vec![0x83, 0x00, 0x10, 0x00, 0x00]
        );
    }

    #[test]
    fn fixed_objects() {
        assert_eq!(object_bytes(Object::Null), vec![0x00]);
        assert_eq!(object_bytes(Object::Bool(false)), vec![0x08]);
        assert_eq!(object_bytes(Object::Bool(true)), vec![0x09]);
    }

    #[test]
    fn set_marker() {
        let table = ObjectTable::new(
            vec![Object::Set(vec![Slot(1), Slot(0)]), Object::String("x".into())],
            Slot(0),
        );
        let bytes = encode(&table).unwrap();
        assert_eq!(&bytes[8..11], &[0xC2, 0x01, 0x00]);
        assert_eq!(&bytes[11..13], b"\x51x");
        assert_eq!(crate::reader::decode(&bytes).unwrap(), table);
    }

    #[test]
    fn container_refs_use_global_width() {
        let mut objects: Vec<Object> = (0..300).map(Object::Integer).collect();
        objects.push(Object::Array(vec![Slot(0), Slot(299)]));
        let table = ObjectTable::new(objects, Slot(300));
        let bytes = encode(&table).unwrap();
        let trailer = Trailer::from_bytes(&bytes[bytes.len() - 32..]).unwrap();
        assert_eq!(trailer.ref_width, 2);
        let array_start = trailer.offset_table_offset as usize - 5;
        assert_eq!(&bytes[array_start..array_start + 5], &[0xA2, 0x00, 0x00, 0x01, 0x2B]);
    }

    #[test]
    fn invalid_table_produces_no_bytes() {
        let table = ObjectTable::new(vec![Object::Array(vec![Slot(5)])], Slot(0));
        let mut out = Vec::new();
        assert!(Encoder::new().encode_to(&table, &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn encode_to_reports_length() {
        let table = ObjectTable::new(vec![Object::Bool(true)], Slot(0));
        let mut out = Vec::new();
        let n = Encoder::new().encode_to(&table, &mut out).unwrap();
        assert_eq!(n, out.len());
        assert_eq!(n, 8 + 1 + 1 + 32);
    }
}
