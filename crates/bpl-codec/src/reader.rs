use tracing::debug;

use bpl_types::{Date, Object, ObjectTable, Slot, Uid};

use crate::error::{DecodeError, DecodeResult};
use crate::marker::{self, read_be, Marker, HEADER_LEN, MAGIC};
use crate::trailer::{Trailer, TRAILER_LEN};

/// Parses an encoded property list back into a flat [`ObjectTable`].
///
/// References are left as raw slots. The decoder walks the offset table
/// once, in order, so cyclic files decode without recursion.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Check the header and read the trailer from the tail of the input.
    pub fn trailer(&self) -> DecodeResult<Trailer> {
        let data = self.data;
        if data.len() < HEADER_LEN + TRAILER_LEN {
            return Err(DecodeError::TooShort { len: data.len() });
        }
        if data[..HEADER_LEN] != MAGIC {
            return Err(DecodeError::InvalidMagic {
                expected: String::from_utf8_lossy(&MAGIC).into(),
                actual: String::from_utf8_lossy(&data[..HEADER_LEN]).into(),
            });
        }
        let trailer = Trailer::from_bytes(&data[data.len() - TRAILER_LEN..])?;
        trailer.validate()?;
        Ok(trailer)
    }

    /// Decode every object listed in the offset table.
    pub fn decode(&self) -> DecodeResult<ObjectTable> {
        let trailer = self.trailer()?;
        let offsets = self.offsets(&trailer)?;

        let mut boundaries: Vec<u64> = offsets.clone();
        boundaries.sort_unstable();
        boundaries.dedup();

        let mut objects = Vec::with_capacity(offsets.len());
        for (index, &offset) in offsets.iter().enumerate() {
            let next = boundaries.partition_point(|&o| o <= offset);
            let boundary = boundaries
                .get(next)
                .copied()
                .unwrap_or(trailer.offset_table_offset);
            let mut cursor = ObjectCursor {
                data: self.data,
                slot: Slot(index),
                offset,
                pos: offset,
                boundary,
            };
            objects.push(cursor.read_object(&trailer)?);
        }

        debug!(
            objects = objects.len(),
            root = trailer.root,
            ref_width = trailer.ref_width,
            offset_width = trailer.offset_width,
            "decoded property list"
        );
        Ok(ObjectTable::new(objects, Slot(trailer.root as usize)))
    }

    /// Read and bounds-check the offset table.
    fn offsets(&self, trailer: &Trailer) -> DecodeResult<Vec<u64>> {
        let objects_end = (self.data.len() - TRAILER_LEN) as u64;
        let start = trailer.offset_table_offset;
        if start < HEADER_LEN as u64 || start > objects_end {
            return Err(DecodeError::InvalidTrailer(format!(
                "offset table at {start} outside {HEADER_LEN}..={objects_end}"
            )));
        }

        let width = u64::from(trailer.offset_width);
        let region = objects_end - start;
        let declared_bytes = trailer.object_count.checked_mul(width);
        if declared_bytes != Some(region) {
            return Err(DecodeError::CountMismatch {
                declared: trailer.object_count,
                actual: region / width,
            });
        }

        let width = usize::from(trailer.offset_width);
        let table = &self.data[start as usize..objects_end as usize];
        table
            .chunks_exact(width)
            .enumerate()
            .map(|(index, chunk)| {
                let offset = read_be(chunk);
                if offset < HEADER_LEN as u64 || offset >= start {
                    return Err(DecodeError::OffsetOutOfBounds {
                        slot: Slot(index),
                        offset,
                    });
                }
                Ok(offset)
            })
            .collect()
    }
}

/// Decode `data` with a fresh [`Decoder`].
pub fn decode(data: &[u8]) -> DecodeResult<ObjectTable> {
    Decoder::new(data).decode()
}

/// Reads one object without crossing the start of the next one.
struct ObjectCursor<'a> {
    data: &'a [u8],
    slot: Slot,
    offset: u64,
    pos: u64,
    boundary: u64,
}

impl<'a> ObjectCursor<'a> {
    fn take(&mut self, len: u64) -> DecodeResult<&'a [u8]> {
        let end = self.pos.checked_add(len).unwrap_or(u64::MAX);
        if end > self.boundary {
            return Err(DecodeError::ObjectOverrun {
                slot: self.slot,
                offset: self.offset,
                end,
                boundary: self.boundary,
            });
        }
        let bytes = &self.data[self.pos as usize..end as usize];
        self.pos = end;
        Ok(bytes)
    }

    fn byte(&mut self) -> DecodeResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn malformed(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError::Malformed {
            slot: self.slot,
            offset: self.offset,
            reason: reason.into(),
        }
    }

    fn read_object(&mut self, trailer: &Trailer) -> DecodeResult<Object> {
        let byte = self.byte()?;
        let marker = Marker::from_byte(byte).ok_or(DecodeError::UnknownMarker {
            slot: self.slot,
            offset: self.offset,
            marker: byte,
        })?;

        Ok(match marker {
            Marker::Null => Object::Null,
            Marker::Bool(b) => Object::Bool(b),
            Marker::Integer { width } => Object::Integer(self.read_int(width)?),
            Marker::Real { width: 4 } => {
                let bytes = self.take(4)?;
                Object::Real(f64::from(f32::from_bits(read_be(bytes) as u32)))
            }
            Marker::Real { .. } => Object::Real(f64::from_bits(read_be(self.take(8)?))),
            Marker::Date => Object::Date(Date::from_plist_secs(f64::from_bits(read_be(
                self.take(8)?,
            )))),
            Marker::Data(nibble) => {
                let len = self.read_size(nibble)?;
                Object::Data(self.take(len)?.to_vec())
            }
            Marker::AsciiString(nibble) => {
                let len = self.read_size(nibble)?;
                let bytes = self.take(len)?;
                if !bytes.is_ascii() {
                    return Err(self.malformed("non-ASCII byte in ASCII string"));
                }
                Object::String(String::from_utf8_lossy(bytes).into_owned())
            }
            Marker::Utf16String(nibble) => {
                let units = self.read_size(nibble)?;
                let bytes = self.take(units.saturating_mul(2))?;
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                let s = String::from_utf16(&units)
                    .map_err(|e| self.malformed(format!("invalid UTF-16: {e}")))?;
                Object::String(s)
            }
            Marker::Uid { width } => {
                if width > 8 {
                    return Err(self.malformed(format!("UID width {width} exceeds 8 bytes")));
                }
                Object::Uid(Uid(read_be(self.take(width as u64)?)))
            }
            Marker::Array(nibble) => Object::Array(self.read_refs(nibble, trailer)?),
            Marker::Set(nibble) => Object::Set(self.read_refs(nibble, trailer)?),
            Marker::Dict(nibble) => {
                let len = self.read_size(nibble)?;
                let keys = self.read_ref_list(len, trailer)?;
                let values = self.read_ref_list(len, trailer)?;
                Object::Dict(keys.into_iter().zip(values).collect())
            }
        })
    }

    /// Integers of 1, 2, and 4 bytes are unsigned; 8 and 16 are signed.
    fn read_int(&mut self, width: usize) -> DecodeResult<i64> {
        let bytes = self.take(width as u64)?;
        match width {
            1 | 2 | 4 | 8 => Ok(read_be(bytes) as i64),
            _ => {
                let mut wide = [0u8; 16];
                wide.copy_from_slice(bytes);
                let value = i128::from_be_bytes(wide);
                i64::try_from(value)
                    .map_err(|_| self.malformed(format!("integer {value} exceeds 64 bits")))
            }
        }
    }

    fn read_size(&mut self, nibble: u8) -> DecodeResult<u64> {
        if nibble != marker::SIZE_FOLLOWS {
            return Ok(u64::from(nibble));
        }
        let byte = self.byte()?;
        match Marker::from_byte(byte) {
            Some(Marker::Integer { width }) if width <= 8 => {
                let size = self.read_int(width)?;
                u64::try_from(size).map_err(|_| self.malformed(format!("negative size {size}")))
            }
            _ => Err(self.malformed(format!("size marker 0x{byte:02x} is not an integer"))),
        }
    }

    fn read_refs(&mut self, nibble: u8, trailer: &Trailer) -> DecodeResult<Vec<Slot>> {
        let len = self.read_size(nibble)?;
        self.read_ref_list(len, trailer)
    }

    fn read_ref_list(&mut self, len: u64, trailer: &Trailer) -> DecodeResult<Vec<Slot>> {
        let width = u64::from(trailer.ref_width);
        let bytes = self.take(len.saturating_mul(width))?;
        bytes
            .chunks_exact(width as usize)
            .map(|chunk| {
                let reference = read_be(chunk);
                if reference >= trailer.object_count {
                    return Err(DecodeError::InvalidReference {
                        slot: self.slot,
                        reference,
                        count: trailer.object_count,
                    });
                }
                Ok(Slot(reference as usize))
            })
            .collect()
    }
}
