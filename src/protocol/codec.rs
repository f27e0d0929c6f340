//! WireCodec: size -> allocate -> encode, dan decode yang mirror-nya
//!
//! Layout:
//! ```text
//! object      : [tag u8 = 1][field_0]...[field_n]      (FieldList order)
//! null object : [tag u8 = 0]
//! string      : [count i32][count x u16 code unit]
//! array       : [count i32][count x element]
//! bool array  : [count i32][ceil(count/8) bytes, MSB first, zero pad]
//! frame       : [len i32][payload]
//! ```

use std::sync::Arc;

use super::encoder::{Decoder, Encoder};
use super::schema::SchemaRegistry;
use super::size::{check_count, check_record, enter, mismatch, packed_bool_bytes, Path, SizeCalculator, COUNT_SIZE};
use super::typed::{Composite, WireType};
use super::value::{Record, TypeDescriptor, Value};
use crate::error::CodecError;

/// Bit pertama dalam setiap packed boolean byte
const FIRST_BIT: u8 = 0x80;

const TAG_NULL: u8 = 0;
const TAG_PRESENT: u8 = 1;

/// Hasil decode + posisi cursor setelah value dikonsumsi
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub cursor: usize,
}

/// Schema-driven binary codec
///
/// Stateless selain registry read-only; `Clone` murah dan aman dipakai
/// dari banyak thread.
#[derive(Debug, Clone, Default)]
pub struct WireCodec {
    registry: Arc<SchemaRegistry>,
}

impl WireCodec {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self::with_registry(Arc::new(registry))
    }

    pub fn with_registry(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Exact encoded size
    pub fn size(&self, value: &Value, descriptor: &TypeDescriptor) -> Result<usize, CodecError> {
        SizeCalculator::new(&self.registry).size(value, descriptor)
    }

    /// Encode ke buffer yang di-alokasi sekali dengan ukuran exact
    pub fn encode(&self, value: &Value, descriptor: &TypeDescriptor) -> Result<Vec<u8>, CodecError> {
        let size = self.size(value, descriptor)?;
        let mut encoder = Encoder::new(size);
        self.write_value(&mut encoder, value, descriptor, Path::Root, 0)?;
        encoder.finish()
    }

    /// Encode dengan 4-byte length prefix (siap dikirim sebagai frame)
    pub fn encode_framed(&self, value: &Value, descriptor: &TypeDescriptor) -> Result<Vec<u8>, CodecError> {
        let size = self.size(value, descriptor)?;
        let len = check_count("frame", size)?;
        let mut encoder = Encoder::new(COUNT_SIZE + size);
        encoder.put_i32(len)?;
        self.write_value(&mut encoder, value, descriptor, Path::Root, 0)?;
        encoder.finish()
    }

    /// Decode satu value mulai dari `cursor`
    ///
    /// `target` (hanya untuk composite) diisi ulang dan dikembalikan jika
    /// tag-nya present; type-nya harus sama dengan descriptor.
    pub fn decode(
        &self,
        bytes: &[u8],
        cursor: usize,
        descriptor: &TypeDescriptor,
        target: Option<Record>,
    ) -> Result<Decoded<Value>, CodecError> {
        if let Some(target) = &target {
            match descriptor {
                TypeDescriptor::Composite(name) if name == target.type_name() => {}
                other => {
                    return Err(CodecError::ClassCast {
                        expected: other.to_string(),
                        found: target.type_name().to_owned(),
                    })
                }
            }
        }

        let mut decoder = Decoder::at(bytes, cursor)?;
        let value = match (descriptor, target) {
            (TypeDescriptor::Composite(name), target) => self.read_object(&mut decoder, name, target, 0)?,
            (descriptor, _) => self.read_value(&mut decoder, descriptor, 0)?,
        };
        Ok(Decoded {
            value,
            cursor: decoder.position(),
        })
    }

    /// Decode seluruh buffer sebagai satu value; sisa byte adalah error
    pub fn decode_exact(&self, bytes: &[u8], descriptor: &TypeDescriptor) -> Result<Value, CodecError> {
        let decoded = self.decode(bytes, 0, descriptor, None)?;
        let remaining = bytes.len() - decoded.cursor;
        if remaining != 0 {
            return Err(CodecError::TrailingBytes { remaining });
        }
        Ok(decoded.value)
    }

    /// Decode frame `[len][payload]` dari awal buffer
    pub fn decode_framed(&self, bytes: &[u8], descriptor: &TypeDescriptor) -> Result<Decoded<Value>, CodecError> {
        let mut decoder = Decoder::new(bytes);
        let len = decoder.get_i32()?;
        if len < 0 {
            return Err(CodecError::InvalidLength { offset: 0, len });
        }
        let payload = decoder.take(len as usize)?;
        let value = self.decode_exact(payload, descriptor)?;
        Ok(Decoded {
            value,
            cursor: decoder.position(),
        })
    }

    pub fn encode_typed<T: WireType>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        self.encode(&value.to_value(), &T::descriptor())
    }

    pub fn decode_typed<T: WireType>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        T::from_value(self.decode_exact(bytes, &T::descriptor())?)
    }

    /// Encode composite non-null sebagai root object
    pub fn encode_composite<T: Composite>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        self.encode(
            &Value::object(value.to_record()),
            &TypeDescriptor::composite(T::TYPE_NAME),
        )
    }

    /// Decode root object; `None` untuk null tag
    pub fn decode_composite<T: Composite>(&self, bytes: &[u8]) -> Result<Option<T>, CodecError> {
        self.decode_typed::<Option<T>>(bytes)
    }

    /// Decode root object ke instance yang sudah ada
    ///
    /// Returns `false` jika buffer berisi null object (target tidak diubah).
    pub fn decode_into<T: Composite>(&self, bytes: &[u8], target: &mut T) -> Result<bool, CodecError> {
        match self.decode_exact(bytes, &TypeDescriptor::composite(T::TYPE_NAME))? {
            Value::Object(Some(record)) => {
                target.fill_from(record)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // === encode ===

    fn write_value(
        &self,
        enc: &mut Encoder,
        value: &Value,
        descriptor: &TypeDescriptor,
        path: Path<'_>,
        depth: usize,
    ) -> Result<(), CodecError> {
        match (descriptor, value) {
            (TypeDescriptor::Bool, Value::Bool(b)) => enc.put_u8(u8::from(*b)),
            (TypeDescriptor::Byte, Value::Byte(v)) => enc.put_u8(*v as u8),
            (TypeDescriptor::Char, Value::Char(c)) => enc.put_u16(*c),
            (TypeDescriptor::Int16, Value::Int16(v)) => enc.put_i16(*v),
            (TypeDescriptor::Int32, Value::Int32(v)) => enc.put_i32(*v),
            (TypeDescriptor::Int64, Value::Int64(v)) => enc.put_i64(*v),
            (TypeDescriptor::Float, Value::Float(v)) => enc.put_f32(*v),
            (TypeDescriptor::Double, Value::Double(v)) => enc.put_f64(*v),
            (TypeDescriptor::String, Value::String(s)) => {
                enc.put_i32(check_count("string", s.encode_utf16().count())?)?;
                for unit in s.encode_utf16() {
                    enc.put_u16(unit)?;
                }
                Ok(())
            }
            (TypeDescriptor::Array(elem), Value::Array(items)) => {
                enc.put_i32(check_count("array", items.len())?)?;
                let depth = enter(depth)?;
                if **elem == TypeDescriptor::Bool {
                    return write_packed_bools(enc, items, elem, path);
                }
                for (i, item) in items.iter().enumerate() {
                    self.write_value(enc, item, elem, Path::Index(&path, i), depth)?;
                }
                Ok(())
            }
            (TypeDescriptor::Composite(_), Value::Object(None)) => enc.put_u8(TAG_NULL),
            (TypeDescriptor::Composite(name), Value::Object(Some(record))) => {
                let depth = enter(depth)?;
                let fields = self.registry.field_list(name)?;
                check_record(record, name, fields.len(), path)?;

                enc.put_u8(TAG_PRESENT)?;
                for (field, value) in fields.iter().zip(record.fields()) {
                    self.write_value(enc, value, &field.descriptor, Path::Field(&path, &field.name), depth)?;
                }
                Ok(())
            }
            (descriptor, value) => Err(mismatch(path, descriptor, value)),
        }
    }

    // === decode ===

    fn read_value(&self, dec: &mut Decoder<'_>, descriptor: &TypeDescriptor, depth: usize) -> Result<Value, CodecError> {
        Ok(match descriptor {
            TypeDescriptor::Bool => Value::Bool(read_bool(dec)?),
            TypeDescriptor::Byte => Value::Byte(dec.get_u8()? as i8),
            TypeDescriptor::Char => Value::Char(dec.get_u16()?),
            TypeDescriptor::Int16 => Value::Int16(dec.get_i16()?),
            TypeDescriptor::Int32 => Value::Int32(dec.get_i32()?),
            TypeDescriptor::Int64 => Value::Int64(dec.get_i64()?),
            TypeDescriptor::Float => Value::Float(dec.get_f32()?),
            TypeDescriptor::Double => Value::Double(dec.get_f64()?),
            TypeDescriptor::String => Value::String(read_string(dec)?),
            TypeDescriptor::Array(elem) => {
                let count = read_count(dec)?;
                let depth = enter(depth)?;
                if **elem == TypeDescriptor::Bool {
                    return read_packed_bools(dec, count).map(Value::Array);
                }
                ensure_available(dec, count.saturating_mul(elem.min_wire_size()))?;

                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(self.read_value(dec, elem, depth)?);
                }
                Value::Array(items)
            }
            TypeDescriptor::Composite(name) => self.read_object(dec, name, None, depth)?,
        })
    }

    fn read_object(
        &self,
        dec: &mut Decoder<'_>,
        type_name: &str,
        target: Option<Record>,
        depth: usize,
    ) -> Result<Value, CodecError> {
        let offset = dec.position();
        match dec.get_u8()? {
            TAG_NULL => return Ok(Value::Object(None)),
            TAG_PRESENT => {}
            tag => return Err(CodecError::InvalidTag { offset, tag }),
        }
        let depth = enter(depth)?;

        let fields = self.registry.field_list(type_name)?;
        let mut record = target.unwrap_or_else(|| Record::empty(type_name.to_owned()));

        let values = record.fields_mut();
        values.clear();
        values.reserve(fields.len());
        for field in &fields {
            values.push(self.read_value(dec, &field.descriptor, depth)?);
        }
        Ok(Value::Object(Some(record)))
    }
}

/// Pack 8 boolean per byte, MSB first; byte terakhir zero-padded
fn write_packed_bools(
    enc: &mut Encoder,
    items: &[Value],
    elem: &TypeDescriptor,
    path: Path<'_>,
) -> Result<(), CodecError> {
    for (group, chunk) in items.chunks(8).enumerate() {
        let mut bit = FIRST_BIT;
        let mut byte = 0u8;
        for (i, item) in chunk.iter().enumerate() {
            match item {
                Value::Bool(true) => byte |= bit,
                Value::Bool(false) => {}
                other => return Err(mismatch(Path::Index(&path, group * 8 + i), elem, other)),
            }
            bit >>= 1;
        }
        enc.put_u8(byte)?;
    }
    Ok(())
}

fn read_packed_bools(dec: &mut Decoder<'_>, count: usize) -> Result<Vec<Value>, CodecError> {
    let start = dec.position();
    let packed = dec.take(packed_bool_bytes(count))?;

    let mut items = Vec::with_capacity(count);
    for index in 0..count {
        let mask = FIRST_BIT >> (index % 8);
        items.push(Value::Bool(packed[index / 8] & mask != 0));
    }

    // Pad bits harus nol supaya encoding tetap canonical
    let remainder = count % 8;
    if remainder != 0 {
        let last = packed[packed.len() - 1];
        let pad_mask = FIRST_BIT >> (remainder - 1);
        let pad_mask = pad_mask - 1;
        if last & pad_mask != 0 {
            return Err(CodecError::InvalidTag {
                offset: start + packed.len() - 1,
                tag: last,
            });
        }
    }
    Ok(items)
}

fn read_bool(dec: &mut Decoder<'_>) -> Result<bool, CodecError> {
    let offset = dec.position();
    match dec.get_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        tag => Err(CodecError::InvalidTag { offset, tag }),
    }
}

fn read_count(dec: &mut Decoder<'_>) -> Result<usize, CodecError> {
    let offset = dec.position();
    let len = dec.get_i32()?;
    usize::try_from(len).map_err(|_| CodecError::InvalidLength { offset, len })
}

fn read_string(dec: &mut Decoder<'_>) -> Result<String, CodecError> {
    let offset = dec.position();
    let units = read_count(dec)?;
    let raw = dec.take(units.saturating_mul(2))?;
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| CodecError::InvalidUtf16 { offset })
}

/// Tolak count yang jelas lebih besar dari sisa buffer sebelum alokasi
fn ensure_available(dec: &Decoder<'_>, needed: usize) -> Result<(), CodecError> {
    if needed > dec.remaining() {
        return Err(CodecError::Truncated {
            offset: dec.position(),
            needed,
            available: dec.remaining(),
        });
    }
    Ok(())
}
