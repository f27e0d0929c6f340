//! Size pass: hitung panjang encoded value TANPA menulis
//!
//! Encoder mengalokasikan buffer persis sebesar hasil pass ini, jadi
//! aturan di sini harus identik byte-per-byte dengan `encoder.rs`.

use std::fmt;

use super::schema::SchemaRegistry;
use super::value::{Record, TypeDescriptor, Value};
use crate::error::CodecError;

/// Lebar count prefix untuk string dan array
pub const COUNT_SIZE: usize = 4;
/// Lebar null tag untuk composite
pub const TAG_SIZE: usize = 1;
/// Panjang encoded null object (dimanapun posisinya)
pub const NULL_SIZE: usize = TAG_SIZE;
/// Batas nesting array/object; size, encode dan decode menolak lebih dalam
pub const MAX_DEPTH: usize = 256;

/// Byte yang dibutuhkan untuk `count` boolean yang di-pack
#[inline(always)]
pub fn packed_bool_bytes(count: usize) -> usize {
    count / 8 + usize::from(count % 8 != 0)
}

/// Ukuran encoded string dengan `units` UTF-16 code units
#[inline(always)]
pub fn string_size(units: usize) -> usize {
    COUNT_SIZE + units * 2
}

/// Exact size calculator
pub struct SizeCalculator<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> SizeCalculator<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Exact encoded length dari `value` terhadap `descriptor`
    pub fn size(&self, value: &Value, descriptor: &TypeDescriptor) -> Result<usize, CodecError> {
        self.size_at(value, descriptor, Path::Root, 0)
    }

    pub(crate) fn size_at(
        &self,
        value: &Value,
        descriptor: &TypeDescriptor,
        path: Path<'_>,
        depth: usize,
    ) -> Result<usize, CodecError> {
        match (descriptor, value) {
            (TypeDescriptor::Bool, Value::Bool(_))
            | (TypeDescriptor::Byte, Value::Byte(_))
            | (TypeDescriptor::Char, Value::Char(_))
            | (TypeDescriptor::Int16, Value::Int16(_))
            | (TypeDescriptor::Int32, Value::Int32(_))
            | (TypeDescriptor::Float, Value::Float(_))
            | (TypeDescriptor::Int64, Value::Int64(_))
            | (TypeDescriptor::Double, Value::Double(_)) => {
                // fixed_width selalu Some untuk kind primitive
                Ok(descriptor.fixed_width().unwrap_or_default())
            }
            (TypeDescriptor::String, Value::String(s)) => {
                let units = s.encode_utf16().count();
                check_count("string", units)?;
                Ok(string_size(units))
            }
            (TypeDescriptor::Array(elem), Value::Array(items)) => {
                check_count("array", items.len())?;
                let depth = enter(depth)?;
                if **elem == TypeDescriptor::Bool {
                    for (i, item) in items.iter().enumerate() {
                        if !matches!(item, Value::Bool(_)) {
                            return Err(mismatch(Path::Index(&path, i), elem, item));
                        }
                    }
                    return Ok(COUNT_SIZE + packed_bool_bytes(items.len()));
                }
                let mut total = COUNT_SIZE;
                for (i, item) in items.iter().enumerate() {
                    total += self.size_at(item, elem, Path::Index(&path, i), depth)?;
                }
                Ok(total)
            }
            (TypeDescriptor::Composite(_), Value::Object(None)) => Ok(NULL_SIZE),
            (TypeDescriptor::Composite(name), Value::Object(Some(record))) => {
                let depth = enter(depth)?;
                let fields = self.registry.field_list(name)?;
                check_record(record, name, fields.len(), path)?;

                let mut total = TAG_SIZE;
                for (field, value) in fields.iter().zip(record.fields()) {
                    total += self.size_at(value, &field.descriptor, Path::Field(&path, &field.name), depth)?;
                }
                Ok(total)
            }
            (descriptor, value) => Err(mismatch(path, descriptor, value)),
        }
    }
}

/// Masuk satu level array/object lebih dalam
#[inline(always)]
pub(crate) fn enter(depth: usize) -> Result<usize, CodecError> {
    if depth >= MAX_DEPTH {
        return Err(CodecError::TooDeep { depth: MAX_DEPTH });
    }
    Ok(depth + 1)
}

/// Count harus muat di 4-byte signed count field
#[inline(always)]
pub(crate) fn check_count(what: &'static str, len: usize) -> Result<i32, CodecError> {
    i32::try_from(len).map_err(|_| CodecError::TooLarge { what, len })
}

/// Record harus punya type dan jumlah field yang cocok dengan descriptor
pub(crate) fn check_record(
    record: &Record,
    type_name: &str,
    field_count: usize,
    path: Path<'_>,
) -> Result<(), CodecError> {
    if record.type_name() != type_name {
        return Err(CodecError::TypeMismatch {
            path: path.to_string(),
            expected: type_name.to_owned(),
            found: "object of another type",
        });
    }
    if record.fields().len() != field_count {
        return Err(CodecError::TypeMismatch {
            path: path.to_string(),
            expected: format!("{} with {} fields", type_name, field_count),
            found: "object with a different field count",
        });
    }
    Ok(())
}

pub(crate) fn mismatch(path: Path<'_>, descriptor: &TypeDescriptor, value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        path: path.to_string(),
        expected: descriptor.to_string(),
        found: value.kind(),
    }
}

/// Lokasi value di dalam tree, hanya di-format saat error
#[derive(Clone, Copy)]
pub(crate) enum Path<'a> {
    Root,
    Field(&'a Path<'a>, &'a str),
    Index(&'a Path<'a>, usize),
}

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Path::Root => f.write_str("$"),
            Path::Field(parent, name) => write!(f, "{}.{}", parent, name),
            Path::Index(parent, i) => write!(f, "{}[{}]", parent, i),
        }
    }
}
