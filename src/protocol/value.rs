//! Type descriptors dan dynamic value tree
//!
//! `TypeDescriptor` mengklasifikasi setiap value ke salah satu kind wire.
//! `Value` adalah representasi runtime yang di-encode terhadap descriptor.

use std::borrow::Cow;
use std::fmt;

/// Wire classification untuk sebuah value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Bool,
    Byte,
    /// One UTF-16 code unit
    Char,
    Double,
    Float,
    Int32,
    Int64,
    Int16,
    String,
    Array(Box<TypeDescriptor>),
    /// Composite record, resolved by name through the schema registry
    Composite(Cow<'static, str>),
}

impl TypeDescriptor {
    pub fn array(element: TypeDescriptor) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn composite(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Composite(name.into())
    }

    /// Fixed wire width untuk primitive, `None` untuk kind variable-size
    #[inline(always)]
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::Byte => Some(1),
            Self::Char | Self::Int16 => Some(2),
            Self::Int32 | Self::Float => Some(4),
            Self::Int64 | Self::Double => Some(8),
            Self::String | Self::Array(_) | Self::Composite(_) => None,
        }
    }

    /// Minimum bytes satu element di wire, dipakai untuk sanity check count
    /// sebelum alokasi saat decode.
    pub(crate) fn min_wire_size(&self) -> usize {
        match self {
            Self::String | Self::Array(_) => 4,
            Self::Composite(_) => 1,
            other => other.fixed_width().unwrap_or(1),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Byte => f.write_str("byte"),
            Self::Char => f.write_str("char"),
            Self::Double => f.write_str("double"),
            Self::Float => f.write_str("float"),
            Self::Int32 => f.write_str("int32"),
            Self::Int64 => f.write_str("int64"),
            Self::Int16 => f.write_str("int16"),
            Self::String => f.write_str("string"),
            Self::Array(elem) => write!(f, "{}[]", elem),
            Self::Composite(name) => f.write_str(name),
        }
    }
}

/// Dynamic value yang bisa di-encode
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Int16(i16),
    String(String),
    Array(Vec<Value>),
    /// `None` adalah null object
    Object(Option<Record>),
}

impl Value {
    /// Nama kind untuk pesan error
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Byte(_) => "byte",
            Self::Char(_) => "char",
            Self::Double(_) => "double",
            Self::Float(_) => "float",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Int16(_) => "int16",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(None) => "null object",
            Self::Object(Some(_)) => "object",
        }
    }

    pub fn null() -> Self {
        Self::Object(None)
    }

    pub fn object(record: Record) -> Self {
        Self::Object(Some(record))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Object(None))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::object(record)
    }
}

/// Composite instance: nama type + field values dalam urutan FieldList
///
/// Field supertype dan capability di-fold ke instance yang sama, jadi
/// `fields` selalu flat.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_name: Cow<'static, str>,
    fields: Vec<Value>,
}

impl Record {
    pub fn new(type_name: impl Into<Cow<'static, str>>, fields: Vec<Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields,
        }
    }

    /// Record kosong, siap diisi oleh decoder
    pub fn empty(type_name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(type_name, Vec::new())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Vec<Value> {
        &mut self.fields
    }

    pub fn into_fields(self) -> Vec<Value> {
        self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_widths() {
        assert_eq!(TypeDescriptor::Bool.fixed_width(), Some(1));
        assert_eq!(TypeDescriptor::Char.fixed_width(), Some(2));
        assert_eq!(TypeDescriptor::Float.fixed_width(), Some(4));
        assert_eq!(TypeDescriptor::Double.fixed_width(), Some(8));
        assert_eq!(TypeDescriptor::String.fixed_width(), None);
    }

    #[test]
    fn test_descriptor_display() {
        let desc = TypeDescriptor::array(TypeDescriptor::array(TypeDescriptor::composite("Player")));
        assert_eq!(desc.to_string(), "Player[][]");
    }
}
