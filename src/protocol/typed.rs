//! Typed bridge: Rust types <-> dynamic `Value`
//!
//! `WireType` memetakan primitive, `String`, `Vec<T>` dan `Option<T>`
//! (nullable composite) ke descriptor + value. `Composite` adalah
//! registrasi hand-written untuk struct: schema + urutan field.
//!
//! Contoh:
//!
//! ```
//! use parcel::protocol::{Composite, FieldReader, Schema, Value, CodecError};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Named {
//!     name: String,
//! }
//!
//! impl Composite for Named {
//!     const TYPE_NAME: &'static str = "Named";
//!
//!     fn schema() -> Schema {
//!         Schema::new(Self::TYPE_NAME).member::<String>("name")
//!     }
//!
//!     fn write_fields(&self, out: &mut Vec<Value>) {
//!         out.push(Value::String(self.name.clone()));
//!     }
//!
//!     fn read_fields(&mut self, fields: &mut FieldReader) -> Result<(), CodecError> {
//!         self.name = fields.next()?;
//!         Ok(())
//!     }
//! }
//! ```

use super::schema::Schema;
use super::value::{Record, TypeDescriptor, Value};
use crate::error::CodecError;

/// Rust type dengan representasi wire tetap
pub trait WireType: Sized {
    fn descriptor() -> TypeDescriptor;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, CodecError>;
}

/// Composite record dengan schema eksplisit
///
/// `write_fields` dan `read_fields` WAJIB mengikuti urutan FieldList:
/// own fields, lalu field supertype (rekursif), lalu field capabilities.
pub trait Composite: Default {
    const TYPE_NAME: &'static str;

    /// Registrasi schema untuk type ini
    fn schema() -> Schema;

    /// Tulis semua field (termasuk fragment supertype/capability) ke `out`
    fn write_fields(&self, out: &mut Vec<Value>);

    /// Baca field dalam urutan yang sama dengan `write_fields`
    fn read_fields(&mut self, fields: &mut FieldReader) -> Result<(), CodecError>;

    fn to_record(&self) -> Record {
        let mut fields = Vec::new();
        self.write_fields(&mut fields);
        Record::new(Self::TYPE_NAME, fields)
    }

    fn from_record(record: Record) -> Result<Self, CodecError> {
        let mut target = Self::default();
        target.fill_from(record)?;
        Ok(target)
    }

    /// Isi instance yang sudah ada (decode ke target)
    fn fill_from(&mut self, record: Record) -> Result<(), CodecError> {
        if record.type_name() != Self::TYPE_NAME {
            return Err(CodecError::ClassCast {
                expected: record.type_name().to_owned(),
                found: Self::TYPE_NAME.to_owned(),
            });
        }
        let mut reader = FieldReader::new(Self::TYPE_NAME, record.into_fields());
        self.read_fields(&mut reader)?;
        reader.finish()
    }
}

/// Cursor atas field values sebuah record
pub struct FieldReader {
    type_name: &'static str,
    fields: std::vec::IntoIter<Value>,
    index: usize,
}

impl FieldReader {
    pub fn new(type_name: &'static str, fields: Vec<Value>) -> Self {
        Self {
            type_name,
            fields: fields.into_iter(),
            index: 0,
        }
    }

    /// Field berikutnya sebagai `T`
    #[allow(clippy::should_implement_trait)]
    pub fn next<T: WireType>(&mut self) -> Result<T, CodecError> {
        let index = self.index;
        let value = self.fields.next().ok_or_else(|| CodecError::TypeMismatch {
            path: format!("{}#{}", self.type_name, index),
            expected: T::descriptor().to_string(),
            found: "end of fields",
        })?;
        self.index += 1;
        T::from_value(value).map_err(|err| match err {
            CodecError::TypeMismatch { path, expected, found } => CodecError::TypeMismatch {
                path: format!("{}#{}{}", self.type_name, index, path.trim_start_matches('$')),
                expected,
                found,
            },
            other => other,
        })
    }

    /// Semua field harus sudah dikonsumsi
    pub fn finish(mut self) -> Result<(), CodecError> {
        match self.fields.next() {
            None => Ok(()),
            Some(extra) => Err(CodecError::TypeMismatch {
                path: format!("{}#{}", self.type_name, self.index),
                expected: "no more fields".to_owned(),
                found: extra.kind(),
            }),
        }
    }
}

fn mismatch<T: WireType>(value: &Value) -> CodecError {
    CodecError::TypeMismatch {
        path: "$".to_owned(),
        expected: T::descriptor().to_string(),
        found: value.kind(),
    }
}

macro_rules! primitive_wire_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl WireType for $ty {
                #[inline(always)]
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::$variant
                }

                #[inline(always)]
                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }

                fn from_value(value: Value) -> Result<Self, CodecError> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

primitive_wire_type! {
    bool => Bool,
    i8 => Byte,
    u16 => Char,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Float,
    f64 => Double,
}

impl WireType for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::String
    }

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: WireType> WireType for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::array(T::descriptor())
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Nullable composite: `None` di-encode sebagai null tag
impl<T: Composite> WireType for Option<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::composite(T::TYPE_NAME)
    }

    fn to_value(&self) -> Value {
        Value::Object(self.as_ref().map(T::to_record))
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Object(None) => Ok(None),
            Value::Object(Some(record)) => T::from_record(record).map(Some),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl Schema {
    /// Own field dengan descriptor dari `T`
    pub fn member<T: WireType>(self, name: &'static str) -> Self {
        self.field(name, T::descriptor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    impl Composite for Point {
        const TYPE_NAME: &'static str = "Point";

        fn schema() -> Schema {
            Schema::new(Self::TYPE_NAME)
                .member::<i32>("x")
                .member::<i32>("y")
        }

        fn write_fields(&self, out: &mut Vec<Value>) {
            out.push(self.x.to_value());
            out.push(self.y.to_value());
        }

        fn read_fields(&mut self, fields: &mut FieldReader) -> Result<(), CodecError> {
            self.x = fields.next()?;
            self.y = fields.next()?;
            Ok(())
        }
    }

    #[test]
    fn test_record_roundtrip() {
        let p = Point { x: 3, y: -4 };
        let record = p.to_record();
        assert_eq!(record.type_name(), "Point");
        assert_eq!(record.fields(), &[Value::Int32(3), Value::Int32(-4)]);
        assert_eq!(Point::from_record(record).unwrap(), p);
    }

    #[test]
    fn test_wrong_record_type_is_class_cast() {
        let record = Record::new("Vector", vec![Value::Int32(1), Value::Int32(2)]);
        assert!(matches!(
            Point::from_record(record),
            Err(CodecError::ClassCast { .. })
        ));
    }

    #[test]
    fn test_field_count_checked() {
        let short = Record::new("Point", vec![Value::Int32(1)]);
        assert!(Point::from_record(short).is_err());

        let long = Record::new("Point", vec![Value::Int32(1), Value::Int32(2), Value::Bool(true)]);
        assert!(Point::from_record(long).is_err());
    }

    #[test]
    fn test_vec_and_option_descriptors() {
        assert_eq!(
            <Vec<Option<Point>>>::descriptor(),
            TypeDescriptor::array(TypeDescriptor::composite("Point"))
        );
        let v = vec![Some(Point { x: 1, y: 1 }), None];
        assert_eq!(<Vec<Option<Point>>>::from_value(v.to_value()).unwrap(), v);
    }
}
