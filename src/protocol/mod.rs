//! Protocol Layer: Schema-less Binary Object Codec
//!
//! Prinsip desain:
//! - Explicit schema: composite type didaftarkan, bukan di-reflect
//! - Exact sizing: size pass memprediksi panjang output byte-per-byte
//! - Single allocation: encode menulis ke satu buffer pre-allocated
//! - Self-threading cursor: setiap decode mengembalikan posisi berikutnya

mod codec;
mod encoder;
mod schema;
mod size;
mod typed;
mod value;

pub use crate::error::CodecError;
pub use codec::{Decoded, WireCodec};
pub use encoder::{Decoder, Encoder};
pub use schema::{Field, FieldList, Schema, SchemaRegistry};
pub use size::{packed_bool_bytes, SizeCalculator, COUNT_SIZE, MAX_DEPTH, NULL_SIZE, TAG_SIZE};
pub use typed::{Composite, FieldReader, WireType};
pub use value::{Record, TypeDescriptor, Value};
