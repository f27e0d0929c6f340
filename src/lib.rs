//! # Parcel
//!
//! Schema-less binary object codec dengan framed TCP transport.
//!
//! ## Arsitektur
//!
//! - [`protocol`]: type descriptors, schema registry, size pass, encode/decode
//! - [`network`]: length-prefixed connection, outbound queue, send loop, client, listener
//! - [`core`]: mmap-backed frame store dan bounded `Stat`
//!
//! ## Wire format
//!
//! Semua integer multi-byte big-endian. Object: `[tag][own][super][capabilities]`,
//! string: `[count][UTF-16 units]`, bool array: `[count][bits MSB-first]`.
//! Di connection atau frame store, setiap value dibungkus `[len][payload]`.
//!
//! ```
//! use parcel::protocol::{Record, Schema, SchemaRegistry, TypeDescriptor, Value, WireCodec};
//!
//! let mut registry = SchemaRegistry::new();
//! registry
//!     .register(Schema::new("Point").field("x", TypeDescriptor::Int32).field("y", TypeDescriptor::Int32))
//!     .unwrap();
//! let codec = WireCodec::new(registry);
//!
//! let point = Value::from(Record::new("Point", vec![Value::Int32(3), Value::Int32(-4)]));
//! let descriptor = TypeDescriptor::composite("Point");
//!
//! let bytes = codec.encode(&point, &descriptor).unwrap();
//! assert_eq!(bytes.len(), codec.size(&point, &descriptor).unwrap());
//! assert_eq!(codec.decode_exact(&bytes, &descriptor).unwrap(), point);
//! ```

pub mod core;
pub mod error;
pub mod network;
pub mod protocol;

pub use error::{Error, Result};
