//! Explicit schema registration + field introspection
//!
//! Tidak ada runtime reflection: setiap composite type mendaftarkan
//! `Schema` miliknya (own fields, supertype, capabilities). Registry lalu
//! mem-flatten chain tersebut menjadi satu `FieldList`:
//!
//! ```text
//! FieldList(T) = own(T) ++ FieldList(super(T)) ++ FieldList(cap_1) ++ ... ++ FieldList(cap_n)
//! ```
//!
//! Urutan ini dipakai oleh size, encode, dan decode. Tiga-tiganya WAJIB
//! memanggil `field_list` yang sama.

use std::borrow::Cow;
use std::collections::HashMap;

use super::typed::Composite;
use super::value::TypeDescriptor;
use crate::error::CodecError;

/// Satu member dari composite type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Cow<'static, str>,
    pub descriptor: TypeDescriptor,
}

/// Flattened, ordered member list
pub type FieldList = Vec<Field>;

/// Registration untuk satu composite type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: Cow<'static, str>,
    fields: Vec<Field>,
    supertype: Option<Cow<'static, str>>,
    capabilities: Vec<Cow<'static, str>>,
}

impl Schema {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            supertype: None,
            capabilities: Vec::new(),
        }
    }

    /// Tambah own field (urutan deklarasi = urutan wire)
    pub fn field(mut self, name: impl Into<Cow<'static, str>>, descriptor: TypeDescriptor) -> Self {
        self.fields.push(Field {
            name: name.into(),
            descriptor,
        });
        self
    }

    pub fn extends(mut self, supertype: impl Into<Cow<'static, str>>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    pub fn implements(mut self, capability: impl Into<Cow<'static, str>>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn own_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn supertype(&self) -> Option<&str> {
        self.supertype.as_deref()
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(|c| c.as_ref())
    }
}

/// Registry semua composite schema yang dikenal codec
///
/// Dibangun sekali lalu read-only; aman di-share lewat `Arc`.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Daftarkan schema. Nama yang sama dua kali adalah error.
    pub fn register(&mut self, schema: Schema) -> Result<&mut Self, CodecError> {
        if self.schemas.contains_key(schema.name()) {
            return Err(CodecError::schema(schema.name(), "registered twice"));
        }
        self.schemas.insert(schema.name().to_owned(), schema);
        Ok(self)
    }

    /// Daftarkan schema dari typed `Composite`
    pub fn register_type<T: Composite>(&mut self) -> Result<&mut Self, CodecError> {
        self.register(T::schema())
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Flattened FieldList untuk `type_name`
    ///
    /// Gagal dengan `CodecError::Schema` jika type, supertype, capability,
    /// atau composite type dari salah satu member tidak terdaftar, atau
    /// jika chain supertype/capability membentuk cycle.
    pub fn field_list(&self, type_name: &str) -> Result<FieldList, CodecError> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        self.collect(type_name, &mut stack, &mut out)?;
        Ok(out)
    }

    /// Resolve semua schema sekaligus, untuk fail-fast saat startup
    pub fn validate(&self) -> Result<(), CodecError> {
        for name in self.schemas.keys() {
            self.field_list(name)?;
        }
        Ok(())
    }

    /// Pastikan descriptor bisa diklasifikasi (composite terdaftar)
    pub fn check_descriptor(&self, descriptor: &TypeDescriptor) -> Result<(), CodecError> {
        match descriptor {
            TypeDescriptor::Array(elem) => self.check_descriptor(elem),
            TypeDescriptor::Composite(name) if !self.contains(name) => {
                Err(CodecError::schema(name.as_ref(), "type is not registered"))
            }
            _ => Ok(()),
        }
    }

    fn collect<'a>(
        &'a self,
        type_name: &str,
        stack: &mut Vec<&'a str>,
        out: &mut FieldList,
    ) -> Result<(), CodecError> {
        let schema = self
            .get(type_name)
            .ok_or_else(|| CodecError::schema(type_name, "type is not registered"))?;

        if stack.contains(&schema.name()) {
            let mut chain = stack.join(" -> ");
            chain.push_str(" -> ");
            chain.push_str(schema.name());
            return Err(CodecError::schema(
                schema.name(),
                format!("cyclic supertype/capability chain: {}", chain),
            ));
        }
        stack.push(schema.name());

        for field in schema.own_fields() {
            self.check_descriptor(&field.descriptor).map_err(|_| {
                CodecError::schema(
                    schema.name(),
                    format!(
                        "member `{}` has unclassifiable type `{}`",
                        field.name, field.descriptor
                    ),
                )
            })?;
            out.push(field.clone());
        }

        if let Some(supertype) = schema.supertype() {
            self.collect(supertype, stack, out)?;
        }

        for capability in schema.capabilities() {
            self.collect(capability, stack, out)?;
        }

        stack.pop();
        Ok(())
    }
}
