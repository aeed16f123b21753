//! # Dialect Model
//!
//! ## Purpose
//!
//! The structured form of a MAVLink dialect: enums with resolved entry
//! values, messages with typed fields, the wire-order rule, and the
//! CRC_EXTRA derivation. The XML parser produces this model; the code
//! generator and the `mavgen` CLI consume it.
//!
//! ## Wire Order
//!
//! Non-extension fields are transmitted sorted by decreasing primitive size
//! (8, 4, 2, 1 bytes), with the sort kept stable so equally sized fields
//! stay in declaration order. Extension fields follow in declaration order
//! and never contribute to CRC_EXTRA.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use mavswitch_codec::X25;

use crate::error::DialectError;

/// Scalar field types a dialect may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    Char,
    F32,
    F64,
}

impl PrimitiveType {
    /// Parse a dialect XML type name. The historical alias
    /// `uint8_t_mavlink_version` normalizes to plain `uint8_t`.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "uint8_t" | "uint8_t_mavlink_version" => Self::U8,
            "int8_t" => Self::I8,
            "uint16_t" => Self::U16,
            "int16_t" => Self::I16,
            "uint32_t" => Self::U32,
            "int32_t" => Self::I32,
            "uint64_t" => Self::U64,
            "int64_t" => Self::I64,
            "char" => Self::Char,
            "float" => Self::F32,
            "double" => Self::F64,
            _ => return None,
        })
    }

    /// Size of one element on the wire.
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Char => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// The canonical XML spelling, as fed into the CRC_EXTRA recipe.
    pub fn xml_name(self) -> &'static str {
        match self {
            Self::U8 => "uint8_t",
            Self::I8 => "int8_t",
            Self::U16 => "uint16_t",
            Self::I16 => "int16_t",
            Self::U32 => "uint32_t",
            Self::I32 => "int32_t",
            Self::U64 => "uint64_t",
            Self::I64 => "int64_t",
            Self::Char => "char",
            Self::F32 => "float",
            Self::F64 => "double",
        }
    }

    /// The Rust scalar the generator materializes. `char` fields are bytes;
    /// `char` arrays become `String` at the field level.
    pub fn rust_name(self) -> &'static str {
        match self {
            Self::U8 | Self::Char => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

/// One field of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub typ: PrimitiveType,
    /// `Some(n)` for `type[n]` array fields.
    pub array_len: Option<u8>,
    pub enum_ref: Option<String>,
    pub units: Option<String>,
    pub is_extension: bool,
    pub description: String,
}

impl FieldDef {
    /// Bytes this field occupies on the wire.
    pub fn wire_len(&self) -> usize {
        self.typ.size() * usize::from(self.array_len.unwrap_or(1))
    }
}

/// One message definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDef {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub fields: Vec<FieldDef>,
}

impl MessageDef {
    /// Fields in transmission order: non-extension fields stable-sorted by
    /// decreasing element size, then extension fields in declaration order.
    pub fn wire_order(&self) -> Vec<&FieldDef> {
        let mut ordered: Vec<&FieldDef> =
            self.fields.iter().filter(|f| !f.is_extension).collect();
        ordered.sort_by_key(|f| Reverse(f.typ.size()));
        ordered.extend(self.fields.iter().filter(|f| f.is_extension));
        ordered
    }

    /// Full payload size including extensions.
    pub fn wire_size(&self) -> usize {
        self.fields.iter().map(FieldDef::wire_len).sum()
    }

    /// Payload size excluding extensions (the v1 payload size).
    pub fn base_wire_size(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| !f.is_extension)
            .map(FieldDef::wire_len)
            .sum()
    }

    /// Derive the message's CRC_EXTRA byte: x25 over `"<NAME> "`, then for
    /// each non-extension field in wire order `"<type> "`, `"<name> "`, and
    /// the array length byte for arrays; result is low byte XOR high byte.
    pub fn crc_extra(&self) -> u8 {
        let mut crc = X25::new();
        crc.update(self.name.as_bytes());
        crc.update(b" ");
        for field in self.wire_order().into_iter().filter(|f| !f.is_extension) {
            crc.update(field.typ.xml_name().as_bytes());
            crc.update(b" ");
            crc.update(field.name.as_bytes());
            crc.update(b" ");
            if let Some(len) = field.array_len {
                crc.update(&[len]);
            }
        }
        let crc = crc.finish();
        ((crc & 0xFF) ^ (crc >> 8)) as u8
    }

    fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the message carries addressing fields (targeted routing).
    pub fn is_targeted(&self) -> bool {
        self.find_field("target_system").is_some() || self.find_field("target_component").is_some()
    }
}

/// An indexed parameter description attached to an enum entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub index: u8,
    pub label: Option<String>,
    pub units: Option<String>,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub description: String,
}

/// One enum entry. A missing `value` resolves to the previous entry's
/// effective value plus one; a missing value on the first entry is 0.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDef {
    pub name: String,
    pub value: Option<u32>,
    pub description: String,
    pub params: Vec<ParamDef>,
}

/// An enumeration definition.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub description: String,
    pub entries: Vec<EntryDef>,
}

impl EnumDef {
    /// Entries paired with their effective values, applying the implicit
    /// previous-plus-one rule.
    pub fn resolved_entries(&self) -> Vec<(u32, &EntryDef)> {
        let mut out = Vec::with_capacity(self.entries.len());
        let mut next = 0u32;
        for entry in &self.entries {
            let value = entry.value.unwrap_or(next);
            next = value.wrapping_add(1);
            out.push((value, entry));
        }
        out
    }

    /// Name-based encode: look up the wire value of a named entry. Unknown
    /// names are an error; unknown wire values are not (they pass through
    /// decode as raw integers).
    pub fn value_of(&self, entry_name: &str) -> Result<u32, DialectError> {
        self.resolved_entries()
            .into_iter()
            .find(|(_, e)| e.name == entry_name)
            .map(|(v, _)| v)
            .ok_or_else(|| DialectError::UnknownEnumEntry {
                enum_name: self.name.clone(),
                entry: entry_name.to_string(),
            })
    }
}

/// A complete dialect: the unit the XML parser yields and the generator
/// consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialect {
    pub version: u8,
    pub dialect_id: u8,
    pub enums: Vec<EnumDef>,
    pub messages: Vec<MessageDef>,
}

impl Dialect {
    /// Structural validation beyond what parsing enforces.
    pub fn validate(&self) -> Result<(), DialectError> {
        for (i, msg) in self.messages.iter().enumerate() {
            if msg.id > 0x00FF_FFFF {
                return Err(DialectError::IdOutOfRange { id: msg.id });
            }
            if let Some(dup) = self.messages[..i].iter().find(|m| m.id == msg.id) {
                return Err(DialectError::DuplicateMessageId {
                    id: msg.id,
                    first: dup.name.clone(),
                    second: msg.name.clone(),
                });
            }
            for field in &msg.fields {
                if let Some(enum_name) = &field.enum_ref {
                    if !self.enums.iter().any(|e| &e.name == enum_name) {
                        return Err(DialectError::UnknownEnumRef {
                            message: msg.name.clone(),
                            field: field.name.clone(),
                            enum_name: enum_name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn enum_named(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Every distinct unit string mentioned by fields or entry params,
    /// sorted. Metadata only; nothing enforces units at runtime.
    pub fn recognized_units(&self) -> Vec<String> {
        let mut units = BTreeSet::new();
        for msg in &self.messages {
            for field in &msg.fields {
                if let Some(u) = &field.units {
                    units.insert(u.clone());
                }
            }
        }
        for e in &self.enums {
            for entry in &e.entries {
                for p in &entry.params {
                    if let Some(u) = &p.units {
                        units.insert(u.clone());
                    }
                }
            }
        }
        units.into_iter().collect()
    }
}
