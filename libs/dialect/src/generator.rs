//! # Dialect Code Generator
//!
//! ## Purpose
//!
//! Turns a [`Dialect`] model into Rust source: one struct per message with
//! wire-order pack/unpack, CRC_EXTRA and size constants, enum types with
//! raw-integer passthrough for unknown values, entry parameter tables, and
//! the dialect's `MavMessage` enum implementing the codec's `Message` trait.
//!
//! The generator is pure: the same model always produces byte-identical
//! output, so builds are reproducible and the emitted file can be diffed.

use crate::model::{Dialect, EnumDef, FieldDef, MessageDef, PrimitiveType};

/// Generate the complete Rust module for a dialect.
pub fn generate(dialect: &Dialect) -> String {
    let mut out = String::new();

    out.push_str("// Generated by mavgen. Do not edit by hand.\n\n");
    emit_uses(&mut out, dialect);
    emit_consts(&mut out, dialect);
    for e in &dialect.enums {
        emit_enum(&mut out, e);
    }
    for m in &dialect.messages {
        emit_message_struct(&mut out, m, dialect);
    }
    emit_message_enum(&mut out, dialect);
    out
}

fn uses_char_arrays(dialect: &Dialect) -> bool {
    dialect.messages.iter().any(|m| {
        m.fields
            .iter()
            .any(|f| f.typ == PrimitiveType::Char && f.array_len.is_some())
    })
}

fn uses_entry_params(dialect: &Dialect) -> bool {
    dialect
        .enums
        .iter()
        .any(|e| e.entries.iter().any(|entry| !entry.params.is_empty()))
}

fn emit_uses(out: &mut String, dialect: &Dialect) {
    out.push_str("use bytes::{Buf, BufMut, BytesMut};\n");
    let mut items = vec!["CodecError", "Destination"];
    if uses_entry_params(dialect) {
        items.push("EntryParam");
    }
    items.push("Message");
    items.push("MessageData");
    if uses_char_arrays(dialect) {
        items.push("wire");
    }
    out.push_str(&format!(
        "use mavswitch_codec::{{{}}};\n\n",
        items.join(", ")
    ));
}

fn emit_consts(out: &mut String, dialect: &Dialect) {
    out.push_str("/// The dialect's `<version>` element.\n");
    out.push_str(&format!(
        "pub const DIALECT_VERSION: u8 = {};\n",
        dialect.version
    ));
    out.push_str("/// The dialect's `<dialect>` element.\n");
    out.push_str(&format!(
        "pub const DIALECT_ID: u8 = {};\n\n",
        dialect.dialect_id
    ));

    let units = dialect.recognized_units();
    out.push_str("/// Unit strings mentioned by this dialect. Metadata only.\n");
    out.push_str("pub const RECOGNIZED_UNITS: &[&str] = &[");
    for (i, unit) in units.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("\"{}\"", escape(unit)));
    }
    out.push_str("];\n\n");
}

fn emit_enum(out: &mut String, e: &EnumDef) {
    let type_name = camel(&e.name);
    let resolved = e.resolved_entries();

    emit_doc(out, "", &e.description);
    out.push_str("#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]\n");
    out.push_str(&format!("pub enum {type_name} {{\n"));
    for (_, entry) in &resolved {
        emit_doc(out, "    ", &entry.description);
        out.push_str(&format!("    {},\n", camel(&entry.name)));
    }
    out.push_str("    /// Value not defined by the dialect, carried through unchanged.\n");
    out.push_str("    Unknown(u32),\n");
    out.push_str("}\n\n");

    out.push_str(&format!("impl {type_name} {{\n"));
    out.push_str("    /// Decode a wire value; unknown values pass through as-is.\n");
    out.push_str("    pub fn from_value(value: u32) -> Self {\n");
    out.push_str("        match value {\n");
    let mut seen = Vec::new();
    for (value, entry) in &resolved {
        if seen.contains(value) {
            continue;
        }
        seen.push(*value);
        out.push_str(&format!(
            "            {} => Self::{},\n",
            value,
            camel(&entry.name)
        ));
    }
    out.push_str("            other => Self::Unknown(other),\n");
    out.push_str("        }\n    }\n\n");
    out.push_str("    /// The wire value of this entry.\n");
    out.push_str("    pub fn value(&self) -> u32 {\n");
    out.push_str("        match self {\n");
    for (value, entry) in &resolved {
        out.push_str(&format!(
            "            Self::{} => {},\n",
            camel(&entry.name),
            value
        ));
    }
    out.push_str("            Self::Unknown(other) => *other,\n");
    out.push_str("        }\n    }\n");
    emit_entry_params(out, e);
    out.push_str("}\n\n");

    out.push_str(&format!("impl Default for {type_name} {{\n"));
    out.push_str("    fn default() -> Self {\n");
    out.push_str("        Self::from_value(0)\n");
    out.push_str("    }\n}\n\n");
}

fn emit_entry_params(out: &mut String, e: &EnumDef) {
    if e.entries.iter().all(|entry| entry.params.is_empty()) {
        return;
    }
    out.push_str("\n    /// Indexed parameter descriptions for entries that define them.\n");
    out.push_str("    pub fn params(&self) -> &'static [EntryParam] {\n");
    out.push_str("        match self {\n");
    for (_, entry) in e.resolved_entries() {
        if entry.params.is_empty() {
            continue;
        }
        out.push_str(&format!("            Self::{} => &[\n", camel(&entry.name)));
        for p in &entry.params {
            out.push_str(&format!(
                "                EntryParam {{ index: {}, label: {}, units: {}, min: {}, max: {}, description: \"{}\" }},\n",
                p.index,
                opt_str(&p.label),
                opt_str(&p.units),
                opt_f32(p.min),
                opt_f32(p.max),
                escape(&p.description)
            ));
        }
        out.push_str("            ],\n");
    }
    out.push_str("            _ => &[],\n");
    out.push_str("        }\n    }\n");
}

fn emit_message_struct(out: &mut String, m: &MessageDef, dialect: &Dialect) {
    let struct_name = struct_name(&m.name);

    emit_doc(out, "", &m.description);
    out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
    out.push_str(&format!("pub struct {struct_name} {{\n"));
    for f in &m.fields {
        emit_doc(out, "    ", &f.description);
        out.push_str(&format!(
            "    pub {}: {},\n",
            field_ident(&f.name),
            field_type(f, dialect)
        ));
    }
    out.push_str("}\n\n");

    out.push_str(&format!("impl Default for {struct_name} {{\n"));
    out.push_str("    fn default() -> Self {\n        Self {\n");
    for f in &m.fields {
        out.push_str(&format!(
            "            {}: {},\n",
            field_ident(&f.name),
            field_default(f, dialect)
        ));
    }
    out.push_str("        }\n    }\n}\n\n");

    out.push_str(&format!("impl MessageData for {struct_name} {{\n"));
    out.push_str(&format!("    const ID: u32 = {};\n", m.id));
    out.push_str(&format!("    const NAME: &'static str = \"{}\";\n", m.name));
    out.push_str(&format!("    const CRC_EXTRA: u8 = {};\n", m.crc_extra()));
    out.push_str(&format!("    const WIRE_SIZE: usize = {};\n", m.wire_size()));
    out.push_str(&format!(
        "    const BASE_WIRE_SIZE: usize = {};\n\n",
        m.base_wire_size()
    ));

    out.push_str("    fn pack_payload(&self, buf: &mut BytesMut) {\n");
    for f in m.wire_order() {
        out.push_str(&pack_line(f, dialect));
    }
    out.push_str("    }\n\n");

    out.push_str("    fn unpack_payload(payload: &[u8]) -> Result<Self, CodecError> {\n");
    out.push_str("        let mut buf = payload;\n");
    for f in m.wire_order() {
        out.push_str(&unpack_line(f, dialect));
    }
    out.push_str("        Ok(Self {\n");
    for f in &m.fields {
        out.push_str(&format!("            {},\n", field_ident(&f.name)));
    }
    out.push_str("        })\n    }\n");

    let has_ts = m.fields.iter().any(|f| f.name == "target_system");
    let has_tc = m.fields.iter().any(|f| f.name == "target_component");
    if has_ts || has_tc {
        let ts = if has_ts { "self.target_system" } else { "0" };
        let tc = if has_tc { "self.target_component" } else { "0" };
        out.push_str("\n    fn destination(&self) -> Destination {\n");
        out.push_str(&format!("        Destination::of({ts}, {tc})\n"));
        out.push_str("    }\n");
    }
    out.push_str("}\n\n");
}

fn emit_message_enum(out: &mut String, dialect: &Dialect) {
    out.push_str("/// Every message defined by this dialect.\n");
    out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
    out.push_str("pub enum MavMessage {\n");
    for m in &dialect.messages {
        out.push_str(&format!(
            "    {}({}),\n",
            camel(&m.name),
            struct_name(&m.name)
        ));
    }
    out.push_str("}\n\n");

    out.push_str("impl Message for MavMessage {\n");

    emit_variant_dispatch(out, dialect, "message_id", "u32", "ID");
    emit_variant_dispatch(out, dialect, "message_name", "&'static str", "NAME");

    out.push_str("    fn destination(&self) -> Destination {\n        match self {\n");
    for m in &dialect.messages {
        out.push_str(&format!(
            "            Self::{}(m) => m.destination(),\n",
            camel(&m.name)
        ));
    }
    out.push_str("        }\n    }\n\n");

    out.push_str("    fn pack_payload(&self, buf: &mut BytesMut) {\n        match self {\n");
    for m in &dialect.messages {
        out.push_str(&format!(
            "            Self::{}(m) => m.pack_payload(buf),\n",
            camel(&m.name)
        ));
    }
    out.push_str("        }\n    }\n\n");

    out.push_str("    fn unpack_payload(id: u32, payload: &[u8]) -> Result<Self, CodecError> {\n");
    out.push_str("        match id {\n");
    for m in &dialect.messages {
        out.push_str(&format!(
            "            {} => {}::unpack_payload(payload).map(Self::{}),\n",
            m.id,
            struct_name(&m.name),
            camel(&m.name)
        ));
    }
    out.push_str("            other => Err(CodecError::UnknownMessage(other)),\n");
    out.push_str("        }\n    }\n\n");

    emit_id_table(out, dialect, "crc_extra", "u8", "CRC_EXTRA");
    emit_id_table(out, dialect, "wire_size", "usize", "WIRE_SIZE");
    emit_id_table(out, dialect, "base_wire_size", "usize", "BASE_WIRE_SIZE");
    emit_id_table(out, dialect, "name_of", "&'static str", "NAME");

    out.push_str("}\n");
}

fn emit_variant_dispatch(
    out: &mut String,
    dialect: &Dialect,
    method: &str,
    ret: &str,
    konst: &str,
) {
    out.push_str(&format!(
        "    fn {method}(&self) -> {ret} {{\n        match self {{\n"
    ));
    for m in &dialect.messages {
        out.push_str(&format!(
            "            Self::{}(_) => {}::{},\n",
            camel(&m.name),
            struct_name(&m.name),
            konst
        ));
    }
    out.push_str("        }\n    }\n\n");
}

fn emit_id_table(out: &mut String, dialect: &Dialect, method: &str, ret: &str, konst: &str) {
    out.push_str(&format!(
        "    fn {method}(id: u32) -> Option<{ret}> {{\n        match id {{\n"
    ));
    for m in &dialect.messages {
        out.push_str(&format!(
            "            {} => Some({}::{}),\n",
            m.id,
            struct_name(&m.name),
            konst
        ));
    }
    out.push_str("            _ => None,\n");
    out.push_str("        }\n    }\n\n");
}

fn pack_line(f: &FieldDef, dialect: &Dialect) -> String {
    let id = field_ident(&f.name);
    if let Some(n) = f.array_len {
        if f.typ == PrimitiveType::Char {
            return format!("        wire::put_char_array(buf, &self.{id}, {n});\n");
        }
        return format!(
            "        for v in &self.{id} {{\n            buf.{}(*v);\n        }}\n",
            put_fn(f.typ)
        );
    }
    if enum_type(f, dialect).is_some() {
        return match f.typ {
            PrimitiveType::U8 => format!("        buf.put_u8(self.{id}.value() as u8);\n"),
            PrimitiveType::U16 => format!("        buf.put_u16_le(self.{id}.value() as u16);\n"),
            _ => format!("        buf.put_u32_le(self.{id}.value());\n"),
        };
    }
    format!("        buf.{}(self.{id});\n", put_fn(f.typ))
}

fn unpack_line(f: &FieldDef, dialect: &Dialect) -> String {
    let id = field_ident(&f.name);
    if let Some(n) = f.array_len {
        if f.typ == PrimitiveType::Char {
            return format!("        let {id} = wire::take_char_array(&mut buf, {n});\n");
        }
        return format!(
            "        let mut {id} = [{}; {n}];\n        for v in {id}.iter_mut() {{\n            *v = buf.{}();\n        }}\n",
            typed_zero(f.typ),
            get_fn(f.typ)
        );
    }
    if let Some(enum_name) = enum_type(f, dialect) {
        let value_expr = match f.typ {
            PrimitiveType::U8 => "u32::from(buf.get_u8())",
            PrimitiveType::U16 => "u32::from(buf.get_u16_le())",
            _ => "buf.get_u32_le()",
        };
        return format!(
            "        let {id} = {enum_name}::from_value({value_expr});\n"
        );
    }
    format!("        let {id} = buf.{}();\n", get_fn(f.typ))
}

/// The generated enum type name for a field, when the field is enum-typed
/// and the base type can carry an enum (unsigned scalar, not an array).
fn enum_type(f: &FieldDef, dialect: &Dialect) -> Option<String> {
    if f.array_len.is_some() {
        return None;
    }
    if !matches!(
        f.typ,
        PrimitiveType::U8 | PrimitiveType::U16 | PrimitiveType::U32
    ) {
        return None;
    }
    let name = f.enum_ref.as_ref()?;
    dialect.enum_named(name).map(|e| camel(&e.name))
}

fn field_type(f: &FieldDef, dialect: &Dialect) -> String {
    if let Some(n) = f.array_len {
        if f.typ == PrimitiveType::Char {
            return "String".to_string();
        }
        return format!("[{}; {}]", f.typ.rust_name(), n);
    }
    if let Some(enum_name) = enum_type(f, dialect) {
        return enum_name;
    }
    f.typ.rust_name().to_string()
}

fn field_default(f: &FieldDef, dialect: &Dialect) -> String {
    if let Some(n) = f.array_len {
        if f.typ == PrimitiveType::Char {
            return "String::new()".to_string();
        }
        return format!("[{}; {}]", typed_zero(f.typ), n);
    }
    if let Some(enum_name) = enum_type(f, dialect) {
        return format!("{enum_name}::default()");
    }
    match f.typ {
        PrimitiveType::F32 | PrimitiveType::F64 => "0.0".to_string(),
        _ => "0".to_string(),
    }
}

fn typed_zero(typ: PrimitiveType) -> String {
    match typ {
        PrimitiveType::F32 | PrimitiveType::F64 => format!("0.0{}", typ.rust_name()),
        _ => format!("0{}", typ.rust_name()),
    }
}

fn put_fn(typ: PrimitiveType) -> &'static str {
    match typ {
        PrimitiveType::U8 | PrimitiveType::Char => "put_u8",
        PrimitiveType::I8 => "put_i8",
        PrimitiveType::U16 => "put_u16_le",
        PrimitiveType::I16 => "put_i16_le",
        PrimitiveType::U32 => "put_u32_le",
        PrimitiveType::I32 => "put_i32_le",
        PrimitiveType::U64 => "put_u64_le",
        PrimitiveType::I64 => "put_i64_le",
        PrimitiveType::F32 => "put_f32_le",
        PrimitiveType::F64 => "put_f64_le",
    }
}

fn get_fn(typ: PrimitiveType) -> &'static str {
    match typ {
        PrimitiveType::U8 | PrimitiveType::Char => "get_u8",
        PrimitiveType::I8 => "get_i8",
        PrimitiveType::U16 => "get_u16_le",
        PrimitiveType::I16 => "get_i16_le",
        PrimitiveType::U32 => "get_u32_le",
        PrimitiveType::I32 => "get_i32_le",
        PrimitiveType::U64 => "get_u64_le",
        PrimitiveType::I64 => "get_i64_le",
        PrimitiveType::F32 => "get_f32_le",
        PrimitiveType::F64 => "get_f64_le",
    }
}

/// `MAV_TYPE` → `MavType`, `GPS_RAW_INT` → `GpsRawInt`.
fn camel(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect()
}

fn struct_name(message_name: &str) -> String {
    format!("{}Data", camel(message_name))
}

/// Lower-case the XML field name and keep it a legal Rust identifier.
/// `type` is special-cased to `mavtype`; other keywords get a raw prefix.
fn field_ident(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    if lower == "type" {
        return "mavtype".to_string();
    }
    const KEYWORDS: &[&str] = &[
        "abstract", "as", "async", "await", "become", "box", "break", "const", "continue",
        "crate", "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "if",
        "impl", "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv",
        "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "try",
        "typeof", "union", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
    ];
    if KEYWORDS.contains(&lower.as_str()) {
        format!("r#{lower}")
    } else {
        lower
    }
}

fn emit_doc(out: &mut String, indent: &str, text: &str) {
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            out.push_str(&format!("{indent}///\n"));
        } else {
            out.push_str(&format!("{indent}/// {line}\n"));
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', " ")
}

fn opt_str(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("Some(\"{}\")", escape(v)),
        None => "None".to_string(),
    }
}

fn opt_f32(value: Option<f32>) -> String {
    match value {
        Some(v) => format!("Some({v:?})"),
        None => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dialect;

    const XML: &str = r#"<mavlink>
  <version>3</version>
  <enums>
    <enum name="MAV_MODE">
      <entry name="MAV_MODE_MANUAL"/>
      <entry name="MAV_MODE_AUTO"/>
    </enum>
  </enums>
  <messages>
    <message id="0" name="HEARTBEAT">
      <field type="uint8_t" name="type" enum="MAV_MODE">Mode.</field>
      <field type="uint32_t" name="custom_mode">Bitfield.</field>
    </message>
    <message id="5" name="CHANGE_OPERATOR_CONTROL">
      <field type="uint8_t" name="target_system">System.</field>
      <field type="uint8_t" name="control_request"/>
      <field type="uint8_t" name="version"/>
      <field type="char[25]" name="passkey"/>
    </message>
  </messages>
</mavlink>"#;

    #[test]
    fn output_is_deterministic() {
        let dialect = parse_dialect(XML).unwrap();
        assert_eq!(generate(&dialect), generate(&dialect));
    }

    #[test]
    fn emits_expected_items() {
        let dialect = parse_dialect(XML).unwrap();
        let code = generate(&dialect);
        assert!(code.contains("pub enum MavMode"));
        assert!(code.contains("Unknown(u32)"));
        assert!(code.contains("pub struct HeartbeatData"));
        assert!(code.contains("pub mavtype: MavMode"));
        assert!(code.contains("pub struct ChangeOperatorControlData"));
        assert!(code.contains("pub passkey: String"));
        assert!(code.contains("const CRC_EXTRA: u8 = 217;"));
        assert!(code.contains("impl Message for MavMessage"));
        assert!(code.contains("wire::put_char_array(buf, &self.passkey, 25);"));
    }

    #[test]
    fn wire_order_places_wide_fields_first() {
        let dialect = parse_dialect(XML).unwrap();
        let code = generate(&dialect);
        // custom_mode (4 bytes) packs before the one-byte enum field.
        let custom = code.find("buf.put_u32_le(self.custom_mode);").unwrap();
        let mode = code.find("buf.put_u8(self.mavtype.value() as u8);").unwrap();
        assert!(custom < mode);
    }

    #[test]
    fn targeted_messages_get_a_destination() {
        let dialect = parse_dialect(XML).unwrap();
        let code = generate(&dialect);
        assert!(code.contains("Destination::of(self.target_system, 0)"));
    }

    #[test]
    fn keyword_field_names_are_sanitized() {
        assert_eq!(field_ident("type"), "mavtype");
        assert_eq!(field_ident("loop"), "r#loop");
        assert_eq!(field_ident("Yaw"), "yaw");
    }
}
