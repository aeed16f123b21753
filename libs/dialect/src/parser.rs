//! # Dialect XML Parser
//!
//! ## Purpose
//!
//! Pull-parses a dialect description (`<mavlink>` with `<version>`,
//! `<dialect>`, `<enums>`, `<messages>`) into the [`Dialect`] model.
//! Unknown elements and attributes are skipped so curated subsets and
//! annotated upstream files both load; structural problems (missing
//! attributes, bad numbers, unknown field types) are hard errors.
//!
//! Fields appearing after an `<extensions/>` marker inside a message are
//! extension fields.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DialectError;
use crate::model::{Dialect, EntryDef, EnumDef, FieldDef, MessageDef, ParamDef, PrimitiveType};

/// Parse a dialect document from its XML text.
pub fn parse_dialect(xml: &str) -> Result<Dialect, DialectError> {
    let mut reader = Reader::from_str(xml);
    let mut seen_root = false;
    let mut version = 0u8;
    let mut dialect_id = 0u8;
    let mut enums = Vec::new();
    let mut messages = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"mavlink" => seen_root = true,
                b"version" => {
                    let text = reader.read_text(e.name())?;
                    version = parse_u32(&text, "version")? as u8;
                }
                b"dialect" => {
                    let text = reader.read_text(e.name())?;
                    dialect_id = parse_u32(&text, "dialect")? as u8;
                }
                b"enums" => parse_enums(&mut reader, &mut enums)?,
                b"messages" => parse_messages(&mut reader, &mut messages)?,
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(DialectError::MissingElement("mavlink"));
    }

    let dialect = Dialect {
        version,
        dialect_id,
        enums,
        messages,
    };
    dialect.validate()?;
    Ok(dialect)
}

/// Load and parse a dialect file from disk.
pub fn load_dialect(path: &std::path::Path) -> Result<Dialect, DialectError> {
    let xml = std::fs::read_to_string(path)?;
    parse_dialect(&xml)
}

fn parse_enums(reader: &mut Reader<&[u8]>, enums: &mut Vec<EnumDef>) -> Result<(), DialectError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"enum" => enums.push(parse_enum(reader, &e)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if e.name().as_ref() == b"enums" => return Ok(()),
            Event::Eof => return Err(DialectError::MissingElement("enums")),
            _ => {}
        }
    }
}

fn parse_enum(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<EnumDef, DialectError> {
    let name = require_attr(start, "enum", "name")?;
    let mut description = String::new();
    let mut entries = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"description" => {
                    description = reader.read_text(e.name())?.trim().to_string();
                }
                b"entry" => entries.push(parse_entry(reader, &e, false)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) if e.name().as_ref() == b"entry" => {
                entries.push(parse_entry(reader, &e, true)?);
            }
            Event::End(e) if e.name().as_ref() == b"enum" => break,
            Event::Eof => return Err(DialectError::MissingElement("enum")),
            _ => {}
        }
    }

    Ok(EnumDef {
        name,
        description,
        entries,
    })
}

fn parse_entry(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
    is_empty: bool,
) -> Result<EntryDef, DialectError> {
    let name = require_attr(start, "entry", "name")?;
    let value = match optional_attr(start, "value")? {
        Some(v) => Some(parse_u32(&v, &format!("entry {name} value"))?),
        None => None,
    };
    let mut description = String::new();
    let mut params = Vec::new();

    if !is_empty {
        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.name().as_ref() {
                    b"description" => {
                        description = reader.read_text(e.name())?.trim().to_string();
                    }
                    b"param" => {
                        let desc = reader.read_text(e.name())?.trim().to_string();
                        params.push(parse_param(&e, desc, &name)?);
                    }
                    _ => {
                        reader.read_to_end(e.name())?;
                    }
                },
                Event::Empty(e) if e.name().as_ref() == b"param" => {
                    params.push(parse_param(&e, String::new(), &name)?);
                }
                Event::End(e) if e.name().as_ref() == b"entry" => break,
                Event::Eof => return Err(DialectError::MissingElement("entry")),
                _ => {}
            }
        }
    }

    Ok(EntryDef {
        name,
        value,
        description,
        params,
    })
}

fn parse_param(
    start: &BytesStart,
    description: String,
    entry_name: &str,
) -> Result<ParamDef, DialectError> {
    let index_raw = require_attr(start, "param", "index")?;
    let index = parse_u32(&index_raw, &format!("param index of {entry_name}"))?;
    if !(1..=7).contains(&index) {
        return Err(DialectError::BadParamIndex {
            entry: entry_name.to_string(),
            index,
        });
    }
    let min = match optional_attr(start, "min")? {
        Some(v) => Some(parse_f32(&v, &format!("param min of {entry_name}"))?),
        None => None,
    };
    let max = match optional_attr(start, "max")? {
        Some(v) => Some(parse_f32(&v, &format!("param max of {entry_name}"))?),
        None => None,
    };

    Ok(ParamDef {
        index: index as u8,
        label: optional_attr(start, "label")?,
        units: optional_attr(start, "units")?,
        min,
        max,
        description,
    })
}

fn parse_messages(
    reader: &mut Reader<&[u8]>,
    messages: &mut Vec<MessageDef>,
) -> Result<(), DialectError> {
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"message" => messages.push(parse_message(reader, &e)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(e) if e.name().as_ref() == b"messages" => return Ok(()),
            Event::Eof => return Err(DialectError::MissingElement("messages")),
            _ => {}
        }
    }
}

fn parse_message(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
) -> Result<MessageDef, DialectError> {
    let name = require_attr(start, "message", "name")?;
    let id_raw = require_attr(start, "message", "id")?;
    let id = parse_u32(&id_raw, &format!("message {name} id"))?;
    let mut description = String::new();
    let mut fields = Vec::new();
    let mut in_extensions = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"description" => {
                    description = reader.read_text(e.name())?.trim().to_string();
                }
                b"field" => {
                    let desc = reader.read_text(e.name())?.trim().to_string();
                    fields.push(parse_field(&e, desc, &name, in_extensions)?);
                }
                b"extensions" => {
                    in_extensions = true;
                    reader.read_to_end(e.name())?;
                }
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"extensions" => in_extensions = true,
                b"field" => {
                    fields.push(parse_field(&e, String::new(), &name, in_extensions)?);
                }
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"message" => break,
            Event::Eof => return Err(DialectError::MissingElement("message")),
            _ => {}
        }
    }

    Ok(MessageDef {
        id,
        name,
        description,
        fields,
    })
}

fn parse_field(
    start: &BytesStart,
    description: String,
    message_name: &str,
    is_extension: bool,
) -> Result<FieldDef, DialectError> {
    let name = require_attr(start, "field", "name")?;
    let type_raw = require_attr(start, "field", "type")?;

    let (base, array_len) = match type_raw.split_once('[') {
        Some((base, rest)) => {
            let len_text = rest.trim_end_matches(']');
            let len = parse_u32(len_text, &format!("array length of {message_name}.{name}"))?;
            if !(1..=255).contains(&len) {
                return Err(DialectError::BadArrayLen {
                    message: message_name.to_string(),
                    len,
                });
            }
            (base, Some(len as u8))
        }
        None => (type_raw.as_str(), None),
    };

    let typ = PrimitiveType::parse(base).ok_or_else(|| DialectError::UnknownType {
        message: message_name.to_string(),
        typ: type_raw.clone(),
    })?;

    Ok(FieldDef {
        name,
        typ,
        array_len,
        enum_ref: optional_attr(start, "enum")?,
        units: optional_attr(start, "units")?,
        is_extension,
        description,
    })
}

fn optional_attr(start: &BytesStart, name: &str) -> Result<Option<String>, DialectError> {
    for attr in start.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(String::from_utf8_lossy(&attr.value).into_owned()));
        }
    }
    Ok(None)
}

fn require_attr(
    start: &BytesStart,
    element: &'static str,
    name: &'static str,
) -> Result<String, DialectError> {
    optional_attr(start, name)?.ok_or(DialectError::MissingAttribute {
        element,
        attribute: name,
    })
}

fn parse_u32(value: &str, context: &str) -> Result<u32, DialectError> {
    let v = value.trim();
    let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => v.parse(),
    };
    parsed.map_err(|_| DialectError::InvalidNumber {
        value: value.to_string(),
        context: context.to_string(),
    })
}

fn parse_f32(value: &str, context: &str) -> Result<f32, DialectError> {
    value
        .trim()
        .parse()
        .map_err(|_| DialectError::InvalidNumber {
            value: value.to_string(),
            context: context.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINI: &str = r#"<?xml version="1.0"?>
<mavlink>
  <version>3</version>
  <dialect>0</dialect>
  <enums>
    <enum name="MAV_STATE">
      <description>System status flag.</description>
      <entry name="MAV_STATE_UNINIT">
        <description>Uninitialized.</description>
      </entry>
      <entry name="MAV_STATE_BOOT"/>
      <entry value="10" name="MAV_STATE_CUSTOM"/>
    </enum>
    <enum name="MAV_CMD">
      <entry value="16" name="MAV_CMD_NAV_WAYPOINT">
        <description>Navigate to waypoint.</description>
        <param index="1" label="Hold" units="s" min="0">Hold time.</param>
        <param index="4" label="Yaw" units="deg">Desired yaw angle.</param>
      </entry>
    </enum>
  </enums>
  <messages>
    <message id="0" name="HEARTBEAT">
      <description>The heartbeat message.</description>
      <field type="uint8_t" name="type" enum="MAV_STATE">Vehicle type.</field>
      <field type="uint32_t" name="custom_mode">Autopilot bitfield.</field>
      <field type="uint8_t_mavlink_version" name="mavlink_version"/>
      <extensions/>
      <field type="uint16_t" name="spare">Trailing extension.</field>
    </message>
  </messages>
</mavlink>
"#;

    #[test]
    fn parses_minimal_dialect() {
        let d = parse_dialect(MINI).unwrap();
        assert_eq!(d.version, 3);
        assert_eq!(d.dialect_id, 0);
        assert_eq!(d.enums.len(), 2);
        assert_eq!(d.messages.len(), 1);

        let msg = &d.messages[0];
        assert_eq!(msg.id, 0);
        assert_eq!(msg.fields.len(), 4);
        assert_eq!(msg.fields[0].enum_ref.as_deref(), Some("MAV_STATE"));
        // The mavlink_version alias normalizes to uint8_t.
        assert_eq!(msg.fields[2].typ, PrimitiveType::U8);
        assert!(msg.fields[3].is_extension);
        assert_eq!(msg.base_wire_size(), 6);
        assert_eq!(msg.wire_size(), 8);
    }

    #[test]
    fn entry_values_and_params_parse() {
        let d = parse_dialect(MINI).unwrap();
        let state = d.enum_named("MAV_STATE").unwrap();
        let values: Vec<u32> = state.resolved_entries().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, [0, 1, 10]);

        let cmd = d.enum_named("MAV_CMD").unwrap();
        let (value, entry) = cmd.resolved_entries().into_iter().next().unwrap();
        assert_eq!(value, 16);
        assert_eq!(entry.params.len(), 2);
        assert_eq!(entry.params[0].index, 1);
        assert_eq!(entry.params[0].units.as_deref(), Some("s"));
        assert_eq!(entry.params[0].min, Some(0.0));
        assert_eq!(entry.params[1].label.as_deref(), Some("Yaw"));
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(matches!(
            parse_dialect("<notmavlink></notmavlink>"),
            Err(DialectError::MissingElement("mavlink"))
        ));
    }

    #[test]
    fn unknown_field_type_is_an_error() {
        let xml = r#"<mavlink><messages>
            <message id="1" name="M">
              <field type="quadword" name="x"/>
            </message>
        </messages></mavlink>"#;
        assert!(matches!(
            parse_dialect(xml),
            Err(DialectError::UnknownType { .. })
        ));
    }

    #[test]
    fn oversized_array_is_an_error() {
        let xml = r#"<mavlink><messages>
            <message id="1" name="M">
              <field type="uint8_t[300]" name="x"/>
            </message>
        </messages></mavlink>"#;
        assert!(matches!(
            parse_dialect(xml),
            Err(DialectError::BadArrayLen { len: 300, .. })
        ));
    }

    #[test]
    fn truncated_document_is_an_error() {
        let xml = r#"<mavlink><messages><message id="1" name="M">"#;
        assert!(parse_dialect(xml).is_err());
    }

    #[test]
    fn units_are_collected() {
        let d = parse_dialect(MINI).unwrap();
        assert_eq!(d.recognized_units(), ["deg", "s"]);
    }
}
