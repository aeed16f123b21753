//! Errors raised while loading or validating a dialect description.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DialectError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),

    #[error("dialect file could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required element <{0}>")]
    MissingElement(&'static str),

    #[error("element <{element}> is missing attribute `{attribute}`")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("invalid number `{value}` in {context}")]
    InvalidNumber { value: String, context: String },

    #[error("message {message}: unknown field type `{typ}`")]
    UnknownType { message: String, typ: String },

    #[error("message {message}: array length {len} is out of range (1..=255)")]
    BadArrayLen { message: String, len: u32 },

    #[error("message id {id} is out of the 24-bit id space")]
    IdOutOfRange { id: u32 },

    #[error("duplicate message id {id} ({first} and {second})")]
    DuplicateMessageId {
        id: u32,
        first: String,
        second: String,
    },

    #[error("message {message}: field `{field}` references unknown enum `{enum_name}`")]
    UnknownEnumRef {
        message: String,
        field: String,
        enum_name: String,
    },

    #[error("enum {enum_name} has no entry named `{entry}`")]
    UnknownEnumEntry { enum_name: String, entry: String },

    #[error("param index {index} is out of range (1..=7) in enum entry {entry}")]
    BadParamIndex { entry: String, index: u32 },
}
