//! # MAVLink Dialect Model & Codec Generator
//!
//! ## Purpose
//!
//! Everything needed to go from a dialect XML description to a typed Rust
//! codec:
//!
//! - [`model`]: the structured dialect (enums, messages, fields), wire
//!   ordering, and CRC_EXTRA derivation
//! - [`parser`]: the XML front end
//! - [`generator`]: deterministic Rust source emission
//!
//! Build scripts call [`parse_dialect`] + [`generate`] to materialize a
//! dialect crate; the `mavgen` binary wraps the same pipeline for ad-hoc
//! use.

pub mod error;
pub mod generator;
pub mod model;
pub mod parser;

pub use error::DialectError;
pub use generator::generate;
pub use model::{Dialect, EntryDef, EnumDef, FieldDef, MessageDef, ParamDef, PrimitiveType};
pub use parser::{load_dialect, parse_dialect};
