//! # Common Dialect
//!
//! A curated subset of the canonical MAVLink `common` message set, generated
//! at build time by `mavswitch-dialect` from
//! `message_definitions/common.xml`. The generated module defines one struct
//! per message, the [`MavMessage`] dispatch enum, enum types with raw-value
//! passthrough, and the dialect's CRC_EXTRA / wire-size tables.
//!
//! Field definitions mirror upstream exactly, so the generated CRC_EXTRA
//! constants equal the canonical values (HEARTBEAT = 50, VFR_HUD = 20, …).

include!(concat!(env!("OUT_DIR"), "/common.rs"));
