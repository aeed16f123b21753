//! # MAVLink Router
//!
//! ## Purpose
//!
//! The routing layer of the mavswitch workspace: a single-task actor that
//! owns the route table, connection map, and subscription registry, plus
//! the pieces that stand it up: endpoint-string parsing, TOML
//! configuration, and the process-wide subscription cache that lets
//! subscriptions survive a router restart.
//!
//! ## Architecture Role
//!
//! ```text
//! adapters (mavswitch-network) ──LinkEvent──▶ ┌────────────────┐
//!                                             │  Router actor   │──▶ forwards (raw Bytes)
//! RouterHandle (send/subscribe) ──commands──▶ │  routes + subs  │──▶ subscriber deliveries
//!                                             └────────────────┘
//! ```
//!
//! The dialect is a type parameter: instantiate `Router<MavMessage>` with
//! the generated message enum of whichever dialect the process speaks.

pub mod cache;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod router;
pub mod routes;
pub mod subscription;

pub use cache::cached_subscription_count;
pub use config::{EndpointSpec, RouterConfig, RouterSection};
pub use endpoint::spawn_endpoint;
pub use error::RouterError;
pub use router::{Router, RouterHandle, RouterSettings, SEQUENCE_MODULUS};
pub use subscription::{Delivery, Subscriber, SubscriptionId, SubscriptionQuery};
