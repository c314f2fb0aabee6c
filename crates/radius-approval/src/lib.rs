//! Approval resolution (spec §4.3): runs a challenge through a connector
//! (chat, HTTP bridge) and folds the outcome into the pipeline's decision
//! chain, installing temporary leases in durable state when granted.

pub mod chat;
pub mod connector;
pub mod http_bridge;
pub mod outcome;
pub mod resolver;

pub use chat::ChatConnector;
pub use connector::Connector;
pub use http_bridge::HttpBridgeConnector;
pub use outcome::ApprovalOutcome;
pub use resolver::{resolve_and_fold, FallbackPolicy, ResolverConfig};
