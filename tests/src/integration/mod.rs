//! Cross-crate flows.

pub mod http_gateway;
pub mod session_flows;
pub mod telemetry;
