//! Ports module for the attempt session
//!
//! Inbound: what the editor surface calls. Outbound: what the session needs
//! from the server, the exam platform and the clock.

pub mod inbound;
pub mod outbound;

pub use inbound::EditorSurfaceApi;
pub use outbound::{
    mock_window_start, Clock, ContestGateway, ExamPlatform, GatewayCall, GatewayError,
    ManualClock, MockGateway, PlatformCall, PlatformError, RecordingPlatform, SystemClock,
};
