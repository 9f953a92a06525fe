//! Application layer
//!
//! - `pipeline`: run/submit with local preconditions
//! - `calls`: gateway requests handed out by the controller and their answers
//! - `controller`: the session state machine driving every component
//! - `runtime`: single-owner task around the controller, and its handle

pub mod calls;
pub mod controller;
pub mod pipeline;
pub mod runtime;

pub use calls::{CallOutcome, CallResult, Completion, PendingCall};
pub use controller::SessionController;
pub use pipeline::{RunOutcome, RunSubmitPipeline};
pub use runtime::{spawn_session, SessionHandle, SessionRuntime};
