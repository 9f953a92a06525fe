//! # Contest Gateway (HTTP)
//!
//! `reqwest` implementation of [`contest_session::ContestGateway`] against the
//! portal's contest API.
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | `fetch_contest` | `GET /api/contests/{cid}` |
//! | `fetch_question` | `GET /api/contests/{cid}/questions/{qid}` |
//! | `finalize` | `POST /api/contests/{cid}/finalize` |
//! | `run` | `POST /api/contests/{cid}/questions/{qid}/run` |
//! | `submit` | `POST /api/contests/{cid}/questions/{qid}/submit` |
//!
//! HTTP 409 means the attempt is already finalized.

mod client;
mod config;
mod error;

pub use client::HttpContestGateway;
pub use config::GatewayConfig;
pub use error::ClientError;
