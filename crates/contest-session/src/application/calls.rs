//! Gateway calls in flight
//!
//! The controller never awaits the gateway while holding the session. It
//! hands out a [`PendingCall`], the owner runs it wherever it likes, and the
//! [`CallResult`] goes back through
//! [`SessionController::complete`](super::SessionController::complete).

use contest_telemetry::metrics::{HistogramTimer, GATEWAY_LATENCY};
use contest_types::{
    ContestId, ContestMetadata, QuestionId, QuestionMetadata, RunRequest, RunVerdict,
    SubmitRequest, SubmitVerdict,
};
use std::future::Future;
use std::sync::Arc;

use super::pipeline::RunOutcome;
use crate::domain::{FinalizeOutcome, FinalizeReason};
use crate::error::SessionResult;
use crate::ports::outbound::{ContestGateway, GatewayError};

/// A gateway request the controller has committed to.
#[derive(Clone, Debug, PartialEq)]
pub enum PendingCall {
    Run(RunRequest),
    Submit(SubmitRequest),
    /// The guard is already `Dispatched` when this is handed out.
    Finalize {
        contest_id: ContestId,
        reason: FinalizeReason,
    },
    /// Contest and question metadata, re-read after a stored run.
    Refresh {
        contest_id: ContestId,
        question_id: QuestionId,
    },
}

impl PendingCall {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingCall::Run(_) => "run",
            PendingCall::Submit(_) => "submit",
            PendingCall::Finalize { .. } => "finalize",
            PendingCall::Refresh { .. } => "refresh",
        }
    }

    /// Send the request and wait for the answer.
    pub async fn execute<G: ContestGateway>(self, gateway: Arc<G>) -> CallResult {
        match self {
            PendingCall::Run(request) => {
                let result = timed(gateway.run(request.clone())).await;
                CallResult::Run { request, result }
            }
            PendingCall::Submit(request) => {
                let result = timed(gateway.submit(request.clone())).await;
                CallResult::Submit { request, result }
            }
            PendingCall::Finalize { contest_id, reason } => {
                let result = timed(gateway.finalize(&contest_id)).await;
                CallResult::Finalize { reason, result }
            }
            PendingCall::Refresh {
                contest_id,
                question_id,
            } => CallResult::Refresh {
                result: fetch_metadata(gateway.as_ref(), &contest_id, &question_id).await,
            },
        }
    }
}

/// Await a gateway request under the latency histogram.
pub(crate) async fn timed<T>(request: impl Future<Output = T>) -> T {
    let _timer = HistogramTimer::new(&GATEWAY_LATENCY);
    request.await
}

/// Contest then question metadata; stops at the first failure.
pub(crate) async fn fetch_metadata<G: ContestGateway + ?Sized>(
    gateway: &G,
    contest_id: &ContestId,
    question_id: &QuestionId,
) -> Result<(ContestMetadata, QuestionMetadata), GatewayError> {
    let contest = gateway.fetch_contest(contest_id).await?;
    let question = gateway.fetch_question(contest_id, question_id).await?;
    Ok((contest, question))
}

/// A finished gateway request, paired with what was sent.
#[derive(Clone, Debug, PartialEq)]
pub enum CallResult {
    Run {
        request: RunRequest,
        result: Result<RunVerdict, GatewayError>,
    },
    Submit {
        request: SubmitRequest,
        result: Result<SubmitVerdict, GatewayError>,
    },
    Finalize {
        reason: FinalizeReason,
        result: Result<(), GatewayError>,
    },
    Refresh {
        result: Result<(ContestMetadata, QuestionMetadata), GatewayError>,
    },
}

/// What a completed call means to whoever asked for it.
#[derive(Clone, Debug, PartialEq)]
pub enum CallOutcome {
    Run(SessionResult<RunOutcome>),
    Submit(SessionResult<SubmitVerdict>),
    Finalized(FinalizeOutcome),
    Refreshed(SessionResult<()>),
}

/// Result of feeding a [`CallResult`] back to the controller.
#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub outcome: CallOutcome,
    /// Another request the controller wants sent, e.g. a metadata refresh
    /// after a stored run.
    pub follow_up: Option<PendingCall>,
}
