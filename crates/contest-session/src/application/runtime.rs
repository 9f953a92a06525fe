//! # Session Runtime
//!
//! Single owner of the [`SessionController`]. Platform events, editor
//! commands and deadline events arrive on channels and are handled one at a
//! time; observers read [`SessionSnapshot`]s from a watch channel.
//!
//! ```text
//! platform ──SessionEvent──┐
//! deadline ──TimedOut──────┼──→ [SessionRuntime] ──snapshot──→ watch
//! editor ──EditorCommand───┘        │      ↑
//!                                   │      └── CallResult ──┐
//!                                   └── PendingCall ──→ [JoinSet] ──→ gateway
//! ```
//!
//! Gateway calls never block the loop: they run on a `JoinSet` and their
//! answers come back as one more input, so a back-press, a timeout or a
//! teardown is served while a run is on the wire. Run and submit commands
//! go out one at a time in arrival order.
//!
//! Events are polled before call answers, and answers before commands, so
//! an event sent before a command is always handled first.

use async_trait::async_trait;
use contest_types::SubmitVerdict;
use std::collections::VecDeque;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use super::calls::{CallOutcome, CallResult, Completion, PendingCall};
use super::controller::SessionController;
use super::pipeline::RunOutcome;
use crate::domain::{FinalizeOutcome, LockState};
use crate::error::{SessionError, SessionResult};
use crate::events::{EditorCommand, SessionEvent, SessionSnapshot};
use crate::monitors::{DeadlineHandle, DeadlineMonitor};
use crate::ports::inbound::EditorSurfaceApi;
use crate::ports::outbound::{Clock, ContestGateway, ExamPlatform};

/// Reply channel of the command that started a call.
#[derive(Debug)]
enum Waiter {
    Run(oneshot::Sender<SessionResult<RunOutcome>>),
    Submit(oneshot::Sender<SessionResult<SubmitVerdict>>),
    Finish(oneshot::Sender<SessionResult<FinalizeOutcome>>),
}

impl Waiter {
    /// A dropped reply receiver only means the caller stopped waiting.
    fn deliver(self, outcome: CallOutcome) {
        match (self, outcome) {
            (Waiter::Run(reply), CallOutcome::Run(result)) => {
                let _ = reply.send(result);
            }
            (Waiter::Submit(reply), CallOutcome::Submit(result)) => {
                let _ = reply.send(result);
            }
            (Waiter::Finish(reply), CallOutcome::Finalized(outcome)) => {
                let _ = reply.send(Ok(outcome));
            }
            (waiter, outcome) => {
                warn!(?waiter, ?outcome, "Call outcome does not match its waiter");
            }
        }
    }
}

type CallTask = (CallResult, Option<Waiter>);

/// Task that owns one attempt session.
pub struct SessionRuntime<G, P, C>
where
    G: ContestGateway + 'static,
    P: ExamPlatform + 'static,
    C: Clock + 'static,
{
    controller: SessionController<G, P, C>,
    events: mpsc::Receiver<SessionEvent>,
    commands: mpsc::Receiver<EditorCommand>,
    snapshots: watch::Sender<SessionSnapshot>,
    /// Handed to the deadline monitor once the session is open.
    deadline_events: Option<mpsc::Sender<SessionEvent>>,
    deadline: Option<DeadlineHandle>,
    calls: JoinSet<CallTask>,
    /// A run or submit is on the wire.
    submission_in_flight: bool,
    /// Run/submit commands waiting for it.
    queued: VecDeque<EditorCommand>,
}

impl<G, P, C> SessionRuntime<G, P, C>
where
    G: ContestGateway + 'static,
    P: ExamPlatform + 'static,
    C: Clock + 'static,
{
    /// Wrap a controller; returns the runtime and the handle the editor and
    /// platform bindings use.
    pub fn new(controller: SessionController<G, P, C>) -> (Self, SessionHandle) {
        let buffer = controller.config().event_buffer.max(1);
        let (event_tx, event_rx) = mpsc::channel(buffer);
        let (command_tx, command_rx) = mpsc::channel(buffer);
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

        let handle = SessionHandle {
            events: event_tx.clone(),
            commands: command_tx,
            snapshots: snapshot_rx,
        };

        let runtime = Self {
            controller,
            events: event_rx,
            commands: command_rx,
            snapshots: snapshot_tx,
            deadline_events: Some(event_tx),
            deadline: None,
            calls: JoinSet::new(),
            submission_in_flight: false,
            queued: VecDeque::new(),
        };
        (runtime, handle)
    }

    /// Open the session and serve events until teardown or until every
    /// handle is dropped.
    pub async fn run(mut self) -> SessionResult<()> {
        // Events that arrive while metadata loads are replayed afterwards;
        // a teardown ends the session before it opens.
        let mut early = Vec::new();
        let opened = {
            let open = self.controller.open();
            tokio::pin!(open);
            loop {
                tokio::select! {
                    biased;

                    opened = &mut open => break Some(opened),
                    event = self.events.recv() => match event {
                        Some(SessionEvent::Teardown) | None => break None,
                        Some(event) => early.push(event),
                    },
                }
            }
        };
        let Some(opened) = opened else {
            self.shutdown();
            return Ok(());
        };
        self.publish();
        if let Err(e) = opened {
            warn!(error = %e, "Contest session failed to open");
            return Err(e);
        }
        for event in early {
            self.on_event(event);
        }
        self.publish();
        self.sync_deadline();

        loop {
            let mut delivery = None;
            tokio::select! {
                biased;

                event = self.events.recv() => match event {
                    Some(SessionEvent::Teardown) | None => break,
                    Some(event) => self.on_event(event),
                },
                Some(joined) = self.calls.join_next(), if !self.calls.is_empty() => {
                    delivery = self.on_call_finished(joined);
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
            self.publish();
            self.sync_deadline();
            if let Some((waiter, outcome)) = delivery {
                waiter.deliver(outcome);
            }
        }

        self.shutdown();
        Ok(())
    }

    fn on_event(&mut self, event: SessionEvent) {
        if let Some(call) = self.controller.apply_event(event) {
            self.start(call, None);
        }
    }

    fn handle_command(&mut self, command: EditorCommand) {
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            EditorCommand::RequestFullscreen { reply } => {
                let _ = reply.send(self.controller.request_fullscreen());
            }
            EditorCommand::Finish { reply } => match self.controller.begin_finish() {
                Ok(Some(call)) => self.start(call, Some(Waiter::Finish(reply))),
                Ok(None) => {
                    let _ = reply.send(Ok(FinalizeOutcome::Skipped));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            command @ (EditorCommand::Run { .. } | EditorCommand::Submit { .. }) => {
                if self.submission_in_flight {
                    debug!(queued = self.queued.len() + 1, "Submission queued behind one in flight");
                    self.queued.push_back(command);
                } else {
                    self.start_submission(command);
                }
            }
        }
    }

    /// Local checks run now, against the lock state at this moment.
    fn start_submission(&mut self, command: EditorCommand) {
        match command {
            EditorCommand::Run {
                source,
                language,
                reply,
            } => match self.controller.begin_run(source, language) {
                Ok(request) => {
                    self.submission_in_flight = true;
                    self.start(PendingCall::Run(request), Some(Waiter::Run(reply)));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            EditorCommand::Submit {
                source,
                language,
                reply,
            } => match self.controller.begin_submit(source, language) {
                Ok(request) => {
                    self.submission_in_flight = true;
                    self.start(PendingCall::Submit(request), Some(Waiter::Submit(reply)));
                }
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            other => self.handle_command(other),
        }
    }

    fn start(&mut self, call: PendingCall, waiter: Option<Waiter>) {
        debug!(
            attempt_id = %self.controller.attempt_id(),
            call = call.as_str(),
            "Gateway call started"
        );
        let gateway = self.controller.gateway();
        self.calls
            .spawn(async move { (call.execute(gateway).await, waiter) });
    }

    /// Apply a finished call and line up whatever comes next. Returns the
    /// reply to send once the new state is published.
    fn on_call_finished(
        &mut self,
        joined: Result<CallTask, JoinError>,
    ) -> Option<(Waiter, CallOutcome)> {
        let (result, waiter) = match joined {
            Ok(task) => task,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                debug!(error = %e, "Gateway call cancelled");
                return None;
            }
        };

        let submission = matches!(result, CallResult::Run { .. } | CallResult::Submit { .. });
        let Completion { outcome, follow_up } = self.controller.complete(result);
        if let Some(call) = follow_up {
            self.start(call, None);
        }
        if submission {
            self.submission_in_flight = false;
            while !self.submission_in_flight {
                let Some(command) = self.queued.pop_front() else {
                    break;
                };
                self.start_submission(command);
            }
        }
        waiter.map(|waiter| (waiter, outcome))
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.controller.snapshot());
    }

    /// Start the deadline monitor once, and drop it when no longer needed.
    fn sync_deadline(&mut self) {
        match self.controller.deadline_target() {
            Some(end_time) => {
                if let Some(events) = self.deadline_events.take() {
                    let interval = self.controller.config().deadline_poll_interval();
                    self.deadline = Some(DeadlineMonitor::spawn(
                        end_time,
                        self.controller.clock(),
                        interval,
                        events,
                    ));
                }
            }
            None => {
                self.deadline_events = None;
                if self.deadline.take().is_some() {
                    debug!("Deadline monitor stopped");
                }
            }
        }
    }

    /// Calls still on the wire are abandoned; their callers see
    /// `SessionClosed`.
    fn shutdown(&mut self) {
        self.deadline = None;
        let abandoned = self.calls.len() + self.queued.len();
        self.calls.abort_all();
        self.queued.clear();
        let beacon = self.controller.teardown();
        self.publish();
        info!(
            attempt_id = %self.controller.attempt_id(),
            beacon,
            abandoned,
            "Contest session torn down"
        );
    }
}

/// Cloneable handle to a running session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    events: mpsc::Sender<SessionEvent>,
    commands: mpsc::Sender<EditorCommand>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Deliver a platform event.
    pub async fn dispatch(&self, event: SessionEvent) -> SessionResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Deliver a platform event from a synchronous callback.
    ///
    /// Fails with `SessionClosed` if the runtime is gone and with
    /// `EventQueueFull` if the event could not be queued.
    pub fn try_dispatch(&self, event: SessionEvent) -> SessionResult<()> {
        match self.events.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event = event.as_str(), "Session event queue full, event dropped");
                Err(SessionError::EventQueueFull {
                    event: event.as_str(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SessionError::SessionClosed),
        }
    }

    /// Page teardown. Sends the best-effort finalize and stops the runtime.
    pub async fn teardown(&self) -> SessionResult<()> {
        self.dispatch(SessionEvent::Teardown).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshots.borrow()
    }

    /// Watch receiver for observers that want every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<SessionResult<T>>) -> EditorCommand,
    ) -> SessionResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| SessionError::SessionClosed)?;
        response.await.map_err(|_| SessionError::SessionClosed)?
    }
}

#[async_trait]
impl EditorSurfaceApi for SessionHandle {
    fn lock_state(&self) -> LockState {
        self.snapshots.borrow().lock_state
    }

    fn violations(&self) -> u8 {
        self.snapshots.borrow().violations
    }

    fn max_violations(&self) -> u8 {
        self.snapshots.borrow().max_violations
    }

    async fn on_request_fullscreen(&self) -> SessionResult<()> {
        self.request(|reply| EditorCommand::RequestFullscreen { reply })
            .await
    }

    async fn on_run(&self, source: String, language: String) -> SessionResult<RunOutcome> {
        self.request(|reply| EditorCommand::Run {
            source,
            language,
            reply,
        })
        .await
    }

    async fn on_submit(&self, source: String, language: String) -> SessionResult<SubmitVerdict> {
        self.request(|reply| EditorCommand::Submit {
            source,
            language,
            reply,
        })
        .await
    }

    async fn on_back_pressed(&self) -> SessionResult<()> {
        self.dispatch(SessionEvent::BackPressed).await
    }

    async fn on_finish(&self) -> SessionResult<FinalizeOutcome> {
        self.request(|reply| EditorCommand::Finish { reply }).await
    }
}

/// Build a runtime from parts and spawn it on the current tokio runtime.
pub fn spawn_session<G, P, C>(
    controller: SessionController<G, P, C>,
) -> (SessionHandle, tokio::task::JoinHandle<SessionResult<()>>)
where
    G: ContestGateway + 'static,
    P: ExamPlatform + 'static,
    C: Clock + 'static,
{
    let (runtime, handle) = SessionRuntime::new(controller);
    (handle, tokio::spawn(runtime.run()))
}
