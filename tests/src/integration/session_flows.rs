//! # Session Flows
//!
//! End-to-end attempt sessions driven through `SessionHandle` against a
//! simulated browser that echoes fullscreen changes back as events.
//!
//! ## Flows Tested:
//!
//! 1. **Strikes**: three fullscreen exits force exactly one finalize
//! 2. **Back-navigation**: confirm finalizes without a strike, decline resumes
//!    whichever order the dialog's fullscreen exit and the answer arrive in
//! 3. **Deadline**: the contest window closing locks run/submit locally
//! 4. **Finalize failure**: the view still leaves, teardown still beacons
//! 5. **Run/submit**: best-run persistence and local rejection

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use contest_session::{
        EditorSurfaceApi, FinalizeOutcome, GatewayCall, LockReason, LockState, MockGateway,
        SessionError, SessionEvent, SessionPhase,
    };

    use crate::harness::{launch, wait_until, SimulatedBrowser};

    async fn enter_fullscreen(h: &crate::harness::Harness) -> anyhow::Result<()> {
        h.handle.on_request_fullscreen().await?;
        wait_until(&h.handle, |s| s.phase == SessionPhase::Active).await;
        Ok(())
    }

    // =========================================================================
    // STRIKES
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_three_exits_finalize_once() -> anyhow::Result<()> {
        let h = launch(MockGateway::default(), SimulatedBrowser::default());
        wait_until(&h.handle, |s| s.phase == SessionPhase::AwaitingFullscreen).await;
        enter_fullscreen(&h).await?;

        for strike in 1..=2u8 {
            h.handle.dispatch(SessionEvent::FullscreenExited).await?;
            wait_until(&h.handle, |s| s.phase == SessionPhase::Warning(strike)).await;
            enter_fullscreen(&h).await?;
        }
        h.handle.dispatch(SessionEvent::FullscreenExited).await?;
        let snap = wait_until(&h.handle, |s| s.phase == SessionPhase::Locked).await;

        // Our own fullscreen exit during finalize must not count.
        h.handle.dispatch(SessionEvent::FullscreenExited).await?;
        let _ = h.handle.on_request_fullscreen().await;

        assert_eq!(snap.violations, 3);
        assert_eq!(h.handle.violations(), 3);
        assert_eq!(h.gateway.finalize_calls(), 1);
        assert_eq!(h.browser.navigations(), 1);
        assert_eq!(h.browser.prompts(), vec![(0, 3), (1, 2), (2, 1)]);
        assert_eq!(h.handle.lock_state(), LockState::Locked);
        Ok(())
    }

    // =========================================================================
    // BACK-NAVIGATION
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_back_confirmed_finalizes_without_strike() -> anyhow::Result<()> {
        let h = launch(MockGateway::default(), SimulatedBrowser::answering_leave(true));
        enter_fullscreen(&h).await?;

        h.handle.on_back_pressed().await?;
        let snap = wait_until(&h.handle, |s| s.phase == SessionPhase::Locked).await;

        assert_eq!(snap.violations, 0);
        assert!(snap.finalized);
        assert_eq!(h.gateway.finalize_calls(), 1);
        assert_eq!(h.browser.navigations(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_declined_resumes_without_strike() -> anyhow::Result<()> {
        let h = launch(MockGateway::default(), SimulatedBrowser::answering_leave(false));
        enter_fullscreen(&h).await?;

        h.handle.on_back_pressed().await?;
        // The leave dialog's fullscreen exit and the answer are queued ahead
        // of this command.
        enter_fullscreen(&h).await?;

        assert_eq!(h.handle.violations(), 0);
        assert_eq!(h.gateway.finalize_calls(), 0);
        assert_eq!(h.browser.history_guards(), 2);
        assert_eq!(h.handle.lock_state(), LockState::Active);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_dialog_exit_reported_after_decline_is_not_a_strike() -> anyhow::Result<()> {
        let h = launch(
            MockGateway::default(),
            SimulatedBrowser::answering_leave(false).exiting_after_answer(),
        );
        enter_fullscreen(&h).await?;

        h.handle.on_back_pressed().await?;
        enter_fullscreen(&h).await?;
        assert_eq!(h.handle.violations(), 0);

        // Later exits count as usual.
        h.handle.dispatch(SessionEvent::FullscreenExited).await?;
        let snap = wait_until(&h.handle, |s| s.phase == SessionPhase::Warning(1)).await;

        assert_eq!(snap.violations, 1);
        assert_eq!(h.gateway.finalize_calls(), 0);
        assert_eq!(h.browser.prompts(), vec![(0, 3), (0, 3), (1, 2)]);
        Ok(())
    }

    // =========================================================================
    // DEADLINE
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_deadline_locks_without_network() -> anyhow::Result<()> {
        let h = launch(MockGateway::default(), SimulatedBrowser::default());
        enter_fullscreen(&h).await?;

        h.clock.advance(ChronoDuration::minutes(31));
        let snap = wait_until(&h.handle, |s| s.timed_out).await;

        assert_eq!(snap.phase, SessionPhase::Locked);
        assert_eq!(snap.violations, 0);
        assert_eq!(h.browser.locked(), vec![LockReason::TimedOut]);

        let err = h
            .handle
            .on_run("print(3)".into(), "python".into())
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::SessionLocked);
        assert_eq!(h.gateway.submission_calls(), 0);
        assert_eq!(h.gateway.finalize_calls(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_contest_opens_locked() -> anyhow::Result<()> {
        let start = contest_session::mock_window_start() - ChronoDuration::hours(3);
        let h = launch(
            MockGateway::default().with_window(start, start + ChronoDuration::hours(1)),
            SimulatedBrowser::default(),
        );

        let snap = wait_until(&h.handle, |s| s.phase == SessionPhase::Locked).await;

        assert!(snap.timed_out);
        assert!(h.browser.prompts().is_empty());
        assert_eq!(h.browser.navigations(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalized_contest_navigates_on_open() -> anyhow::Result<()> {
        let h = launch(MockGateway::default().finalized(), SimulatedBrowser::default());

        let snap = wait_until(&h.handle, |s| s.phase == SessionPhase::Locked).await;

        assert!(snap.finalized);
        assert_eq!(h.browser.navigations(), 1);
        assert_eq!(h.gateway.finalize_calls(), 0);
        Ok(())
    }

    // =========================================================================
    // FINALIZE FAILURE
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_failed_finalize_still_leaves_and_beacons() -> anyhow::Result<()> {
        let h = launch(MockGateway::default().failing_finalize(), SimulatedBrowser::default());
        enter_fullscreen(&h).await?;

        let outcome = h.handle.on_finish().await?;
        assert!(matches!(outcome, FinalizeOutcome::Failed(_)));
        assert_eq!(h.handle.lock_state(), LockState::Locked);
        assert_eq!(h.browser.navigations(), 1);

        h.handle.teardown().await?;
        h.task.await??;

        assert_eq!(h.gateway.finalize_calls(), 1);
        assert_eq!(h.gateway.beacon_calls(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_is_at_most_once() -> anyhow::Result<()> {
        let h = launch(MockGateway::default(), SimulatedBrowser::default());
        enter_fullscreen(&h).await?;

        let first = h.handle.on_finish().await?;
        let second = h.handle.on_finish().await?;

        assert_eq!(first, FinalizeOutcome::Acknowledged);
        assert_eq!(second, FinalizeOutcome::Skipped);
        assert_eq!(h.gateway.finalize_calls(), 1);

        h.handle.teardown().await?;
        h.task.await??;
        assert_eq!(h.gateway.beacon_calls(), 0);
        Ok(())
    }

    // =========================================================================
    // RUN / SUBMIT
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_run_persists_once_then_submit() -> anyhow::Result<()> {
        let h = launch(MockGateway::default(), SimulatedBrowser::default());
        enter_fullscreen(&h).await?;

        let first = h.handle.on_run("print(3)".into(), "python".into()).await?;
        let second = h.handle.on_run("print(3)".into(), "python".into()).await?;
        let verdict = h.handle.on_submit("print(3)".into(), "python".into()).await?;

        assert!(first.persisted);
        assert!(!second.persisted);
        assert_eq!(verdict.marks_awarded, verdict.max_marks);

        let submissions: Vec<_> = h
            .gateway
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GatewayCall::Run { .. } | GatewayCall::Submit))
            .collect();
        assert_eq!(
            submissions,
            vec![
                GatewayCall::Run { save_run: true },
                GatewayCall::Run { save_run: false },
                GatewayCall::Submit,
            ]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbalanced_submit_rejected_locally() -> anyhow::Result<()> {
        let h = launch(MockGateway::default(), SimulatedBrowser::default());
        enter_fullscreen(&h).await?;

        let err = h
            .handle
            .on_submit("def f(:\n  pass".into(), "python".into())
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::UnbalancedSource(_)));
        assert_eq!(h.gateway.submission_calls(), 0);
        assert_eq!(h.handle.lock_state(), LockState::Active);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_failure_is_retryable() -> anyhow::Result<()> {
        let h = launch(MockGateway::default().failing_submissions(), SimulatedBrowser::default());
        enter_fullscreen(&h).await?;

        let err = h
            .handle
            .on_submit("print(3)".into(), "python".into())
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        h.gateway.recover_submissions();
        let verdict = h.handle.on_submit("print(3)".into(), "python".into()).await?;
        assert!(verdict.marks_awarded > 0.0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_closed_during_submit_locks_quietly() -> anyhow::Result<()> {
        let h = launch(MockGateway::default().closed_submissions(), SimulatedBrowser::default());
        enter_fullscreen(&h).await?;

        let err = h
            .handle
            .on_submit("print(3)".into(), "python".into())
            .await
            .unwrap_err();

        assert!(err.is_quiet());
        assert_eq!(h.handle.lock_state(), LockState::Locked);
        assert_eq!(h.browser.locked(), vec![LockReason::Finalized]);
        assert_eq!(h.browser.navigations(), 0);
        Ok(())
    }
}
