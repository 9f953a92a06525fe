//! # Telemetry
//!
//! Session activity shows up in the Prometheus export.

#[cfg(test)]
mod tests {
    use contest_session::{EditorSurfaceApi, MockGateway, SessionEvent, SessionPhase};
    use contest_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};

    use crate::harness::{launch, wait_until, SimulatedBrowser};

    #[tokio::test(start_paused = true)]
    async fn test_session_metrics_exported() -> anyhow::Result<()> {
        let config = TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::default()
        };
        // Another test may already own the global subscriber.
        let _guard = init_telemetry(&config).ok();
        contest_telemetry::register_metrics()?;

        let h = launch(MockGateway::default(), SimulatedBrowser::default());
        h.handle.on_request_fullscreen().await?;
        wait_until(&h.handle, |s| s.phase == SessionPhase::Active).await;
        h.handle.dispatch(SessionEvent::FullscreenExited).await?;
        let _ = h.handle.on_submit(String::new(), "python".into()).await;
        h.handle.on_finish().await?;

        let text = encode_metrics()?;
        assert!(text.contains("contest_integrity_violations_total"));
        assert!(text.contains("contest_finalize_dispatches_total"));
        assert!(text.contains("contest_submissions_rejected_total"));
        Ok(())
    }
}
