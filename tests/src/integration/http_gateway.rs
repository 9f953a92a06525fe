//! # HTTP Gateway Wiring
//!
//! The reqwest adapter plugged into a live session. No contest API is
//! reachable here, so these flows cover the failure paths: open fails with a
//! retryable network error and the runtime ends cleanly.

#[cfg(test)]
mod tests {
    use contest_gateway_http::{GatewayConfig, HttpContestGateway};
    use contest_session::{ContestGateway, EditorSurfaceApi, LockState, SessionError};
    use contest_types::ContestId;

    use crate::harness::{launch, SimulatedBrowser};

    fn unreachable_gateway() -> anyhow::Result<HttpContestGateway> {
        let config = GatewayConfig::new("http://127.0.0.1:9").with_token("test-token");
        Ok(HttpContestGateway::new(&config)?)
    }

    #[tokio::test]
    async fn test_session_open_fails_with_network_error() -> anyhow::Result<()> {
        let h = launch(unreachable_gateway()?, SimulatedBrowser::default());

        let result = h.task.await?;

        assert!(matches!(result, Err(SessionError::NetworkFailure(_))));
        assert_eq!(h.handle.lock_state(), LockState::Locked);
        assert_eq!(
            h.handle.on_finish().await.unwrap_err(),
            SessionError::SessionClosed
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_beacon_returns_immediately() -> anyhow::Result<()> {
        let gateway = unreachable_gateway()?;
        gateway.finalize_best_effort(&ContestId::new("c1"));
        Ok(())
    }
}
