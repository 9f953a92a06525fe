//! Contest API client.

use async_trait::async_trait;
use contest_session::{ContestGateway, GatewayError};
use contest_types::{
    ContestId, ContestMetadata, QuestionId, QuestionMetadata, RunRequest, RunVerdict,
    SubmitRequest, SubmitVerdict,
};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::ClientError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Contest gateway over HTTP.
#[derive(Clone, Debug)]
pub struct HttpContestGateway {
    client: Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpContestGateway {
    /// Create a new client.
    pub fn new(config: &GatewayConfig) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Config(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "{} cannot be a base URL",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn contest_url(&self, contest_id: &ContestId) -> Result<Url, ClientError> {
        self.endpoint(&["api", "contests", contest_id.as_str()])
    }

    fn question_url(
        &self,
        contest_id: &ContestId,
        question_id: &QuestionId,
        action: Option<&str>,
    ) -> Result<Url, ClientError> {
        let mut segments = vec![
            "api",
            "contests",
            contest_id.as_str(),
            "questions",
            question_id.as_str(),
        ];
        segments.extend(action);
        self.endpoint(&segments)
    }

    fn finalize_url(&self, contest_id: &ContestId) -> Result<Url, ClientError> {
        self.endpoint(&["api", "contests", contest_id.as_str(), "finalize"])
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and fail on any non-2xx status.
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = self.authorize(builder).send().await.map_err(|e| {
            if e.is_connect() {
                ClientError::Connection(format!("Cannot connect to {}", self.base_url))
            } else {
                ClientError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), %message, "Contest API returned an error status");
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch_json<R: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<R, ClientError> {
        self.execute(builder)
            .await?
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ContestGateway for HttpContestGateway {
    async fn fetch_contest(&self, contest_id: &ContestId) -> Result<ContestMetadata, GatewayError> {
        let url = self.contest_url(contest_id)?;
        Ok(self.fetch_json(self.client.get(url)).await?)
    }

    async fn fetch_question(
        &self,
        contest_id: &ContestId,
        question_id: &QuestionId,
    ) -> Result<QuestionMetadata, GatewayError> {
        let url = self.question_url(contest_id, question_id, None)?;
        Ok(self.fetch_json(self.client.get(url)).await?)
    }

    async fn finalize(&self, contest_id: &ContestId) -> Result<(), GatewayError> {
        let url = self.finalize_url(contest_id)?;
        self.execute(self.client.post(url)).await?;
        Ok(())
    }

    async fn run(&self, request: RunRequest) -> Result<RunVerdict, GatewayError> {
        let url = self.question_url(&request.contest_id, &request.question_id, Some("run"))?;
        Ok(self.fetch_json(self.client.post(url).json(&request)).await?)
    }

    async fn submit(&self, request: SubmitRequest) -> Result<SubmitVerdict, GatewayError> {
        let url = self.question_url(&request.contest_id, &request.question_id, Some("submit"))?;
        Ok(self.fetch_json(self.client.post(url).json(&request)).await?)
    }

    fn finalize_best_effort(&self, contest_id: &ContestId) {
        let url = match self.finalize_url(contest_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Cannot build finalize URL for teardown beacon");
                return;
            }
        };
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(contest_id = %contest_id, "No async runtime, teardown finalize dropped");
                return;
            }
        };

        let request = self.authorize(self.client.post(url));
        let contest_id = contest_id.clone();
        runtime.spawn(async move {
            if let Err(e) = request.send().await {
                debug!(contest_id = %contest_id, error = %e, "Teardown finalize beacon failed");
            }
        });
    }
}
