// crates/client/src/http.rs
//! reqwest-backed implementation of [`JobService`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::credentials::CredentialProvider;
use crate::error::ClientError;
use crate::service::{
    ActiveJobSummary, JobService, RealtimeResponse, StartJobResponse, StartPayload, StatusResponse,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the answer-generation job backend.
///
/// Every call checks for a stored credential first and attaches it as a
/// bearer token; a missing credential raises [`ClientError::NotAuthenticated`]
/// without touching the network.
pub struct HttpJobService {
    base_url: String,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpJobService {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the bearer credential, or fail before the call is made.
    fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        match self.credentials.token() {
            Some(token) => Ok(req.bearer_auth(token)),
            None => Err(ClientError::NotAuthenticated),
        }
    }

    /// Map a non-success response to the error taxonomy, consuming the
    /// body as the message.
    async fn check(resp: Response) -> Result<Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(ClientError::from_status(status.as_u16(), message))
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
        let body = resp.text().await.map_err(ClientError::from)?;
        serde_json::from_str(&body).map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn start_job(&self, payload: &StartPayload) -> Result<StartJobResponse, ClientError> {
        let path = if payload.is_batch() {
            "/api/answers/jobs/batch"
        } else {
            "/api/answers/jobs"
        };
        debug!(endpoint = path, "starting job");
        let req = self.authed(self.http.post(self.url(path)))?.json(payload);
        let resp = Self::check(req.send().await?).await?;
        Self::parse_json(resp).await
    }

    async fn poll_status(
        &self,
        job_id: &str,
        shard_key: Option<&str>,
    ) -> Result<StatusResponse, ClientError> {
        let mut req = self
            .http
            .get(self.url(&format!("/api/answers/jobs/{job_id}/status")));
        if let Some(shard) = shard_key {
            req = req.query(&[("shardKey", shard)]);
        }
        let resp = Self::check(self.authed(req)?.send().await?).await?;
        Self::parse_json(resp).await
    }

    async fn poll_realtime(
        &self,
        job_id: &str,
        since: Option<i64>,
        shard_key: &str,
    ) -> Result<RealtimeResponse, ClientError> {
        let mut req = self
            .http
            .get(self.url(&format!("/api/answers/jobs/{job_id}/realtime")))
            .query(&[("shardKey", shard_key)]);
        if let Some(watermark) = since {
            req = req.query(&[("since", watermark.to_string())]);
        }
        let resp = Self::check(self.authed(req)?.send().await?).await?;
        let parsed: RealtimeResponse = Self::parse_json(resp).await?;
        if !parsed.enhanced_available {
            return Err(ClientError::EnhancedUnavailable);
        }
        Ok(parsed)
    }

    async fn cancel(&self, job_id: &str, shard_key: Option<&str>) -> Result<(), ClientError> {
        let mut req = self
            .http
            .post(self.url(&format!("/api/answers/jobs/{job_id}/cancel")));
        if let Some(shard) = shard_key {
            req = req.query(&[("shardKey", shard)]);
        }
        let resp = self.authed(req)?.send().await?;
        // 404 on cancel means the job is already gone server-side; callers
        // treat that the same as a successful cancel.
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(resp).await?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<ActiveJobSummary>, ClientError> {
        let req = self.authed(self.http.get(self.url("/api/answers/jobs/active")))?;
        let resp = Self::check(req.send().await?).await?;
        Self::parse_json(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use mockito::Matcher;
    use serde_json::json;

    fn service(url: &str) -> HttpJobService {
        HttpJobService::new(url, Arc::new(StaticCredentials::new("test-token")))
    }

    #[tokio::test]
    async fn start_batch_hits_batch_endpoint_with_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/answers/jobs/batch")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_body(
                json!({
                    "jobId": "master_b1",
                    "shardKey": "tenant-3",
                    "subJobCount": 3,
                    "status": "QUEUED"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let svc = service(&server.url());
        let payload = StartPayload::Batch {
            item_ids: vec!["a".into(), "b".into(), "c".into()],
            stage_id: None,
            group_id: None,
        };
        let resp = svc.start_job(&payload).await.unwrap();
        assert_eq!(resp.job_id.as_deref(), Some("master_b1"));
        assert_eq!(resp.shard_key.as_deref(), Some("tenant-3"));
        assert_eq!(resp.sub_job_count, Some(3));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn start_without_credential_never_calls_network() {
        let server = mockito::Server::new_async().await;
        let svc = HttpJobService::new(server.url(), Arc::new(StaticCredentials::signed_out()));
        let payload = StartPayload::Single {
            item_id: "q".into(),
            input: serde_json::Value::Null,
        };
        assert!(matches!(
            svc.start_job(&payload).await,
            Err(ClientError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn poll_status_forwards_shard_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/answers/jobs/j1/status")
            .match_query(Matcher::UrlEncoded("shardKey".into(), "t-1".into()))
            .with_status(200)
            .with_body(json!({"status": "RUNNING", "progress": 40}).to_string())
            .create_async()
            .await;

        let resp = service(&server.url())
            .poll_status("j1", Some("t-1"))
            .await
            .unwrap();
        assert_eq!(resp.status, "RUNNING");
        assert_eq!(resp.progress, Some(40));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn poll_status_401_maps_to_auth_expired() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/answers/jobs/j1/status")
            .with_status(401)
            .create_async()
            .await;

        assert!(matches!(
            service(&server.url()).poll_status("j1", None).await,
            Err(ClientError::AuthExpired)
        ));
    }

    #[tokio::test]
    async fn poll_status_500_maps_to_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/answers/jobs/j1/status")
            .with_status(500)
            .with_body("pipeline config missing")
            .create_async()
            .await;

        match service(&server.url()).poll_status("j1", None).await {
            Err(ClientError::Server { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "pipeline config missing");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn realtime_watermark_and_completions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/answers/jobs/master_b1/realtime")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("shardKey".into(), "t-1".into()),
                Matcher::UrlEncoded("since".into(), "1700000000000".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "status": "RUNNING",
                    "progress": 40,
                    "enhancedAvailable": true,
                    "recentCompletions": [{"itemId": "item-2", "docItemId": "di-2"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let resp = service(&server.url())
            .poll_realtime("master_b1", Some(1_700_000_000_000), "t-1")
            .await
            .unwrap();
        assert_eq!(resp.recent_completions.len(), 1);
        assert_eq!(resp.recent_completions[0].item_id, "item-2");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn realtime_unavailable_is_hard_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/answers/jobs/master_b1/realtime")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"status": "RUNNING", "enhancedAvailable": false}).to_string())
            .create_async()
            .await;

        assert!(matches!(
            service(&server.url())
                .poll_realtime("master_b1", None, "t-1")
                .await,
            Err(ClientError::EnhancedUnavailable)
        ));
    }

    #[tokio::test]
    async fn cancel_tolerates_missing_job() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/answers/jobs/gone/cancel")
            .with_status(404)
            .create_async()
            .await;

        service(&server.url()).cancel("gone", None).await.unwrap();
    }

    #[tokio::test]
    async fn list_active_parses_summaries() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/answers/jobs/active")
            .with_status(200)
            .with_body(
                json!([{
                    "jobId": "master_r1",
                    "status": "RUNNING",
                    "progress": 10,
                    "shardKey": "t-9",
                    "subJobCount": 5,
                    "createdAt": 1_700_000_000_000_i64
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let jobs = service(&server.url()).list_active().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "master_r1");
        assert_eq!(jobs[0].shard_key.as_deref(), Some("t-9"));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/answers/jobs/j1/status")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        assert!(matches!(
            service(&server.url()).poll_status("j1", None).await,
            Err(ClientError::Malformed(_))
        ));
    }
}
