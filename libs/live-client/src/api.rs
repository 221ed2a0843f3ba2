//! Thin HTTP client for the live API.

use std::time::Duration;

use bazaar_common::wire::{MarkReadRequest, NotificationsResponse, PresenceSnapshot, UnreadCounts};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use crate::error::ClientError;

#[derive(Clone)]
pub struct LiveApi {
    http: reqwest::Client,
    base_url: String,
    token: String,
    request_timeout: Duration,
}

/// Poll results are decoded entry by entry so one bad frame does not lose the
/// rest.
#[derive(Deserialize)]
struct RawPollResponse {
    events: Vec<serde_json::Value>,
}

impl LiveApi {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            request_timeout,
        }
    }

    /// Request for the event stream. It carries no timeout, since the body
    /// stays open for the life of the connection.
    pub fn stream_request(&self) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}/api/v1/stream", self.base_url))
            .query(&[("token", self.token.as_str())])
    }

    pub async fn poll(&self, since: Option<DateTime<Utc>>) -> Result<Vec<serde_json::Value>, ClientError> {
        let mut req = self
            .http
            .get(format!("{}/api/v1/poll", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.request_timeout);
        if let Some(since) = since {
            req = req.query(&[("since", since.to_rfc3339_opts(SecondsFormat::Nanos, true))]);
        }
        let res = check(req.send().await?, "/api/v1/poll")?;
        Ok(res.json::<RawPollResponse>().await?.events)
    }

    pub async fn unread_counts(&self) -> Result<UnreadCounts, ClientError> {
        let res = self
            .http
            .get(format!("{}/api/v1/unread-counts", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(check(res, "/api/v1/unread-counts")?.json().await?)
    }

    pub async fn presence(&self) -> Result<PresenceSnapshot, ClientError> {
        let res = self
            .http
            .get(format!("{}/api/v1/presence", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(check(res, "/api/v1/presence")?.json().await?)
    }

    pub async fn recent_notifications(&self, limit: usize) -> Result<NotificationsResponse, ClientError> {
        let res = self
            .http
            .get(format!("{}/api/v1/notifications", self.base_url))
            .query(&[("limit", limit)])
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(check(res, "/api/v1/notifications")?.json().await?)
    }

    pub async fn report_activity(&self) -> Result<(), ClientError> {
        let res = self
            .http
            .post(format!("{}/api/v1/activity", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .send()
            .await?;
        check(res, "/api/v1/activity").map(|_| ())
    }

    pub async fn mark_read(&self, chat_scope_id: Option<String>) -> Result<(), ClientError> {
        let res = self
            .http
            .put(format!("{}/api/v1/notifications/read", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.request_timeout)
            .json(&MarkReadRequest { chat_scope_id })
            .send()
            .await?;
        check(res, "/api/v1/notifications/read").map(|_| ())
    }
}

fn check(res: reqwest::Response, path: &'static str) -> Result<reqwest::Response, ClientError> {
    if res.status().is_success() {
        Ok(res)
    } else {
        Err(ClientError::Status {
            status: res.status(),
            path,
        })
    }
}
