//! User administration and attendance history over the service's REST API.

use attend_core::attendance::{AttendanceEvent, UserRecord};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("invalid service url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Status {
        status: StatusCode,
        message: Option<String>,
    },
    #[error("{0}")]
    Rejected(String),
}

/// `{status, message}` reply of the mutating endpoints.
#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl StatusReply {
    fn into_result(self) -> Result<(), AdminError> {
        if self.status == "success" {
            Ok(())
        } else {
            Err(AdminError::Rejected(self.message.unwrap_or(self.status)))
        }
    }
}

pub struct AdminClient {
    client: reqwest::Client,
    base_url: Url,
}

impl AdminClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AdminError> {
        let base_url =
            Url::parse(base_url).map_err(|e| AdminError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(AdminError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// `GET /getall`
    pub async fn list_users(&self) -> Result<Vec<UserRecord>, AdminError> {
        let resp = self.client.get(self.url(&["getall"])?).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// `DELETE /delete-user/{name}`
    pub async fn delete_user(&self, name: &str) -> Result<(), AdminError> {
        tracing::info!(name, "deleting user");
        let resp = self
            .client
            .delete(self.url(&["delete-user", name])?)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        resp.json::<StatusReply>().await?.into_result()
    }

    /// `PUT /update-user/{name}`. `name` is the user's current name; the
    /// record may carry a new one.
    pub async fn update_user(&self, name: &str, record: &UserRecord) -> Result<(), AdminError> {
        tracing::info!(name, new_name = %record.name, "updating user");
        let resp = self
            .client
            .put(self.url(&["update-user", name])?)
            .json(record)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        resp.json::<StatusReply>().await?.into_result()
    }

    /// `GET /attendance/{username}`
    pub async fn attendance(&self, username: &str) -> Result<Vec<AttendanceEvent>, AdminError> {
        let resp = self
            .client
            .get(self.url(&["attendance", username])?)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Append percent-encoded path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url, AdminError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AdminError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, AdminError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string));
    Err(AdminError::Status { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> AdminClient {
        AdminClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_encodes_segments() {
        let admin = client("http://localhost:8000");
        let url = admin.url(&["delete-user", "Asha K/1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/delete-user/Asha%20K%2F1");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let admin = client("http://localhost:8000/api/");
        let url = admin.url(&["getall"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/getall");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            AdminClient::new("not a url", Duration::from_secs(1)),
            Err(AdminError::InvalidUrl(_))
        ));
        assert!(matches!(
            AdminClient::new("mailto:admin@example.com", Duration::from_secs(1)),
            Err(AdminError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_status_reply() {
        let ok: StatusReply = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(ok.into_result().is_ok());

        let err: StatusReply =
            serde_json::from_str(r#"{"status":"error","message":"User not found"}"#).unwrap();
        match err.into_result() {
            Err(AdminError::Rejected(msg)) => assert_eq!(msg, "User not found"),
            other => panic!("unexpected: {other:?}"),
        }

        let bare: StatusReply = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert!(matches!(bare.into_result(), Err(AdminError::Rejected(m)) if m == "error"));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let admin = client("http://127.0.0.1:1");
        assert!(matches!(admin.list_users().await, Err(AdminError::Http(_))));
    }
}
