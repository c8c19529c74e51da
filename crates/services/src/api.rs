use std::sync::Arc;

use chrono::{DateTime, Utc};
use retiscan_connection::TokenSource;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No auth token available")]
    MissingToken,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Server-side notification representation, as returned by the REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNotification {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<ApiNotification>,
    pub pagination: Pagination,
    pub unread_count: u64,
}

/// REST collaborator for notification CRUD. The server-paginated view it
/// returns is the authoritative history; the live socket-fed store is a
/// session-local cache and never reads or writes through this client.
pub struct NotificationApi {
    client: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl NotificationApi {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    fn token(&self) -> ApiResult<String> {
        self.token_source.token().ok_or(ApiError::MissingToken)
    }

    pub async fn list(&self, page: u32, limit: u32) -> ApiResult<NotificationPage> {
        let page = self
            .client
            .get(format!("{}/notifications", self.base_url))
            .bearer_auth(self.token()?)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json::<NotificationPage>()
            .await?;
        Ok(page)
    }

    pub async fn mark_read(&self, id: &str) -> ApiResult<()> {
        self.client
            .patch(format!("{}/notifications/{}/read", self.base_url, id))
            .bearer_auth(self.token()?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn mark_all_read(&self) -> ApiResult<()> {
        self.client
            .patch(format!("{}/notifications/read-all", self.base_url))
            .bearer_auth(self.token()?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        self.client
            .delete(format!("{}/notifications/{}", self.base_url, id))
            .bearer_auth(self.token()?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn clear_all(&self) -> ApiResult<()> {
        self.client
            .delete(format!("{}/notifications", self.base_url))
            .bearer_auth(self.token()?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
