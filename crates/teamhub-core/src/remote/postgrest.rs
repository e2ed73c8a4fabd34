//! Supabase-style REST client (PostgREST) with realtime change feeds.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{realtime, RemoteError, RemoteResult, RemoteStore, RemoteTable, Subscription};
use crate::config::RemoteConfig;
use crate::util::compact_text;

/// [`RemoteStore`] backed by a hosted PostgREST endpoint.
#[derive(Clone)]
pub struct PostgrestRemote {
    rest_url: String,
    realtime_url: String,
    anon_key: String,
    client: Client,
}

impl PostgrestRemote {
    /// Build a client from a configured endpoint.
    pub fn new(config: &RemoteConfig, timeout: Duration) -> RemoteResult<Self> {
        let config = config
            .clone()
            .normalized()
            .map_err(|_| RemoteError::NotConfigured)?;
        let (Some(rest_url), Some(realtime_url), Some(anon_key)) = (
            config.rest_url(),
            config.realtime_url(),
            config.anon_key.clone(),
        ) else {
            return Err(RemoteError::NotConfigured);
        };

        Ok(Self {
            rest_url,
            realtime_url,
            anon_key,
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn table_url(&self, table: RemoteTable) -> String {
        format!("{}/{}", self.rest_url, table.as_str())
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<Response> {
        let response = self.public_request(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Api {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        })
    }
}

#[async_trait]
impl RemoteStore for PostgrestRemote {
    fn is_configured(&self) -> bool {
        true
    }

    async fn insert(&self, table: RemoteTable, row: Value) -> RemoteResult<Value> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let rows = self.send(request).await?.json::<Vec<Value>>().await?;

        tracing::debug!("Inserted row into {table}");
        rows.into_iter().next().ok_or_else(|| {
            RemoteError::InvalidPayload(format!("insert into {table} returned no row"))
        })
    }

    async fn update(&self, table: RemoteTable, id: &str, patch: Value) -> RemoteResult<()> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .json(&patch);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, table: RemoteTable, id: &str) -> RemoteResult<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))]);
        self.send(request).await?;
        Ok(())
    }

    async fn select_all(&self, table: RemoteTable) -> RemoteResult<Vec<Value>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&[("select", "*"), ("order", "created_at.asc")]);
        let rows = self.send(request).await?.json::<Vec<Value>>().await?;
        tracing::debug!("Fetched {} rows from {table}", rows.len());
        Ok(rows)
    }

    async fn subscribe_changes(&self, table: RemoteTable) -> RemoteResult<Subscription> {
        realtime::subscribe(&self.realtime_url, table).await
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorResponse {
    message: Option<String>,
    details: Option<String>,
    hint: Option<String>,
    error: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<PostgrestErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            let detail = payload.details.or(payload.hint);
            return match detail {
                Some(detail) => format!("{}: {}", message.trim(), compact_text(&detail)),
                None => message.trim().to_string(),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}
