// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for talking to `relayd`.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not reach relayd at {addr}: {source}")]
    Connect { addr: String, source: reqwest::Error },
    #[error("relayd rejected the request ({status}): {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("failed to decode relayd response: {0}")]
    Decode(#[from] reqwest::Error),
}

pub struct DaemonClient {
    http: reqwest::Client,
    addr: String,
    api_key: Option<String>,
}

impl DaemonClient {
    pub fn new(addr: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            addr,
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.addr.trim_end_matches('/'))
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    pub async fn healthz(&self) -> Result<String, ClientError> {
        let resp = self
            .http
            .get(self.url("/healthz"))
            .send()
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        Ok(resp.text().await?)
    }

    pub async fn post_json<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, ClientError> {
        let resp = self
            .authed(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        Self::decode(resp).await
    }

    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, ClientError> {
        let resp = self
            .authed(self.http.get(self.url(path)))
            .send()
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        Self::decode(resp).await
    }

    async fn decode<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Rejected { status, body });
        }
        Ok(resp.json().await?)
    }
}
