// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Mail Service HTTP Adapter
//
// Anti-Corruption Layer for the agent mail service REST API.
// Messages are read from and published to
// `{endpoint}/api/v1/projects/{project}/threads/{thread}/messages`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::config::MailConfig;
use crate::domain::message::{MailError, MessagePublisher, MessageSource, ThreadMessage};

pub struct HttpMailClient {
    client: reqwest::Client,
    endpoint: Url,
    project: String,
    sender: String,
    api_token: Option<String>,
}

/// Message shape as the service returns it.
#[derive(Deserialize)]
struct MailMessage {
    id: i64,
    #[serde(alias = "from")]
    sender: String,
    #[serde(alias = "created_at")]
    created_ts: DateTime<Utc>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(alias = "body_md")]
    body: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessagesResponse {
    List(Vec<MailMessage>),
    Wrapped { messages: Vec<MailMessage> },
}

#[derive(Serialize)]
struct PublishRequest<'a> {
    sender: &'a str,
    subject: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct PublishResponse {
    id: i64,
}

impl From<MailMessage> for ThreadMessage {
    fn from(m: MailMessage) -> Self {
        ThreadMessage {
            id: m.id,
            sender: m.sender,
            created_ts: m.created_ts,
            subject: m.subject,
            thread_id: m.thread_id,
            body: m.body,
        }
    }
}

impl HttpMailClient {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| MailError::InvalidData(format!("invalid endpoint '{}': {}", config.endpoint, e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| MailError::Network(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            project: config.project.clone(),
            sender: config.sender.clone(),
            api_token: config.resolved_token(),
        })
    }

    fn messages_url(&self, thread_id: &str) -> Result<Url, MailError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| MailError::InvalidData(format!("endpoint '{}' cannot be a base URL", self.endpoint)))?
            .pop_if_empty()
            .extend(["api", "v1", "projects", self.project.as_str(), "threads", thread_id, "messages"]);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn check(response: reqwest::Response, thread_id: &str) -> Result<reqwest::Response, MailError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => MailError::Authentication(error_text),
            StatusCode::NOT_FOUND => MailError::ThreadNotFound(thread_id.to_string()),
            _ => MailError::Service(format!("HTTP {}: {}", status, error_text)),
        })
    }
}

#[async_trait]
impl MessageSource for HttpMailClient {
    async fn fetch_thread(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, MailError> {
        let url = self.messages_url(thread_id)?;
        tracing::debug!(%url, "Fetching thread messages");

        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| MailError::Network(e.to_string()))?;
        let response = Self::check(response, thread_id).await?;

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| MailError::InvalidData(e.to_string()))?;
        let messages = match body {
            MessagesResponse::List(messages) | MessagesResponse::Wrapped { messages } => messages,
        };
        Ok(messages.into_iter().map(ThreadMessage::from).collect())
    }
}

#[async_trait]
impl MessagePublisher for HttpMailClient {
    async fn publish(&self, thread_id: &str, subject: &str, body: &str) -> Result<i64, MailError> {
        let url = self.messages_url(thread_id)?;
        let request = PublishRequest {
            sender: &self.sender,
            subject,
            body,
        };

        let response = self
            .authorize(self.client.post(url).json(&request))
            .send()
            .await
            .map_err(|e| MailError::Network(e.to_string()))?;
        let response = Self::check(response, thread_id).await?;

        let created: PublishResponse = response
            .json()
            .await
            .map_err(|e| MailError::InvalidData(e.to_string()))?;
        Ok(created.id)
    }
}
