// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Thread Messages
//!
//! Domain interface to the external mail service that stores agent messages.
//! The core treats a thread's history as an already-ordered list of
//! [`ThreadMessage`]s; ordering, delivery and acknowledgements belong to the
//! service.
//!
//! Implementations live in `infrastructure/` (`HttpMailClient`,
//! `FileMessageSource`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One message as returned by the mail service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: i64,
    /// Sending agent name.
    pub sender: String,
    /// Server-assigned creation time.
    pub created_ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Thread not found: {0}")]
    ThreadNotFound(String),

    #[error("Mail service error: {0}")]
    Service(String),

    #[error("IO error reading {path}: {error}")]
    Io { path: String, error: String },

    #[error("Invalid message data: {0}")]
    InvalidData(String),
}

/// Read side of the mail service.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// All messages of `thread_id`, in the service's storage order.
    async fn fetch_thread(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, MailError>;
}

/// Write side of the mail service, used to republish compiled artifacts.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Post a message to `thread_id` and return the id the service assigned.
    async fn publish(&self, thread_id: &str, subject: &str, body: &str) -> Result<i64, MailError>;
}
