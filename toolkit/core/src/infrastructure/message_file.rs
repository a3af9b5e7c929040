// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// File-backed Message Source
//
// Reads a thread history from a JSON file holding an array of messages, as
// exported from the mail service. Used for offline compiles and tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::domain::message::{MailError, MessageSource, ThreadMessage};

pub struct FileMessageSource {
    path: PathBuf,
}

impl FileMessageSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MessageSource for FileMessageSource {
    /// Messages whose `thread_id` is absent are assumed to belong to the
    /// requested thread.
    async fn fetch_thread(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, MailError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| MailError::Io {
                path: self.path.display().to_string(),
                error: e.to_string(),
            })?;

        let messages: Vec<ThreadMessage> = serde_json::from_str(&content)
            .map_err(|e| MailError::InvalidData(format!("{}: {}", self.path.display(), e)))?;

        let total = messages.len();
        let thread: Vec<ThreadMessage> = messages
            .into_iter()
            .filter(|m| m.thread_id.as_deref().map_or(true, |t| t == thread_id))
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            total,
            selected = thread.len(),
            "Loaded messages from file"
        );
        Ok(thread)
    }
}
