// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SFTP log source.
//!
//! Connects lazily and reconnects on the next poll after any failure;
//! the offset survives connection loss. Rotation is detected by the
//! remote file shrinking below the current offset.

use crate::source::{split_lines, LogBatch, LogSource, LogSourceError};
use async_trait::async_trait;
use russh::client;
use russh_sftp::client::SftpSession;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Connection settings for an SFTP tail.
#[derive(Debug, Clone)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub path: String,
}

pub struct SftpSource {
    config: SftpConfig,
    session: Option<SftpSession>,
    offset: u64,
    partial: String,
}

struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    // Game hosts hand out rotating containers; host keys are not
    // stable enough to pin.
    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

impl SftpSource {
    pub fn new(config: SftpConfig, offset: u64) -> Self {
        Self {
            config,
            session: None,
            offset,
            partial: String::new(),
        }
    }

    async fn connect(&mut self) -> Result<&SftpSession, LogSourceError> {
        if self.session.is_none() {
            let ssh_config = Arc::new(client::Config::default());
            let mut handle = client::connect(
                ssh_config,
                (self.config.host.as_str(), self.config.port),
                AcceptingHandler,
            )
            .await
            .map_err(|e| LogSourceError::Connection(e.to_string()))?;

            let auth = handle
                .authenticate_password(&self.config.username, &self.config.password)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            if !matches!(auth, russh::client::AuthResult::Success) {
                return Err(LogSourceError::Connection(format!(
                    "sftp auth rejected for {}",
                    self.config.username
                )));
            }

            let channel = handle
                .channel_open_session()
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            channel
                .request_subsystem(true, "sftp")
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            let session = SftpSession::new(channel.into_stream())
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            self.session = Some(session);
        }
        // Set above when absent.
        self.session
            .as_ref()
            .ok_or_else(|| LogSourceError::Connection("sftp session unavailable".into()))
    }

    fn drop_session(&mut self) {
        self.session = None;
    }
}

#[async_trait]
impl LogSource for SftpSource {
    async fn poll(&mut self) -> Result<LogBatch, LogSourceError> {
        let offset = self.offset;
        let path = self.config.path.clone();

        let result: Result<(Vec<u8>, bool), LogSourceError> = async {
            let session = self.connect().await?;
            let metadata = session
                .metadata(&path)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            let size = metadata.size.unwrap_or(0);

            let rotated = size < offset;
            let start = if rotated { 0 } else { offset };
            if size == start {
                return Ok((Vec::new(), rotated));
            }

            let mut file = session
                .open(&path)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            file.seek(SeekFrom::Start(start))
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            let mut chunk = Vec::new();
            file.read_to_end(&mut chunk)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            Ok((chunk, rotated))
        }
        .await;

        match result {
            Ok((chunk, rotated)) => {
                if rotated {
                    tracing::info!(path = %self.config.path, "remote log rotated, restarting from 0");
                    self.offset = 0;
                    self.partial.clear();
                }
                self.offset += chunk.len() as u64;
                let lines = split_lines(&mut self.partial, &String::from_utf8_lossy(&chunk));
                Ok(LogBatch {
                    lines,
                    offset: self.offset,
                    rotated,
                })
            }
            Err(e) => {
                // Reconnect on the next poll; never touch the offset.
                self.drop_session();
                Err(e)
            }
        }
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}
