// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FTP log source.
//!
//! Same contract as SFTP: lazy connect, reconnect on next poll after
//! failure, offset preserved across errors, rotation by shrink. Uses
//! `REST` to resume mid-file.

use crate::source::{split_lines, LogBatch, LogSource, LogSourceError};
use async_trait::async_trait;
use suppaftp::AsyncFtpStream;
use tokio::io::AsyncReadExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;

/// Connection settings for an FTP tail.
#[derive(Debug, Clone)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub path: String,
}

pub struct FtpSource {
    config: FtpConfig,
    stream: Option<AsyncFtpStream>,
    offset: u64,
    partial: String,
}

impl FtpSource {
    pub fn new(config: FtpConfig, offset: u64) -> Self {
        Self {
            config,
            stream: None,
            offset,
            partial: String::new(),
        }
    }

    async fn connect(&mut self) -> Result<&mut AsyncFtpStream, LogSourceError> {
        if self.stream.is_none() {
            let mut stream =
                AsyncFtpStream::connect((self.config.host.as_str(), self.config.port))
                    .await
                    .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            stream
                .login(&self.config.username, &self.config.password)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            stream
                .transfer_type(suppaftp::types::FileType::Binary)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| LogSourceError::Connection("ftp stream unavailable".into()))
    }

    fn drop_stream(&mut self) {
        self.stream = None;
    }
}

#[async_trait]
impl LogSource for FtpSource {
    async fn poll(&mut self) -> Result<LogBatch, LogSourceError> {
        let offset = self.offset;
        let path = self.config.path.clone();

        let result: Result<(Vec<u8>, bool), LogSourceError> = async {
            let stream = self.connect().await?;
            let size = stream
                .size(&path)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))? as u64;

            let rotated = size < offset;
            let start = if rotated { 0 } else { offset };
            if size == start {
                return Ok((Vec::new(), rotated));
            }

            stream
                .resume_transfer(start as usize)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            let mut reader = stream
                .retr_as_stream(&path)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            let mut chunk = Vec::new();
            (&mut reader)
                .compat()
                .read_to_end(&mut chunk)
                .await
                .map_err(|e| LogSourceError::Connection(e.to_string()))?;
            stream
                .finalize_retr_stream(reader)
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
                self.drop_stream();
                Err(e)
            }
        }
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}
