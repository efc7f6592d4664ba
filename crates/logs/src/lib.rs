// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! aegis-logs: incremental log ingestion and parsing.
//!
//! Three interchangeable sources (local tail, SFTP, FTP) feed the same
//! line-oriented contract: complete lines, in file order, no
//! duplicates across restarts, offsets persisted after each parsed
//! batch. The parser turns lines into typed events via a fixed,
//! declared-order pattern table; unmatched lines become `UNPARSED`
//! events.

pub mod ftp;
pub mod local;
pub mod parser;
pub mod pipeline;
pub mod sftp;
pub mod source;

pub use local::LocalSource;
pub use parser::LogParser;
pub use pipeline::LogPipeline;
pub use source::{LogBatch, LogSource, LogSourceError};
