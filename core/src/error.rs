/*
 * error.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Corriere, an HTTP exchange engine.
 *
 * Corriere is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Corriere is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Corriere.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Exchange errors: configuration, transport, framing, cancellation.
//!
//! HTTP error statuses (4xx, 5xx) are not errors here; they arrive as a normal `Response`.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Violation of a payload framing rule (chunked coding, trailers, response head).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("invalid chunk size: {0:?}")]
    InvalidChunkSize(String),
    #[error("incomplete chunk: expected {expected} bytes, received {received}")]
    IncompleteChunk { expected: u64, received: u64 },
    #[error("chunk data not terminated by CRLF")]
    MissingChunkTerminator,
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("invalid trailer: {0:?}")]
    InvalidTrailer(String),
    #[error("invalid response head: {0}")]
    InvalidHead(String),
}

/// Outcome of a failed exchange or body read.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Invalid method, URL, timeout, buffer size or unloadable certificate. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Connection refused, DNS failure, TLS handshake failure, stream closed early.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("exchange timed out after {0:?}")]
    Timeout(Duration),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    /// The cancellation token fired at a checkpoint.
    #[error("exchange cancelled")]
    Cancelled,
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ExchangeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExchangeError::Cancelled)
    }

    pub fn is_framing(&self) -> bool {
        matches!(self, ExchangeError::Framing(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ExchangeError::Transport(_) | ExchangeError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
