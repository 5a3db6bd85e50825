/*
 * mod.rs
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

//! HTTP/1.1 exchange layer: request description, transport, response envelope and the body
//! decoders for chunked transfer coding and Server-Sent Events.
//!
//! - One connection per exchange, `Connection: close`.
//! - Buffers: `bytes` crate (BytesMut for read buffers, Bytes for payload slices).
//! - Every wait takes a `CancellationToken`; cancellation is reported as `ExchangeError::Cancelled`.

pub mod auth;
pub mod body;
pub mod chunked;
pub mod client;
pub mod connection;
pub mod engine;
pub mod h1;
pub mod headers;
pub mod request;
pub mod response;
pub mod sse;

pub use auth::Authorization;
pub use body::BodyStream;
pub use chunked::{ChunkRecord, ChunkedBodyReader, ChunkedBodyWriter};
pub use client::{HttpTransport, InboundResponse, OutboundRequest, Transport};
pub use engine::{ChunkedUpload, ExchangeEngine};
pub use headers::{is_valid_name, HeaderMap};
pub use request::{ClientCertificate, ExchangeSpec, Method, RequestBody, TlsPolicy, DEFAULT_TIMEOUT};
pub use response::{BodyFraming, Response, Timing};
pub use sse::{SseEvent, SseReader};
