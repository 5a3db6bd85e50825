/*
 * lib.rs
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

//! Corriere core: HTTP/1.1 exchange engine with streaming chunked and event-stream bodies.
//!
//! Start with `http::ExchangeEngine` and an `http::ExchangeSpec`; the response body is read
//! lazily as bytes, chunk by chunk, or event by event.

pub mod config;
pub mod error;
pub mod http;
pub mod json;
pub mod net;
pub mod uri;

pub use config::EngineConfig;
pub use error::{ExchangeError, FramingError, Result};
pub use http::{
    Authorization, BodyFraming, ChunkRecord, ChunkedBodyReader, ChunkedBodyWriter, ChunkedUpload,
    ExchangeEngine, ExchangeSpec, HeaderMap, Method, RequestBody, Response, SseEvent, SseReader,
    Timing,
};
pub use json::{JsonSerializer, Serializer};
pub use uri::TargetUrl;
