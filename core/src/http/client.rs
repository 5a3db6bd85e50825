/*
 * client.rs
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

//! Transport: the only place an exchange touches the network.
//!
//! `Transport` issues one request and returns the final response head plus a streaming body.
//! `HttpTransport` is the default, one HTTP/1.1 connection per exchange.

use std::future::Future;
use std::sync::Arc;

use rustls::ClientConfig;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::http::body::BodyStream;
use crate::http::connection::HttpConnection;
use crate::http::h1::{encode_request_head, BodyLength, ResponseHead};
use crate::http::headers::HeaderMap;
use crate::http::request::{Method, RequestBody};
use crate::uri::TargetUrl;

/// One request as handed to the transport. Headers are final except for `Host`, `Connection`
/// and body framing, which the transport adds.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: TargetUrl,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Send a `Bytes` body with chunked coding.
    pub chunked: bool,
    /// TLS settings built once per exchange and shared by every redirect hop.
    pub tls: Arc<ClientConfig>,
}

impl OutboundRequest {
    /// Framing announced in the head for this body.
    pub fn body_length(&self) -> BodyLength {
        match &self.body {
            RequestBody::Empty if self.method.allows_body() => BodyLength::Fixed(0),
            RequestBody::Empty => BodyLength::None,
            RequestBody::Bytes(_) if self.chunked => BodyLength::Chunked,
            RequestBody::Bytes(b) => BodyLength::Fixed(b.len() as u64),
            RequestBody::Stream(_) | RequestBody::Chunked(_) => BodyLength::Chunked,
        }
    }
}

/// Final response head and the unread body.
pub struct InboundResponse {
    pub head: ResponseHead,
    pub body: BodyStream,
}

/// Issues exchanges. Implementations must honor `cancel` at every wait.
pub trait Transport {
    fn issue(
        &self,
        request: OutboundRequest,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<InboundResponse>> + Send;
}

/// HTTP/1.1 over TCP or TLS, `Connection: close`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    config: EngineConfig,
}

impl HttpTransport {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl Transport for HttpTransport {
    async fn issue(
        &self,
        request: OutboundRequest,
        cancel: &CancellationToken,
    ) -> Result<InboundResponse> {
        let length = request.body_length();
        let head = encode_request_head(request.method, &request.url, &request.headers, length);
        let mut conn = HttpConnection::open(&request.url, &request.tls, &self.config, cancel).await?;
        debug!("{} {} ({:?})", request.method, request.url, request.body);
        conn.send_request(head, request.body, length == BodyLength::Chunked, cancel)
            .await?;
        let head = conn.read_head(cancel).await?;
        debug!("{} {} from {}", head.status, head.reason, request.url);
        Ok(InboundResponse {
            head,
            body: conn.into_body_stream(),
        })
    }
}
