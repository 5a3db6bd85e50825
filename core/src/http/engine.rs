/*
 * engine.rs
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

//! Exchange engine: validates an `ExchangeSpec`, builds the request, dispatches it through a
//! `Transport` under one deadline, follows redirects and wraps the result in a `Response`.
//!
//! `ChunkedUpload` splits a chunked request into explicit steps: chunks are framed in memory
//! while `Buffering`, and nothing reaches the network until the final chunk dispatches it.

use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::{ExchangeError, Result};
use crate::http::chunked::ChunkedBodyWriter;
use crate::http::client::{HttpTransport, InboundResponse, OutboundRequest, Transport};
use crate::http::headers::HeaderMap;
use crate::http::request::{ExchangeSpec, Method, RequestBody};
use crate::http::response::{Response, Stopwatch, Timing};
use crate::net::http_client_config;
use crate::uri::TargetUrl;

/// Caller headers that the transport manages itself.
const SKIPPED_HEADERS: &[&str] = &["connection", "close", "content-length"];

/// Performs exchanges one at a time. Not for concurrent use; create one engine per task.
pub struct ExchangeEngine<T: Transport = HttpTransport> {
    transport: T,
    config: EngineConfig,
    last_timing: Option<Timing>,
}

impl ExchangeEngine<HttpTransport> {
    pub fn new() -> Self {
        Self::with_transport(HttpTransport::default(), EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_transport(HttpTransport::new(config.clone()), config))
    }
}

impl Default for ExchangeEngine<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ExchangeEngine<T> {
    pub fn with_transport(transport: T, config: EngineConfig) -> Self {
        Self {
            transport,
            config,
            last_timing: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Timing of the most recent `send`, successful or not.
    pub fn last_timing(&self) -> Option<&Timing> {
        self.last_timing.as_ref()
    }

    /// Perform one exchange. 4xx and 5xx statuses are returned as normal responses.
    pub async fn send(
        &mut self,
        spec: &ExchangeSpec,
        body: RequestBody,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let stopwatch = Stopwatch::start();
        let result = self.exchange(spec, body, cancel).await;
        let timing = stopwatch.finish();
        self.last_timing = Some(timing.clone());
        match result {
            Ok(mut response) => {
                trace!("{} {} took {:?}", spec.method, spec.url, timing.elapsed);
                response.set_timing(timing);
                Ok(response)
            }
            Err(e) => {
                debug!("{} {} failed after {:?}: {}", spec.method, spec.url, timing.elapsed, e);
                Err(e)
            }
        }
    }

    /// Start a chunked upload for `spec`. Nothing is sent until the final chunk.
    pub fn begin_chunked(&mut self, spec: &ExchangeSpec) -> Result<ChunkedUpload<'_, T>> {
        spec.validate()?;
        Ok(ChunkedUpload {
            engine: self,
            spec: spec.clone(),
            state: UploadState::Buffering(ChunkedBodyWriter::new()),
        })
    }

    async fn exchange(
        &mut self,
        spec: &ExchangeSpec,
        body: RequestBody,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        check_cancelled(cancel)?;
        let mut url = spec.validate()?;

        // Trust settings and any client certificate are resolved once, before touching the
        // network, and reused by every hop.
        let tls = http_client_config(&spec.tls)?;
        if let Some(cert) = &spec.tls.client_certificate {
            trace!("client certificate {} loaded", cert.path.display());
        }
        check_cancelled(cancel)?;

        let mut headers = self.build_headers(spec);
        check_cancelled(cancel)?;

        let mut method = spec.method;
        let mut body = if method.allows_body() {
            body
        } else {
            if !body.is_empty() {
                debug!("{} request: body not sent", method);
            }
            RequestBody::Empty
        };

        let deadline = Instant::now() + spec.timeout;
        let mut hops = 0u32;
        loop {
            check_cancelled(cancel)?;
            let replay = if spec.allow_auto_redirect {
                body.try_clone()
            } else {
                None
            };
            debug!("dispatching {} {}", method, url);
            let request = OutboundRequest {
                method,
                url: url.clone(),
                headers: headers.clone(),
                body,
                chunked: spec.chunked,
                tls: tls.clone(),
            };
            let inbound = match timeout_at(deadline, self.transport.issue(request, cancel)).await {
                Ok(result) => result?,
                Err(_) => {
                    debug!("{} {} timed out", method, url);
                    return Err(ExchangeError::Timeout(spec.timeout));
                }
            };

            let status = inbound.head.status;
            if !spec.allow_auto_redirect || !is_redirect_status(status) {
                return Ok(Response::new(inbound, method, url));
            }
            if hops >= self.config.max_redirects {
                debug!("redirect limit {} reached at {}", self.config.max_redirects, url);
                return Ok(Response::new(inbound, method, url));
            }
            let Some(next) = redirect_target(&inbound, &url) else {
                return Ok(Response::new(inbound, method, url));
            };

            let next_method = redirect_method(method, status);
            let next_body = if next_method != method || !next_method.allows_body() {
                headers.remove("content-type");
                Some(RequestBody::Empty)
            } else {
                replay
            };
            let Some(next_body) = next_body else {
                debug!("{} to {}: streamed body cannot be resent", status, next);
                return Ok(Response::new(inbound, method, url));
            };
            if !url.same_origin(&next) && headers.remove("authorization") {
                trace!("authorization dropped for {}", next);
            }

            debug!("{} redirect {} -> {}", status, url, next);
            hops += 1;
            url = next;
            method = next_method;
            body = next_body;
        }
    }

    /// Caller headers minus transport-managed ones, then content type, authorization and user agent.
    fn build_headers(&self, spec: &ExchangeSpec) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in spec.headers.iter() {
            if SKIPPED_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name)) {
                continue;
            }
            headers.append(name, value);
        }
        if !headers.contains("content-type") {
            if let Some(content_type) = &spec.content_type {
                headers.set("Content-Type", content_type.as_str());
            }
        }
        if let Some(value) = spec.authorization.resolve() {
            headers.set("Authorization", value);
        }
        if !headers.contains("user-agent") {
            if let Some(agent) = &self.config.user_agent {
                headers.set("User-Agent", agent.as_str());
            }
        }
        headers
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        debug!("exchange cancelled");
        return Err(ExchangeError::Cancelled);
    }
    Ok(())
}

fn is_redirect_status(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// 303 becomes GET (HEAD stays HEAD); 301 and 302 turn POST into GET; 307 and 308 keep the method.
fn redirect_method(method: Method, status: u16) -> Method {
    match status {
        303 if method != Method::Head => Method::Get,
        301 | 302 if method == Method::Post => Method::Get,
        _ => method,
    }
}

fn redirect_target(inbound: &InboundResponse, url: &TargetUrl) -> Option<TargetUrl> {
    let location = inbound.head.headers.get("location")?;
    match url.resolve(location) {
        Ok(next) => Some(next),
        Err(e) => {
            warn!("unusable redirect location {:?}: {}", location, e);
            None
        }
    }
}

enum UploadState {
    Buffering(ChunkedBodyWriter),
    Dispatched,
}

/// Chunked request body built in memory, then sent with the final chunk.
pub struct ChunkedUpload<'e, T: Transport> {
    engine: &'e mut ExchangeEngine<T>,
    spec: ExchangeSpec,
    state: UploadState,
}

impl<T: Transport> ChunkedUpload<'_, T> {
    /// Frame `data` as one chunk. No I/O.
    pub fn send_chunk(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.state {
            UploadState::Buffering(writer) => writer.append_chunk(data),
            UploadState::Dispatched => Err(ExchangeError::InvalidState("chunked upload already dispatched")),
        }
    }

    /// Frame `data`, terminate the body and perform the exchange.
    pub async fn send_final_chunk(
        &mut self,
        data: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Response> {
        self.send_chunk(data)?;
        self.finish(cancel).await
    }

    /// Terminate the body and perform the exchange.
    pub async fn finish(&mut self, cancel: &CancellationToken) -> Result<Response> {
        let mut writer = match std::mem::replace(&mut self.state, UploadState::Dispatched) {
            UploadState::Buffering(writer) => writer,
            UploadState::Dispatched => {
                return Err(ExchangeError::InvalidState("chunked upload already dispatched"))
            }
        };
        writer.finalize()?;
        trace!("chunked upload of {} chunks ({} bytes)", writer.chunk_count(), writer.len());
        let body = RequestBody::Chunked(writer.into_body()?);
        self.engine.send(&self.spec, body, cancel).await
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self.state, UploadState::Dispatched)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::BytesMut;

    use super::*;
    use crate::http::auth::Authorization;
    use crate::http::body::BodyStream;
    use crate::http::h1::ResponseHead;

    #[derive(Debug, Clone)]
    struct Seen {
        method: Method,
        url: String,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
        tls: Arc<rustls::ClientConfig>,
    }

    /// Replies from a script keyed by request path; records every request.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        replies: Arc<Mutex<Vec<(u16, Vec<(String, String)>, &'static [u8])>>>,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl ScriptedTransport {
        fn reply(self, status: u16, headers: &[(&str, &str)], body: &'static [u8]) -> Self {
            let headers = headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            self.replies.lock().unwrap().push((status, headers, body));
            self
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn issue(
            &self,
            request: OutboundRequest,
            cancel: &CancellationToken,
        ) -> Result<InboundResponse> {
            check_cancelled(cancel)?;
            let body = match &request.body {
                RequestBody::Empty => None,
                RequestBody::Bytes(b) | RequestBody::Chunked(b) => Some(b.to_vec()),
                RequestBody::Stream(_) => Some(b"<stream>".to_vec()),
            };
            self.seen.lock().unwrap().push(Seen {
                method: request.method,
                url: request.url.to_string(),
                headers: request.headers.clone(),
                body,
                tls: request.tls.clone(),
            });
            let (status, headers, body) = self.replies.lock().unwrap().remove(0);
            Ok(InboundResponse {
                head: ResponseHead {
                    version: "HTTP/1.1".into(),
                    status,
                    reason: String::new(),
                    headers: headers.into_iter().collect(),
                },
                body: BodyStream::with_buffered(
                    Box::new(body),
                    BytesMut::new(),
                    64,
                    1024,
                ),
            })
        }
    }

    fn engine(t: &ScriptedTransport) -> ExchangeEngine<ScriptedTransport> {
        ExchangeEngine::with_transport(t.clone(), EngineConfig::default())
    }

    #[tokio::test]
    async fn headers_are_built_in_order_of_precedence() {
        let t = ScriptedTransport::default().reply(200, &[], b"");
        let spec = ExchangeSpec::post("http://example.com/api")
            .header("Connection", "keep-alive")
            .header("Content-Length", "999")
            .header("content-type", "application/xml")
            .header("X-Trace", "1")
            .content_type("application/json")
            .authorization(Authorization::bearer("tok"));
        engine(&t)
            .send(&spec, RequestBody::from("<a/>"), &CancellationToken::new())
            .await
            .unwrap();
        let seen = &t.seen()[0];
        assert!(!seen.headers.contains("connection"));
        assert!(!seen.headers.contains("content-length"));
        assert_eq!(seen.headers.get("Content-Type"), Some("application/xml"));
        assert_eq!(seen.headers.get("authorization"), Some("Bearer tok"));
        assert_eq!(seen.headers.get("user-agent"), Some(crate::config::DEFAULT_USER_AGENT));
        assert_eq!(seen.headers.get("x-trace"), Some("1"));
    }

    #[tokio::test]
    async fn get_and_head_never_carry_a_body() {
        let t = ScriptedTransport::default().reply(200, &[], b"").reply(200, &[], b"");
        let mut e = engine(&t);
        let cancel = CancellationToken::new();
        e.send(&ExchangeSpec::get("http://h/"), RequestBody::from("payload"), &cancel)
            .await
            .unwrap();
        e.send(&ExchangeSpec::new(Method::Head, "http://h/"), RequestBody::from("payload"), &cancel)
            .await
            .unwrap();
        assert!(t.seen().iter().all(|s| s.body.is_none()));
    }

    #[tokio::test]
    async fn other_methods_keep_the_body() {
        let t = ScriptedTransport::default().reply(200, &[], b"");
        engine(&t)
            .send(&ExchangeSpec::new(Method::Delete, "http://h/x"), RequestBody::from("gone"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(t.seen()[0].body.as_deref(), Some(&b"gone"[..]));
    }

    #[tokio::test]
    async fn redirect_303_switches_to_get() {
        let t = ScriptedTransport::default()
            .reply(303, &[("Location", "/done")], b"")
            .reply(200, &[("Content-Length", "2")], b"ok");
        let spec = ExchangeSpec::post("http://h/form").content_type("text/plain");
        let mut r = engine(&t)
            .send(&spec, RequestBody::from("data"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(r.text(&CancellationToken::new()).await.unwrap(), "ok");
        assert_eq!(r.url().to_string(), "http://h/done");
        let seen = t.seen();
        assert_eq!(seen[1].method, Method::Get);
        assert!(seen[1].body.is_none());
        assert!(!seen[1].headers.contains("content-type"));
    }

    #[tokio::test]
    async fn redirect_307_resends_body_and_drops_auth_across_origins() {
        let t = ScriptedTransport::default()
            .reply(307, &[("Location", "http://other:8080/x")], b"")
            .reply(201, &[], b"");
        let spec = ExchangeSpec::new(Method::Put, "http://h/x").authorization(Authorization::basic("u", "p"));
        let r = engine(&t)
            .send(&spec, RequestBody::from("v"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(r.status(), 201);
        let seen = t.seen();
        assert_eq!(seen[1].method, Method::Put);
        assert_eq!(seen[1].url, "http://other:8080/x");
        assert_eq!(seen[1].body.as_deref(), Some(&b"v"[..]));
        assert!(seen[0].headers.contains("authorization"));
        assert!(!seen[1].headers.contains("authorization"));
    }

    #[tokio::test]
    async fn redirect_not_followed_when_disabled() {
        let t = ScriptedTransport::default().reply(302, &[("Location", "/elsewhere")], b"");
        let spec = ExchangeSpec::get("http://h/").allow_auto_redirect(false);
        let r = engine(&t)
            .send(&spec, RequestBody::Empty, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(r.status(), 302);
        assert!(r.is_redirect());
        assert_eq!(t.seen().len(), 1);
    }

    #[tokio::test]
    async fn redirect_limit_returns_last_3xx() {
        let t = ScriptedTransport::default()
            .reply(301, &[("Location", "/a")], b"")
            .reply(301, &[("Location", "/b")], b"")
            .reply(301, &[("Location", "/c")], b"");
        let config = EngineConfig {
            max_redirects: 2,
            ..EngineConfig::default()
        };
        let mut e = ExchangeEngine::with_transport(t.clone(), config);
        let r = e
            .send(&ExchangeSpec::get("http://h/"), RequestBody::Empty, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(r.status(), 301);
        assert_eq!(r.url().target, "/b");
    }

    #[tokio::test]
    async fn streamed_body_stops_redirects() {
        let t = ScriptedTransport::default().reply(307, &[("Location", "/again")], b"");
        let r = engine(&t)
            .send(
                &ExchangeSpec::post("http://h/"),
                RequestBody::stream(&b"abc"[..]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(r.status(), 307);
        assert_eq!(t.seen().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_dispatch() {
        let t = ScriptedTransport::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut e = engine(&t);
        let err = e
            .send(&ExchangeSpec::get("http://h/"), RequestBody::Empty, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(t.seen().is_empty());
        assert!(e.last_timing().is_some());
    }

    #[tokio::test]
    async fn invalid_spec_fails_before_transport() {
        let t = ScriptedTransport::default();
        let err = engine(&t)
            .send(&ExchangeSpec::get("ftp://h/"), RequestBody::Empty, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Configuration(_)));
        assert!(t.seen().is_empty());
    }

    #[tokio::test]
    async fn missing_client_certificate_is_configuration_error() {
        let t = ScriptedTransport::default();
        let spec = ExchangeSpec::get("http://h/").client_certificate("/nonexistent/client.pem", None);
        let err = engine(&t)
            .send(&spec, RequestBody::Empty, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Configuration(_)));
        assert!(t.seen().is_empty());
    }

    #[tokio::test]
    async fn redirect_hops_share_one_tls_setup() {
        let t = ScriptedTransport::default()
            .reply(302, &[("Location", "https://h/next")], b"")
            .reply(200, &[], b"");
        engine(&t)
            .send(&ExchangeSpec::get("http://h/"), RequestBody::Empty, &CancellationToken::new())
            .await
            .unwrap();
        let seen = t.seen();
        assert_eq!(seen.len(), 2);
        assert!(Arc::ptr_eq(&seen[0].tls, &seen[1].tls));
    }

    #[tokio::test]
    async fn invalid_header_name_fails_before_transport() {
        let t = ScriptedTransport::default();
        let spec = ExchangeSpec::get("http://h/").header("X-A\r\nInjected", "1");
        let err = engine(&t)
            .send(&spec, RequestBody::Empty, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Configuration(_)));
        assert!(t.seen().is_empty());
    }

    #[tokio::test]
    async fn chunked_upload_dispatches_once() {
        let t = ScriptedTransport::default().reply(200, &[], b"");
        let mut e = engine(&t);
        let spec = ExchangeSpec::post("http://h/upload");
        let cancel = CancellationToken::new();
        let mut upload = e.begin_chunked(&spec).unwrap();
        upload.send_chunk(b"hello ").unwrap();
        let r = upload.send_final_chunk(b"world", &cancel).await.unwrap();
        assert_eq!(r.status(), 200);
        assert!(upload.is_dispatched());
        assert!(matches!(upload.send_chunk(b"late"), Err(ExchangeError::InvalidState(_))));
        assert!(matches!(upload.finish(&cancel).await, Err(ExchangeError::InvalidState(_))));
        let seen = t.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].body.as_deref(), Some(&b"6\r\nhello \r\n5\r\nworld\r\n0\r\n\r\n"[..]));
    }

    #[tokio::test]
    async fn timing_recorded_on_success() {
        let t = ScriptedTransport::default().reply(500, &[], b"oops");
        let mut e = engine(&t);
        let r = e
            .send(&ExchangeSpec::get("http://h/"), RequestBody::Empty, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(r.status(), 500);
        assert!(r.timing().is_some());
        assert_eq!(r.timing(), e.last_timing());
    }
}
