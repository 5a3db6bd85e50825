/*
 * connection.rs
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

//! HTTP connection: one TCP or TLS stream carrying exactly one exchange.
//!
//! Writes the request head and body, reads the final response head, then hands the stream and
//! any read-ahead bytes over as the response `BodyStream`.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::BytesMut;
use rustls::ClientConfig;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream as TokioTlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{ExchangeError, Result};
use crate::http::body::{unexpected_eof, BodyStream};
use crate::http::chunked::{encode_chunk_into, TERMINAL_CHUNK};
use crate::http::h1::{ResponseHead, ResponseHeadParser};
use crate::http::request::RequestBody;
use crate::net::server_name;
use crate::uri::TargetUrl;

/// Unified stream: plain TCP or TLS. Implements AsyncRead + AsyncWrite.
pub enum HttpStream {
    Plain(TcpStream),
    Tls(Box<TokioTlsStream<TcpStream>>),
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_flush(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            HttpStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            HttpStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Run an I/O future unless the token fires first.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(ExchangeError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExchangeError::Cancelled),
        r = fut => r.map_err(ExchangeError::from),
    }
}

/// One connection, one exchange.
pub struct HttpConnection {
    stream: HttpStream,
    read_buf: BytesMut,
    read_size: usize,
    max_line: usize,
}

impl HttpConnection {
    /// Connect (and for https, handshake) to the URL's host and port.
    pub async fn open(
        url: &TargetUrl,
        tls: &Arc<ClientConfig>,
        config: &EngineConfig,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let tls_setup = if url.is_secure() {
            Some((tls.clone(), server_name(&url.host)?))
        } else {
            None
        };

        let addr = format!("{}:{}", url.host, url.port);
        let connect_timeout = config.connect_timeout();
        let tcp = cancellable(cancel, async {
            timeout(connect_timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TCP connect timed out"))?
        })
        .await?;
        tcp.set_nodelay(true).ok();
        debug!("connected to {}", addr);

        let stream = match tls_setup {
            Some((client_config, name)) => {
                let connector = TlsConnector::from(client_config);
                let tls = cancellable(cancel, connector.connect(name, tcp)).await?;
                trace!("TLS established with {}", url.host);
                HttpStream::Tls(Box::new(tls))
            }
            None => HttpStream::Plain(tcp),
        };

        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            read_size: config.read_buffer_size,
            max_line: config.max_line_length,
        })
    }

    /// Write the head, then the body in the framing the head announced.
    pub async fn send_request(
        &mut self,
        head: BytesMut,
        body: RequestBody,
        chunked: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancellable(cancel, self.stream.write_all(&head)).await?;
        match body {
            RequestBody::Empty => {}
            RequestBody::Bytes(data) if chunked => {
                let mut framed = BytesMut::with_capacity(data.len() + 16);
                if !data.is_empty() {
                    encode_chunk_into(&data, &mut framed);
                }
                framed.extend_from_slice(TERMINAL_CHUNK);
                cancellable(cancel, self.stream.write_all(&framed)).await?;
            }
            RequestBody::Bytes(data) | RequestBody::Chunked(data) => {
                cancellable(cancel, self.stream.write_all(&data)).await?;
            }
            RequestBody::Stream(mut reader) => {
                let mut buf = BytesMut::with_capacity(self.read_size);
                let mut framed = BytesMut::with_capacity(self.read_size + 16);
                loop {
                    buf.clear();
                    let n = cancellable(cancel, reader.read_buf(&mut buf)).await?;
                    if n == 0 {
                        break;
                    }
                    framed.clear();
                    encode_chunk_into(&buf, &mut framed);
                    cancellable(cancel, self.stream.write_all(&framed)).await?;
                }
                cancellable(cancel, self.stream.write_all(TERMINAL_CHUNK)).await?;
            }
        }
        cancellable(cancel, self.stream.flush()).await?;
        Ok(())
    }

    /// Read until the final (non-1xx) response head is complete.
    pub async fn read_head(&mut self, cancel: &CancellationToken) -> Result<ResponseHead> {
        let mut parser = ResponseHeadParser::new(self.max_line);
        loop {
            if let Some(head) = parser.receive(&mut self.read_buf)? {
                if head.is_interim() {
                    trace!("skipping interim response {}", head.status);
                    parser.reset();
                    continue;
                }
                return Ok(head);
            }
            self.read_buf.reserve(self.read_size);
            let n = cancellable(cancel, self.stream.read_buf(&mut self.read_buf)).await?;
            if n == 0 {
                return Err(unexpected_eof("connection closed before response head"));
            }
        }
    }

    /// The rest of the connection as the response body, read-ahead bytes first.
    pub fn into_body_stream(self) -> BodyStream {
        BodyStream::with_buffered(Box::new(self.stream), self.read_buf, self.read_size, self.max_line)
    }
}
