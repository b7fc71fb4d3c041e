//! HTTP/1.1 exchanges between the client and the daemon server.
//!
//! Message framing is handled by `hyper`. Each dialled or accepted stream
//! carries a single body-less `POST` and is driven on a current-thread runtime
//! owned by the calling thread, so callers stay blocking.

use std::convert::Infallible;
use std::future::Future;
use std::io;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, Limited};
use hyper::body::Incoming;
use hyper::client::conn::http1 as client;
use hyper::header::{CONNECTION, CONTENT_TYPE, HOST, HeaderValue, USER_AGENT};
use hyper::server::conn::http1 as server;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::command::{CommandPath, CommandRequest};
use crate::transport::Connection;

const HTTP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::http");
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;
const CLIENT_AGENT: &str = concat!("ipfs/", env!("CARGO_PKG_VERSION"));

const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Request target for `request`, e.g. `/api/v0/swarm/peers?arg=a`.
pub(crate) fn request_target(prefix: &str, request: &CommandRequest) -> String {
    let mut target = format!("{prefix}/{}", request.path().key());
    for (index, argument) in request.arguments().iter().enumerate() {
        target.push(if index == 0 { '?' } else { '&' });
        target.push_str("arg=");
        target.extend(utf8_percent_encode(argument, QUERY_VALUE));
    }
    target
}

/// Recovers the command request from a request target under `prefix`.
pub(crate) fn parse_target(prefix: &str, target: &str) -> Result<CommandRequest, HttpError> {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let Some(command) = path.strip_prefix(prefix) else {
        return Err(HttpError::UnknownTarget(target.to_owned()));
    };
    if !command.is_empty() && !command.starts_with('/') {
        return Err(HttpError::UnknownTarget(target.to_owned()));
    }

    let mut arguments = Vec::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        if name != "arg" {
            continue;
        }
        let value = value.replace('+', " ");
        let decoded = percent_decode_str(&value)
            .decode_utf8()
            .map_err(|_| HttpError::Malformed(format!("argument '{value}' is not UTF-8")))?;
        arguments.push(decoded.into_owned());
    }
    Ok(CommandRequest::new(CommandPath::from_key(command), arguments))
}

/// A response status with its collected body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpResponse {
    pub(crate) status: u16,
    pub(crate) body: Vec<u8>,
}

impl HttpResponse {
    pub(crate) const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// The daemon's error message, when the body carries one.
    pub(crate) fn error_message(&self) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(&self.body)
            .ok()
            .map(|body| body.message)
    }
}

/// Sends a `POST` for `target` over `connection` and collects the response.
pub(crate) fn post(
    connection: Connection,
    host: &str,
    target: &str,
) -> Result<HttpResponse, HttpError> {
    let request = Request::post(target)
        .header(HOST, host)
        .header(USER_AGENT, CLIENT_AGENT)
        .header(CONNECTION, "close")
        .body(Empty::<Bytes>::new())
        .map_err(|error| HttpError::Malformed(error.to_string()))?;
    block_on(post_over(connection, request))?
}

async fn post_over(
    connection: Connection,
    request: Request<Empty<Bytes>>,
) -> Result<HttpResponse, HttpError> {
    match connection {
        Connection::Tcp(stream) => {
            stream.set_nonblocking(true)?;
            send(tokio::net::TcpStream::from_std(stream)?, request).await
        }
        #[cfg(unix)]
        Connection::Unix(stream) => {
            stream.set_nonblocking(true)?;
            send(tokio::net::UnixStream::from_std(stream)?, request).await
        }
    }
}

async fn send<S>(stream: S, request: Request<Empty<Bytes>>) -> Result<HttpResponse, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) =
        client::handshake::<_, Empty<Bytes>>(TokioIo::new(stream)).await?;
    let _driver = tokio::spawn(async move {
        if let Err(error) = connection.await {
            debug!(target: HTTP_TARGET, error = %error, "client connection ended with an error");
        }
    });

    let response = sender.send_request(request).await?;
    let status = response.status().as_u16();
    let body = Limited::new(response.into_body(), MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|error| HttpError::Body(error.to_string()))?
        .to_bytes();
    Ok(HttpResponse {
        status,
        body: body.to_vec(),
    })
}

/// Head of a request received by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestHead {
    pub(crate) method: Method,
    pub(crate) target: String,
    pub(crate) host: Option<String>,
}

impl RequestHead {
    fn of(request: &Request<Incoming>) -> Self {
        Self {
            method: request.method().clone(),
            target: request.uri().to_string(),
            host: request
                .headers()
                .get(HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
        }
    }
}

/// A complete response produced by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    status: StatusCode,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    pub(crate) const fn text(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "text/plain",
            body,
        }
    }

    /// The JSON error document the client understands.
    pub(crate) fn error(status: StatusCode, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorBody::new(message))
            .unwrap_or_else(|_| message.as_bytes().to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        response
    }
}

/// Answers the request carried by `connection` with `handler`.
pub(crate) fn serve<F>(connection: Connection, handler: F) -> Result<(), HttpError>
where
    F: Fn(&RequestHead) -> Reply,
{
    block_on(serve_over(connection, &handler))?
}

async fn serve_over<F>(connection: Connection, handler: &F) -> Result<(), HttpError>
where
    F: Fn(&RequestHead) -> Reply,
{
    match connection {
        Connection::Tcp(stream) => {
            stream.set_nonblocking(true)?;
            answer(tokio::net::TcpStream::from_std(stream)?, handler).await
        }
        #[cfg(unix)]
        Connection::Unix(stream) => {
            stream.set_nonblocking(true)?;
            answer(tokio::net::UnixStream::from_std(stream)?, handler).await
        }
    }
}

async fn answer<S, F>(stream: S, handler: &F) -> Result<(), HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(&RequestHead) -> Reply,
{
    let service = service_fn(|request: Request<Incoming>| {
        let reply = handler(&RequestHead::of(&request));
        async move { Ok::<_, Infallible>(reply.into_response()) }
    });
    server::Builder::new()
        .keep_alive(false)
        .serve_connection(TokioIo::new(stream), service)
        .await?;
    Ok(())
}

fn block_on<F: Future>(future: F) -> io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()?;
    Ok(runtime.block_on(future))
}

/// Error payload returned for failed commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ErrorBody {
    pub(crate) message: String,
    pub(crate) code: i32,
    #[serde(rename = "Type")]
    pub(crate) kind: String,
}

impl ErrorBody {
    fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
            code: 0,
            kind: String::from("error"),
        }
    }
}

/// Failures exchanging a request with the peer.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("malformed HTTP message: {0}")]
    Malformed(String),
    #[error("HTTP exchange failed: {0}")]
    Protocol(#[from] hyper::Error),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("no command is served at '{0}'")]
    UnknownTarget(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}
