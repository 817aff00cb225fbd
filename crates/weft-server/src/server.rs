//! The hyper transport.
//!
//! Each connection is served by hyper's HTTP/1.1 connection driver. Each
//! request becomes a [`RequestContext`] whose response handle is a
//! [`Response::channel`]; the pipeline runs on its own task and the hyper
//! service awaits the committed response.
//!
//! ```rust,ignore
//! use weft_middleware::Pipeline;
//! use weft_server::{Server, ServerConfig};
//!
//! let server = Server::builder()
//!     .config(ServerConfig::builder().http_addr("0.0.0.0:8080").build())
//!     .pipeline(pipeline)
//!     .build();
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use hyper::body::Incoming;
use hyper::ext::ReasonPhrase;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use weft_core::{
    empty_body, full_body, BoxBody, CancellationToken, Committed, Request, RequestContext,
    Response, ResponseBody,
};
use weft_middleware::Pipeline;

use crate::config::ServerConfig;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// The response type handed to hyper.
pub type HttpResponse = http::Response<BoxBody>;

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address does not parse.
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// Binding the listener failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A pipeline bound to a transport configuration.
#[derive(Debug, Clone)]
pub struct Server {
    config: ServerConfig,
    pipeline: Pipeline,
}

impl Server {
    /// Starts building a server.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves until SIGTERM or SIGINT.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals())
            .await
    }

    /// Serves until `shutdown` is triggered.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await
    }

    /// Binds the listener without accepting connections yet.
    ///
    /// Binding `127.0.0.1:0` and reading [`BoundServer::local_addr`] is the
    /// way to get an ephemeral port.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|err| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                reason: err.to_string(),
            })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        Ok(BoundServer {
            listener,
            local_addr,
            config: self.config,
            pipeline: self.pipeline,
        })
    }
}

/// Builder for [`Server`].
#[derive(Debug, Default)]
pub struct ServerBuilder {
    config: Option<ServerConfig>,
    pipeline: Option<Pipeline>,
}

impl ServerBuilder {
    /// Sets the transport configuration.
    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the pipeline requests are dispatched to.
    #[must_use]
    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Builds the server. Without a pipeline every request is answered 404.
    #[must_use]
    pub fn build(self) -> Server {
        Server {
            config: self.config.unwrap_or_default(),
            pipeline: self
                .pipeline
                .unwrap_or_else(|| Pipeline::builder().build()),
        }
    }
}

/// A server whose listener is bound.
#[derive(Debug)]
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    pipeline: Pipeline,
}

impl BoundServer {
    /// The address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until `shutdown` is triggered, then drains open
    /// connections for up to the configured shutdown timeout.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let Self {
            listener,
            local_addr,
            config,
            pipeline,
        } = self;
        tracing::info!(addr = %local_addr, "server listening");
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let token = tracker.acquire();
                        let pipeline = pipeline.clone();
                        let config = config.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, pipeline, &config, shutdown).await {
                                tracing::debug!(remote = %remote, error = %err, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(err) => tracing::error!(error = %err, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }
        drop(listener);

        let timeout = config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            timeout_ms = timeout.as_millis() as u64,
            "draining connections"
        );
        if tokio::time::timeout(timeout, tracker.drained()).await.is_err() {
            tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with open connections"
            );
        }
        tracing::info!("server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    pipeline: Pipeline,
    config: &ServerConfig,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let request_timeout = config.request_timeout();
    let service = service_fn(move |req: http::Request<Incoming>| {
        let pipeline = pipeline.clone();
        async move { Ok::<_, Infallible>(handle(pipeline, request_timeout, req).await) }
    });

    let conn = http1::Builder::new()
        .keep_alive(config.keep_alive())
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => return result,
        () = shutdown.recv() => conn.as_mut().graceful_shutdown(),
    }
    conn.await
}

/// Runs one request through the pipeline and converts the commit.
async fn handle(
    pipeline: Pipeline,
    request_timeout: Option<Duration>,
    req: http::Request<Incoming>,
) -> HttpResponse {
    let (response, receiver) = Response::channel();
    let handle = response.clone();
    let token = CancellationToken::new();
    // Dropping this future (client gone) cancels the request.
    let guard = token.clone().drop_guard();
    let ctx = RequestContext::with_cancellation(Request::from_http(req), response, token.clone());

    tokio::spawn(async move {
        pipeline.dispatch(ctx).await;
    });

    let receiver = receiver.recv();
    tokio::pin!(receiver);
    let committed = match request_timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver.as_mut()).await {
            Ok(committed) => committed,
            Err(_) => {
                tracing::warn!(timeout_ms = limit.as_millis() as u64, "request timed out");
                // Committed on the shared handle so the access record carries 504.
                if let Err(err) = handle.abort(http::StatusCode::GATEWAY_TIMEOUT) {
                    tracing::debug!(error = %err, "response committed as the timeout fired");
                }
                token.cancel();
                receiver.await
            }
        },
        None => receiver.await,
    };
    guard.disarm();

    match committed {
        Some(committed) => into_http(committed),
        None => {
            tracing::error!("pipeline ended without committing a response");
            plain(http::StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn plain(status: http::StatusCode) -> HttpResponse {
    let mut response = http::Response::new(empty_body());
    *response.status_mut() = status;
    response
}

/// Converts a committed response into a hyper response.
pub(crate) fn into_http(committed: Committed) -> HttpResponse {
    let Committed {
        status,
        reason,
        headers,
        body,
    } = committed;
    let body = match body {
        ResponseBody::Empty => empty_body(),
        ResponseBody::Full(bytes) => full_body(bytes),
        ResponseBody::Stream(body) => body,
    };

    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if let Some(reason) = reason {
        match ReasonPhrase::try_from(reason.into_bytes()) {
            Ok(phrase) => {
                response.extensions_mut().insert(phrase);
            }
            Err(_) => tracing::warn!(status = status.as_u16(), "dropping invalid reason phrase"),
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    #[test]
    fn test_into_http_keeps_custom_reason() {
        let mut headers = HeaderMap::new();
        headers.insert("x-id", "1".parse().unwrap());
        let response = into_http(Committed {
            status: http::StatusCode::UNAUTHORIZED,
            reason: Some("Token expired".to_string()),
            headers,
            body: ResponseBody::Full("denied".into()),
        });

        assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["x-id"], "1");
        let phrase = response.extensions().get::<ReasonPhrase>().unwrap();
        assert_eq!(phrase.as_bytes(), b"Token expired");
    }

    #[test]
    fn test_into_http_without_reason() {
        let response = into_http(Committed {
            status: http::StatusCode::OK,
            reason: None,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        });
        assert!(response.extensions().get::<ReasonPhrase>().is_none());
    }

    #[test]
    fn test_builder_defaults() {
        let server = Server::builder().build();
        assert_eq!(server.config().http_addr(), crate::config::DEFAULT_HTTP_ADDR);
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        let server = Server::builder()
            .config(ServerConfig::builder().http_addr("nowhere").build())
            .build();
        assert!(matches!(
            server.bind().await,
            Err(ServerError::InvalidAddress { .. })
        ));
    }
}
