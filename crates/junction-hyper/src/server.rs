//! Embedded HTTP server
//!
//! A thin tokio accept loop binding the route runner to hyper: one task per
//! connection, one [`HyperRequest`]/[`HyperResponse`] pair per request. The
//! runner finalizes responses itself, including error mapping, so this layer
//! only logs the returned error and ships the buffered response.

use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use junction_core::{ApiError, HttpResponse, SessionServices};
use junction_router::RouteRunner;

use crate::request::HyperRequest;
use crate::response::HyperResponse;

/// Configuration for the embedded server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Maximum request body size
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// HTTP server wrapping a route runner
pub struct JunctionServer<S, P>
where
    S: Send + Sync,
    P: SessionServices,
{
    config: ServerConfig,
    runner: Arc<RouteRunner<S, P>>,
}

impl<S, P> JunctionServer<S, P>
where
    S: Send + Sync + 'static,
    P: SessionServices + 'static,
{
    pub fn new(config: ServerConfig, runner: RouteRunner<S, P>) -> Self {
        Self {
            config,
            runner: Arc::new(runner),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the accept loop until the process exits
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        info!("junction server listening on {}", self.config.bind_address);

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            debug!("new connection from {}", peer_addr);

            let runner = Arc::clone(&self.runner);
            let config = self.config.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    handle_request(req, Arc::clone(&runner), config.clone())
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    let err_str = err.to_string();
                    if err_str.contains("connection closed before message completed") {
                        debug!("client disconnected: {}", err);
                    } else {
                        error!("error serving connection: {}", err);
                    }
                }
            });
        }
    }
}

async fn handle_request<S, P>(
    req: hyper::Request<hyper::body::Incoming>,
    runner: Arc<RouteRunner<S, P>>,
    config: ServerConfig,
) -> Result<hyper::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible>
where
    S: Send + Sync,
    P: SessionServices,
{
    let mut request = match HyperRequest::from_hyper(req, config.max_body_size).await {
        Ok(request) => request,
        // the request never reached the runner; map the transport-level
        // error through the same registry
        Err(err) => return Ok(transport_error(&runner, err)),
    };
    let mut response = HyperResponse::new();
    if let Err(err) = runner.run(&mut request, &mut response).await {
        // the response is already finalized; nothing left to write
        debug!("request failed: {}", err);
    }
    Ok(response.into_hyper())
}

fn transport_error<S, P>(
    runner: &RouteRunner<S, P>,
    mut err: ApiError,
) -> hyper::Response<http_body_util::Full<bytes::Bytes>>
where
    S: Send + Sync,
    P: SessionServices,
{
    err.ensure_trace_id();
    let (status, body, _) = runner.errors().render(&err);
    let mut response = HyperResponse::new();
    response.set_status(status);
    response.set_json(serde_json::to_value(&body).unwrap_or(serde_json::Value::Null));
    response.end();
    response.into_hyper()
}
