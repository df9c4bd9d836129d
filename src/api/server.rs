//! TCP server for the line-delimited JSON protocol
//!
//! Each connection is read line by line; every line is handled on tokio's
//! blocking pool since the engine does synchronous store and ledger I/O.

use crate::api::backend::Backend;
use crate::api::protocol::Response;
use crate::errors::{CustodyError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Largest accepted request line
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// A connection idle this long is closed
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct CustodyServer {
    backend: Arc<Backend>,
    max_connections: usize,
}

impl CustodyServer {
    pub fn new(backend: Arc<Backend>, max_connections: usize) -> Self {
        Self {
            backend,
            max_connections: max_connections.max(1),
        }
    }

    /// Accept connections on `listener` until `shutdown` resolves
    pub async fn run(self, listener: TcpListener, shutdown: impl Future<Output = ()>) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Custody server listening on {}", local_addr);

        let limit = Arc::new(Semaphore::new(self.max_connections));
        let server = Arc::new(self);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let Ok(permit) = limit.clone().try_acquire_owned() else {
                                warn!("Connection limit reached ({}), rejecting {}", server.max_connections, peer);
                                drop(stream);
                                continue;
                            };
                            debug!("Accepted connection from {}", peer);
                            let server = Arc::clone(&server);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    warn!("Connection from {} failed: {}", peer, e);
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            warn!("Accept error: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Custody server stopped");
        Ok(())
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();

            let bytes_read = match tokio::time::timeout(IDLE_TIMEOUT, reader.read_line(&mut line)).await {
                Ok(read) => read?,
                Err(_) => {
                    debug!("Connection idle, closing");
                    break;
                }
            };
            if bytes_read == 0 {
                break;
            }

            if line.len() > MAX_REQUEST_SIZE {
                warn!("Request of {} bytes exceeds limit, disconnecting", line.len());
                let response = Response::parse_error("request too large");
                write_response(&mut writer, &response).await?;
                break;
            }

            let request = line.trim();
            if request.is_empty() {
                continue;
            }

            let request = request.to_owned();
            let backend = Arc::clone(&self.backend);
            let response = tokio::task::spawn_blocking(move || backend.process_line(&request))
                .await
                .map_err(|e| CustodyError::InternalError(format!("request task failed: {}", e)))?;

            write_response(&mut writer, &response).await?;
        }

        Ok(())
    }
}

async fn write_response(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    response: &Response,
) -> Result<()> {
    let mut body = serde_json::to_vec(response)
        .map_err(|e| CustodyError::EncodingFailure(e.to_string()))?;
    body.push(b'\n');
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
