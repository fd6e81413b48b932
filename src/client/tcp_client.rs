//! TCP client for connecting to a RESP server

use crate::client::connection::{Connection, PipelineState};
use crate::config::ClientConfig;
use crate::protocol::{Command, Reply};
use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

type TcpConnection = Connection<ReadHalf<TcpStream>, WriteHalf<TcpStream>>;

/// TCP client using split read/write halves.
pub struct TcpClient {
    connection: TcpConnection,
    config: ClientConfig,
}

impl TcpClient {
    /// Connect to the configured server, retrying with backoff.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let connection = open(&config).await?;
        Ok(TcpClient { connection, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.connection.pipeline_state()
    }

    pub fn is_desynced(&self) -> bool {
        self.connection.is_desynced()
    }

    /// Send a command; `None` while a batch is open.
    pub async fn submit(&mut self, command: &Command) -> Result<Option<Reply>> {
        let limit = self.config.io_timeout();
        let result = timed(limit, self.connection.submit(command)).await;
        self.settle(result)
    }

    /// Send `name` (upper-cased) followed by `args`.
    pub async fn call<I, A>(&mut self, name: &str, args: I) -> Result<Option<Reply>>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let limit = self.config.io_timeout();
        let result = timed(limit, self.connection.call(name, args)).await;
        self.settle(result)
    }

    pub fn begin_batch(&mut self) -> Result<()> {
        self.connection.begin_batch()
    }

    pub async fn drain_batch(&mut self) -> Result<Vec<Reply>> {
        let limit = self.config.io_timeout();
        let result = timed(limit, self.connection.drain_batch()).await;
        self.settle(result)
    }

    /// Send QUIT using the inline form.
    pub async fn quit(&mut self) -> Result<Option<Reply>> {
        let limit = self.config.io_timeout();
        let result = timed(limit, self.connection.quit()).await;
        self.settle(result)
    }

    /// Drop the current stream and connect again.
    ///
    /// Any open batch is discarded; the new connection starts idle.
    pub async fn reconnect(&mut self) -> Result<()> {
        let pending = self.connection.pending();
        if pending > 0 {
            warn!(pending, "Reconnecting with undrained pipeline replies");
        }
        self.connection = open(&self.config).await?;
        Ok(())
    }

    /// Flush and close the connection.
    pub async fn close(mut self) -> Result<()> {
        self.connection.shutdown().await?;
        info!(addr = %self.config.addr(), "Connection closed");
        Ok(())
    }

    fn settle<T>(&mut self, result: Result<T>) -> Result<T> {
        // a timed-out operation was dropped mid-flight
        if let Err(Error::Timeout(_)) = &result {
            self.connection.mark_desynced();
        }
        result
    }
}

async fn timed<T, F>(limit: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::Timeout(limit))?,
        None => fut.await,
    }
}

async fn open(config: &ClientConfig) -> Result<TcpConnection> {
    let socket = connect_with_retry(config).await?;
    socket.set_nodelay(true)?;
    let (reader, writer) = tokio::io::split(socket);
    Ok(Connection::new(reader, writer).with_max_depth(config.max_reply_depth))
}

/// Make up to `retry.attempts` connect attempts, doubling the delay between
/// them up to `retry.max_backoff`.
async fn connect_with_retry(config: &ClientConfig) -> Result<TcpStream> {
    let addr = config.addr();
    let attempts = config.retry.attempts.max(1);
    let mut backoff = config.retry.initial_backoff();
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        debug!(%addr, attempt, "Connecting");
        match tokio::time::timeout(config.connect_timeout(), TcpStream::connect(&addr)).await {
            Ok(Ok(socket)) => {
                info!(%addr, attempt, "Connected");
                return Ok(socket);
            }
            Ok(Err(e)) => {
                warn!(%addr, attempt, "Connect attempt failed: {}", e);
                last_error = e.to_string();
            }
            Err(_) => {
                warn!(%addr, attempt, "Connect attempt timed out");
                last_error = format!("timed out after {:?}", config.connect_timeout());
            }
        }

        if attempt < attempts {
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(config.retry.max_backoff());
        }
    }

    Err(Error::Connection(format!(
        "Failed to connect to {} after {} attempts: {}",
        addr, attempts, last_error
    )))
}
