//! Connection state and pipelining over one RESP byte stream

use crate::protocol::{read_reply_limited, Command, Reply, DEFAULT_MAX_DEPTH};
use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};

/// Whether replies are read immediately or deferred to a batch drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Every command is answered before `submit` returns.
    Idle,
    /// Commands are written and counted; replies wait for `drain_batch`.
    Batching { pending: usize },
}

/// A single client connection using split read/write halves.
///
/// All methods take `&mut self`: one caller owns the stream at a time, and
/// replies are matched to commands purely by order.
pub struct Connection<R, W> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
    pipeline: PipelineState,
    desynced: bool,
    max_depth: usize,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wrap a reader and writer in buffered halves.
    pub fn new(reader: R, writer: W) -> Self {
        Connection {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            pipeline: PipelineState::Idle,
            desynced: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Reject replies nested more than `max_depth` arrays deep.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn pipeline_state(&self) -> PipelineState {
        self.pipeline
    }

    pub fn is_batching(&self) -> bool {
        matches!(self.pipeline, PipelineState::Batching { .. })
    }

    /// Commands written since `begin_batch` whose replies are still unread.
    pub fn pending(&self) -> usize {
        match self.pipeline {
            PipelineState::Idle => 0,
            PipelineState::Batching { pending } => pending,
        }
    }

    /// Whether an earlier failure left the stream at an unknown position.
    pub fn is_desynced(&self) -> bool {
        self.desynced
    }

    /// Underlying reader and writer.
    pub fn get_ref(&self) -> (&R, &W) {
        (self.reader.get_ref(), self.writer.get_ref())
    }

    pub(crate) fn mark_desynced(&mut self) {
        if !self.desynced {
            warn!("Connection desynchronized; it must be reconnected");
        }
        self.desynced = true;
    }

    /// Send a command.
    ///
    /// Outside a batch the reply is read and returned. Inside a batch the
    /// command is queued on the wire and `None` is returned.
    pub async fn submit(&mut self, command: &Command) -> Result<Option<Reply>> {
        self.ensure_synced()?;
        let result = self.submit_inner(command).await;
        self.track(result)
    }

    /// Send `name` (upper-cased) followed by `args`.
    pub async fn call<I, A>(&mut self, name: &str, args: I) -> Result<Option<Reply>>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let mut command = Command::new(name.to_uppercase());
        for arg in args {
            command.push_arg(arg);
        }
        self.submit(&command).await
    }

    /// Ask the server to close the connection.
    pub async fn quit(&mut self) -> Result<Option<Reply>> {
        let command = Command::inline("QUIT")?;
        self.submit(&command).await
    }

    /// Start deferring replies.
    ///
    /// Beginning again while a batch with queued commands is open is an
    /// error; the open batch is left untouched. Beginning again on an empty
    /// batch does nothing.
    pub fn begin_batch(&mut self) -> Result<()> {
        self.ensure_synced()?;
        match self.pipeline {
            PipelineState::Idle => {
                debug!("Pipeline batch started");
                self.pipeline = PipelineState::Batching { pending: 0 };
                Ok(())
            }
            PipelineState::Batching { pending: 0 } => Ok(()),
            PipelineState::Batching { pending } => Err(Error::Pipeline(format!(
                "A batch with {} queued commands is already open; drain it first",
                pending
            ))),
        }
    }

    /// Flush queued commands and read one reply per command, in order.
    ///
    /// Either every reply is returned or none is. The connection is idle
    /// again afterwards in both cases.
    pub async fn drain_batch(&mut self) -> Result<Vec<Reply>> {
        let pending = match self.pipeline {
            PipelineState::Idle => {
                return Err(Error::Pipeline("No batch is open".to_string()));
            }
            PipelineState::Batching { pending } => pending,
        };
        self.pipeline = PipelineState::Idle;
        self.ensure_synced()?;

        debug!(pending, "Draining pipeline batch");
        let result = self.drain_inner(pending).await;
        self.track(result)
    }

    /// Flush and shut down the write half.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let PipelineState::Batching { pending } = self.pipeline {
            if pending > 0 {
                warn!(pending, "Closing with undrained pipeline replies");
            }
            self.pipeline = PipelineState::Idle;
        }
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn submit_inner(&mut self, command: &Command) -> Result<Option<Reply>> {
        debug!(
            command = %command.name(),
            args = command.arg_count(),
            "Sending command"
        );
        // write_all retries short writes with the remainder
        self.writer.write_all(&command.encode()).await?;

        if let PipelineState::Batching { pending } = &mut self.pipeline {
            *pending += 1;
            return Ok(None);
        }

        self.writer.flush().await?;
        self.read_one().await.map(Some)
    }

    async fn drain_inner(&mut self, pending: usize) -> Result<Vec<Reply>> {
        self.writer.flush().await?;

        let mut replies = Vec::with_capacity(pending);
        for _ in 0..pending {
            replies.push(self.read_one().await?);
        }
        Ok(replies)
    }

    async fn read_one(&mut self) -> Result<Reply> {
        let reply = read_reply_limited(&mut self.reader, self.max_depth).await?;
        debug!(kind = reply.kind(), "Received reply");
        Ok(reply)
    }

    fn ensure_synced(&self) -> Result<()> {
        if self.desynced {
            return Err(Error::Connection(
                "Connection is desynchronized after an earlier failure; reconnect".to_string(),
            ));
        }
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            if e.desyncs_stream() {
                self.mark_desynced();
            }
        }
        result
    }
}
