//! Connects a [`Digester`] to a byte stream.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, warn};

use crate::digester::{Digester, Grammar, MessageHandler};
use crate::error::DecodeError;
use crate::metrics::{DecodeMetrics, PduKind};

const READ_BUFFER_SIZE: usize = 4096;

/// Passes results through while counting them.
struct CountingHandler<'a, H> {
    inner: &'a mut H,
    metrics: &'a DecodeMetrics,
}

impl<M: PduKind, H: MessageHandler<M>> MessageHandler<M> for CountingHandler<'_, H> {
    fn on_message_decoded(&mut self, message: M) {
        self.metrics.inc_pdu(message.pdu_kind());
        self.inner.on_message_decoded(message);
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        self.metrics.inc_error(error);
        self.inner.on_decode_error(error);
    }
}

/// One decoder per byte stream. Messages reach the handler in arrival order.
pub struct StatefulDecoder<G: Grammar> {
    digester: Digester<G>,
    metrics: Arc<DecodeMetrics>,
}

impl<G> StatefulDecoder<G>
where
    G: Grammar,
    G::Message: PduKind,
{
    pub fn new(digester: Digester<G>, metrics: Arc<DecodeMetrics>) -> Self {
        metrics.inc_streams();
        Self { digester, metrics }
    }

    pub fn digester(&self) -> &Digester<G> {
        &self.digester
    }

    pub fn metrics(&self) -> &Arc<DecodeMetrics> {
        &self.metrics
    }

    /// Decode one chunk. An `Err` is a framing error: the stream is no longer
    /// aligned and should be closed.
    pub fn feed<H>(&mut self, data: &[u8], handler: &mut H) -> Result<(), DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        self.feed_bytes(Bytes::copy_from_slice(data), handler)
    }

    fn feed_bytes<H>(&mut self, chunk: Bytes, handler: &mut H) -> Result<(), DecodeError>
    where
        H: MessageHandler<G::Message>,
    {
        let len = chunk.len();
        let started = Instant::now();
        let mut counting = CountingHandler {
            inner: handler,
            metrics: &self.metrics,
        };
        let result = self.digester.decode(chunk, &mut counting);
        self.metrics.observe_chunk(len, started.elapsed());
        if let Err(e) = &result {
            self.metrics.inc_error(e);
            error!("Closing stream after framing error: {}", e);
        }
        result
    }

    /// Call at end of input. Fails if a PDU was left incomplete.
    pub fn finish(&mut self) -> Result<(), DecodeError> {
        if self.digester.is_idle() {
            return Ok(());
        }
        let error = DecodeError::TruncatedInput {
            buffered: self.digester.pending_bytes(),
        };
        warn!("Input ended mid-PDU: {}", error);
        self.metrics.inc_error(&error);
        self.digester.reset();
        Err(error)
    }

    /// Read `reader` to the end, decoding as bytes arrive.
    pub async fn run<R, H>(&mut self, mut reader: R, handler: &mut H) -> Result<()>
    where
        R: AsyncRead + Unpin,
        H: MessageHandler<G::Message>,
    {
        let mut buffer = BytesMut::with_capacity(READ_BUFFER_SIZE);
        loop {
            buffer.reserve(READ_BUFFER_SIZE);
            let n = reader
                .read_buf(&mut buffer)
                .await
                .context("reading input stream")?;
            if n == 0 {
                debug!("End of input after {} bytes", self.digester.offset());
                break;
            }
            let chunk = buffer.split().freeze();
            self.feed_bytes(chunk, handler)?;
        }
        self.finish()?;
        Ok(())
    }
}
