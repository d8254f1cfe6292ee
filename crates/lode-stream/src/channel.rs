use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

use crate::error::{StreamError, StreamResult};
use crate::guarded::GuardedStream;

/// Abort slot shared between the producer and the consumer.
#[derive(Debug, Default)]
struct AbortSlot(Mutex<Option<StreamError>>);

impl AbortSlot {
    fn record(&self, err: StreamError) {
        let mut slot = self.0.lock().expect("lock poisoned");
        // The first abort wins.
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    fn take(&self) -> Option<StreamError> {
        self.0.lock().expect("lock poisoned").take()
    }
}

/// Create a bounded producer/consumer pair.
///
/// The producer pushes chunks through [`GuardedSender::send`] and ends the
/// stream with [`GuardedSender::finish`]. Aborting (or dropping the sender
/// without finishing) records an error that the consumer sees on its next
/// poll, even if it had not started reading yet and chunks are still
/// buffered.
pub fn channel(capacity: usize) -> (GuardedSender, GuardedStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let slot = Arc::new(AbortSlot::default());
    let sender = GuardedSender {
        tx: Some(tx),
        slot: Arc::clone(&slot),
        finished: false,
    };
    let source = ChannelSource { rx, slot };
    (sender, GuardedStream::new(source))
}

// ---------------------------------------------------------------------------
// Producer side
// ---------------------------------------------------------------------------

/// Producer half of a guarded channel.
#[derive(Debug)]
pub struct GuardedSender {
    tx: Option<mpsc::Sender<Bytes>>,
    slot: Arc<AbortSlot>,
    finished: bool,
}

impl GuardedSender {
    /// Push one chunk, waiting for buffer space.
    ///
    /// Fails with [`StreamError::Closed`] once the consumer is gone.
    pub async fn send(&mut self, chunk: impl Into<Bytes>) -> StreamResult<()> {
        let tx = self.tx.as_ref().ok_or(StreamError::Closed)?;
        tx.send(chunk.into()).await.map_err(|_| StreamError::Closed)
    }

    /// End the stream cleanly.
    pub fn finish(mut self) {
        self.finished = true;
    }

    /// End the stream with an error.
    pub fn abort(mut self, err: StreamError) {
        tracing::debug!(error = %err, "guarded channel aborted by producer");
        self.slot.record(err);
        self.finished = true;
    }

    /// Returns `true` if the consumer has dropped its end.
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, mpsc::Sender::is_closed)
    }
}

impl Drop for GuardedSender {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.record(StreamError::Closed);
        }
        // Dropping the sender wakes a consumer parked on `recv`.
        self.tx.take();
    }
}

// ---------------------------------------------------------------------------
// Consumer side
// ---------------------------------------------------------------------------

struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
    slot: Arc<AbortSlot>,
}

impl Stream for ChannelSource {
    type Item = StreamResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(err) = this.slot.take() {
            return Poll::Ready(Some(Err(err)));
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) => match this.slot.take() {
                Some(err) => Poll::Ready(Some(Err(err))),
                None => Poll::Ready(None),
            },
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn finished_channel_delivers_all_chunks() {
        let (mut tx, rx) = channel(4);
        tx.send("hello ").await.unwrap();
        tx.send("world").await.unwrap();
        tx.finish();
        assert_eq!(rx.read_to_string().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn abort_before_consumer_attaches_is_observed() {
        let (mut tx, rx) = channel(4);
        tx.send("buffered").await.unwrap();
        tx.abort(StreamError::aborted("client disconnected"));

        // The consumer only starts now; the error must not be lost and must
        // not be preceded by the buffered chunk.
        let mut rx = rx;
        let first = rx.next().await.unwrap();
        assert_eq!(first.unwrap_err(), StreamError::aborted("client disconnected"));
    }

    #[tokio::test]
    async fn dropped_sender_reports_closed() {
        let (mut tx, rx) = channel(4);
        tx.send("partial").await.unwrap();
        drop(tx);
        assert_eq!(rx.read_to_end().await.unwrap_err(), StreamError::Closed);
    }

    #[tokio::test]
    async fn abort_while_consumer_waits() {
        let (mut tx, rx) = channel(1);
        let reader = tokio::spawn(async move { rx.read_to_end().await });
        tx.send("first").await.unwrap();
        tokio::task::yield_now().await;
        tx.abort(StreamError::aborted("cancelled"));
        let result = reader.await.unwrap();
        assert_eq!(result.unwrap_err(), StreamError::aborted("cancelled"));
    }

    #[tokio::test]
    async fn send_after_consumer_dropped_fails() {
        let (mut tx, rx) = channel(1);
        drop(rx);
        assert!(tx.is_closed());
        assert_eq!(tx.send("late").await.unwrap_err(), StreamError::Closed);
        tx.finish();
    }
}
