use std::fmt;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error::{StreamError, StreamResult};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum State {
    Open,
    Errored(StreamError),
    Done,
}

// ---------------------------------------------------------------------------
// GuardedStream
// ---------------------------------------------------------------------------

/// A single-consumer byte stream whose errors can never be lost.
///
/// The first error produced by the wrapped source is stored. From then on
/// every poll yields that same error, so a consumer that starts reading
/// after the failure still observes it. Consumers stop at the first `Err`.
///
/// Consuming operations take `self`, which makes "read at most once" a
/// compile-time property. Transforms ([`Self::map_chunks`],
/// [`Self::try_map_chunks`]) return a new `GuardedStream`.
pub struct GuardedStream {
    // Never locked: `get_mut` is used on every poll. The mutex only makes the
    // stream `Sync` so representations holding it can be shared by reference.
    inner: Option<Mutex<Source>>,
    state: State,
}

type Source = BoxStream<'static, StreamResult<Bytes>>;

impl GuardedStream {
    /// Guard an arbitrary byte stream.
    pub fn new<S, E>(source: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<StreamError>,
    {
        Self {
            inner: Some(Mutex::new(
                source
                    .map(|item| -> StreamResult<Bytes> { item.map_err(Into::into) })
                    .boxed(),
            )),
            state: State::Open,
        }
    }

    /// A stream yielding `data` as a single chunk.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        if data.is_empty() {
            return Self::empty();
        }
        Self::from_chunks(vec![data])
    }

    /// A stream yielding each chunk in order.
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        Self::new(stream::iter(chunks.into_iter().map(Ok::<_, StreamError>)))
    }

    /// A stream that ends immediately.
    pub fn empty() -> Self {
        Self {
            inner: None,
            state: State::Done,
        }
    }

    /// A stream already in the error state.
    pub fn failed(err: StreamError) -> Self {
        Self {
            inner: None,
            state: State::Errored(err),
        }
    }

    /// The stored error, if the source has failed.
    pub fn error(&self) -> Option<&StreamError> {
        match &self.state {
            State::Errored(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` once the stream has ended or failed.
    pub fn is_finished(&self) -> bool {
        !matches!(self.state, State::Open)
    }

    /// Transform every chunk, keeping the error guarantee.
    pub fn map_chunks<F>(self, mut f: F) -> Self
    where
        F: FnMut(Bytes) -> Bytes + Send + 'static,
    {
        self.try_map_chunks(move |chunk| Ok(f(chunk)))
    }

    /// Transform every chunk with a fallible function. The first failure
    /// becomes the stored error of the returned stream.
    pub fn try_map_chunks<F>(self, mut f: F) -> Self
    where
        F: FnMut(Bytes) -> StreamResult<Bytes> + Send + 'static,
    {
        if let State::Errored(err) = &self.state {
            return Self::failed(err.clone());
        }
        Self::new(self.map(move |item| item.and_then(&mut f)))
    }

    /// Drain the stream into one contiguous buffer.
    ///
    /// Fails with the stored error when the source failed, whether that
    /// happened before or during the read.
    pub async fn read_to_end(mut self) -> StreamResult<Bytes> {
        if let State::Errored(err) = &self.state {
            return Err(err.clone());
        }
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Drain the stream and decode it as UTF-8.
    pub async fn read_to_string(self) -> StreamResult<String> {
        let bytes = self.read_to_end().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| StreamError::Utf8(e.to_string()))
    }
}

impl Stream for GuardedStream {
    type Item = StreamResult<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match &this.state {
            State::Errored(err) => return Poll::Ready(Some(Err(err.clone()))),
            State::Done => return Poll::Ready(None),
            State::Open => {}
        }

        let Some(inner) = this.inner.as_mut() else {
            this.state = State::Done;
            return Poll::Ready(None);
        };
        let source = inner.get_mut().unwrap_or_else(PoisonError::into_inner);

        match source.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(err))) => {
                tracing::debug!(error = %err, "guarded stream source failed");
                this.inner = None;
                this.state = State::Errored(err.clone());
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.inner = None;
                this.state = State::Done;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl From<Bytes> for GuardedStream {
    fn from(data: Bytes) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&'static str> for GuardedStream {
    fn from(data: &'static str) -> Self {
        Self::from_bytes(Bytes::from_static(data.as_bytes()))
    }
}

impl fmt::Debug for GuardedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedStream")
            .field("state", &self.state)
            .finish()
    }
}

/// Guard a byte stream. Shorthand for [`GuardedStream::new`].
pub fn guard<S, E>(source: S) -> GuardedStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<StreamError>,
{
    GuardedStream::new(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn failing_after(chunks: &[&'static str], err: StreamError) -> GuardedStream {
        let mut items: Vec<StreamResult<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        items.push(Err(err));
        GuardedStream::new(stream::iter(items))
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reads_all_chunks_in_order() {
        let s = GuardedStream::from_chunks(vec![
            Bytes::from_static(b"he"),
            Bytes::from_static(b"ll"),
            Bytes::from_static(b"o"),
        ]);
        assert_eq!(s.read_to_string().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn empty_stream_reads_nothing() {
        let s = GuardedStream::empty();
        assert!(s.is_finished());
        assert!(s.read_to_end().await.unwrap().is_empty());
        assert!(GuardedStream::from_bytes("").is_finished());
    }

    #[tokio::test]
    async fn io_errors_convert_on_guard() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read")),
        ]);
        let err = guard(source).read_to_end().await.unwrap_err();
        assert!(matches!(
            err,
            StreamError::Io {
                kind: io::ErrorKind::UnexpectedEof,
                ..
            }
        ));
    }

    // -----------------------------------------------------------------------
    // Error retention
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn error_is_sticky_after_first_delivery() {
        let mut s = failing_after(&["partial"], StreamError::aborted("boom"));
        assert_eq!(s.next().await.unwrap().unwrap(), Bytes::from_static(b"partial"));
        let first = s.next().await.unwrap().unwrap_err();
        let second = s.next().await.unwrap().unwrap_err();
        assert_eq!(first, second);
        assert!(s.is_finished());
        assert_eq!(s.error(), Some(&StreamError::aborted("boom")));
    }

    #[tokio::test]
    async fn late_reader_observes_stored_error() {
        let mut s = failing_after(&[], StreamError::Closed);
        // Someone polled and ignored the failure.
        let _ = s.next().await;
        // A later full read must still fail.
        assert_eq!(s.read_to_end().await.unwrap_err(), StreamError::Closed);
    }

    #[tokio::test]
    async fn failed_stream_never_yields_data() {
        let mut s = GuardedStream::failed(StreamError::aborted("rejected"));
        assert!(s.next().await.unwrap().is_err());
        assert!(s.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn finished_stream_yields_none_repeatedly() {
        let mut s = GuardedStream::from_bytes("x");
        assert!(s.next().await.is_some());
        assert!(s.next().await.is_none());
        assert!(s.next().await.is_none());
    }

    // -----------------------------------------------------------------------
    // Transforms
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn map_chunks_transforms_content() {
        let s = GuardedStream::from_chunks(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"c")])
            .map_chunks(|chunk| Bytes::from(chunk.to_ascii_uppercase()));
        assert_eq!(s.read_to_string().await.unwrap(), "ABC");
    }

    #[tokio::test]
    async fn map_chunks_preserves_source_error() {
        let s = failing_after(&["ok"], StreamError::aborted("upstream"))
            .map_chunks(|chunk| chunk);
        assert_eq!(
            s.read_to_end().await.unwrap_err(),
            StreamError::aborted("upstream")
        );
    }

    #[tokio::test]
    async fn map_chunks_on_failed_stream_stays_failed() {
        let s = GuardedStream::failed(StreamError::Closed).map_chunks(|chunk| chunk);
        assert_eq!(s.error(), Some(&StreamError::Closed));
    }

    #[tokio::test]
    async fn try_map_chunks_failure_becomes_stored_error() {
        let mut s = GuardedStream::from_bytes("data")
            .try_map_chunks(|_| Err(StreamError::aborted("transform failed")));
        let first = s.next().await.unwrap().unwrap_err();
        assert_eq!(first, StreamError::aborted("transform failed"));
        assert_eq!(s.next().await.unwrap().unwrap_err(), first);
    }

    #[tokio::test]
    async fn read_to_string_rejects_invalid_utf8() {
        let s = GuardedStream::from_bytes(Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(
            s.read_to_string().await.unwrap_err(),
            StreamError::Utf8(_)
        ));
    }

    #[test]
    fn debug_shows_state() {
        let s = GuardedStream::failed(StreamError::Closed);
        let debug = format!("{s:?}");
        assert!(debug.contains("GuardedStream"));
        assert!(debug.contains("Errored"));
    }
}
