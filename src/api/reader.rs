use crate::error::TransportError;
use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// Single reader over a response body.
///
/// The body is held until completion, a transport error, or an explicit
/// [`release`](Self::release); whichever comes first drops it, and `Drop`
/// covers every other exit path. After release `next_chunk` yields `None`.
pub struct StreamReader<S> {
    source: Option<S>,
}

impl<S> StreamReader<S>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
        }
    }

    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, TransportError>> {
        let source = self.source.as_mut()?;
        match source.next().await {
            Some(Ok(chunk)) => Some(Ok(chunk)),
            Some(Err(error)) => {
                self.release();
                Some(Err(TransportError::from(error)))
            }
            None => {
                self.release();
                None
            }
        }
    }

    /// Drop the underlying body. Returns `true` only for the call that
    /// actually released it.
    pub fn release(&mut self) -> bool {
        self.source.take().is_some()
    }

    pub fn is_released(&self) -> bool {
        self.source.is_none()
    }
}

impl<S> Drop for StreamReader<S> {
    fn drop(&mut self) {
        self.source.take();
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use anyhow::Result;
    use bytes::Bytes;
    use futures::Stream;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio_util::sync::CancellationToken;

    /// Scripted transport that counts how many times it was closed.
    pub struct FakeTransport {
        items: VecDeque<Result<Bytes>>,
        closes: Arc<AtomicUsize>,
        cancel_when_drained: Option<CancellationToken>,
    }

    impl FakeTransport {
        pub fn new(chunks: &[&[u8]]) -> (Self, Arc<AtomicUsize>) {
            let closes = Arc::new(AtomicUsize::new(0));
            let transport = Self {
                items: chunks
                    .iter()
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect(),
                closes: Arc::clone(&closes),
                cancel_when_drained: None,
            };
            (transport, closes)
        }

        pub fn then_fail(mut self, message: &str) -> Self {
            self.items.push_back(Err(anyhow::anyhow!(message.to_string())));
            self
        }

        /// Instead of completing, cancel `token` and hang once the scripted
        /// chunks run out.
        pub fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
            self.cancel_when_drained = Some(token);
            self
        }
    }

    impl Stream for FakeTransport {
        type Item = Result<Bytes>;

        fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            if let Some(item) = self.items.pop_front() {
                return Poll::Ready(Some(item));
            }
            match &self.cancel_when_drained {
                Some(token) => {
                    token.cancel();
                    Poll::Pending
                }
                None => Poll::Ready(None),
            }
        }
    }

    impl Drop for FakeTransport {
        fn drop(&mut self) {
            let previous = self.closes.fetch_add(1, Ordering::SeqCst);
            assert_eq!(previous, 0, "transport closed more than once");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeTransport;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_reader_yields_chunks_then_releases_on_completion() {
        let (transport, closes) = FakeTransport::new(&[b"one", b"two"]);
        let mut reader = StreamReader::new(transport);

        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), "one");
        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), "two");
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        assert!(reader.next_chunk().await.is_none());
        assert!(reader.is_released());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(reader.next_chunk().await.is_none());

        drop(reader);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reader_surfaces_transport_error_and_stops() {
        let (transport, closes) = FakeTransport::new(&[b"partial"]);
        let mut reader = StreamReader::new(transport.then_fail("connection reset"));

        assert!(reader.next_chunk().await.unwrap().is_ok());
        let error = reader.next_chunk().await.unwrap().unwrap_err();
        assert_eq!(error.message(), "connection reset");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(reader.next_chunk().await.is_none());
    }

    #[test]
    fn test_release_reports_only_first_call() {
        let (transport, closes) = FakeTransport::new(&[]);
        let mut reader = StreamReader::new(transport);
        assert!(reader.release());
        assert!(!reader.release());
        drop(reader);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
