use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::generation_client::{Fragment, FragmentStream, GenerationError};

/// One fragment in flight at a time: the producer waits for the consumer to
/// take the previous one before pulling the next from the backend.
pub const FRAGMENT_CHANNEL_CAPACITY: usize = 1;

/// Drain `stream` on a separate task into a bounded channel.
///
/// The producer stops after forwarding an error, when the stream ends, or
/// as soon as the receiver is dropped.
pub fn spawn_fragment_producer(
    mut stream: FragmentStream,
) -> (
    mpsc::Receiver<Result<Fragment, GenerationError>>,
    JoinHandle<()>,
) {
    let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);

    let handle = tokio::spawn(async move {
        while let Some(item) = stream.next().await {
            let is_err = item.is_err();
            if tx.send(item).await.is_err() {
                debug!("Fragment consumer went away, stopping producer");
                return;
            }
            if is_err {
                return;
            }
        }
    });

    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_forwards_in_order_then_closes() {
        let items: Vec<Result<Fragment, GenerationError>> =
            vec![Ok(b"a".to_vec()), Ok(b"b".to_vec()), Ok(b"c".to_vec())];
        let (mut rx, handle) = spawn_fragment_producer(Box::pin(stream::iter(items)));

        let mut received = Vec::new();
        while let Some(item) = rx.recv().await {
            received.push(item.unwrap());
        }

        assert_eq!(received, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_ends_the_producer() {
        let items: Vec<Result<Fragment, GenerationError>> = vec![
            Ok(b"partial".to_vec()),
            Err(GenerationError::Backend("boom".into())),
            Ok(b"never".to_vec()),
        ];
        let (mut rx, handle) = spawn_fragment_producer(Box::pin(stream::iter(items)));

        assert!(rx.recv().await.unwrap().is_ok());
        assert!(matches!(rx.recv().await, Some(Err(GenerationError::Backend(_)))));
        assert!(rx.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_producer_is_backpressured_and_stops_on_drop() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let source = stream::iter(0..100).map(move |i| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<Fragment, GenerationError>(vec![i as u8])
        });
        let (mut rx, handle) = spawn_fragment_producer(Box::pin(source));

        assert_eq!(rx.recv().await.unwrap().unwrap(), vec![0]);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        // One taken, one buffered, one waiting to be sent
        assert!(pulled.load(Ordering::SeqCst) <= 3);

        drop(rx);
        handle.await.unwrap();
        assert!(pulled.load(Ordering::SeqCst) < 100);
    }
}
