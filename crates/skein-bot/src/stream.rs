//! Stream utilities for reactive event consumption.

use std::pin::Pin;

use futures::Stream;
use tokio::sync::broadcast;

/// Convert a broadcast receiver into an async Stream.
///
/// A lagged receiver skips the dropped items and keeps receiving; the
/// stream ends when the sender side is gone.
pub fn broadcast_to_stream<T: Clone + Send + 'static>(
    mut rx: broadcast::Receiver<T>,
) -> Pin<Box<dyn Stream<Item = T> + Send>> {
    Box::pin(async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(item) => yield item,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
