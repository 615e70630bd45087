// ── Notification subscriptions ──
//
// `Stream` adapter over the bridge's broadcast channel, with an optional
// filter applied per item.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::notify::Notification;

pub use filter::NotificationFilter;

/// Filtered notification subscription.
///
/// A subscriber that falls behind the channel capacity skips the lost
/// items (logged) rather than ending the stream.
pub struct NotificationStream {
    inner: BroadcastStream<Arc<Notification>>,
    filter: NotificationFilter,
}

impl NotificationStream {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<Notification>>, filter: NotificationFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }
}

impl Stream for NotificationStream {
    type Item = Arc<Notification>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(notification))) => {
                    if self.filter.matches(&notification) {
                        return Poll::Ready(Some(notification));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "Notification subscriber lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
