//! Latest-wins rate limiting

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::debug;

use crate::types::MIN_THROTTLE_INTERVAL;

/// Adds [`throttle`](ThrottleExt::throttle) to every stream.
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `period`.
    ///
    /// Items that arrive while waiting replace each other; only the newest
    /// is emitted. The first item passes through immediately, and the last
    /// one is still delivered after the inner stream ends.
    fn throttle(self, period: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, period)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream returned by [`ThrottleExt::throttle`].
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        finished: bool,
        dropped: u64,
    }
}

impl<S: Stream> Throttle<S> {
    /// A zero `period` is raised to one nanosecond.
    pub fn new(stream: S, period: Duration) -> Self {
        let mut interval = interval(period.max(MIN_THROTTLE_INTERVAL));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self { stream, interval, pending: None, finished: false, dropped: 0 }
    }

    /// Items replaced by a newer one before they could be emitted.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        while !*this.finished {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if this.pending.replace(item).is_some() {
                        *this.dropped += 1;
                    }
                }
                Poll::Ready(None) => *this.finished = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_none() {
            if *this.finished {
                debug!(dropped = *this.dropped, "throttled stream ended");
                return Poll::Ready(None);
            }
            return Poll::Pending;
        }

        ready!(this.interval.poll_tick(cx));
        Poll::Ready(this.pending.take())
    }
}
