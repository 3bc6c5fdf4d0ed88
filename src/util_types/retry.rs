use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Receiving half of a cancellation channel.
///
/// Cancellation fires when the sender publishes a value or is dropped.
pub type CancelReceiver = watch::Receiver<()>;

/// Sending half of a cancellation channel.
pub type CancelSender = watch::Sender<()>;

/// Smallest interval accepted by [`retry`]. A zero interval would make
/// [`tokio::time::interval`] panic.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError<E> {
    #[error("retry aborted after {attempts} attempt(s); last error: {last_error}")]
    Cancelled { attempts: usize, last_error: E },
}

impl<E> RetryError<E> {
    /// The error returned by the final attempt before cancellation.
    pub fn last_error(&self) -> &E {
        match self {
            Self::Cancelled { last_error, .. } => last_error,
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            Self::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Create a fresh cancellation channel.
pub fn cancel_channel() -> (CancelSender, CancelReceiver) {
    watch::channel(())
}

/// Run `attempt` until it succeeds or `cancel` fires.
///
/// The first attempt runs immediately; subsequent attempts run once per
/// `interval`. Between attempts the task sleeps on whichever comes first of
/// the next tick and the cancellation signal.
///
/// There is no built-in timeout. If `attempt` never succeeds and nobody ever
/// cancels, this future never resolves. Callers that need an upper bound must
/// fire `cancel` themselves.
pub async fn retry<T, E, F, Fut>(
    interval: Duration,
    mut cancel: CancelReceiver,
    mut attempt: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // the first tick of a tokio interval completes immediately.
    ticker.tick().await;

    let mut attempts = 0;
    loop {
        attempts += 1;
        let last_error = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        tracing::trace!("attempt #{} failed: {}. retrying", attempts, last_error);

        tokio::select! {
            biased;

            // an error here means the sender is gone, which counts as
            // cancellation as well.
            _ = cancel.changed() => {
                tracing::debug!("retry cancelled after {} attempt(s)", attempts);
                return Err(RetryError::Cancelled { attempts, last_error });
            }
            _ = ticker.tick() => {}
        }
    }
}
