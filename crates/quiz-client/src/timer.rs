//! Per-question countdown timer.
//!
//! The timer only produces one tick per second; the session state does the
//! counting. Each started countdown gets a fresh generation number that is
//! stamped on its ticks, so a consumer can drop ticks from a countdown that
//! was already replaced or cancelled.

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// One second elapsed on countdown `generation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub generation: u64,
}

/// Where a running countdown delivers its ticks.
pub struct TickSink {
    send: Box<dyn Fn(TimerTick) -> bool + Send + Sync>,
}

impl TickSink {
    pub fn new<F>(send: F) -> Self
    where
        F: Fn(TimerTick) -> bool + Send + Sync + 'static,
    {
        Self {
            send: Box::new(send),
        }
    }

    /// Deliver ticks into an existing channel, wrapped into its message type.
    pub fn channel<T: Send + 'static>(tx: mpsc::UnboundedSender<T>, wrap: fn(TimerTick) -> T) -> Self {
        Self::new(move |tick| tx.send(wrap(tick)).is_ok())
    }

    /// Returns `false` once the receiving side is gone.
    pub fn send(&self, tick: TimerTick) -> bool {
        (self.send)(tick)
    }
}

impl fmt::Debug for TickSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickSink").finish_non_exhaustive()
    }
}

/// A cancellable, single-instance countdown.
pub trait QuestionTimer: Send {
    /// Start ticking once per second for `seconds` ticks, cancelling any
    /// countdown already running. Returns the generation of the new countdown.
    fn start(&mut self, seconds: u32, sink: TickSink) -> u64;

    fn cancel(&mut self);

    fn is_active(&self) -> bool;
}

/// [`QuestionTimer`] backed by a spawned `tokio::time::interval` task.
#[derive(Debug, Default)]
pub struct TokioQuestionTimer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TokioQuestionTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuestionTimer for TokioQuestionTimer {
    fn start(&mut self, seconds: u32, sink: TickSink) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;

        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            for _ in 0..seconds {
                interval.tick().await;
                if !sink.send(TimerTick { generation }) {
                    break;
                }
            }
        }));
        tracing::debug!(generation, seconds, "countdown started");
        generation
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(generation = self.generation, "countdown cancelled");
        }
    }

    fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TokioQuestionTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> (TickSink, mpsc::UnboundedReceiver<TimerTick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TickSink::channel(tx, |tick| tick), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<TimerTick>) -> Vec<u64> {
        let mut seen = Vec::new();
        while let Ok(tick) = rx.try_recv() {
            seen.push(tick.generation);
        }
        seen
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second_then_stops() {
        let mut timer = TokioQuestionTimer::new();
        let (sink, mut rx) = sink();
        let generation = timer.start(3, sink);
        settle().await;
        assert!(timer.is_active());

        tokio::time::advance(Duration::from_millis(999)).await;
        settle().await;
        assert!(drain(&mut rx).is_empty());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(drain(&mut rx), vec![generation]);

        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(drain(&mut rx), vec![generation, generation]);
        assert!(!timer.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_replaces_the_previous_countdown() {
        let mut timer = TokioQuestionTimer::new();
        let (sink_a, mut rx_a) = sink();
        let (sink_b, mut rx_b) = sink();

        let a = timer.start(10, sink_a);
        settle().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        let b = timer.start(10, sink_b);
        assert_ne!(a, b);
        settle().await;

        // B ticks at 1.5s, 2.5s and 3.5s; A would have ticked at 1s, 2s and 3s.
        tokio::time::advance(Duration::from_millis(3_700)).await;
        settle().await;
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![b, b, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let mut timer = TokioQuestionTimer::new();
        let (sink, mut rx) = sink();
        timer.start(10, sink);
        settle().await;
        timer.cancel();
        assert!(!timer.is_active());

        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;
        assert!(drain(&mut rx).is_empty());
    }
}
