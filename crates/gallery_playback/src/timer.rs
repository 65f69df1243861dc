//! Repeating tick timer backed by a tokio task.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// A cancellable repeating timer.
///
/// The callback first runs one full `period` after the timer starts, then
/// once per `period` until it returns `ControlFlow::Break` or the timer is
/// dropped. Dropping the timer aborts the task.
#[derive(Debug)]
pub(crate) struct TickTimer {
    task: JoinHandle<()>,
    period: Duration,
}

impl TickTimer {
    pub(crate) fn spawn<F>(runtime: &Handle, period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let task = runtime.spawn(async move {
            // Read the clock inside the task so the deadline follows the
            // runtime's clock, not the caller's.
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if on_tick().is_break() {
                    break;
                }
            }
        });
        Self { task, period }
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for TickTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_timer(period: Duration, limit: usize) -> (TickTimer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let timer = TickTimer::spawn(&Handle::current(), period, move || {
            if c.fetch_add(1, Ordering::SeqCst) + 1 >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        (timer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let (timer, count) = counting_timer(Duration::from_millis(100), usize::MAX);
        assert_eq!(timer.period(), Duration::from_millis(100));

        time::sleep(Duration::from_millis(99)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_stops_ticking() {
        let (_timer, count) = counting_timer(Duration::from_millis(10), 2);
        time::sleep(Duration::from_millis(105)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_spawn_from_outside_runtime_uses_runtime_clock() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _timer = TickTimer::spawn(runtime.handle(), Duration::from_millis(100), move || {
            c.fetch_add(1, Ordering::SeqCst);
            ControlFlow::Continue(())
        });

        runtime.block_on(async { time::sleep(Duration::from_millis(99)).await });
        assert_eq!(count.load(Ordering::SeqCst), 0);

        runtime.block_on(async { time::sleep(Duration::from_millis(2)).await });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        runtime.block_on(async { time::sleep(Duration::from_millis(200)).await });
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts() {
        let (timer, count) = counting_timer(Duration::from_millis(10), usize::MAX);
        time::sleep(Duration::from_millis(15)).await;
        drop(timer);
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
