//! # 60Hz Clock
//!
//! A background thread that counts ticks at a fixed rate and posts one pulse
//! per tick. The pulse channel works as a counting semaphore: the simulation
//! thread blocks on it and runs one step per pulse, catching up after a slow
//! frame as long as the backlog has not overflowed.
//!
//! ## Drift
//!
//! Deadlines are absolute (`start + n * interval`), so sleep overshoot on one
//! tick is paid back on the next instead of accumulating. If the thread falls
//! more than a whole backlog behind it resynchronizes rather than bursting.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

/// Duration of one tick at `rate` Hz.
#[must_use]
pub fn tick_interval(rate: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / u64::from(rate.max(1)))
}

/// Cloneable read side of a running clock.
#[derive(Clone, Debug)]
pub struct ClockHandle {
    ticks: Arc<AtomicU64>,
    pulses: Receiver<u64>,
}

impl ClockHandle {
    /// Ticks counted since the clock started. Monotonic.
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Blocks until the next pulse. Returns the tick number, or `None` once
    /// the clock has stopped and every queued pulse is consumed.
    #[must_use]
    pub fn wait_pulse(&self) -> Option<u64> {
        self.pulses.recv().ok()
    }

    /// Like [`ClockHandle::wait_pulse`] with an upper bound on the wait.
    #[must_use]
    pub fn wait_pulse_timeout(&self, timeout: Duration) -> Option<u64> {
        match self.pulses.recv_timeout(timeout) {
            Ok(tick) => Some(tick),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Takes a queued pulse without blocking.
    #[must_use]
    pub fn try_pulse(&self) -> Option<u64> {
        self.pulses.try_recv().ok()
    }

    /// Pulses waiting to be consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pulses.len()
    }
}

/// The clock thread and its controls.
pub struct Clock {
    handle: ClockHandle,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    interval: Duration,
}

impl Clock {
    /// Starts ticking at `rate` Hz, queueing at most `backlog` pulses.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the thread cannot be spawned.
    pub fn start(rate: u32, backlog: usize) -> io::Result<Self> {
        let interval = tick_interval(rate);
        let ticks = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let (tx, rx) = bounded(backlog.max(1));

        let thread = {
            let ticks = Arc::clone(&ticks);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("bulletrain-clock".to_owned())
                .spawn(move || run(&ticks, &running, &tx, interval, backlog))?
        };

        tracing::debug!(rate, backlog, ?interval, "Clock started");
        Ok(Self {
            handle: ClockHandle { ticks, pulses: rx },
            running,
            thread: Some(thread),
            interval,
        })
    }

    /// A read handle for consumer threads.
    #[must_use]
    pub fn handle(&self) -> ClockHandle {
        self.handle.clone()
    }

    /// Ticks counted so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.handle.ticks()
    }

    /// Target tick duration.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// True until [`Clock::stop`] is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stops the thread and waits for it. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Clock thread panicked");
            }
            tracing::debug!(ticks = self.ticks(), "Clock stopped");
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("ticks", &self.ticks())
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

fn run(
    ticks: &AtomicU64,
    running: &AtomicBool,
    pulses: &Sender<u64>,
    interval: Duration,
    backlog: usize,
) {
    let mut epoch = Instant::now();
    let mut scheduled: u32 = 0;
    let max_lag = interval * u32::try_from(backlog.max(1)).unwrap_or(u32::MAX);

    while running.load(Ordering::Acquire) {
        scheduled = scheduled.wrapping_add(1);
        let deadline = epoch + interval * scheduled;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else if now - deadline > max_lag {
            tracing::warn!(lag = ?(now - deadline), "Clock fell behind, resynchronizing");
            epoch = now;
            scheduled = 0;
        }
        if !running.load(Ordering::Acquire) {
            break;
        }

        let tick = ticks.fetch_add(1, Ordering::AcqRel) + 1;
        match pulses.try_send(tick) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }

        // Keep the multiplier small; rebase every so often
        if scheduled >= 1 << 20 {
            epoch += interval * scheduled;
            scheduled = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval() {
        assert_eq!(tick_interval(60), Duration::from_nanos(16_666_666));
        assert_eq!(tick_interval(1000), Duration::from_millis(1));
    }

    #[test]
    fn test_ticks_and_pulses() {
        let mut clock = Clock::start(1000, 64).unwrap();
        let handle = clock.handle();

        let first = handle.wait_pulse_timeout(Duration::from_secs(1)).unwrap();
        let second = handle.wait_pulse_timeout(Duration::from_secs(1)).unwrap();
        assert!(second > first);
        assert!(handle.ticks() >= second);

        clock.stop();
        assert!(!clock.is_running());
        let after = clock.ticks();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(clock.ticks(), after);
    }

    #[test]
    fn test_backlog_is_bounded() {
        let clock = Clock::start(1000, 4).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(clock.handle().pending() <= 4);
        assert!(clock.ticks() > 4);
    }

    #[test]
    fn test_drop_stops_thread() {
        let handle = {
            let clock = Clock::start(1000, 2).unwrap();
            clock.handle()
        };
        let frozen = handle.ticks();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(handle.ticks(), frozen);
    }
}
