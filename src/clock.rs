//! Uptime clock.
//!
//! Every timestamp on the board is seconds of uptime as `f64`.  On Linux the
//! source is `CLOCK_BOOTTIME`, which keeps counting across suspend, so
//! intervals measured across a suspend stay correct.  Tests use
//! [`ManualClock`], whose `sleep` just moves time forward.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Seconds since boot.
    fn uptime(&self) -> f64;

    /// Block for `secs` seconds.  Non-positive values return at once.
    fn sleep(&self, secs: f64);

    fn wall_clock(&self) -> SystemTime {
        SystemTime::now()
    }
}

// ───────────────────────────────────────────────────────────────
// Boot clock
// ───────────────────────────────────────────────────────────────

pub struct BootClock {
    start: Instant,
}

impl BootClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for BootClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn boot_time() -> Option<f64> {
    use nix::time::{ClockId, clock_gettime};

    clock_gettime(ClockId::CLOCK_BOOTTIME)
        .ok()
        .map(|ts| ts.tv_sec() as f64 + ts.tv_nsec() as f64 * 1e-9)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn boot_time() -> Option<f64> {
    None
}

impl Clock for BootClock {
    fn uptime(&self) -> f64 {
        boot_time().unwrap_or_else(|| self.start.elapsed().as_secs_f64())
    }

    fn sleep(&self, secs: f64) {
        if secs > 0.0 && secs.is_finite() {
            thread::sleep(Duration::from_secs_f64(secs));
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Manual clock
// ───────────────────────────────────────────────────────────────

/// Deterministic clock for tests.  Wall-clock time is the epoch plus uptime.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new(start_secs: f64) -> Self {
        let clock = Self::default();
        clock.set(start_secs);
        clock
    }

    pub fn set(&self, secs: f64) {
        self.micros.store(to_micros(secs), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.micros.fetch_add(to_micros(secs), Ordering::SeqCst);
    }
}

fn to_micros(secs: f64) -> u64 {
    (secs.max(0.0) * 1e6).round() as u64
}

impl Clock for ManualClock {
    fn uptime(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1e6
    }

    fn sleep(&self, secs: f64) {
        if secs > 0.0 && secs.is_finite() {
            let micros = to_micros(secs).max(1);
            self.micros.fetch_add(micros, Ordering::SeqCst);
        }
        // Let real worker threads make progress while tests spin on time.
        thread::yield_now();
    }

    fn wall_clock(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// Sleep until `secs` seconds of uptime have really passed, re-sleeping
/// after early wake-ups.
pub fn delay(clock: &dyn Clock, secs: f64) {
    let end = clock.uptime() + secs;
    let mut remaining = secs;
    while remaining > 0.0 {
        clock.sleep(remaining);
        remaining = end - clock.uptime();
    }
}
