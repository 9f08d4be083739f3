//! Ready line (DREQ) tracking.
//!
//! The chip raises its ready line while it can take at least 32 more data
//! bytes or another register command. [`ReadyLine`] is shared between the
//! worker thread, configuration callers and, in edge-driven mode, the
//! platform's pin-change handler. It never takes the slot lock, so an edge
//! can always be delivered while a register transaction is in flight.

use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::{Error as _, InputPin};
use tracing::{trace, warn};

use crate::config::ReadinessMode;
use crate::constants::READY_POLL_INTERVAL;
use crate::sync::{lock, wait_while};

/// Shared view of one chip's ready line.
pub struct ReadyLine<P> {
    pin: Mutex<P>,
    mode: ReadinessMode,
    bypass: bool,
    /// Last level seen by [`on_edge`](Self::on_edge). Edge-driven mode only.
    level: Mutex<bool>,
    edge: Condvar,
}

impl<P: InputPin> ReadyLine<P> {
    /// Wrap `pin`. The current level is sampled once to seed the cache.
    ///
    /// With `bypass` set the line is reported ready unconditionally.
    pub fn new(mut pin: P, mode: ReadinessMode, bypass: bool) -> Self {
        let level = sample(&mut pin);
        Self {
            pin: Mutex::new(pin),
            mode,
            bypass,
            level: Mutex::new(level),
            edge: Condvar::new(),
        }
    }

    pub fn mode(&self) -> ReadinessMode {
        self.mode
    }

    /// Latest observed level.
    pub fn is_ready(&self) -> bool {
        if self.bypass {
            return true;
        }
        let ready = match self.mode {
            ReadinessMode::EdgeDriven => *lock(&self.level),
            ReadinessMode::Polled => sample(&mut *lock(&self.pin)),
        };
        trace!(ready, "ready line");
        ready
    }

    /// Block until the line is ready or `timeout` elapses. Returns the level
    /// at the end of the wait.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        if self.bypass {
            return true;
        }
        match self.mode {
            ReadinessMode::EdgeDriven => {
                let level = wait_while(&self.edge, lock(&self.level), timeout, |ready| !*ready);
                *level
            }
            ReadinessMode::Polled => {
                let deadline = Instant::now() + timeout;
                loop {
                    if self.is_ready() {
                        return true;
                    }
                    if Instant::now() >= deadline {
                        return false;
                    }
                    thread::sleep(READY_POLL_INTERVAL);
                }
            }
        }
    }

    /// Pin-change notification. Call from the platform's edge handler on
    /// both rising and falling edges; waiters wake when the line goes high.
    pub fn on_edge(&self) {
        let high = sample(&mut *lock(&self.pin));
        let mut level = lock(&self.level);
        *level = high;
        if high {
            self.edge.notify_all();
        }
    }
}

fn sample<P: InputPin>(pin: &mut P) -> bool {
    match pin.is_high() {
        Ok(high) => high,
        Err(e) => {
            warn!(kind = ?e.kind(), "ready line read failed");
            false
        }
    }
}
