// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Timer
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Named-split stopwatch for solver timing.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Timer {
    started: Option<Instant>,
    lap: Duration,
    splits: HashMap<String, Duration>,
}

impl Timer {
    pub fn new() -> Self {
        Timer::default()
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Stop the stopwatch, remembering the elapsed lap time.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.lap = started.elapsed();
        }
    }

    /// Accumulate the last lap into a named split.
    pub fn record_split(&mut self, name: &str) {
        *self.splits.entry(name.to_string()).or_default() += self.lap;
    }

    /// Accumulated seconds for a named split; 0 if never recorded.
    pub fn split(&self, name: &str) -> f64 {
        self.splits
            .get(name)
            .map(Duration::as_secs_f64)
            .unwrap_or(0.0)
    }

    pub fn clear_split(&mut self, name: &str) {
        self.splits.remove(name);
    }

    pub fn clear_splits(&mut self) {
        self.splits.clear();
        self.lap = Duration::ZERO;
    }
}
