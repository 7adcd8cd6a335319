/*
    Copyright (C) 2025  John Melton G0ORX/N6LYT

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::time::TimeSpec;

use crate::config::TimerConfig;
use crate::protocol2::packets::Packets;
use crate::protocol2::pacing::{monotonic_now, sleep_for, sleep_until};

/// Fires at most once per interval. A late tick does not cause a burst of
/// catch up sends.
#[derive(Clone, Copy, Debug)]
pub struct Cadence {
    interval: Duration,
    next: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Cadence {
        Cadence { interval, next: None }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        match self.next {
            Some(next) if now < next => false,
            _ => {
                self.next = Some(now + self.interval);
                true
            }
        }
    }
}

/// Re-sends the control packets so a radio that missed one, or was
/// restarted, converges on the current state.
pub struct PeriodicTimer {
    tick: Duration,
    high_priority: Cadence,
    general: Cadence,
    receive_specific: Cadence,
    transmit_specific: Cadence,
}

impl PeriodicTimer {
    pub fn new(config: &TimerConfig) -> PeriodicTimer {
        let cadence = |ms: u64| {
            let mut cadence = Cadence::new(Duration::from_millis(ms));
            // the engine has just sent everything at start
            cadence.next = Some(Instant::now() + cadence.interval);
            cadence
        };
        PeriodicTimer {
            tick: Duration::from_millis(config.tick_ms.max(1)),
            high_priority: cadence(config.high_priority_ms),
            general: cadence(config.general_ms),
            receive_specific: cadence(config.receive_specific_ms),
            transmit_specific: cadence(config.transmit_specific_ms),
        }
    }

    fn fire(&mut self, now: Instant, packets: &Packets) {
        if self.high_priority.due(now) {
            packets.send_high_priority(true);
        }
        if self.general.due(now) {
            packets.send_general();
        }
        if self.receive_specific.due(now) {
            packets.send_receive_specific();
        }
        if self.transmit_specific.due(now) {
            packets.send_transmit_specific();
        }
    }

    pub fn run(mut self, running: &AtomicBool, packets: Arc<Packets>) {
        log::debug!("timer: tick {:?}", self.tick);
        let tick = TimeSpec::from_duration(self.tick);
        let mut deadline = monotonic_now();
        while running.load(Ordering::Acquire) {
            match deadline.as_mut() {
                Some(deadline) => {
                    *deadline = *deadline + tick;
                    sleep_until(deadline);
                }
                None => sleep_for(self.tick),
            }
            if !running.load(Ordering::Acquire) {
                break;
            }
            self.fire(Instant::now(), &packets);
        }
        log::debug!("timer: exit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_fires_once_per_interval() {
        let start = Instant::now();
        let mut cadence = Cadence::new(Duration::from_millis(100));
        assert!(cadence.due(start));
        assert!(!cadence.due(start + Duration::from_millis(50)));
        assert!(cadence.due(start + Duration::from_millis(100)));
        assert!(!cadence.due(start + Duration::from_millis(150)));
        // a long stall fires once, not three times
        assert!(cadence.due(start + Duration::from_millis(500)));
        assert!(!cadence.due(start + Duration::from_millis(550)));
    }

    #[test]
    fn timer_waits_a_full_interval_after_start() {
        let config = TimerConfig::default();
        let mut timer = PeriodicTimer::new(&config);
        let now = Instant::now();
        assert!(!timer.high_priority.due(now));
        assert!(timer.high_priority.due(now + Duration::from_millis(150)));
        assert!(!timer.general.due(now + Duration::from_millis(500)));
        assert!(timer.general.due(now + Duration::from_millis(1100)));
    }
}
