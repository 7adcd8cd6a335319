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

// The radio does not report how full its TX IQ and audio FIFOs are. The
// estimate drains at the nominal rate between sends and fills by one frame
// per send.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::time::TimeSpec;
use nix::time::{clock_gettime, clock_nanosleep, ClockId, ClockNanosleepFlags};

use crate::config::PacingConfig;
use crate::protocol2::ring::OutboundRing;
use crate::protocol2::stats::EngineStats;
use crate::protocol2::wire::{write_sequence, SEQUENCE_SIZE};
use crate::radio::RadioHandle;

/// Estimated occupancy of the radio's FIFO, in samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FifoEstimate {
    level: f64,
    rate: f64,
}

impl FifoEstimate {
    pub fn new(rate: f64) -> FifoEstimate {
        FifoEstimate { level: 0.0, rate: rate.max(0.0) }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn drain(&mut self, elapsed: Duration) {
        self.level = (self.level - elapsed.as_secs_f64() * self.rate).max(0.0);
    }

    pub fn fill(&mut self, samples: usize) {
        self.level += samples as f64;
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }

    /// How long to hold the next frame back, if at all.
    pub fn backoff(&self, config: &PacingConfig) -> Option<Duration> {
        if self.level > config.very_high_water {
            Some(config.long_sleep())
        } else if self.level > config.high_water {
            Some(config.short_sleep())
        } else {
            None
        }
    }
}

pub fn monotonic_now() -> Option<TimeSpec> {
    clock_gettime(ClockId::CLOCK_MONOTONIC).ok()
}

/// Sleeps to an absolute CLOCK_MONOTONIC deadline, so an interrupted or
/// late wakeup does not push later deadlines out.
pub fn sleep_until(deadline: &TimeSpec) {
    loop {
        match clock_nanosleep(ClockId::CLOCK_MONOTONIC, ClockNanosleepFlags::TIMER_ABSTIME, deadline) {
            Err(Errno::EINTR) => continue,
            Err(e) => {
                log::warn!("clock_nanosleep: {}", e);
                break;
            }
            Ok(_) => break,
        }
    }
}

pub fn sleep_for(duration: Duration) {
    match monotonic_now() {
        Some(now) => sleep_until(&(now + TimeSpec::from_duration(duration))),
        None => std::thread::sleep(duration),
    }
}

pub struct Pacer {
    ring: Arc<OutboundRing>,
    socket: UdpSocket,
    destination: SocketAddr,
    frame_samples: usize,
    datagram: Vec<u8>,
    sequence: u32,
    fifo: FifoEstimate,
    config: PacingConfig,
    last_update: Option<Instant>,
    transmitting: bool,
}

impl Pacer {
    pub fn new(ring: Arc<OutboundRing>, socket: UdpSocket, destination: SocketAddr, frame_samples: usize, config: PacingConfig) -> Pacer {
        let datagram = vec![0u8; SEQUENCE_SIZE + ring.frame_bytes()];
        Pacer {
            ring,
            socket,
            destination,
            frame_samples,
            datagram,
            sequence: 0,
            fifo: FifoEstimate::new(config.rate),
            config,
            last_update: None,
            transmitting: false,
        }
    }

    fn drain_to(&mut self, now: Instant) {
        if let Some(last) = self.last_update {
            self.fifo.drain(now.saturating_duration_since(last));
        }
        self.last_update = Some(now);
    }

    /// Brings the estimate up to `now` and returns how long to hold the
    /// next frame. An RX/TX transition starts the estimate from empty.
    fn step(&mut self, transmitting: bool, now: Instant) -> Option<Duration> {
        if transmitting != self.transmitting {
            self.transmitting = transmitting;
            self.fifo.reset();
            self.last_update = None;
        }
        self.drain_to(now);
        self.fifo.backoff(&self.config)
    }

    // only a frame that left counts towards the estimate
    fn send_frame(&mut self) -> bool {
        write_sequence(&mut self.datagram, self.sequence);
        match self.socket.send_to(&self.datagram, self.destination) {
            Ok(_) => {
                self.sequence = self.sequence.wrapping_add(1);
                self.fifo.fill(self.frame_samples);
                true
            }
            Err(e) => {
                log::error!("{}: send to {} failed: {}", self.ring.name(), self.destination, e);
                false
            }
        }
    }

    pub fn run(mut self, running: &AtomicBool, radio: RadioHandle, stats: Arc<EngineStats>, sent: fn(&EngineStats)) {
        log::debug!("{}: pacing to {}", self.ring.name(), self.destination);
        loop {
            self.ring.wait();
            if !running.load(Ordering::Acquire) {
                break;
            }
            if !self.ring.pop_frame(&mut self.datagram[SEQUENCE_SIZE..]) {
                continue;
            }

            let transmitting = radio.snapshot().is_transmitting();
            if let Some(pause) = self.step(transmitting, Instant::now()) {
                log::trace!("{}: fifo {:.0}, holding {:?}", self.ring.name(), self.fifo.level(), pause);
                sleep_for(pause);
                self.drain_to(Instant::now());
            }

            if self.send_frame() {
                sent(&stats);
            }
        }
        log::debug!("{}: exit", self.ring.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol2::sink::LogDiagnostics;

    fn pacer(config: PacingConfig) -> (Pacer, UdpSocket) {
        let radio = UdpSocket::bind("127.0.0.1:0").unwrap();
        radio.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let ring = Arc::new(OutboundRing::new("test", 4 * 64, 8, Arc::new(LogDiagnostics)));
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let destination = radio.local_addr().unwrap();
        (Pacer::new(ring, socket, destination, 64, config), radio)
    }

    #[test]
    fn estimate_never_goes_negative() {
        let mut fifo = FifoEstimate::new(48000.0);
        fifo.drain(Duration::from_secs(5));
        assert_eq!(fifo.level(), 0.0);
        fifo.fill(64);
        fifo.drain(Duration::ZERO);
        assert_eq!(fifo.level(), 64.0);
        fifo.drain(Duration::from_millis(1));
        assert!(fifo.level() >= 0.0);
        assert!((fifo.level() - 16.0).abs() < 1e-9);
        fifo.reset();
        assert_eq!(fifo.level(), 0.0);
        fifo.drain(Duration::from_micros(1));
        assert_eq!(fifo.level(), 0.0);
    }

    #[test]
    fn backoff_follows_thresholds() {
        let config = PacingConfig::audio();
        let mut fifo = FifoEstimate::new(config.rate);
        assert_eq!(fifo.backoff(&config), None);
        fifo.fill(config.high_water as usize + 1);
        assert_eq!(fifo.backoff(&config), Some(config.short_sleep()));
        fifo.fill(config.very_high_water as usize);
        assert_eq!(fifo.backoff(&config), Some(config.long_sleep()));
    }

    #[test]
    fn absolute_sleep_reaches_deadline() {
        let start = Instant::now();
        sleep_for(Duration::from_millis(3));
        assert!(start.elapsed() >= Duration::from_millis(3));

        // a deadline in the past returns at once
        let past = monotonic_now().unwrap() - TimeSpec::from_duration(Duration::from_millis(10));
        let start = Instant::now();
        sleep_until(&past);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn step_resets_the_estimate_on_rx_tx_transitions() {
        let config = PacingConfig::audio();
        let (mut pacer, _radio) = pacer(config);
        let start = Instant::now();

        assert_eq!(pacer.step(false, start), None);
        pacer.fifo.fill(config.very_high_water as usize + 100);
        // zero elapsed time drains nothing
        assert_eq!(pacer.step(false, start), Some(config.long_sleep()));
        assert_eq!(pacer.fifo.level(), config.very_high_water + 100.0);

        // keying the transmitter starts over from an empty FIFO
        assert_eq!(pacer.step(true, start), None);
        assert_eq!(pacer.fifo.level(), 0.0);
        assert!(pacer.transmitting);

        pacer.fifo.fill(config.high_water as usize + 1);
        assert_eq!(pacer.step(true, start), Some(config.short_sleep()));
        assert_eq!(pacer.step(false, start + Duration::from_millis(1)), None);
        assert_eq!(pacer.fifo.level(), 0.0);
    }

    #[test]
    fn step_drains_at_the_nominal_rate() {
        let config = PacingConfig::audio();
        let (mut pacer, _radio) = pacer(config);
        let start = Instant::now();

        pacer.step(false, start);
        pacer.fifo.fill(config.very_high_water as usize + 24);
        assert_eq!(pacer.step(false, start), Some(config.long_sleep()));

        // 1 ms at 48 kHz drains 48 samples
        assert_eq!(pacer.step(false, start + Duration::from_millis(1)), Some(config.short_sleep()));
        assert!((pacer.fifo.level() - (config.very_high_water - 24.0)).abs() < 1e-6);
        assert_eq!(pacer.step(false, start + Duration::from_secs(1)), None);
        assert_eq!(pacer.fifo.level(), 0.0);
    }

    #[test]
    fn only_sent_frames_fill_the_estimate() {
        let (mut pacer, radio) = pacer(PacingConfig::tx_iq());
        pacer.step(true, Instant::now());
        assert!(pacer.send_frame());
        assert!(pacer.send_frame());
        assert_eq!(pacer.fifo.level(), 128.0);

        let mut buf = [0u8; 2048];
        let (len, _) = radio.recv_from(&mut buf).unwrap();
        assert_eq!(len, SEQUENCE_SIZE + 4 * 64);
        assert_eq!(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]), 0);
        let (_, _) = radio.recv_from(&mut buf).unwrap();
        assert_eq!(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]), 1);

        // a datagram too large for UDP fails to send and is not counted
        pacer.datagram = vec![0u8; 70_000];
        assert!(!pacer.send_frame());
        assert_eq!(pacer.fifo.level(), 128.0);
        assert_eq!(pacer.sequence, 2);
    }
}
