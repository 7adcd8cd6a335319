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

//! Device state shared between the UI and the protocol threads.
//!
//! A [`Radio`] is an immutable snapshot. The [`RadioHandle`] holds the
//! current one; writers clone it, modify the clone and publish it whole,
//! so a protocol thread always works on one consistent snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::adc::Adc;
use crate::device::Device;
use crate::modes::Modes;
use crate::receiver::Receiver;
use crate::transmitter::Transmitter;

pub const MAX_RECEIVERS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterBoards {
    NONE,
    ALEX,
    APOLLO,
    N2ADR,
}

#[derive(Debug, PartialEq, Copy, Clone)]
pub enum Keyer {
    Straight,
    ModeA,
    ModeB,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Radio {
    pub receivers: usize,
    pub active_receiver: usize,
    pub split: bool,
    pub duplex: bool,
    pub receiver: Vec<Receiver>,
    pub transmitter: Transmitter,
    pub adc: Vec<Adc>,
    pub filter_board: FilterBoards,
    pub pa_enabled: bool,
    pub open_collector: u8,

    pub ptt: bool,
    pub mox: bool,
    pub vox: bool,
    pub tune: bool,
    pub dot: bool,
    pub dash: bool,
    pub cw_key_down: bool,

    pub diversity: bool,
    pub diversity_gain: f64,
    /// Degrees.
    pub diversity_phase: f64,

    pub cw_keyer_mode: Keyer,
    pub cw_keyer_internal: bool,
    pub cw_keys_reversed: bool,
    pub cw_keyer_speed: u8,
    pub cw_keyer_weight: u8,
    pub cw_keyer_spacing: bool,
    pub cw_keyer_ptt_delay: u8,
    pub cw_keyer_hang_time: u16,
    pub cw_breakin: bool,
    pub cw_keyer_sidetone_volume: u8,
    pub cw_keyer_sidetone_frequency: u16,

    pub line_in: bool,
    pub line_in_gain: u8,
    pub mic_boost: bool,
    pub mic_ptt: bool,
    pub mic_bias_ring: bool,
    pub mic_bias_enable: bool,
    pub mic_saturn_xlr: bool,
}

impl Radio {
    pub fn new(device: &Device) -> Radio {
        let receiver = (0..MAX_RECEIVERS).map(|_| Receiver::new()).collect();
        let adc = (0..device.adcs.max(1)).map(|_| Adc::new()).collect();

        Radio {
            receivers: 1,
            active_receiver: 0,
            split: false,
            duplex: false,
            receiver,
            transmitter: Transmitter::new(),
            adc,
            filter_board: FilterBoards::ALEX,
            pa_enabled: true,
            open_collector: 0,

            ptt: false,
            mox: false,
            vox: false,
            tune: false,
            dot: false,
            dash: false,
            cw_key_down: false,

            diversity: false,
            diversity_gain: 1.0,
            diversity_phase: 0.0,

            cw_keyer_mode: Keyer::Straight,
            cw_keyer_internal: true,
            cw_keys_reversed: false,
            cw_keyer_speed: 12,
            cw_keyer_weight: 30,
            cw_keyer_spacing: false,
            cw_keyer_ptt_delay: 20,
            cw_keyer_hang_time: 300,
            cw_breakin: false,
            cw_keyer_sidetone_volume: 20,
            cw_keyer_sidetone_frequency: 650,

            line_in: false,
            line_in_gain: 0,
            mic_boost: true,
            mic_ptt: true,
            mic_bias_ring: false,
            mic_bias_enable: true,
            mic_saturn_xlr: false,
        }
    }

    pub fn is_transmitting(&self) -> bool {
        self.mox | self.ptt | self.vox | self.tune
    }

    /// Receiver whose frequency and mode the transmitter follows.
    pub fn tx_receiver(&self) -> &Receiver {
        let index = if self.split && self.receiver.len() > 1 {
            1 - self.active_receiver.min(1)
        } else {
            self.active_receiver
        };
        &self.receiver[index.min(self.receiver.len() - 1)]
    }

    pub fn transmit_mode(&self) -> Modes {
        self.tx_receiver().mode
    }

    pub fn tx_frequency(&self) -> f64 {
        self.tx_receiver().frequency
    }

    pub fn adc(&self, n: usize) -> Adc {
        self.adc.get(n).cloned().unwrap_or_default()
    }
}

/// The single authority over the current [`Radio`] snapshot.
#[derive(Clone, Debug)]
pub struct RadioHandle {
    current: Arc<RwLock<Arc<Radio>>>,
    generation: Arc<AtomicU64>,
}

impl RadioHandle {
    pub fn new(radio: Radio) -> RadioHandle {
        RadioHandle {
            current: Arc::new(RwLock::new(Arc::new(radio))),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> Arc<Radio> {
        self.current.read().clone()
    }

    /// Bumped on every publish.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Clones the current snapshot, applies `change` and publishes the
    /// result. Returns the new generation.
    pub fn update<F: FnOnce(&mut Radio)>(&self, change: F) -> u64 {
        let mut current = self.current.write();
        let mut next = Radio::clone(&current);
        change(&mut next);
        *current = Arc::new(next);
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::thread;

    use crate::device::ORION_2;

    fn radio() -> Radio {
        Radio::new(&Device::new(IpAddr::V4(Ipv4Addr::LOCALHOST), ORION_2))
    }

    #[test]
    fn transmit_follows_split() {
        let mut r = radio();
        r.receiver[0].frequency = 7_100_000.0;
        r.receiver[1].frequency = 7_150_000.0;
        r.receiver[1].mode = Modes::CWU;
        assert_eq!(r.tx_frequency(), 7_100_000.0);
        r.split = true;
        assert_eq!(r.tx_frequency(), 7_150_000.0);
        assert!(r.transmit_mode().is_cw());
        assert!(!r.is_transmitting());
        r.tune = true;
        assert!(r.is_transmitting());
    }

    #[test]
    fn old_snapshots_are_unchanged() {
        let handle = RadioHandle::new(radio());
        let before = handle.snapshot();
        let generation = handle.update(|r| r.mox = true);
        assert_eq!(generation, 1);
        assert!(!before.mox);
        assert!(handle.snapshot().mox);
        assert_eq!(handle.generation(), 1);
    }

    #[test]
    fn concurrent_writers_are_all_applied() {
        let handle = RadioHandle::new(radio());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        handle.update(|r| r.open_collector = r.open_collector.wrapping_add(1));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }
        assert_eq!(handle.generation(), 1000);
        assert_eq!(handle.snapshot().open_collector, (1000 % 256) as u8);
    }
}
