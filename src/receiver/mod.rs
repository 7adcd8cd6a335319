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

use crate::modes::Modes;

pub const DEFAULT_SAMPLE_RATE: u32 = 384000;
pub const SAMPLE_RATES: [u32; 6] = [48000, 96000, 192000, 384000, 768000, 1536000];

#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub frequency: f64,
    pub mode: Modes,
    pub sample_rate: u32,
    pub adc: usize,
    pub cw_pitch: f64,
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    pub fn new() -> Receiver {
        Receiver {
            frequency: 14_175_000.0,
            mode: Modes::USB,
            sample_rate: DEFAULT_SAMPLE_RATE,
            adc: 0,
            cw_pitch: 650.0,
        }
    }

    /// Frequency the DDC is tuned to. In CW the carrier is offset so the
    /// signal lands on the side tone pitch.
    pub fn ddc_frequency(&self) -> f64 {
        match self.mode {
            Modes::CWL => self.frequency + self.cw_pitch,
            Modes::CWU => self.frequency - self.cw_pitch,
            _ => self.frequency,
        }
    }

    /// Sample rate field of the receive specific packet.
    pub fn sample_rate_khz(&self) -> u16 {
        (self.sample_rate / 1000) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cw_offsets() {
        let mut rx = Receiver::new();
        rx.frequency = 7_030_000.0;
        assert_eq!(rx.ddc_frequency(), 7_030_000.0);
        rx.mode = Modes::CWU;
        assert_eq!(rx.ddc_frequency(), 7_029_350.0);
        rx.mode = Modes::CWL;
        assert_eq!(rx.ddc_frequency(), 7_030_650.0);
        assert_eq!(rx.sample_rate_khz(), 384);
    }
}
