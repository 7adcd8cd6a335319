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

use crate::alex::*;

#[derive(Debug, Clone, PartialEq)]
pub struct Adc {
    pub rx_antenna: u32,
    pub random: bool,
    pub dither: bool,
    /// Step attenuator in the radio, in dB.
    pub attenuation: u8,
    /// Step attenuator on the Alex board, in dB.
    pub alex_attenuation: u32,
}

impl Default for Adc {
    fn default() -> Self {
        Self::new()
    }
}

impl Adc {
    pub fn new() -> Adc {
        Adc {
            rx_antenna: ALEX_ANTENNA_1,
            random: false,
            dither: false,
            attenuation: 0,
            alex_attenuation: 0,
        }
    }

    pub fn alex_bits(&self) -> u32 {
        self.rx_antenna | attenuation_bits(self.alex_attenuation)
    }
}
