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

use crate::alex::ALEX_ANTENNA_1;

#[derive(Debug, Clone, PartialEq)]
pub struct Transmitter {
    pub drive: u8,
    pub puresignal: bool,
    /// Feedback attenuation while PureSignal is sampling the PA output, dB.
    pub attenuation: u8,
    pub antenna: u32,
}

impl Default for Transmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transmitter {
    pub fn new() -> Transmitter {
        Transmitter {
            drive: 0x80,
            puresignal: false,
            attenuation: 0,
            antenna: ALEX_ANTENNA_1,
        }
    }
}
