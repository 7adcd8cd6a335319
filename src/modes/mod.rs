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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modes {
    LSB = 0,
    #[default]
    USB,
    DSB,
    CWL,
    CWU,
    FMN,
    AM,
    DIGU,
    SPEC,
    DIGL,
    SAM,
    DRM,
}

const NAMES: [&str; 12] = ["LSB", "USB", "DSB", "CWL", "CWU", "FMN", "AM", "DIGU", "SPEC", "DIGL", "SAM", "DRM"];

impl Modes {
    pub fn from_usize(value: usize) -> Option<Self> {
        match value {
            0 => Some(Modes::LSB),
            1 => Some(Modes::USB),
            2 => Some(Modes::DSB),
            3 => Some(Modes::CWL),
            4 => Some(Modes::CWU),
            5 => Some(Modes::FMN),
            6 => Some(Modes::AM),
            7 => Some(Modes::DIGU),
            8 => Some(Modes::SPEC),
            9 => Some(Modes::DIGL),
            10 => Some(Modes::SAM),
            11 => Some(Modes::DRM),
            _ => None,
        }
    }

    pub fn to_usize(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        NAMES[self.to_usize()]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(Modes::from_usize)
    }

    pub fn is_cw(&self) -> bool {
        matches!(self, Modes::CWL | Modes::CWU)
    }
}
