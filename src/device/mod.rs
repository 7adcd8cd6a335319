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

use std::net::{IpAddr, SocketAddr};

use crate::protocol2::actions::DdcLayout;

// board ids reported by protocol 2 discovery
pub const ATLAS: u8 = 0;
pub const HERMES: u8 = 1;
pub const HERMES_2: u8 = 2;
pub const ANGELIA: u8 = 3;
pub const ORION: u8 = 4;
pub const ORION_2: u8 = 5;
pub const HERMES_LITE: u8 = 6;
pub const SATURN: u8 = 10;

const BOARDS: [(u8, &str); 8] = [
    (ATLAS, "atlas"),
    (HERMES, "hermes"),
    (HERMES_2, "hermes2"),
    (ANGELIA, "angelia"),
    (ORION, "orion"),
    (ORION_2, "orion2"),
    (HERMES_LITE, "hermeslite"),
    (SATURN, "saturn"),
];

/// A radio as found by discovery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Device {
    pub address: SocketAddr,
    pub device: u8,
    pub adcs: u8,
}

impl Device {
    pub fn new(address: IpAddr, device: u8) -> Device {
        let adcs = match device {
            ANGELIA | ORION | ORION_2 | SATURN => 2,
            _ => 1,
        };
        Device {
            address: SocketAddr::new(address, 1024),
            device,
            adcs,
        }
    }

    pub fn name(&self) -> &'static str {
        BOARDS
            .iter()
            .find(|(id, _)| *id == self.device)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    pub fn from_name(name: &str) -> Option<u8> {
        let name = name.to_ascii_lowercase().replace(|c: char| c == '-' || c == '_' || c == ' ', "");
        BOARDS.iter().find(|(_, n)| *n == name).map(|(id, _)| *id)
    }

    pub fn all_names() -> Vec<&'static str> {
        BOARDS.iter().map(|(_, name)| *name).collect()
    }

    pub fn ip(&self) -> IpAddr {
        self.address.ip()
    }

    pub fn alex_boards(&self) -> u8 {
        match self.device {
            ORION_2 | SATURN => 2,
            _ => 1,
        }
    }

    pub fn supports_puresignal(&self) -> bool {
        !matches!(self.device, ATLAS | HERMES_LITE)
    }

    pub fn ddc_layout(&self) -> DdcLayout {
        if self.supports_puresignal() {
            DdcLayout::standard()
        } else {
            DdcLayout::compact()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn board_properties() {
        let ip = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
        let saturn = Device::new(ip, SATURN);
        assert_eq!(saturn.name(), "saturn");
        assert_eq!(saturn.adcs, 2);
        assert_eq!(saturn.alex_boards(), 2);
        assert_eq!(saturn.ddc_layout(), DdcLayout::standard());
        assert_eq!(saturn.address.port(), 1024);

        let lite = Device::new(ip, HERMES_LITE);
        assert_eq!(
            lite,
            Device {
                address: SocketAddr::new(ip, 1024),
                device: HERMES_LITE,
                adcs: 1,
            }
        );
        assert!(!lite.supports_puresignal());
        assert_eq!(lite.ddc_layout(), DdcLayout::compact());
    }

    #[test]
    fn names_round_trip() {
        assert_eq!(Device::from_name("Hermes-Lite"), Some(HERMES_LITE));
        assert_eq!(Device::from_name("ORION_2"), Some(ORION_2));
        assert_eq!(Device::from_name("nonesuch"), None);
        assert_eq!(Device::all_names().len(), 8);
    }
}
