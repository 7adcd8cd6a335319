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

//! Alex filter board control word, sent in the high priority packet.

#![allow(non_upper_case_globals)]

pub const ALEX_ANTENNA_1: u32 =          0x01000000;

pub const ALEX_TX_RELAY: u32 =           0x08000000;
pub const ALEX_PS_BIT: u32 =             0x00040000;

pub const ALEX_ATTENUATION_0dB: u32 =    0x00000000;
pub const ALEX_ATTENUATION_10dB: u32 =   0x00004000;
pub const ALEX_ATTENUATION_20dB: u32 =   0x00002000;
pub const ALEX_ATTENUATION_30dB: u32 =   0x00006000;

pub const ALEX_30_20_LPF: u32 =          0x00100000;
pub const ALEX_60_40_LPF: u32 =          0x00200000;
pub const ALEX_80_LPF: u32 =             0x00400000;
pub const ALEX_160_LPF: u32 =            0x00800000;
pub const ALEX_6_BYPASS_LPF: u32 =       0x20000000;
pub const ALEX_12_10_LPF: u32 =          0x40000000;
pub const ALEX_17_15_LPF: u32 =          0x80000000;

pub const ALEX_13MHZ_HPF: u32 =          0x00000002;
pub const ALEX_20MHZ_HPF: u32 =          0x00000004;
pub const ALEX_9_5MHZ_HPF: u32 =         0x00000010;
pub const ALEX_6_5MHZ_HPF: u32 =         0x00000020;
pub const ALEX_1_5MHZ_HPF: u32 =         0x00000040;
pub const ALEX_BYPASS_HPF: u32 =         0x00001000;

pub const ALEX_6M_PREAMP: u32 =          0x00000008;

/// High pass filter for the receive frequency.
pub fn hpf_bits(frequency: f64) -> u32 {
    if frequency < 1_800_000.0 {
        ALEX_BYPASS_HPF
    } else if frequency < 6_500_000.0 {
        ALEX_1_5MHZ_HPF
    } else if frequency < 9_500_000.0 {
        ALEX_6_5MHZ_HPF
    } else if frequency < 13_000_000.0 {
        ALEX_9_5MHZ_HPF
    } else if frequency < 20_000_000.0 {
        ALEX_13MHZ_HPF
    } else if frequency < 50_000_000.0 {
        ALEX_20MHZ_HPF
    } else {
        ALEX_6M_PREAMP
    }
}

/// Low pass filter for the transmit frequency.
pub fn lpf_bits(frequency: f64) -> u32 {
    if frequency > 35_600_000.0 {
        ALEX_6_BYPASS_LPF
    } else if frequency > 24_000_000.0 {
        ALEX_12_10_LPF
    } else if frequency > 16_500_000.0 {
        ALEX_17_15_LPF
    } else if frequency > 8_000_000.0 {
        ALEX_30_20_LPF
    } else if frequency > 5_000_000.0 {
        ALEX_60_40_LPF
    } else if frequency > 2_500_000.0 {
        ALEX_80_LPF
    } else {
        ALEX_160_LPF
    }
}

/// Step attenuator bits, rounded down to 10 dB steps.
pub fn attenuation_bits(db: u32) -> u32 {
    match db {
        0..=9 => ALEX_ATTENUATION_0dB,
        10..=19 => ALEX_ATTENUATION_10dB,
        20..=29 => ALEX_ATTENUATION_20dB,
        _ => ALEX_ATTENUATION_30dB,
    }
}
