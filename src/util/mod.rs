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

/// Formats a frequency in Hz with a dot between thousands, the way the
/// radio's frequency display reads: 14.175.000
pub fn format_frequency(hz: u64) -> String {
    let digits = hz.to_string();
    let len = digits.len();
    let mut result = String::with_capacity(len + len / 3);

    for (i, ch) in digits.chars().enumerate() {
        if (len - i) % 3 == 0 && i != 0 {
            result.push('.');
        }
        result.push(ch);
    }

    result
}

/// Samples per second as a short string: 384k, 1536k.
pub fn format_rate(rate: u32) -> String {
    if rate % 1000 == 0 {
        format!("{}k", rate / 1000)
    } else {
        rate.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_are_separated() {
        assert_eq!(format_frequency(0), "0");
        assert_eq!(format_frequency(999), "999");
        assert_eq!(format_frequency(1_000), "1.000");
        assert_eq!(format_frequency(14_175_000), "14.175.000");
        assert_eq!(format_frequency(144_300_000), "144.300.000");
    }

    #[test]
    fn rates() {
        assert_eq!(format_rate(384_000), "384k");
        assert_eq!(format_rate(44_100), "44100");
    }
}
