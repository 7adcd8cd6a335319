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

//! Fixed Protocol 2 datagram layouts and the sample codecs shared by the
//! workers and pacing threads. All multi-byte fields are big-endian.

pub const MAX_DDC: usize = 8;

pub const SEQUENCE_SIZE: usize = 4;
pub const IQ_HEADER_SIZE: usize = 16; // 16 byte header
pub const SAMPLE_SIZE: usize = 3; // 3 byte (24 bit) samples
pub const INTERLEAVE_FACTOR: usize = 2; // 2 samples (I & Q) interleaved
pub const IQ_SAMPLE_SIZE: usize = SAMPLE_SIZE * INTERLEAVE_FACTOR;
pub const BITS_PER_SAMPLE: u16 = 24;

pub const GENERAL_SIZE: usize = 60;
pub const HIGH_PRIORITY_SIZE: usize = 1444;
pub const RECEIVE_SPECIFIC_SIZE: usize = 1444;
pub const TRANSMIT_SPECIFIC_SIZE: usize = 60;
pub const HIGH_PRIORITY_STATUS_SIZE: usize = 60;

pub const MIC_SAMPLES: usize = 64;
pub const MIC_DATAGRAM_SIZE: usize = SEQUENCE_SIZE + MIC_SAMPLES * 2;
pub const AUDIO_SAMPLES: usize = 64;
pub const AUDIO_SAMPLE_SIZE: usize = 4;
pub const AUDIO_DATAGRAM_SIZE: usize = SEQUENCE_SIZE + AUDIO_SAMPLES * AUDIO_SAMPLE_SIZE;
pub const TX_IQ_SAMPLES: usize = 240;
pub const TX_IQ_DATAGRAM_SIZE: usize = SEQUENCE_SIZE + TX_IQ_SAMPLES * IQ_SAMPLE_SIZE;

pub const CLOCK_FREQUENCY: f64 = 122_880_000.0;

const IQ_SCALE: f64 = 8388607.0;
const MIC_SCALE: f64 = 32768.0;
const AUDIO_SCALE: f64 = 32767.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IqSample {
    pub i: f64,
    pub q: f64,
}

impl IqSample {
    pub fn new(i: f64, q: f64) -> IqSample {
        IqSample { i, q }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioSample {
    pub left: f64,
    pub right: f64,
}

impl AudioSample {
    pub fn new(left: f64, right: f64) -> AudioSample {
        AudioSample { left, right }
    }
}

pub fn read_sequence(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}

pub fn write_sequence(buf: &mut [u8], sequence: u32) {
    buf[..SEQUENCE_SIZE].copy_from_slice(&sequence.to_be_bytes());
}

pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

pub fn read_i24(b: &[u8]) -> i32 {
    if b[0] & 0x80 != 0 {
        u32::from_be_bytes([0xFF, b[0], b[1], b[2]]) as i32
    } else {
        u32::from_be_bytes([0, b[0], b[1], b[2]]) as i32
    }
}

pub fn write_i24(b: &mut [u8], value: i32) {
    b[0] = (value >> 16) as u8;
    b[1] = (value >> 8) as u8;
    b[2] = value as u8;
}

/// Converts a frequency in Hz into the 32 bit phase word of the 122.88 MHz NCO.
pub fn frequency_to_phase(frequency: f64) -> u32 {
    ((4294967296.0 * frequency) / CLOCK_FREQUENCY) as u32
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IqHeader {
    pub sequence: u32,
    pub timestamp: u64,
    pub bits_per_sample: u16,
    pub samples_per_frame: u16,
}

pub fn parse_iq_header(buf: &[u8]) -> Option<IqHeader> {
    if buf.len() < IQ_HEADER_SIZE {
        return None;
    }
    let mut timestamp = [0u8; 8];
    timestamp.copy_from_slice(&buf[4..12]);
    Some(IqHeader {
        sequence: read_sequence(buf),
        timestamp: u64::from_be_bytes(timestamp),
        bits_per_sample: read_u16(buf, 12),
        samples_per_frame: read_u16(buf, 14),
    })
}

/// Decodes `count` interleaved 24 bit I/Q pairs. `out` is cleared first so
/// the caller can reuse it between datagrams.
pub fn decode_iq(payload: &[u8], count: usize, out: &mut Vec<IqSample>) {
    out.clear();
    for chunk in payload.chunks_exact(IQ_SAMPLE_SIZE).take(count) {
        let i = read_i24(&chunk[0..3]) as f64 / IQ_SCALE;
        let q = read_i24(&chunk[3..6]) as f64 / IQ_SCALE;
        out.push(IqSample { i, q });
    }
}

/// Decodes the datagrams of a synchronized DDC pair, where every sample
/// slot carries I0 Q0 I1 Q1.
pub fn decode_iq_pairs(payload: &[u8], count: usize, first: &mut Vec<IqSample>, second: &mut Vec<IqSample>) {
    first.clear();
    second.clear();
    for chunk in payload.chunks_exact(IQ_SAMPLE_SIZE * 2).take(count) {
        first.push(IqSample {
            i: read_i24(&chunk[0..3]) as f64 / IQ_SCALE,
            q: read_i24(&chunk[3..6]) as f64 / IQ_SCALE,
        });
        second.push(IqSample {
            i: read_i24(&chunk[6..9]) as f64 / IQ_SCALE,
            q: read_i24(&chunk[9..12]) as f64 / IQ_SCALE,
        });
    }
}

pub fn encode_iq(sample: IqSample, out: &mut [u8]) {
    let i = (sample.i.clamp(-1.0, 1.0) * IQ_SCALE) as i32;
    let q = (sample.q.clamp(-1.0, 1.0) * IQ_SCALE) as i32;
    write_i24(&mut out[0..3], i);
    write_i24(&mut out[3..6], q);
}

pub fn encode_audio(sample: AudioSample, out: &mut [u8]) {
    let left = (sample.left.clamp(-1.0, 1.0) * AUDIO_SCALE) as i16;
    let right = (sample.right.clamp(-1.0, 1.0) * AUDIO_SCALE) as i16;
    out[0..2].copy_from_slice(&left.to_be_bytes());
    out[2..4].copy_from_slice(&right.to_be_bytes());
}

pub fn decode_mic(buf: &[u8], out: &mut Vec<f64>) {
    out.clear();
    for chunk in buf[SEQUENCE_SIZE..].chunks_exact(2).take(MIC_SAMPLES) {
        let sample = i16::from_be_bytes([chunk[0], chunk[1]]);
        out.push(sample as f64 / MIC_SCALE);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RadioStatus {
    pub sequence: u32,
    pub ptt: bool,
    pub dot: bool,
    pub dash: bool,
    pub pll_locked: bool,
    pub adc_overload: u8,
    pub exciter_power: u16,
    pub forward_power: u16,
    pub reverse_power: u16,
    pub supply_volts: u16,
    pub user_adc: [u16; 4],
    pub user_io: u8,
}

impl RadioStatus {
    pub fn adc_overloaded(&self, adc: usize) -> bool {
        adc < 8 && self.adc_overload & (1 << adc) != 0
    }
}

pub fn decode_status(buf: &[u8]) -> Option<RadioStatus> {
    if buf.len() < HIGH_PRIORITY_STATUS_SIZE {
        return None;
    }
    Some(RadioStatus {
        sequence: read_sequence(buf),
        ptt: buf[4] & 0x01 == 0x01,
        dot: buf[4] & 0x02 == 0x02,
        dash: buf[4] & 0x04 == 0x04,
        pll_locked: buf[4] & 0x10 == 0x10,
        adc_overload: buf[5],
        exciter_power: read_u16(buf, 6),
        forward_power: read_u16(buf, 14),
        reverse_power: read_u16(buf, 22),
        supply_volts: read_u16(buf, 49),
        // user ADC3 is first on the wire
        user_adc: [read_u16(buf, 57), read_u16(buf, 55), read_u16(buf, 53), read_u16(buf, 51)],
        user_io: buf[59],
    })
}

/// Tracks the expected sequence number of one stream. The first datagram
/// only establishes the baseline.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceCheck {
    expected: Option<u32>,
}

impl SequenceCheck {
    pub fn new() -> SequenceCheck {
        SequenceCheck { expected: None }
    }

    /// Returns the expected value when `received` does not match it, then
    /// resynchronizes to `received`.
    pub fn check(&mut self, received: u32) -> Option<u32> {
        let mismatch = match self.expected {
            Some(expected) if expected != received => Some(expected),
            _ => None,
        };
        self.expected = Some(received.wrapping_add(1));
        mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_four_bit_samples_keep_their_sign() {
        assert_eq!(read_i24(&[0x7F, 0xFF, 0xFF]), 8388607);
        assert_eq!(read_i24(&[0x80, 0x00, 0x00]), -8388608);
        assert_eq!(read_i24(&[0xFF, 0xFF, 0xFF]), -1);

        let mut b = [0u8; 3];
        write_i24(&mut b, -2);
        assert_eq!(b, [0xFF, 0xFF, 0xFE]);
        assert_eq!(read_i24(&b), -2);
    }

    #[test]
    fn phase_word_matches_nco_clock() {
        assert_eq!(frequency_to_phase(0.0), 0);
        assert_eq!(frequency_to_phase(CLOCK_FREQUENCY / 2.0), 0x8000_0000);
        // 14.175 MHz
        assert_eq!(frequency_to_phase(14_175_000.0), 495_452_160);
    }

    #[test]
    fn iq_header_fields() {
        let mut buf = [0u8; 1444];
        write_sequence(&mut buf, 0x01020304);
        buf[11] = 9;
        put_u16(&mut buf, 12, 24);
        put_u16(&mut buf, 14, 238);
        let header = parse_iq_header(&buf).unwrap();
        assert_eq!(header.sequence, 0x01020304);
        assert_eq!(header.timestamp, 9);
        assert_eq!(header.bits_per_sample, 24);
        assert_eq!(header.samples_per_frame, 238);
        assert!(parse_iq_header(&buf[..10]).is_none());
    }

    #[test]
    fn decode_iq_stops_at_payload_end() {
        let mut payload = vec![0u8; IQ_SAMPLE_SIZE * 2];
        write_i24(&mut payload[0..3], 4194304);
        write_i24(&mut payload[3..6], -4194304);
        let mut out = vec![IqSample::default(); 5];
        decode_iq(&payload, 10, &mut out);
        assert_eq!(out.len(), 2);
        assert!((out[0].i - 0.5).abs() < 1e-6);
        assert!((out[0].q + 0.5).abs() < 1e-6);
        assert_eq!(out[1], IqSample::new(0.0, 0.0));
    }

    #[test]
    fn decode_pairs_splits_the_interleaved_streams() {
        let mut payload = vec![0u8; IQ_SAMPLE_SIZE * 2];
        write_i24(&mut payload[0..3], 1);
        write_i24(&mut payload[3..6], 2);
        write_i24(&mut payload[6..9], 3);
        write_i24(&mut payload[9..12], 4);
        let mut first = Vec::new();
        let mut second = Vec::new();
        decode_iq_pairs(&payload, 1, &mut first, &mut second);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert!((first[0].q * IQ_SCALE - 2.0).abs() < 1e-9);
        assert!((second[0].i * IQ_SCALE - 3.0).abs() < 1e-9);
    }

    #[test]
    fn encoders_clamp_full_scale() {
        let mut out = [0u8; 6];
        encode_iq(IqSample::new(2.0, -2.0), &mut out);
        assert_eq!(read_i24(&out[0..3]), 8388607);
        assert_eq!(read_i24(&out[3..6]), -8388607);

        let mut audio = [0u8; 4];
        encode_audio(AudioSample::new(1.0, -0.5), &mut audio);
        assert_eq!(i16::from_be_bytes([audio[0], audio[1]]), 32767);
        assert_eq!(i16::from_be_bytes([audio[2], audio[3]]), -16383);
    }

    #[test]
    fn mic_samples_are_scaled() {
        let mut buf = [0u8; MIC_DATAGRAM_SIZE];
        buf[4..6].copy_from_slice(&(-16384i16).to_be_bytes());
        let mut out = Vec::new();
        decode_mic(&buf, &mut out);
        assert_eq!(out.len(), MIC_SAMPLES);
        assert_eq!(out[0], -0.5);
    }

    #[test]
    fn status_bits_and_meters() {
        let mut buf = [0u8; HIGH_PRIORITY_STATUS_SIZE];
        write_sequence(&mut buf, 7);
        buf[4] = 0x01 | 0x04 | 0x10;
        buf[5] = 0x02;
        put_u16(&mut buf, 14, 1200);
        put_u16(&mut buf, 22, 30);
        put_u16(&mut buf, 49, 3300);
        put_u16(&mut buf, 57, 11);
        buf[59] = 0x05;
        let status = decode_status(&buf).unwrap();
        assert_eq!(status.sequence, 7);
        assert!(status.ptt);
        assert!(!status.dot);
        assert!(status.dash);
        assert!(status.pll_locked);
        assert!(!status.adc_overloaded(0));
        assert!(status.adc_overloaded(1));
        assert_eq!(status.forward_power, 1200);
        assert_eq!(status.reverse_power, 30);
        assert_eq!(status.supply_volts, 3300);
        assert_eq!(status.user_adc[0], 11);
        assert_eq!(status.user_io, 0x05);
        assert!(decode_status(&buf[..40]).is_none());
    }

    #[test]
    fn sequence_check_reports_and_resyncs() {
        let mut check = SequenceCheck::new();
        assert_eq!(check.check(100), None);
        assert_eq!(check.check(101), None);
        assert_eq!(check.check(103), Some(102));
        assert_eq!(check.check(104), None);
        assert_eq!(check.check(u32::MAX), Some(105));
        assert_eq!(check.check(0), None);
    }
}
