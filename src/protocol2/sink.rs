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

use std::fmt;

use crate::protocol2::wire::IqSample;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stream {
    Ddc(usize),
    Microphone,
    HighPriority,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Ddc(ddc) => write!(f, "DDC{}", ddc),
            Stream::Microphone => write!(f, "MIC"),
            Stream::HighPriority => write!(f, "HP"),
        }
    }
}

/// Receives decoded samples. Called from the worker threads, one call per
/// datagram, so implementations must not block for long.
pub trait SampleSink: Send + Sync {
    fn rx_iq_samples(&self, receiver: usize, samples: &[IqSample]);

    /// `tx` is the DAC reference, `rx` the feedback received from the PA.
    fn puresignal_samples(&self, tx: &[IqSample], rx: &[IqSample]);

    fn mic_samples(&self, samples: &[f64]);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Discard {
    UnknownPort,
    Short,
    BadFormat,
    Unsynchronized,
}

impl fmt::Display for Discard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Discard::UnknownPort => "unknown port",
            Discard::Short => "short datagram",
            Discard::BadFormat => "unexpected sample format",
            Discard::Unsynchronized => "datagram on synchronized DDC",
        };
        f.write_str(reason)
    }
}

pub trait Diagnostics: Send + Sync {
    fn sequence_mismatch(&self, stream: Stream, expected: u32, received: u32);
    fn pool_grown(&self, size: usize);
    fn queue_overflow(&self, stream: Stream, skip: usize);
    fn ring_overflow(&self, ring: &'static str, dropped_bytes: usize);
    fn discarded(&self, port: u16, length: usize, reason: Discard);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn sequence_mismatch(&self, stream: Stream, expected: u32, received: u32) {
        log::warn!("{}: sequence error expected {} got {}", stream, expected, received);
    }

    fn pool_grown(&self, size: usize) {
        log::info!("buffer pool grown to {} buffers", size);
    }

    fn queue_overflow(&self, stream: Stream, skip: usize) {
        log::warn!("{}: queue full, skipping next {} datagrams", stream, skip);
    }

    fn ring_overflow(&self, ring: &'static str, dropped_bytes: usize) {
        log::warn!("{}: ring overflow, dropped {} bytes", ring, dropped_bytes);
    }

    fn discarded(&self, port: u16, length: usize, reason: Discard) {
        log::debug!("discarded {} byte datagram from port {}: {}", length, port, reason);
    }
}
