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

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineStats {
    received: AtomicU64,
    discarded: AtomicU64,
    dropped: AtomicU64,
    sequence_errors: AtomicU64,
    iq_frames: AtomicU64,
    mic_frames: AtomicU64,
    status_frames: AtomicU64,
    tx_iq_sent: AtomicU64,
    audio_sent: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub discarded: u64,
    pub dropped: u64,
    pub sequence_errors: u64,
    pub iq_frames: u64,
    pub mic_frames: u64,
    pub status_frames: u64,
    pub tx_iq_sent: u64,
    pub audio_sent: u64,
}

impl EngineStats {
    pub fn received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sequence_error(&self) {
        self.sequence_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn iq_frame(&self) {
        self.iq_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mic_frame(&self) {
        self.mic_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn status_frame(&self) {
        self.status_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tx_iq_sent(&self) {
        self.tx_iq_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn audio_sent(&self) {
        self.audio_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            sequence_errors: self.sequence_errors.load(Ordering::Relaxed),
            iq_frames: self.iq_frames.load(Ordering::Relaxed),
            mic_frames: self.mic_frames.load(Ordering::Relaxed),
            status_frames: self.status_frames.load(Ordering::Relaxed),
            tx_iq_sent: self.tx_iq_sent.load(Ordering::Relaxed),
            audio_sent: self.audio_sent.load(Ordering::Relaxed),
        }
    }
}
