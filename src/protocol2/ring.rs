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

use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol2::semaphore::Semaphore;
use crate::protocol2::sink::Diagnostics;

struct RingState {
    data: Box<[u8]>,
    write_ptr: usize,
    read_ptr: usize,
    pending: usize,
    // bytes of the frame currently being filled
    partial: usize,
}

pub struct OutboundRing {
    name: &'static str,
    frame_bytes: usize,
    state: Mutex<RingState>,
    frames: Semaphore,
    diagnostics: Arc<dyn Diagnostics>,
}

impl OutboundRing {
    pub fn new(name: &'static str, frame_bytes: usize, frames: usize, diagnostics: Arc<dyn Diagnostics>) -> OutboundRing {
        let frame_bytes = frame_bytes.max(1);
        let capacity = frame_bytes * frames.max(2);
        OutboundRing {
            name,
            frame_bytes,
            state: Mutex::new(RingState {
                data: vec![0u8; capacity].into_boxed_slice(),
                write_ptr: 0,
                read_ptr: 0,
                pending: 0,
                partial: 0,
            }),
            frames: Semaphore::new(0),
            diagnostics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().data.len()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending
    }

    /// Appends encoded samples. On overflow the oldest whole frames are
    /// discarded to make room.
    pub fn push(&self, bytes: &[u8]) {
        let mut dropped = 0;
        let completed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let capacity = state.data.len();

            // keep room for the partial frame at the head
            let limit = capacity - self.frame_bytes;
            let bytes = if bytes.len() > limit {
                dropped += bytes.len() - limit;
                &bytes[bytes.len() - limit..]
            } else {
                bytes
            };

            while state.pending + bytes.len() > capacity && state.pending >= self.frame_bytes {
                state.read_ptr = (state.read_ptr + self.frame_bytes) % capacity;
                state.pending -= self.frame_bytes;
                dropped += self.frame_bytes;
            }

            let first = bytes.len().min(capacity - state.write_ptr);
            state.data[state.write_ptr..state.write_ptr + first].copy_from_slice(&bytes[..first]);
            state.data[..bytes.len() - first].copy_from_slice(&bytes[first..]);
            state.write_ptr = (state.write_ptr + bytes.len()) % capacity;
            state.pending += bytes.len();

            state.partial += bytes.len();
            let completed = state.partial / self.frame_bytes;
            state.partial %= self.frame_bytes;
            completed
        };
        if dropped > 0 {
            self.diagnostics.ring_overflow(self.name, dropped);
        }
        self.frames.signal_n(completed);
    }

    /// Copies the oldest whole frame into `out`. Returns false when no
    /// complete frame is pending, which happens after an overflow consumed
    /// frames that had already been signalled.
    pub fn pop_frame(&self, out: &mut [u8]) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.pending < self.frame_bytes || out.len() < self.frame_bytes {
            return false;
        }
        let capacity = state.data.len();
        let first = self.frame_bytes.min(capacity - state.read_ptr);
        out[..first].copy_from_slice(&state.data[state.read_ptr..state.read_ptr + first]);
        out[first..self.frame_bytes].copy_from_slice(&state.data[..self.frame_bytes - first]);
        state.read_ptr = (state.read_ptr + self.frame_bytes) % capacity;
        state.pending -= self.frame_bytes;
        true
    }

    pub fn wait(&self) {
        self.frames.wait();
    }

    pub fn wake(&self) {
        self.frames.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::protocol2::sink::{Discard, Stream};

    #[derive(Default)]
    struct Overflows(AtomicUsize);

    impl Diagnostics for Overflows {
        fn sequence_mismatch(&self, _stream: Stream, _expected: u32, _received: u32) {}
        fn pool_grown(&self, _size: usize) {}
        fn queue_overflow(&self, _stream: Stream, _skip: usize) {}
        fn ring_overflow(&self, _ring: &'static str, dropped_bytes: usize) {
            self.0.fetch_add(dropped_bytes, Ordering::SeqCst);
        }
        fn discarded(&self, _port: u16, _length: usize, _reason: Discard) {}
    }

    #[test]
    fn frames_come_out_in_order() {
        let ring = OutboundRing::new("test", 4, 3, Arc::new(Overflows::default()));
        ring.push(&[1, 2, 3]);
        let mut out = [0u8; 4];
        assert!(!ring.pop_frame(&mut out));
        ring.push(&[4, 5, 6, 7, 8]);
        assert_eq!(ring.pending(), 8);
        assert!(ring.pop_frame(&mut out));
        assert_eq!(out, [1, 2, 3, 4]);
        assert!(ring.pop_frame(&mut out));
        assert_eq!(out, [5, 6, 7, 8]);
        assert_eq!(ring.pending(), 0);
    }

    #[test]
    fn overflow_drops_oldest_frames() {
        let overflows = Arc::new(Overflows::default());
        let ring = OutboundRing::new("test", 2, 2, overflows.clone());
        ring.push(&[1, 2]);
        ring.push(&[3, 4]);
        ring.push(&[5, 6]);
        assert_eq!(ring.pending(), 4);
        assert_eq!(overflows.0.load(Ordering::SeqCst), 2);

        let mut out = [0u8; 2];
        assert!(ring.pop_frame(&mut out));
        assert_eq!(out, [3, 4]);
        assert!(ring.pop_frame(&mut out));
        assert_eq!(out, [5, 6]);
        // three frames were signalled, two remained
        assert!(!ring.pop_frame(&mut out));
    }

    #[test]
    fn oversized_push_keeps_the_newest_bytes() {
        let overflows = Arc::new(Overflows::default());
        let ring = OutboundRing::new("test", 2, 3, overflows.clone());
        ring.push(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(ring.pending(), 4);
        assert_eq!(overflows.0.load(Ordering::SeqCst), 4);
        let mut out = [0u8; 2];
        assert!(ring.pop_frame(&mut out));
        assert_eq!(out, [5, 6]);
    }

    #[test]
    fn pending_stays_within_capacity() {
        let ring = OutboundRing::new("test", 48, 4, Arc::new(Overflows::default()));
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut out = [0u8; 48];
        for _ in 0..10_000 {
            if rng.gen_bool(0.6) {
                let len = rng.gen_range(1..300);
                let bytes: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
                ring.push(&bytes);
            } else {
                ring.pop_frame(&mut out);
            }
            assert!(ring.pending() <= ring.capacity());
        }
    }
}
