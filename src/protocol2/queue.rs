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

use parking_lot::Mutex;

use crate::protocol2::pool::Buffer;
use crate::protocol2::semaphore::Semaphore;
use crate::protocol2::sink::Stream;

struct QueueRing {
    slots: Vec<Option<Buffer>>,
    write_index: usize,
    read_index: usize,
}

/// Bounded FIFO between the dispatcher (only writer) and one worker
/// (only reader). The semaphore count equals the number of unread entries,
/// plus any explicit wake-ups issued at shutdown.
pub struct StreamQueue {
    stream: Stream,
    ring: Mutex<QueueRing>,
    ready: Semaphore,
}

impl StreamQueue {
    pub fn new(stream: Stream, capacity: usize) -> StreamQueue {
        // one slot stays empty so that full and empty are distinguishable
        let slots = (0..capacity.max(1) + 1).map(|_| None).collect();
        StreamQueue {
            stream,
            ring: Mutex::new(QueueRing {
                slots,
                write_index: 0,
                read_index: 0,
            }),
            ready: Semaphore::new(0),
        }
    }

    pub fn stream(&self) -> Stream {
        self.stream
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().slots.len() - 1
    }

    pub fn len(&self) -> usize {
        let ring = self.ring.lock();
        let size = ring.slots.len();
        (ring.write_index + size - ring.read_index) % size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, buffer: Buffer) -> Result<(), Buffer> {
        {
            let mut guard = self.ring.lock();
            let ring = &mut *guard;
            let next = (ring.write_index + 1) % ring.slots.len();
            if next == ring.read_index {
                return Err(buffer);
            }
            ring.slots[ring.write_index] = Some(buffer);
            ring.write_index = next;
        }
        self.ready.signal();
        Ok(())
    }

    pub fn pop(&self) -> Option<Buffer> {
        let mut guard = self.ring.lock();
        let ring = &mut *guard;
        if ring.read_index == ring.write_index {
            return None;
        }
        let buffer = ring.slots[ring.read_index].take();
        ring.read_index = (ring.read_index + 1) % ring.slots.len();
        buffer
    }

    /// Blocks until an entry is available or [`wake`](Self::wake) is called.
    pub fn wait(&self) {
        self.ready.wait();
    }

    pub fn try_wait(&self) -> bool {
        self.ready.try_wait()
    }

    pub fn wake(&self) {
        self.ready.signal();
    }
}
