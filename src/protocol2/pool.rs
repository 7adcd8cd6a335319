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
use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol2::sink::Diagnostics;

pub struct Buffer {
    id: usize,
    data: Box<[u8]>,
    len: usize,
}

impl Buffer {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn space(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    pub fn fill(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.data.len());
        self.data[..n].copy_from_slice(&bytes[..n]);
        self.len = n;
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("id", &self.id).field("len", &self.len).finish()
    }
}

struct Slot {
    data: Option<Box<[u8]>>,
    in_use: bool,
}

struct PoolInner {
    slots: Vec<Slot>,
    free: Vec<usize>,
}

impl PoolInner {
    fn grow(&mut self, batch: usize, buffer_size: usize) {
        let first = self.slots.len();
        for id in first..first + batch {
            self.slots.push(Slot {
                data: Some(vec![0u8; buffer_size].into_boxed_slice()),
                in_use: false,
            });
            // lowest ids are handed out first
            self.free.push(first + batch - 1 - (id - first));
        }
    }
}

pub struct BufferPool {
    inner: Mutex<PoolInner>,
    buffer_size: usize,
    batch: usize,
    diagnostics: Arc<dyn Diagnostics>,
}

impl BufferPool {
    pub fn new(buffer_size: usize, batch: usize, diagnostics: Arc<dyn Diagnostics>) -> BufferPool {
        BufferPool {
            inner: Mutex::new(PoolInner {
                slots: Vec::new(),
                free: Vec::new(),
            }),
            buffer_size,
            batch: batch.max(1),
            diagnostics,
        }
    }

    /// Never blocks and never fails: an empty free list grows by one batch.
    pub fn acquire(&self) -> Buffer {
        let mut grown = None;
        let buffer = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            loop {
                if let Some(id) = inner.free.pop() {
                    let slot = &mut inner.slots[id];
                    slot.in_use = true;
                    let data = slot
                        .data
                        .take()
                        .unwrap_or_else(|| vec![0u8; self.buffer_size].into_boxed_slice());
                    break Buffer { id, data, len: 0 };
                }
                inner.grow(self.batch, self.buffer_size);
                grown = Some(inner.slots.len());
            }
        };
        if let Some(size) = grown {
            self.diagnostics.pool_grown(size);
        }
        buffer
    }

    pub fn release(&self, mut buffer: Buffer) {
        buffer.len = 0;
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match inner.slots.get_mut(buffer.id) {
            Some(slot) if slot.in_use && buffer.data.len() == self.buffer_size => {
                slot.in_use = false;
                slot.data = Some(buffer.data);
                inner.free.push(buffer.id);
            }
            _ => {
                drop(guard);
                log::error!("buffer {} released to a pool that does not own it", buffer.id);
            }
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn size(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    pub fn in_use_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots.len() - inner.free.len()
    }
}
