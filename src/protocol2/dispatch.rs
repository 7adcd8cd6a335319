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

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PortMap;
use crate::protocol2::pool::{Buffer, BufferPool};
use crate::protocol2::queue::StreamQueue;
use crate::protocol2::sink::{Diagnostics, Discard, Stream};
use crate::protocol2::stats::EngineStats;
use crate::protocol2::wire::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Stream(Stream),
    Ignored,
    Unknown,
}

pub fn route_for(ports: &PortMap, port: u16) -> Route {
    if port == ports.high_priority_status {
        return Route::Stream(Stream::HighPriority);
    }
    if port == ports.microphone {
        return Route::Stream(Stream::Microphone);
    }
    if port >= ports.ddc_base && ((port - ports.ddc_base) as usize) < MAX_DDC {
        return Route::Stream(Stream::Ddc((port - ports.ddc_base) as usize));
    }
    if port == ports.command_reply || port == ports.wideband {
        return Route::Ignored;
    }
    Route::Unknown
}

fn minimum_length(stream: Stream) -> usize {
    match stream {
        Stream::Ddc(_) => IQ_HEADER_SIZE,
        Stream::Microphone => MIC_DATAGRAM_SIZE,
        Stream::HighPriority => HIGH_PRIORITY_STATUS_SIZE,
    }
}

struct Lane {
    queue: Arc<StreamQueue>,
    skip: usize,
}

pub struct Dispatcher {
    ports: PortMap,
    pool: Arc<BufferPool>,
    ddc: Vec<Lane>,
    microphone: Lane,
    high_priority: Lane,
    sequences: [SequenceCheck; MAX_DDC],
    skip_window: usize,
    diagnostics: Arc<dyn Diagnostics>,
    stats: Arc<EngineStats>,
}

impl Dispatcher {
    pub fn new(
        ports: PortMap,
        pool: Arc<BufferPool>,
        ddc: Vec<Arc<StreamQueue>>,
        microphone: Arc<StreamQueue>,
        high_priority: Arc<StreamQueue>,
        skip_window: usize,
        diagnostics: Arc<dyn Diagnostics>,
        stats: Arc<EngineStats>,
    ) -> Dispatcher {
        let lane = |queue| Lane { queue, skip: 0 };
        Dispatcher {
            ports,
            pool,
            ddc: ddc.into_iter().map(lane).collect(),
            microphone: lane(microphone),
            high_priority: lane(high_priority),
            sequences: [SequenceCheck::new(); MAX_DDC],
            skip_window,
            diagnostics,
            stats,
        }
    }

    fn lane(&mut self, stream: Stream) -> Option<&mut Lane> {
        match stream {
            Stream::Ddc(ddc) => self.ddc.get_mut(ddc),
            Stream::Microphone => Some(&mut self.microphone),
            Stream::HighPriority => Some(&mut self.high_priority),
        }
    }

    fn discard(&self, port: u16, buffer: Buffer, reason: Discard) {
        self.diagnostics.discarded(port, buffer.len(), reason);
        self.stats.discarded();
        self.pool.release(buffer);
    }

    pub fn route(&mut self, port: u16, buffer: Buffer) {
        self.stats.received();
        let stream = match route_for(&self.ports, port) {
            Route::Stream(stream) => stream,
            Route::Ignored => {
                log::trace!("ignoring {} bytes from port {}", buffer.len(), port);
                self.pool.release(buffer);
                return;
            }
            Route::Unknown => {
                self.discard(port, buffer, Discard::UnknownPort);
                return;
            }
        };

        if buffer.len() < minimum_length(stream) {
            self.discard(port, buffer, Discard::Short);
            return;
        }

        if let Stream::Ddc(ddc) = stream {
            let received = read_sequence(buffer.data());
            if let Some(expected) = self.sequences[ddc].check(received) {
                self.diagnostics.sequence_mismatch(stream, expected, received);
                self.stats.sequence_error();
            }
        }

        let skip_window = self.skip_window;
        let (rejected, overflowed) = match self.lane(stream) {
            None => (Some(buffer), false),
            Some(lane) if lane.skip > 0 => {
                lane.skip -= 1;
                (Some(buffer), false)
            }
            Some(lane) => match lane.queue.push(buffer) {
                Ok(()) => (None, false),
                Err(buffer) => {
                    lane.skip = skip_window;
                    (Some(buffer), true)
                }
            },
        };

        if overflowed {
            self.diagnostics.queue_overflow(stream, skip_window);
        }
        if let Some(buffer) = rejected {
            self.stats.dropped();
            self.pool.release(buffer);
        }
    }

    pub fn run(mut self, socket: UdpSocket, running: &AtomicBool) {
        log::debug!("dispatcher: listening on {:?}", socket.local_addr());
        while running.load(Ordering::Acquire) {
            let mut buffer = self.pool.acquire();
            match socket.recv_from(buffer.space()) {
                Ok((len, source)) => {
                    if !running.load(Ordering::Acquire) {
                        self.pool.release(buffer);
                        break;
                    }
                    buffer.set_len(len);
                    self.route(source.port(), buffer);
                }
                Err(e) => {
                    self.pool.release(buffer);
                    if running.load(Ordering::Acquire) {
                        log::warn!("dispatcher: receive failed: {}", e);
                    }
                }
            }
        }
        log::debug!("dispatcher: exit");
    }
}
