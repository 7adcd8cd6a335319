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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PortMap;
use crate::protocol2::actions::{Action, DdcLayout, Rotation, SharedActions};
use crate::protocol2::packets::Packets;
use crate::protocol2::pool::{Buffer, BufferPool};
use crate::protocol2::queue::StreamQueue;
use crate::protocol2::sink::{Diagnostics, Discard, SampleSink, Stream};
use crate::protocol2::stats::EngineStats;
use crate::protocol2::wire::*;
use crate::radio::RadioHandle;

pub type StatusSlot = Arc<Mutex<Option<RadioStatus>>>;

#[derive(Clone)]
pub struct WorkerContext {
    pub ports: PortMap,
    pub pool: Arc<BufferPool>,
    pub radio: RadioHandle,
    pub sink: Arc<dyn SampleSink>,
    pub diagnostics: Arc<dyn Diagnostics>,
    pub stats: Arc<EngineStats>,
}

trait Worker {
    fn queue(&self) -> &StreamQueue;
    fn context(&self) -> &WorkerContext;
    fn process(&mut self, buffer: &Buffer);

    fn run(&mut self, running: &AtomicBool) {
        let stream = self.queue().stream();
        log::debug!("{} worker: start", stream);
        loop {
            self.queue().wait();
            if !running.load(Ordering::Acquire) {
                break;
            }
            let Some(buffer) = self.queue().pop() else {
                continue;
            };
            self.process(&buffer);
            self.context().pool.release(buffer);
        }
        log::debug!("{} worker: exit", stream);
    }
}

pub struct IqWorker {
    ddc: usize,
    queue: Arc<StreamQueue>,
    actions: Arc<SharedActions>,
    layout: DdcLayout,
    context: WorkerContext,
    first: Vec<IqSample>,
    second: Vec<IqSample>,
    mixed: Vec<IqSample>,
    rotation: Option<(u64, Rotation)>,
}

impl IqWorker {
    pub fn new(ddc: usize, queue: Arc<StreamQueue>, actions: Arc<SharedActions>, layout: DdcLayout, context: WorkerContext) -> IqWorker {
        IqWorker {
            ddc,
            queue,
            actions,
            layout,
            context,
            first: Vec::with_capacity(240),
            second: Vec::with_capacity(240),
            mixed: Vec::with_capacity(240),
            rotation: None,
        }
    }

    pub fn run(mut self, running: &AtomicBool) {
        Worker::run(&mut self, running);
    }

    // recomputed only when the radio state has been republished
    fn rotation(&mut self) -> Rotation {
        let generation = self.context.radio.generation();
        match self.rotation {
            Some((seen, rotation)) if seen == generation => rotation,
            _ => {
                let radio = self.context.radio.snapshot();
                let rotation = Rotation::new(radio.diversity_gain, radio.diversity_phase);
                self.rotation = Some((generation, rotation));
                rotation
            }
        }
    }

    fn discard(&self, buffer: &Buffer, reason: Discard) {
        let port = self.context.ports.ddc_base.wrapping_add(self.ddc as u16);
        self.context.diagnostics.discarded(port, buffer.len(), reason);
        self.context.stats.discarded();
    }
}

impl Worker for IqWorker {
    fn queue(&self) -> &StreamQueue {
        &self.queue
    }

    fn context(&self) -> &WorkerContext {
        &self.context
    }

    fn process(&mut self, buffer: &Buffer) {
        let action = self.actions.load().get(self.ddc);
        if action == Action::Skip {
            return;
        }

        let Some(header) = parse_iq_header(buffer.data()) else {
            self.discard(buffer, Discard::Short);
            return;
        };
        if header.bits_per_sample != BITS_PER_SAMPLE {
            self.discard(buffer, Discard::BadFormat);
            return;
        }
        let count = header.samples_per_frame as usize;
        let payload = &buffer.data()[IQ_HEADER_SIZE..];

        match action {
            Action::Skip => {}
            Action::Normal(receiver) => {
                decode_iq(payload, count, &mut self.first);
                self.context.sink.rx_iq_samples(receiver, &self.first);
                self.context.stats.iq_frame();
            }
            Action::PureSignalFeedback => {
                if self.layout.is_secondary(self.ddc) {
                    self.discard(buffer, Discard::Unsynchronized);
                    return;
                }
                if self.context.radio.snapshot().transmit_mode().is_cw() {
                    return;
                }
                decode_iq_pairs(payload, count, &mut self.first, &mut self.second);
                // DDC0 samples the PA output, DDC1 the DAC
                self.context.sink.puresignal_samples(&self.second, &self.first);
                self.context.stats.iq_frame();
            }
            Action::DiversityMix => {
                if self.layout.is_secondary(self.ddc) {
                    self.discard(buffer, Discard::Unsynchronized);
                    return;
                }
                let rotation = self.rotation();
                decode_iq_pairs(payload, count, &mut self.first, &mut self.second);
                self.mixed.clear();
                self.mixed
                    .extend(self.first.iter().zip(self.second.iter()).map(|(a, b)| rotation.mix(*a, *b)));
                self.context.sink.rx_iq_samples(0, &self.mixed);
                self.context.stats.iq_frame();
            }
        }
    }
}

pub struct MicWorker {
    queue: Arc<StreamQueue>,
    context: WorkerContext,
    sequence: SequenceCheck,
    samples: Vec<f64>,
}

impl MicWorker {
    pub fn new(queue: Arc<StreamQueue>, context: WorkerContext) -> MicWorker {
        MicWorker {
            queue,
            context,
            sequence: SequenceCheck::new(),
            samples: Vec::with_capacity(MIC_SAMPLES),
        }
    }

    pub fn run(mut self, running: &AtomicBool) {
        Worker::run(&mut self, running);
    }
}

impl Worker for MicWorker {
    fn queue(&self) -> &StreamQueue {
        &self.queue
    }

    fn context(&self) -> &WorkerContext {
        &self.context
    }

    fn process(&mut self, buffer: &Buffer) {
        let received = read_sequence(buffer.data());
        if let Some(expected) = self.sequence.check(received) {
            self.context.diagnostics.sequence_mismatch(Stream::Microphone, expected, received);
            self.context.stats.sequence_error();
        }

        decode_mic(buffer.data(), &mut self.samples);
        if self.context.radio.snapshot().tune {
            // tune carrier: nothing from the microphone
            self.samples.iter_mut().for_each(|s| *s = 0.0);
        }
        self.context.sink.mic_samples(&self.samples);
        self.context.stats.mic_frame();
    }
}

pub struct HighPriorityWorker {
    queue: Arc<StreamQueue>,
    context: WorkerContext,
    packets: Arc<Packets>,
    status: StatusSlot,
    sequence: SequenceCheck,
}

impl HighPriorityWorker {
    pub fn new(queue: Arc<StreamQueue>, context: WorkerContext, packets: Arc<Packets>, status: StatusSlot) -> HighPriorityWorker {
        HighPriorityWorker {
            queue,
            context,
            packets,
            status,
            sequence: SequenceCheck::new(),
        }
    }

    /// Decodes one status datagram and publishes it. Returns true when the
    /// PTT or paddle state changed, which the radio has to be told about.
    pub fn update(&mut self, buffer: &Buffer) -> bool {
        let Some(status) = decode_status(buffer.data()) else {
            let port = self.context.ports.high_priority_status;
            self.context.diagnostics.discarded(port, buffer.len(), Discard::Short);
            self.context.stats.discarded();
            return false;
        };
        if let Some(expected) = self.sequence.check(status.sequence) {
            self.context.diagnostics.sequence_mismatch(Stream::HighPriority, expected, status.sequence);
            self.context.stats.sequence_error();
        }
        self.context.stats.status_frame();

        let previous = self.status.lock().replace(status);
        if let Some(previous) = previous {
            if previous.pll_locked != status.pll_locked {
                log::info!("PLL {}", if status.pll_locked { "locked" } else { "unlocked" });
            }
            for adc in (0..8).filter(|adc| status.adc_overloaded(*adc) && !previous.adc_overloaded(*adc)) {
                log::warn!("ADC{} overload", adc);
            }
        }

        let radio = self.context.radio.snapshot();
        if radio.ptt == status.ptt && radio.dot == status.dot && radio.dash == status.dash {
            return false;
        }
        self.context.radio.update(|r| {
            r.ptt = status.ptt;
            r.dot = status.dot;
            r.dash = status.dash;
        });
        log::debug!("radio ptt={} dot={} dash={}", status.ptt, status.dot, status.dash);
        true
    }

    pub fn run(mut self, running: &AtomicBool) {
        Worker::run(&mut self, running);
    }
}

impl Worker for HighPriorityWorker {
    fn queue(&self) -> &StreamQueue {
        &self.queue
    }

    fn context(&self) -> &WorkerContext {
        &self.context
    }

    fn process(&mut self, buffer: &Buffer) {
        if self.update(buffer) {
            self.packets.send_high_priority(true);
        }
    }
}
