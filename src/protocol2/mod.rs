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

//! The Protocol 2 real-time I/O engine.

pub mod actions;
pub mod dispatch;
pub mod packets;
pub mod pacing;
pub mod pool;
pub mod queue;
pub mod ring;
pub mod semaphore;
pub mod sink;
pub mod stats;
pub mod timer;
pub mod wire;
pub mod workers;

use nix::sys::socket::sockopt::{RcvBuf, ReuseAddr, SndBuf};
use nix::sys::socket::{bind, setsockopt, socket, AddressFamily, SockFlag, SockType, SockaddrStorage};
use parking_lot::Mutex;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::EngineConfig;
use crate::device::Device;
use crate::error::EngineError;
use crate::radio::RadioHandle;

use self::actions::{ActionTable, SharedActions};
use self::dispatch::Dispatcher;
use self::packets::Packets;
use self::pacing::Pacer;
use self::pool::BufferPool;
use self::queue::StreamQueue;
use self::ring::OutboundRing;
use self::sink::{Diagnostics, SampleSink, Stream};
use self::stats::{EngineStats, StatsSnapshot};
use self::timer::PeriodicTimer;
use self::wire::*;
use self::workers::{HighPriorityWorker, IqWorker, MicWorker, StatusSlot, WorkerContext};

// options have to be set before bind to take effect
fn bind_socket(address: SocketAddr, buffer: usize) -> Result<UdpSocket, EngineError> {
    let family = if address.is_ipv4() { AddressFamily::Inet } else { AddressFamily::Inet6 };
    let fd = socket(family, SockType::Datagram, SockFlag::SOCK_CLOEXEC, None)?;
    setsockopt(&fd, ReuseAddr, &true)?;
    if buffer > 0 {
        setsockopt(&fd, RcvBuf, &buffer)?;
        setsockopt(&fd, SndBuf, &buffer)?;
    }
    bind(fd.as_raw_fd(), &SockaddrStorage::from(address)).map_err(|e| EngineError::Bind {
        address,
        source: io::Error::from(e),
    })?;
    Ok(UdpSocket::from(fd))
}

pub struct Protocol2 {
    device: Device,
    socket: UdpSocket,
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    radio: RadioHandle,
    packets: Arc<Packets>,
    actions: Arc<SharedActions>,
    status: StatusSlot,
    stats: Arc<EngineStats>,
    queues: Vec<Arc<StreamQueue>>,
    tx_iq: Arc<OutboundRing>,
    audio: Arc<OutboundRing>,
    threads: Vec<JoinHandle<()>>,
}

impl Protocol2 {
    /// Binds the socket, starts every thread and sends the initial control
    /// packets. The radio starts streaming when it sees the run bit.
    pub fn start(
        device: Device,
        config: EngineConfig,
        radio: RadioHandle,
        sink: Arc<dyn SampleSink>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Result<Protocol2, EngineError> {
        config.validate()?;

        let address = SocketAddr::new(config.bind_address, config.bind_port);
        let socket = bind_socket(address, config.socket_buffer)?;
        let local_addr = socket.local_addr()?;
        log::info!("Protocol2: {} at {} from {}", device.name(), device.address, local_addr);

        let layout = device.ddc_layout();
        let actions = Arc::new(SharedActions::new());
        let packets = Arc::new(Packets::new(socket.try_clone()?, device, config.ports, layout, actions.clone(), radio.clone()));
        let stats = Arc::new(EngineStats::default());
        let pool = Arc::new(BufferPool::new(config.buffer_size, config.pool_batch, diagnostics.clone()));

        let ddc: Vec<Arc<StreamQueue>> =
            (0..MAX_DDC).map(|n| Arc::new(StreamQueue::new(Stream::Ddc(n), config.queue_capacity))).collect();
        let microphone = Arc::new(StreamQueue::new(Stream::Microphone, config.queue_capacity));
        let high_priority = Arc::new(StreamQueue::new(Stream::HighPriority, config.queue_capacity));
        let mut queues = ddc.clone();
        queues.push(microphone.clone());
        queues.push(high_priority.clone());

        let tx_iq = Arc::new(OutboundRing::new("TX IQ", TX_IQ_SAMPLES * IQ_SAMPLE_SIZE, config.ring_frames, diagnostics.clone()));
        let audio = Arc::new(OutboundRing::new("RX audio", AUDIO_SAMPLES * AUDIO_SAMPLE_SIZE, config.ring_frames, diagnostics.clone()));

        let mut p2 = Protocol2 {
            device,
            socket: socket.try_clone()?,
            local_addr,
            running: Arc::new(AtomicBool::new(true)),
            radio: radio.clone(),
            packets: packets.clone(),
            actions: actions.clone(),
            status: Arc::new(Mutex::new(None)),
            stats: stats.clone(),
            queues,
            tx_iq: tx_iq.clone(),
            audio: audio.clone(),
            threads: Vec::new(),
        };

        // from here on an error drops p2, which stops whatever was started
        let context = WorkerContext {
            ports: config.ports,
            pool: pool.clone(),
            radio: radio.clone(),
            sink,
            diagnostics: diagnostics.clone(),
            stats: stats.clone(),
        };

        let dispatcher = Dispatcher::new(
            config.ports,
            pool,
            ddc.clone(),
            microphone.clone(),
            high_priority.clone(),
            config.skip_window,
            diagnostics,
            stats.clone(),
        );
        let receive = socket.try_clone()?;
        p2.spawn("p2-dispatch", move |running| dispatcher.run(receive, running))?;

        for (n, queue) in ddc.into_iter().enumerate() {
            let worker = IqWorker::new(n, queue, actions.clone(), layout, context.clone());
            p2.spawn(&format!("p2-ddc{}", n), move |running| worker.run(running))?;
        }

        let worker = MicWorker::new(microphone, context.clone());
        p2.spawn("p2-mic", move |running| worker.run(running))?;

        let worker = HighPriorityWorker::new(high_priority, context, packets.clone(), p2.status.clone());
        p2.spawn("p2-status", move |running| worker.run(running))?;

        let pacer = Pacer::new(tx_iq, socket.try_clone()?, SocketAddr::new(device.ip(), config.ports.tx_iq), TX_IQ_SAMPLES, config.tx_iq);
        let (r, s) = (radio.clone(), stats.clone());
        p2.spawn("p2-tx-iq", move |running| pacer.run(running, r, s, EngineStats::tx_iq_sent))?;

        let pacer = Pacer::new(audio, socket.try_clone()?, SocketAddr::new(device.ip(), config.ports.audio), AUDIO_SAMPLES, config.audio);
        let (r, s) = (radio.clone(), stats);
        p2.spawn("p2-audio", move |running| pacer.run(running, r, s, EngineStats::audio_sent))?;

        let timer = PeriodicTimer::new(&config.timer);
        let p = packets.clone();
        p2.spawn("p2-timer", move |running| timer.run(running, p))?;

        packets.send_general();
        packets.send_receive_specific();
        packets.send_transmit_specific();
        packets.send_high_priority(true);

        Ok(p2)
    }

    fn spawn<F>(&mut self, name: &str, body: F) -> Result<(), EngineError>
    where
        F: FnOnce(&AtomicBool) + Send + 'static,
    {
        let running = self.running.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(&running))
            .map_err(|source| EngineError::Spawn {
                name: name.to_string(),
                source,
            })?;
        self.threads.push(handle);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(EngineError::NotRunning)
        }
    }

    pub fn schedule_general(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.packets.send_general();
        Ok(())
    }

    pub fn schedule_high_priority(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.packets.send_high_priority(true);
        Ok(())
    }

    pub fn schedule_receive_specific(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.packets.send_receive_specific();
        Ok(())
    }

    pub fn schedule_transmit_specific(&self) -> Result<(), EngineError> {
        self.ensure_running()?;
        self.packets.send_transmit_specific();
        Ok(())
    }

    pub fn queue_tx_iq(&self, samples: &[IqSample]) {
        let mut frame = [0u8; TX_IQ_SAMPLES * IQ_SAMPLE_SIZE];
        for chunk in samples.chunks(TX_IQ_SAMPLES) {
            for (sample, out) in chunk.iter().zip(frame.chunks_exact_mut(IQ_SAMPLE_SIZE)) {
                encode_iq(*sample, out);
            }
            self.tx_iq.push(&frame[..chunk.len() * IQ_SAMPLE_SIZE]);
        }
    }

    pub fn queue_audio(&self, samples: &[AudioSample]) {
        let mut frame = [0u8; AUDIO_SAMPLES * AUDIO_SAMPLE_SIZE];
        for chunk in samples.chunks(AUDIO_SAMPLES) {
            for (sample, out) in chunk.iter().zip(frame.chunks_exact_mut(AUDIO_SAMPLE_SIZE)) {
                encode_audio(*sample, out);
            }
            self.audio.push(&frame[..chunk.len() * AUDIO_SAMPLE_SIZE]);
        }
    }

    pub fn status(&self) -> Option<RadioStatus> {
        *self.status.lock()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn actions(&self) -> ActionTable {
        self.actions.load()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn radio(&self) -> &RadioHandle {
        &self.radio
    }

    // where to send the datagram that wakes the dispatcher
    fn wake_addr(&self) -> SocketAddr {
        let ip = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, self.local_addr.port())
    }

    /// Stops every thread, then tells the radio to stop streaming. Calling
    /// it again does nothing.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        log::info!("Protocol2: stopping");

        if let Err(e) = self.socket.send_to(&[], self.wake_addr()) {
            log::warn!("Protocol2: failed to wake dispatcher: {}", e);
        }
        for queue in &self.queues {
            queue.wake();
        }
        self.tx_iq.wake();
        self.audio.wake();

        for handle in self.threads.drain(..) {
            let name = handle.thread().name().unwrap_or("p2").to_string();
            if handle.join().is_err() {
                log::error!("Protocol2: thread {} panicked", name);
            }
        }

        self.packets.send_high_priority(false);
        log::info!("Protocol2: stopped");
    }
}

impl Drop for Protocol2 {
    fn drop(&mut self) {
        self.stop();
    }
}
