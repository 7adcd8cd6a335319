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

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::alex::*;
use crate::config::PortMap;
use crate::device::Device;
use crate::protocol2::actions::{ActionInputs, DdcLayout, SharedActions};
use crate::protocol2::wire::*;
use crate::radio::{FilterBoards, Keyer, Radio, RadioHandle};

pub fn build_general(buf: &mut [u8], sequence: u32, device: &Device, ports: &PortMap, radio: &Radio) {
    buf.fill(0);
    write_sequence(buf, sequence);
    buf[4] = 0x00; // command

    put_u16(buf, 5, ports.receive_specific);
    put_u16(buf, 7, ports.transmit_specific);
    put_u16(buf, 9, ports.high_priority);
    put_u16(buf, 11, ports.high_priority_status);
    put_u16(buf, 13, ports.audio);
    put_u16(buf, 15, ports.tx_iq);
    put_u16(buf, 17, ports.ddc_base);
    put_u16(buf, 19, ports.microphone);
    put_u16(buf, 21, ports.wideband);

    buf[23] = 0x00; // wideband not enabled
    buf[37] = 0x08; // phase word (not frequency)
    buf[38] = 0x01; // enable hardware timer

    if radio.pa_enabled {
        buf[58] = 0x01;
    }

    if radio.filter_board == FilterBoards::ALEX {
        buf[59] = if device.alex_boards() == 2 { 0x03 } else { 0x01 };
    }
}

pub fn build_high_priority(buf: &mut [u8], sequence: u32, device: &Device, layout: &DdcLayout, radio: &Radio, run: bool) {
    buf.fill(0);
    write_sequence(buf, sequence);

    let transmitting = radio.is_transmitting();
    buf[4] = if run { 0x01 } else { 0x00 };
    if transmitting && run {
        buf[4] |= 0x02;
    }

    if radio.cw_key_down {
        buf[5] |= 0x01;
    }
    if radio.dot {
        buf[5] |= 0x02;
    }
    if radio.dash {
        buf[5] |= 0x04;
    }

    // receivers
    for (rx, ddc) in layout.receivers.iter().enumerate().take(radio.receivers) {
        if let Some(receiver) = radio.receiver.get(rx) {
            put_u32(buf, 9 + ddc * 4, frequency_to_phase(receiver.ddc_frequency()));
        }
    }

    let tx_phase = frequency_to_phase(radio.tx_frequency());
    if let Some((first, second)) = layout.pair {
        let pair_phase = if radio.diversity {
            radio.receiver.first().map(|rx| frequency_to_phase(rx.ddc_frequency()))
        } else if radio.transmitter.puresignal {
            Some(tx_phase)
        } else {
            None
        };
        if let Some(phase) = pair_phase {
            put_u32(buf, 9 + first * 4, phase);
            put_u32(buf, 9 + second * 4, phase);
        }
    }

    // DUC0
    put_u32(buf, 329, tx_phase);
    buf[345] = radio.transmitter.drive;

    buf[1401] = radio.open_collector;

    if radio.filter_board == FilterBoards::ALEX {
        let rx_frequency = radio.receiver.first().map(|rx| rx.frequency).unwrap_or_default();
        let mut alex0 = hpf_bits(rx_frequency) | lpf_bits(radio.tx_frequency());
        if transmitting {
            alex0 |= radio.transmitter.antenna | ALEX_TX_RELAY;
            if radio.transmitter.puresignal {
                alex0 |= ALEX_PS_BIT;
            }
        } else {
            alex0 |= radio.adc(0).alex_bits();
        }
        put_u32(buf, 1432, alex0);

        if device.alex_boards() == 2 {
            let rx2_frequency = radio.receiver.get(1).map(|rx| rx.frequency).unwrap_or(rx_frequency);
            put_u32(buf, 1428, hpf_bits(rx2_frequency) | radio.adc(1).alex_bits());
        }
    }

    buf[1442] = radio.adc(1).attenuation;
    buf[1443] = if transmitting && radio.transmitter.puresignal {
        radio.transmitter.attenuation
    } else {
        radio.adc(0).attenuation
    };
}

// returns the DDC's enable bit
fn set_ddc(buf: &mut [u8], ddc: usize, adc: u8, rate_khz: u16) -> u8 {
    let offset = 17 + ddc * 6;
    buf[offset] = adc;
    put_u16(buf, offset + 1, rate_khz);
    buf[offset + 5] = BITS_PER_SAMPLE as u8;
    1 << ddc
}

pub fn build_receive_specific(buf: &mut [u8], sequence: u32, device: &Device, layout: &DdcLayout, radio: &Radio) {
    buf.fill(0);
    write_sequence(buf, sequence);

    buf[4] = device.adcs;
    for (n, adc) in radio.adc.iter().enumerate().take(8) {
        if adc.dither {
            buf[5] |= 1 << n;
        }
        if adc.random {
            buf[6] |= 1 << n;
        }
    }

    let mut enable = 0u8;
    for (rx, ddc) in layout.receivers.iter().enumerate().take(radio.receivers) {
        if let Some(receiver) = radio.receiver.get(rx) {
            enable |= set_ddc(buf, *ddc, receiver.adc as u8, receiver.sample_rate_khz());
        }
    }

    let mut synchronized = false;
    if let Some((first, second)) = layout.pair {
        if radio.diversity {
            let rate = radio.receiver.first().map(|rx| rx.sample_rate_khz()).unwrap_or(48);
            enable |= set_ddc(buf, first, 0, rate);
            enable |= set_ddc(buf, second, 1, rate);
            synchronized = true;
        } else if radio.transmitter.puresignal && radio.is_transmitting() {
            // feedback from the PA coupler, reference from the DAC
            enable |= set_ddc(buf, first, 0, 192);
            enable |= set_ddc(buf, second, device.adcs, 192);
            synchronized = true;
        }
    }

    buf[7] = enable;
    if synchronized {
        buf[1363] = 0x02; // DDC1 synchronized to DDC0
    }
}

pub fn build_transmit_specific(buf: &mut [u8], sequence: u32, radio: &Radio) {
    buf.fill(0);
    write_sequence(buf, sequence);

    buf[4] = 1; // DACs

    let mut mode = 0u8;
    if radio.cw_keyer_internal {
        mode |= 0x02;
    }
    if radio.cw_keys_reversed {
        mode |= 0x04;
    }
    match radio.cw_keyer_mode {
        Keyer::ModeA => mode |= 0x08,
        Keyer::ModeB => mode |= 0x28,
        Keyer::Straight => {}
    }
    if radio.cw_keyer_sidetone_volume != 0 {
        mode |= 0x10;
    }
    if radio.cw_keyer_spacing {
        mode |= 0x40;
    }
    if radio.cw_breakin {
        mode |= 0x80;
    }
    buf[5] = mode;

    buf[6] = radio.cw_keyer_sidetone_volume;
    put_u16(buf, 7, radio.cw_keyer_sidetone_frequency);
    buf[9] = radio.cw_keyer_speed;
    buf[10] = radio.cw_keyer_weight;
    put_u16(buf, 11, radio.cw_keyer_hang_time);
    buf[13] = radio.cw_keyer_ptt_delay;

    let mut mic = 0u8;
    if radio.line_in {
        mic |= 0x01;
    }
    if radio.mic_boost {
        mic |= 0x02;
    }
    if !radio.mic_ptt {
        mic |= 0x04;
    }
    if radio.mic_bias_ring {
        mic |= 0x08;
    }
    if radio.mic_bias_enable {
        mic |= 0x10;
    }
    if radio.mic_saturn_xlr {
        mic |= 0x20;
    }
    buf[50] = mic;
    buf[51] = radio.line_in_gain;

    buf[57] = radio.transmitter.attenuation;
    buf[58] = radio.transmitter.attenuation;
    buf[59] = radio.transmitter.attenuation;
}

// One build and send per packet type at a time. The radio state is read
// under the mutex so a later packet never carries an older state.
pub struct Packets {
    socket: UdpSocket,
    device: Device,
    ports: PortMap,
    layout: DdcLayout,
    actions: Arc<SharedActions>,
    radio: RadioHandle,
    general: Mutex<u32>,
    high_priority: Mutex<u32>,
    receive_specific: Mutex<u32>,
    transmit_specific: Mutex<u32>,
}

impl Packets {
    pub fn new(
        socket: UdpSocket,
        device: Device,
        ports: PortMap,
        layout: DdcLayout,
        actions: Arc<SharedActions>,
        radio: RadioHandle,
    ) -> Packets {
        Packets {
            socket,
            device,
            ports,
            layout,
            actions,
            radio,
            general: Mutex::new(0),
            high_priority: Mutex::new(0),
            receive_specific: Mutex::new(0),
            transmit_specific: Mutex::new(0),
        }
    }

    fn send(&self, what: &str, port: u16, buf: &[u8]) -> bool {
        let destination = SocketAddr::new(self.device.ip(), port);
        match self.socket.send_to(buf, destination) {
            Ok(_) => {
                log::trace!("{} sent to {}", what, destination);
                true
            }
            Err(e) => {
                log::error!("{}: send to {} failed: {}", what, destination, e);
                false
            }
        }
    }

    pub fn send_general(&self) {
        let mut sequence = self.general.lock();
        let radio = self.radio.snapshot();
        let mut buf = [0u8; GENERAL_SIZE];
        build_general(&mut buf, *sequence, &self.device, &self.ports, &radio);
        if self.send("general", self.ports.general, &buf) {
            *sequence = sequence.wrapping_add(1);
        }
    }

    /// Also recomputes the action table from the flags just sent.
    pub fn send_high_priority(&self, run: bool) {
        let mut sequence = self.high_priority.lock();
        let radio = self.radio.snapshot();
        let mut buf = [0u8; HIGH_PRIORITY_SIZE];
        build_high_priority(&mut buf, *sequence, &self.device, &self.layout, &radio, run);
        if self.send("high priority", self.ports.high_priority, &buf) {
            *sequence = sequence.wrapping_add(1);
        }
        self.actions.update(ActionInputs::from_radio(&radio), &self.layout, radio.receivers);
    }

    pub fn send_receive_specific(&self) {
        let mut sequence = self.receive_specific.lock();
        let radio = self.radio.snapshot();
        let mut buf = [0u8; RECEIVE_SPECIFIC_SIZE];
        build_receive_specific(&mut buf, *sequence, &self.device, &self.layout, &radio);
        if self.send("receive specific", self.ports.receive_specific, &buf) {
            *sequence = sequence.wrapping_add(1);
        }
    }

    pub fn send_transmit_specific(&self) {
        let mut sequence = self.transmit_specific.lock();
        let radio = self.radio.snapshot();
        let mut buf = [0u8; TRANSMIT_SPECIFIC_SIZE];
        build_transmit_specific(&mut buf, *sequence, &radio);
        if self.send("transmit specific", self.ports.transmit_specific, &buf) {
            *sequence = sequence.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use crate::device::{HERMES_LITE, ORION_2, SATURN};
    use crate::modes::Modes;
    use crate::protocol2::actions::Action;

    fn device(id: u8) -> Device {
        Device::new(IpAddr::V4(Ipv4Addr::LOCALHOST), id)
    }

    #[test]
    fn general_advertises_ports() {
        let device = device(ORION_2);
        let radio = Radio::new(&device);
        let mut ports = PortMap::default();
        ports.ddc_base = 2035;
        let mut buf = [0u8; GENERAL_SIZE];
        build_general(&mut buf, 3, &device, &ports, &radio);
        assert_eq!(read_sequence(&buf), 3);
        assert_eq!(read_u16(&buf, 5), 1025);
        assert_eq!(read_u16(&buf, 9), 1027);
        assert_eq!(read_u16(&buf, 17), 2035);
        assert_eq!(read_u16(&buf, 19), 1026);
        assert_eq!(buf[37], 0x08);
        assert_eq!(buf[38], 0x01);
        assert_eq!(buf[58], 0x01);
        assert_eq!(buf[59], 0x03);

        let single = self::device(HERMES_LITE);
        build_general(&mut buf, 4, &single, &ports, &radio);
        assert_eq!(buf[59], 0x01);
    }

    #[test]
    fn high_priority_frequencies_and_run() {
        let device = device(SATURN);
        let layout = device.ddc_layout();
        let mut radio = Radio::new(&device);
        radio.receivers = 2;
        radio.receiver[0].frequency = 14_175_000.0;
        radio.receiver[1].frequency = 7_030_000.0;
        radio.receiver[1].mode = Modes::CWU;
        radio.transmitter.drive = 200;

        let mut buf = [0u8; HIGH_PRIORITY_SIZE];
        build_high_priority(&mut buf, 0, &device, &layout, &radio, true);
        assert_eq!(buf[4], 0x01);
        let word = |buf: &[u8], offset: usize| u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]]);
        assert_eq!(word(&buf, 9 + 2 * 4), frequency_to_phase(14_175_000.0));
        assert_eq!(word(&buf, 9 + 3 * 4), frequency_to_phase(7_029_350.0));
        // pair idle
        assert_eq!(word(&buf, 9), 0);
        assert_eq!(word(&buf, 329), frequency_to_phase(14_175_000.0));
        assert_eq!(buf[345], 200);
        assert_eq!(word(&buf, 1432) & ALEX_TX_RELAY, 0);
        assert_ne!(word(&buf, 1432) & ALEX_13MHZ_HPF, 0);

        radio.mox = true;
        radio.transmitter.puresignal = true;
        radio.transmitter.attenuation = 31;
        build_high_priority(&mut buf, 1, &device, &layout, &radio, true);
        assert_eq!(buf[4], 0x03);
        assert_eq!(word(&buf, 9), frequency_to_phase(14_175_000.0));
        assert_eq!(word(&buf, 13), frequency_to_phase(14_175_000.0));
        let alex = word(&buf, 1432);
        assert_ne!(alex & ALEX_TX_RELAY, 0);
        assert_ne!(alex & ALEX_PS_BIT, 0);
        assert_eq!(buf[1443], 31);

        build_high_priority(&mut buf, 2, &device, &layout, &radio, false);
        assert_eq!(buf[4], 0x00);
    }

    #[test]
    fn receive_specific_enables_ddcs() {
        let device = device(ORION_2);
        let layout = device.ddc_layout();
        let mut radio = Radio::new(&device);
        radio.receivers = 2;
        radio.receiver[1].sample_rate = 192000;
        radio.receiver[1].adc = 1;
        radio.adc[0].dither = true;
        radio.adc[1].random = true;

        let mut buf = [0u8; RECEIVE_SPECIFIC_SIZE];
        build_receive_specific(&mut buf, 0, &device, &layout, &radio);
        assert_eq!(buf[4], 2);
        assert_eq!(buf[5], 0x01);
        assert_eq!(buf[6], 0x02);
        assert_eq!(buf[7], 0x0C);
        assert_eq!(buf[17 + 12], 0);
        assert_eq!(read_u16(&buf, 17 + 12 + 1), 384);
        assert_eq!(buf[17 + 12 + 5], 24);
        assert_eq!(buf[17 + 18], 1);
        assert_eq!(read_u16(&buf, 17 + 18 + 1), 192);
        assert_eq!(buf[1363], 0);

        radio.diversity = true;
        build_receive_specific(&mut buf, 1, &device, &layout, &radio);
        assert_eq!(buf[7], 0x0F);
        assert_eq!(buf[17], 0);
        assert_eq!(buf[17 + 6], 1);
        assert_eq!(read_u16(&buf, 17 + 6 + 1), 384);
        assert_eq!(buf[1363], 0x02);

        radio.diversity = false;
        radio.transmitter.puresignal = true;
        radio.ptt = true;
        build_receive_specific(&mut buf, 2, &device, &layout, &radio);
        assert_eq!(buf[17 + 6], 2);
        assert_eq!(read_u16(&buf, 17 + 1), 192);
        assert_eq!(buf[1363], 0x02);
    }

    #[test]
    fn transmit_specific_keyer_and_mic() {
        let device = device(ORION_2);
        let mut radio = Radio::new(&device);
        radio.cw_keyer_mode = Keyer::ModeB;
        radio.cw_breakin = true;
        radio.cw_keyer_sidetone_frequency = 700;
        radio.cw_keyer_hang_time = 500;
        radio.mic_ptt = false;
        radio.mic_boost = false;
        radio.mic_bias_enable = false;

        let mut buf = [0u8; TRANSMIT_SPECIFIC_SIZE];
        build_transmit_specific(&mut buf, 9, &radio);
        assert_eq!(read_sequence(&buf), 9);
        assert_eq!(buf[4], 1);
        assert_eq!(buf[5], 0x02 | 0x28 | 0x10 | 0x80);
        assert_eq!(read_u16(&buf, 7), 700);
        assert_eq!(buf[9], 12);
        assert_eq!(read_u16(&buf, 11), 500);
        assert_eq!(buf[50], 0x04);
    }

    fn packets(device: Device, ports: PortMap) -> (Packets, Arc<SharedActions>, RadioHandle) {
        let actions = Arc::new(SharedActions::new());
        let radio = RadioHandle::new(Radio::new(&device));
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let packets = Packets::new(socket, device, ports, device.ddc_layout(), actions.clone(), radio.clone());
        (packets, actions, radio)
    }

    #[test]
    fn sending_high_priority_publishes_actions() {
        let radio_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        radio_socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut ports = PortMap::default();
        ports.high_priority = radio_socket.local_addr().unwrap().port();
        let (packets, actions, _) = packets(device(SATURN), ports);

        packets.send_high_priority(true);
        packets.send_high_priority(true);
        let mut buf = [0u8; 2048];
        let (len, _) = radio_socket.recv_from(&mut buf).unwrap();
        assert_eq!(len, HIGH_PRIORITY_SIZE);
        assert_eq!(read_sequence(&buf), 0);
        let (_, _) = radio_socket.recv_from(&mut buf).unwrap();
        assert_eq!(read_sequence(&buf), 1);
        assert_eq!(actions.load().get(2), Action::Normal(0));
    }

    #[test]
    fn every_send_carries_the_current_state() {
        let radio_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        radio_socket.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let mut ports = PortMap::default();
        ports.high_priority = radio_socket.local_addr().unwrap().port();
        ports.receive_specific = ports.high_priority;
        let (packets, actions, radio) = packets(device(SATURN), ports);

        // a sender that looked at the state before the change still sends the new one
        let before = radio.snapshot();
        radio.update(|r| {
            r.mox = true;
            r.transmitter.puresignal = true;
        });
        packets.send_high_priority(true);
        assert!(!before.mox);
        packets.send_high_priority(true);
        packets.send_receive_specific();

        let mut buf = [0u8; 2048];
        for _ in 0..2 {
            let (len, _) = radio_socket.recv_from(&mut buf).unwrap();
            assert_eq!(len, HIGH_PRIORITY_SIZE);
            assert_eq!(buf[4], 0x03);
        }
        let (len, _) = radio_socket.recv_from(&mut buf).unwrap();
        assert_eq!(len, RECEIVE_SPECIFIC_SIZE);
        assert_eq!(buf[1363], 0x02);
        assert_eq!(actions.load().get(0), Action::PureSignalFeedback);

        radio.update(|r| r.mox = false);
        packets.send_high_priority(true);
        let (_, _) = radio_socket.recv_from(&mut buf).unwrap();
        assert_eq!(buf[4], 0x01);
        assert_eq!(actions.load().get(0), Action::Skip);
        assert_eq!(actions.load().get(2), Action::Normal(0));
    }

    #[test]
    fn concurrent_senders_end_on_the_latest_state() {
        let radio_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut ports = PortMap::default();
        ports.high_priority = radio_socket.local_addr().unwrap().port();
        let (packets, actions, radio) = packets(device(SATURN), ports);
        let packets = Arc::new(packets);

        let senders: Vec<_> = (0..4)
            .map(|_| {
                let packets = packets.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        packets.send_high_priority(true);
                    }
                })
            })
            .collect();
        for n in 0..50 {
            radio.update(|r| r.mox = n % 2 == 0);
        }
        radio.update(|r| {
            r.mox = true;
            r.transmitter.puresignal = true;
        });
        for sender in senders {
            sender.join().unwrap();
        }

        // whichever send came last read the state under the lock
        packets.send_high_priority(true);
        assert_eq!(actions.load().get(0), Action::PureSignalFeedback);
        let last = packets.high_priority.lock();
        assert_eq!(*last, 201);
    }
}
