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

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use rustyp2::config::EngineConfig;
use rustyp2::device::Device;
use rustyp2::modes::Modes;
use rustyp2::protocol2::sink::{LogDiagnostics, SampleSink};
use rustyp2::protocol2::wire::IqSample;
use rustyp2::protocol2::Protocol2;
use rustyp2::radio::{Radio, RadioHandle, MAX_RECEIVERS};
use rustyp2::receiver::SAMPLE_RATES;
use rustyp2::util::{format_frequency, format_rate};

#[derive(Parser)]
#[command(name = "rustyp2", about = "HPSDR Protocol 2 receive test client")]
struct Cli {
    /// IP address of the radio
    #[arg(long)]
    radio: IpAddr,

    /// Board type
    #[arg(long, default_value = "orion2", value_parser = parse_device)]
    device: u8,

    /// Receiver frequency in Hz
    #[arg(long, default_value = "14175000")]
    frequency: f64,

    /// DDC sample rate
    #[arg(long, default_value = "384000", value_parser = parse_sample_rate)]
    sample_rate: u32,

    /// Number of receivers
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=MAX_RECEIVERS as i64))]
    receivers: u8,

    /// Demodulation mode, only affects the CW offset
    #[arg(long, default_value = "USB", value_parser = parse_mode)]
    mode: Modes,

    /// Engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to the config path and exit
    #[arg(long)]
    write_config: bool,

    /// Stop after this many seconds, 0 runs until killed
    #[arg(long, default_value = "10")]
    seconds: u64,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_device(s: &str) -> Result<u8, String> {
    Device::from_name(s).ok_or_else(|| format!("unknown device '{}'. Valid: {}", s, Device::all_names().join(", ")))
}

fn parse_sample_rate(s: &str) -> Result<u32, String> {
    let rate: u32 = s.parse().map_err(|e| format!("{}", e))?;
    if SAMPLE_RATES.contains(&rate) {
        Ok(rate)
    } else {
        Err(format!("unsupported sample rate {}. Valid: {:?}", rate, SAMPLE_RATES))
    }
}

fn parse_mode(s: &str) -> Result<Modes, String> {
    Modes::from_name(s).ok_or_else(|| format!("unknown mode '{}'", s))
}

/// Counts what the engine delivers instead of demodulating it.
#[derive(Default)]
struct CountingSink {
    iq: [AtomicU64; MAX_RECEIVERS],
    puresignal: AtomicU64,
    mic: AtomicU64,
}

impl SampleSink for CountingSink {
    fn rx_iq_samples(&self, receiver: usize, samples: &[IqSample]) {
        if let Some(count) = self.iq.get(receiver) {
            count.fetch_add(samples.len() as u64, Ordering::Relaxed);
        }
    }

    fn puresignal_samples(&self, tx: &[IqSample], _rx: &[IqSample]) {
        self.puresignal.fetch_add(tx.len() as u64, Ordering::Relaxed);
    }

    fn mic_samples(&self, samples: &[f64]) {
        self.mic.fetch_add(samples.len() as u64, Ordering::Relaxed);
    }
}

impl CountingSink {
    fn take(&self) -> ([u64; MAX_RECEIVERS], u64, u64) {
        let mut iq = [0u64; MAX_RECEIVERS];
        for (out, count) in iq.iter_mut().zip(self.iq.iter()) {
            *out = count.swap(0, Ordering::Relaxed);
        }
        (iq, self.puresignal.swap(0, Ordering::Relaxed), self.mic.swap(0, Ordering::Relaxed))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let config = EngineConfig::load(cli.config.as_deref());
    if cli.write_config {
        let path = cli.config.clone().unwrap_or_else(EngineConfig::default_path);
        return match config.save(&path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let device = Device::new(cli.radio, cli.device);
    let mut radio = Radio::new(&device);
    radio.receivers = cli.receivers as usize;
    for rx in radio.receiver.iter_mut() {
        rx.frequency = cli.frequency;
        rx.sample_rate = cli.sample_rate;
        rx.mode = cli.mode;
    }
    let radio = RadioHandle::new(radio);

    log::info!(
        "{} at {}: {} receiver(s) on {} Hz {} at {}",
        device.name(),
        device.ip(),
        cli.receivers,
        format_frequency(cli.frequency as u64),
        cli.mode.name(),
        format_rate(cli.sample_rate),
    );

    let sink = Arc::new(CountingSink::default());
    let mut p2 = match Protocol2::start(device, config, radio, sink.clone(), Arc::new(LogDiagnostics)) {
        Ok(p2) => p2,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let started = Instant::now();
    let mut last = started;
    while cli.seconds == 0 || started.elapsed() < Duration::from_secs(cli.seconds) {
        thread::sleep(Duration::from_secs(1));
        let elapsed = last.elapsed().as_secs_f64();
        last = Instant::now();

        let (iq, puresignal, mic) = sink.take();
        let stats = p2.stats();
        log::info!(
            "rx1 {:.0} S/s rx2 {:.0} S/s ps {:.0} S/s mic {:.0} S/s, {} datagrams, {} dropped, {} sequence errors",
            iq[0] as f64 / elapsed,
            iq[1] as f64 / elapsed,
            puresignal as f64 / elapsed,
            mic as f64 / elapsed,
            stats.received,
            stats.dropped,
            stats.sequence_errors,
        );
        if let Some(status) = p2.status() {
            log::debug!(
                "ptt={} pll={} overload=0x{:02X} fwd={} rev={} volts={}",
                status.ptt,
                status.pll_locked,
                status.adc_overload,
                status.forward_power,
                status.reverse_power,
                status.supply_volts,
            );
        }
    }

    p2.stop();
    ExitCode::SUCCESS
}
