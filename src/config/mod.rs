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

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;

/// UDP ports on both ends. The host to radio ports are where the packets
/// are sent, the radio to host ports identify inbound streams by their
/// source port. The general packet tells the radio about all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortMap {
    pub general: u16,
    pub receive_specific: u16,
    pub transmit_specific: u16,
    pub high_priority: u16,
    pub audio: u16,
    pub tx_iq: u16,
    pub command_reply: u16,
    pub high_priority_status: u16,
    pub microphone: u16,
    pub wideband: u16,
    pub ddc_base: u16,
}

impl Default for PortMap {
    fn default() -> Self {
        PortMap {
            general: 1024,
            receive_specific: 1025,
            transmit_specific: 1026,
            high_priority: 1027,
            audio: 1028,
            tx_iq: 1029,
            command_reply: 1024,
            high_priority_status: 1025,
            microphone: 1026,
            wideband: 1027,
            ddc_base: 1035,
        }
    }
}

/// Thresholds for one outbound stream. Levels are in samples of the
/// radio's FIFO, `rate` in samples per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub rate: f64,
    pub high_water: f64,
    pub very_high_water: f64,
    pub short_sleep_us: u64,
    pub long_sleep_us: u64,
}

impl PacingConfig {
    pub fn tx_iq() -> PacingConfig {
        PacingConfig {
            rate: 192000.0,
            high_water: 2000.0,
            very_high_water: 4000.0,
            short_sleep_us: 1000,
            long_sleep_us: 2000,
        }
    }

    pub fn audio() -> PacingConfig {
        PacingConfig {
            rate: 48000.0,
            high_water: 500.0,
            very_high_water: 1000.0,
            short_sleep_us: 1000,
            long_sleep_us: 2000,
        }
    }

    pub fn short_sleep(&self) -> Duration {
        Duration::from_micros(self.short_sleep_us)
    }

    pub fn long_sleep(&self) -> Duration {
        Duration::from_micros(self.long_sleep_us)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig::audio()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub tick_ms: u64,
    pub high_priority_ms: u64,
    pub general_ms: u64,
    pub receive_specific_ms: u64,
    pub transmit_specific_ms: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            tick_ms: 50,
            high_priority_ms: 100,
            general_ms: 1000,
            receive_specific_ms: 1000,
            transmit_specific_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub bind_address: IpAddr,
    pub bind_port: u16,
    pub ports: PortMap,
    pub buffer_size: usize,
    pub pool_batch: usize,
    pub queue_capacity: usize,
    pub skip_window: usize,
    pub socket_buffer: usize,
    pub ring_frames: usize,
    pub tx_iq: PacingConfig,
    pub audio: PacingConfig,
    pub timer: TimerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            bind_port: 0,
            ports: PortMap::default(),
            buffer_size: 2048,
            pool_batch: 25,
            queue_capacity: 64,
            skip_window: 4,
            socket_buffer: 0x10_0000,
            ring_frames: 16,
            tx_iq: PacingConfig::tx_iq(),
            audio: PacingConfig::audio(),
            timer: TimerConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn default_path() -> PathBuf {
        let app_name = env!("CARGO_PKG_NAME");
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join(app_name).join("engine.ron")
    }

    /// Loads from `path`, or the default location, falling back to the
    /// defaults when the file is missing or unreadable.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            log::debug!("no engine config at {:?}, using defaults", path);
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{}: using defaults", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, EngineError> {
        let s = fs::read_to_string(path).map_err(|e| EngineError::Config(format!("reading {:?}: {}", path, e)))?;
        let config = ron::from_str::<EngineConfig>(&s).map_err(|e| EngineError::Config(format!("parsing {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| EngineError::Config(format!("creating {:?}: {}", parent, e)))?;
            }
        }
        let s = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| EngineError::Config(format!("serializing: {}", e)))?;
        fs::write(path, s).map_err(|e| EngineError::Config(format!("writing {:?}: {}", path, e)))?;
        log::info!("saved engine config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.buffer_size < crate::protocol2::wire::HIGH_PRIORITY_SIZE {
            return Err(EngineError::Config(format!("buffer_size {} is smaller than a datagram", self.buffer_size)));
        }
        if self.pool_batch == 0 || self.queue_capacity == 0 {
            return Err(EngineError::Config("pool_batch and queue_capacity must be non zero".to_string()));
        }
        if self.ring_frames < 2 {
            return Err(EngineError::Config("ring_frames must be at least 2".to_string()));
        }
        if self.timer.tick_ms == 0 {
            return Err(EngineError::Config("timer tick must be non zero".to_string()));
        }
        for pacing in [&self.tx_iq, &self.audio] {
            if pacing.rate <= 0.0 || pacing.very_high_water < pacing.high_water {
                return Err(EngineError::Config(format!("bad pacing thresholds {:?}", pacing)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rustyp2-{}-{}", std::process::id(), name)).join("engine.ron")
    }

    #[test]
    fn defaults_match_protocol_ports() {
        let config = EngineConfig::default();
        assert_eq!(config.ports.general, 1024);
        assert_eq!(config.ports.ddc_base, 1035);
        assert_eq!(config.skip_window, 4);
        assert_eq!(config.pool_batch, 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_then_load() {
        let path = scratch("save");
        let mut config = EngineConfig::default();
        config.queue_capacity = 12;
        config.ports.microphone = 4000;
        config.audio.high_water = 700.0;
        config.save(&path).unwrap();
        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_file_takes_defaults() {
        let loaded: EngineConfig = ron::from_str("(skip_window: 9, ports: (ddc_base: 2000))").unwrap();
        assert_eq!(loaded.skip_window, 9);
        assert_eq!(loaded.ports.ddc_base, 2000);
        assert_eq!(loaded.ports.general, 1024);
        assert_eq!(loaded.buffer_size, 2048);
    }

    #[test]
    fn unreadable_file_falls_back() {
        let path = scratch("garbage");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "this is not ron").unwrap();
        assert!(matches!(EngineConfig::load_from(&path), Err(EngineError::Config(_))));
        assert_eq!(EngineConfig::load(Some(&path)), EngineConfig::default());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = EngineConfig::default();
        config.buffer_size = 100;
        assert!(config.validate().is_err());
        let mut config = EngineConfig::default();
        config.tx_iq.very_high_water = 10.0;
        assert!(config.validate().is_err());
    }
}
