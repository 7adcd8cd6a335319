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

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Failures that stop the engine from starting. Everything that happens
/// once it runs is reported through the diagnostics sink instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket option: {0}")]
    SocketOption(#[from] nix::Error),

    #[error("socket: {0}")]
    Socket(#[from] io::Error),

    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("engine is not running")]
    NotRunning,

    #[error("configuration: {0}")]
    Config(String),
}
