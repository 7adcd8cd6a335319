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

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::protocol2::wire::{IqSample, MAX_DDC};
use crate::radio::Radio;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Skip,
    Normal(usize),
    PureSignalFeedback,
    DiversityMix,
}

const SKIP: u8 = 0x00;
const PURESIGNAL: u8 = 0x01;
const DIVERSITY: u8 = 0x02;
const NORMAL: u8 = 0x80;

impl Action {
    fn encode(self) -> u8 {
        match self {
            Action::Skip => SKIP,
            Action::PureSignalFeedback => PURESIGNAL,
            Action::DiversityMix => DIVERSITY,
            Action::Normal(rx) => NORMAL | (rx as u8 & 0x7F),
        }
    }

    fn decode(value: u8) -> Action {
        if value & NORMAL != 0 {
            return Action::Normal((value & 0x7F) as usize);
        }
        match value {
            PURESIGNAL => Action::PureSignalFeedback,
            DIVERSITY => Action::DiversityMix,
            _ => Action::Skip,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionTable([Action; MAX_DDC]);

impl Default for ActionTable {
    fn default() -> Self {
        ActionTable([Action::Skip; MAX_DDC])
    }
}

impl ActionTable {
    pub fn get(&self, ddc: usize) -> Action {
        self.0.get(ddc).copied().unwrap_or(Action::Skip)
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.0.iter().copied()
    }

    fn set(&mut self, ddc: usize, action: Action) {
        if ddc < MAX_DDC {
            self.0[ddc] = action;
        }
    }

    pub fn encode(&self) -> u64 {
        let mut bytes = [0u8; MAX_DDC];
        for (byte, action) in bytes.iter_mut().zip(self.0.iter()) {
            *byte = action.encode();
        }
        u64::from_le_bytes(bytes)
    }

    pub fn decode(value: u64) -> ActionTable {
        let mut table = ActionTable::default();
        for (ddc, byte) in value.to_le_bytes().iter().enumerate() {
            table.0[ddc] = Action::decode(*byte);
        }
        table
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DdcLayout {
    /// Synchronized pair used for PureSignal feedback or diversity. The
    /// second DDC is synchronized to the first.
    pub pair: Option<(usize, usize)>,
    /// DDC carrying receiver 1 and receiver 2.
    pub receivers: [usize; 2],
}

impl DdcLayout {
    pub fn standard() -> DdcLayout {
        DdcLayout {
            pair: Some((0, 1)),
            receivers: [2, 3],
        }
    }

    pub fn compact() -> DdcLayout {
        DdcLayout {
            pair: None,
            receivers: [0, 1],
        }
    }

    pub fn is_secondary(&self, ddc: usize) -> bool {
        matches!(self.pair, Some((_, second)) if second == ddc)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActionInputs {
    pub duplex: bool,
    pub transmitting: bool,
    pub puresignal: bool,
    pub diversity: bool,
}

impl ActionInputs {
    pub fn from_radio(radio: &Radio) -> ActionInputs {
        ActionInputs {
            duplex: radio.duplex,
            transmitting: radio.is_transmitting(),
            puresignal: radio.transmitter.puresignal,
            diversity: radio.diversity,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("PureSignal and diversity both need the synchronized DDC pair")]
pub struct IllegalCombination;

pub fn compute(inputs: ActionInputs, layout: &DdcLayout, receivers: usize) -> Result<ActionTable, IllegalCombination> {
    if inputs.puresignal && inputs.diversity {
        return Err(IllegalCombination);
    }

    let mut table = ActionTable::default();
    let receiving = !inputs.transmitting || inputs.duplex;

    if receiving {
        for (rx, ddc) in layout.receivers.iter().enumerate().take(receivers.min(2)) {
            table.set(*ddc, Action::Normal(rx));
        }
        if inputs.diversity {
            if let Some((first, second)) = layout.pair {
                // the pair replaces receiver 1's own DDC
                table.set(layout.receivers[0], Action::Skip);
                table.set(first, Action::DiversityMix);
                table.set(second, Action::DiversityMix);
            }
        }
    }

    if inputs.transmitting && inputs.puresignal {
        if let Some((first, second)) = layout.pair {
            table.set(first, Action::PureSignalFeedback);
            table.set(second, Action::PureSignalFeedback);
        }
    }

    Ok(table)
}

#[derive(Debug, Default)]
pub struct SharedActions {
    table: AtomicU64,
}

impl SharedActions {
    pub fn new() -> SharedActions {
        SharedActions {
            table: AtomicU64::new(ActionTable::default().encode()),
        }
    }

    pub fn load(&self) -> ActionTable {
        ActionTable::decode(self.table.load(Ordering::Acquire))
    }

    pub fn publish(&self, table: ActionTable) {
        self.table.store(table.encode(), Ordering::Release);
    }

    /// Recomputes and publishes. An illegal combination leaves the current
    /// table in place.
    pub fn update(&self, inputs: ActionInputs, layout: &DdcLayout, receivers: usize) -> bool {
        if layout.pair.is_none() && (inputs.puresignal || inputs.diversity) {
            log::warn!("no synchronized DDC pair on this radio: PureSignal/diversity ignored");
        }
        match compute(inputs, layout, receivers) {
            Ok(table) => {
                self.publish(table);
                log::trace!("action table {:?}", table);
                true
            }
            Err(e) => {
                log::error!("action table unchanged for {:?}: {}", inputs, e);
                false
            }
        }
    }
}

/// Precomputed diversity rotation of the second channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    cos: f64,
    sin: f64,
}

impl Rotation {
    pub fn new(gain: f64, phase_degrees: f64) -> Rotation {
        let phase = phase_degrees.to_radians();
        Rotation {
            cos: gain * phase.cos(),
            sin: gain * phase.sin(),
        }
    }

    pub fn mix(&self, a: IqSample, b: IqSample) -> IqSample {
        IqSample {
            i: a.i + (self.cos * b.i - self.sin * b.q),
            q: a.q + (self.sin * b.i + self.cos * b.q),
        }
    }
}
