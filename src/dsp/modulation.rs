//! MIDI CC Modulation Matrix
//!
//! Binds MIDI continuous controllers to parameter ids. Each slot remembers
//! the last normalised value of its controller and biases the parameter's
//! base value by `last_value * depth`.
//!
//! Resolution is block-rate: the sample offset carried by each event is
//! ignored, and a controller change anywhere in a block takes effect the
//! next time [`ModulationMatrix::apply_modulation`] is queried.

use std::collections::HashMap;

use log::debug;

use crate::dsp::params::clamp_unit;

/// Opaque parameter identifier
pub type ParamId = u32;

// ============================================================================
// MIDI Events
// ============================================================================

/// Channel voice message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    ControlChange { channel: u8, controller: u8, value: u8 },
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Anything the modulation matrix does not look at
    Other,
}

impl MidiMessage {
    /// Decode a raw message
    ///
    /// Returns `None` when the bytes are too short for their status.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let channel = status & 0x0F;
        let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);

        let message = match status & 0xF0 {
            0xB0 => MidiMessage::ControlChange {
                channel,
                controller: data(1)?,
                value: data(2)?,
            },
            0x90 => MidiMessage::NoteOn {
                channel,
                note: data(1)?,
                velocity: data(2)?,
            },
            0x80 => MidiMessage::NoteOff {
                channel,
                note: data(1)?,
                velocity: data(2)?,
            },
            _ => MidiMessage::Other,
        };
        Some(message)
    }

    pub fn control_change(controller: u8, value: u8) -> Self {
        MidiMessage::ControlChange {
            channel: 0,
            controller,
            value,
        }
    }
}

/// A message with its position inside the host block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    pub sample_offset: u32,
    pub message: MidiMessage,
}

impl MidiEvent {
    pub fn new(sample_offset: u32, message: MidiMessage) -> Self {
        Self {
            sample_offset,
            message,
        }
    }
}

/// Normalise a 7-bit controller value to `[0, 1]`
#[inline]
pub fn normalize_cc(value: u8) -> f32 {
    value.min(127) as f32 / 127.0
}

// ============================================================================
// Modulation Matrix
// ============================================================================

/// Binding of one controller to one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationSlot {
    pub cc_number: u8,
    /// Modulation depth in `[0, 1]`
    pub depth: f32,
    /// Last normalised controller value, 0 until the controller moves
    pub last_value: f32,
}

/// Parameter id → controller binding
#[derive(Debug, Clone, Default)]
pub struct ModulationMatrix {
    slots: HashMap<ParamId, ModulationSlot>,
}

impl ModulationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `cc_number` to `param`, replacing any existing binding
    ///
    /// Depth is clamped to `[0, 1]`; the slot's last value starts at 0.
    pub fn add_slot(&mut self, param: ParamId, cc_number: u8, depth: f32) {
        let slot = ModulationSlot {
            cc_number,
            depth: clamp_unit(depth),
            last_value: 0.0,
        };
        debug!(
            "modulation slot: param {} <- CC {} depth {}",
            param, cc_number, slot.depth
        );
        self.slots.insert(param, slot);
    }

    pub fn remove_slot(&mut self, param: ParamId) -> Option<ModulationSlot> {
        self.slots.remove(&param)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn slot(&self, param: ParamId) -> Option<&ModulationSlot> {
        self.slots.get(&param)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Consume one block of MIDI in delivery order
    ///
    /// Every slot bound to an event's controller takes its value; the last
    /// matching event in the block wins.
    pub fn process_midi(&mut self, events: &[MidiEvent]) {
        for event in events {
            let MidiMessage::ControlChange {
                controller, value, ..
            } = event.message
            else {
                continue;
            };

            let value = normalize_cc(value);
            for slot in self.slots.values_mut() {
                if slot.cc_number == controller {
                    slot.last_value = value;
                }
            }
        }
    }

    /// Bias `base_value` by the parameter's modulation
    ///
    /// Unbound parameters pass through unchanged; bound ones return
    /// `clamp(base + last_value * depth, 0, 1)`.
    pub fn apply_modulation(&self, param: ParamId, base_value: f32) -> f32 {
        match self.slots.get(&param) {
            Some(slot) => clamp_unit(base_value + slot.last_value * slot.depth),
            None => base_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cc(controller: u8, value: u8) -> MidiEvent {
        MidiEvent::new(0, MidiMessage::control_change(controller, value))
    }

    #[test]
    fn test_unbound_param_passes_through() {
        let matrix = ModulationMatrix::new();
        assert_eq!(matrix.apply_modulation(42, 0.7), 0.7);
        assert_eq!(matrix.apply_modulation(42, 1.7), 1.7);
    }

    #[test]
    fn test_full_depth_clamps_to_one() {
        let mut matrix = ModulationMatrix::new();
        matrix.add_slot(1, 7, 1.0);
        matrix.process_midi(&[cc(7, 127)]);
        assert_eq!(matrix.apply_modulation(1, 0.6), 1.0);
    }

    #[test]
    fn test_bound_param_before_any_cc_is_base() {
        let mut matrix = ModulationMatrix::new();
        matrix.add_slot(1, 7, 1.0);
        assert_eq!(matrix.apply_modulation(1, 0.25), 0.25);
        assert_eq!(matrix.apply_modulation(1, -0.25), 0.0);
    }

    #[test]
    fn test_depth_scales_modulation() {
        let mut matrix = ModulationMatrix::new();
        matrix.add_slot(3, 1, 0.5);
        matrix.process_midi(&[cc(1, 127)]);
        assert_relative_eq!(matrix.apply_modulation(3, 0.2), 0.7);
    }

    #[test]
    fn test_shared_cc_fans_out() {
        let mut matrix = ModulationMatrix::new();
        matrix.add_slot(1, 74, 1.0);
        matrix.add_slot(2, 74, 0.5);
        matrix.add_slot(3, 75, 1.0);

        matrix.process_midi(&[cc(74, 127)]);

        assert_eq!(matrix.slot(1).unwrap().last_value, 1.0);
        assert_eq!(matrix.slot(2).unwrap().last_value, 1.0);
        assert_eq!(matrix.slot(3).unwrap().last_value, 0.0);
    }

    #[test]
    fn test_last_event_in_block_wins() {
        let mut matrix = ModulationMatrix::new();
        matrix.add_slot(1, 10, 1.0);
        matrix.process_midi(&[
            MidiEvent::new(5, MidiMessage::control_change(10, 127)),
            MidiEvent::new(
                2,
                MidiMessage::NoteOn {
                    channel: 0,
                    note: 60,
                    velocity: 100,
                },
            ),
            MidiEvent::new(400, MidiMessage::control_change(10, 0)),
        ]);
        assert_eq!(matrix.slot(1).unwrap().last_value, 0.0);
    }

    #[test]
    fn test_add_slot_overwrites_and_clamps_depth() {
        let mut matrix = ModulationMatrix::new();
        matrix.add_slot(1, 10, 0.2);
        matrix.process_midi(&[cc(10, 127)]);
        matrix.add_slot(1, 11, 4.0);

        let slot = matrix.slot(1).unwrap();
        assert_eq!(matrix.len(), 1);
        assert_eq!(slot.cc_number, 11);
        assert_eq!(slot.depth, 1.0);
        assert_eq!(slot.last_value, 0.0);
    }

    #[test]
    fn test_clear_and_remove() {
        let mut matrix = ModulationMatrix::new();
        matrix.add_slot(1, 10, 0.2);
        matrix.add_slot(2, 10, 0.2);
        assert!(matrix.remove_slot(1).is_some());
        assert!(matrix.remove_slot(1).is_none());
        matrix.clear();
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_normalize_cc() {
        assert_eq!(normalize_cc(0), 0.0);
        assert_eq!(normalize_cc(127), 1.0);
        assert_eq!(normalize_cc(200), 1.0);
        assert_relative_eq!(normalize_cc(64), 64.0 / 127.0);
    }

    #[test]
    fn test_from_bytes() {
        assert_eq!(
            MidiMessage::from_bytes(&[0xB3, 7, 100]),
            Some(MidiMessage::ControlChange {
                channel: 3,
                controller: 7,
                value: 100
            })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x90, 60, 0xFF]),
            Some(MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 0x7F
            })
        );
        assert_eq!(
            MidiMessage::from_bytes(&[0x81, 60, 0]),
            Some(MidiMessage::NoteOff {
                channel: 1,
                note: 60,
                velocity: 0
            })
        );
        assert_eq!(MidiMessage::from_bytes(&[0xE0, 0, 64]), Some(MidiMessage::Other));
        assert_eq!(MidiMessage::from_bytes(&[0xB0, 7]), None);
        assert_eq!(MidiMessage::from_bytes(&[]), None);
    }
}
