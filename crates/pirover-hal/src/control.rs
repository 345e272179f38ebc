//! [`ControlState`] – the rover's control register block.
//!
//! Motor and accessory commands land here and the [`ControlLink`][crate::link::ControlLink]
//! periodically snapshots the block into a fixed 12-byte packet.
//!
//! # Packet layout
//!
//! | Bytes | Field |
//! |---|---|
//! | 0..8 | four motor words (channels 0..3) |
//! | 8..10 | lights bitmask |
//! | 10..12 | flags word (reserved, always zero) |
//!
//! Every word is big-endian.  Motor words are sign-magnitude: bit 15 marks
//! reverse and the low bits carry the speed in percent.  The right side drives
//! channels 0 and 2, the left side channels 1 and 3.

use std::sync::{Mutex, PoisonError};

use pirover_types::{Accessory, MOTOR_LIMIT, Side};

/// Size of one control packet on the wire.
pub const PACKET_LEN: usize = 12;

const REVERSE_FLAG: u16 = 0x8000;

/// Bit in the lights word driven by `accessory`.
pub fn accessory_mask(accessory: Accessory) -> u16 {
    match accessory {
        Accessory::Headlights => 0x1,
        Accessory::Taillights => 0x2,
        Accessory::Hazards => 0x4,
    }
}

/// Encode a signed speed as a sign-magnitude motor word.
pub fn encode_speed(speed: i16) -> u16 {
    let magnitude = speed.unsigned_abs().min(MOTOR_LIMIT as u16);
    if speed < 0 {
        REVERSE_FLAG | magnitude
    } else {
        magnitude
    }
}

fn side_channels(side: Side) -> [usize; 2] {
    match side {
        Side::Right => [0, 2],
        Side::Left => [1, 3],
    }
}

/// Plain snapshot of the register block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlRegisters {
    pub motors: [i16; 4],
    pub lights: u16,
    pub flags: u16,
}

impl ControlRegisters {
    /// Serialise the registers into a wire packet.
    pub fn packet(&self) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        for (i, motor) in self.motors.iter().enumerate() {
            buf[i * 2..i * 2 + 2].copy_from_slice(&encode_speed(*motor).to_be_bytes());
        }
        buf[8..10].copy_from_slice(&self.lights.to_be_bytes());
        buf[10..12].copy_from_slice(&self.flags.to_be_bytes());
        buf
    }

    /// Speed currently commanded for `side`.
    pub fn side(&self, side: Side) -> i16 {
        self.motors[side_channels(side)[0]]
    }

    pub fn accessory(&self, accessory: Accessory) -> bool {
        self.lights & accessory_mask(accessory) != 0
    }
}

/// Thread-safe register block shared between the pipeline (writer) and the
/// control link (reader).
#[derive(Debug, Default)]
pub struct ControlState {
    registers: Mutex<ControlRegisters>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, f: impl FnOnce(&mut ControlRegisters)) {
        let mut regs = self.registers.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut regs);
    }

    /// Set both motor channels of `side`.
    pub fn set_side(&self, side: Side, speed: i16) {
        self.update(|regs| {
            for ch in side_channels(side) {
                regs.motors[ch] = speed;
            }
        });
    }

    pub fn set_motors(&self, motors: [i16; 4]) {
        self.update(|regs| regs.motors = motors);
    }

    /// Zero every motor channel.
    pub fn stop_motors(&self) {
        self.set_motors([0; 4]);
    }

    /// Set or clear only the bit belonging to `accessory`.
    pub fn set_accessory(&self, accessory: Accessory, on: bool) {
        let mask = accessory_mask(accessory);
        self.update(|regs| {
            if on {
                regs.lights |= mask;
            } else {
                regs.lights &= !mask;
            }
        });
    }

    pub fn snapshot(&self) -> ControlRegisters {
        *self.registers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialise the current registers into a wire packet.
    pub fn packet(&self) -> [u8; PACKET_LEN] {
        self.snapshot().packet()
    }
}
