//! [`InputEvent`] – the inbound UI/input contract of a session.
//!
//! Hosts translate their toolkit callbacks into these events and hand them to
//! [`SessionController::dispatch`][crate::controller::SessionController::dispatch].
//! [`GamepadAxes`] covers the one non-trivial translation: a physical gamepad
//! drives both on-screen joysticks at once.

use pirover_types::{Accessory, Side, SurfaceHandle};
use serde::{Deserialize, Serialize};

/// One event from the UI/input side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    SessionStart,
    SessionEnd,
    SurfaceCreated {
        handle: SurfaceHandle,
    },
    SurfaceChanged {
        handle: SurfaceHandle,
        width: u32,
        height: u32,
    },
    SurfaceDestroyed,
    JoystickMoved {
        side: Side,
        pan: i32,
        tilt: i32,
    },
    JoystickReleased {
        side: Side,
    },
    JoystickCentered {
        side: Side,
    },
    AccessoryToggled {
        accessory: Accessory,
        on: bool,
    },
}

/// A gamepad sample.  Every axis is in `[-1.0, 1.0]`; `y`/`ry` grow
/// downwards, as reported by input devices.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GamepadAxes {
    pub x: f32,
    pub y: f32,
    pub rx: f32,
    pub ry: f32,
}

impl GamepadAxes {
    /// One `JoystickMoved` per stick: left stick drives the left side, right
    /// stick the right.  Pushing a stick up is forward.
    pub fn events(&self) -> [InputEvent; 2] {
        [
            InputEvent::JoystickMoved {
                side: Side::Left,
                pan: scale_axis(self.x),
                tilt: scale_axis(-self.y),
            },
            InputEvent::JoystickMoved {
                side: Side::Right,
                pan: scale_axis(self.rx),
                tilt: scale_axis(-self.ry),
            },
        ]
    }
}

fn scale_axis(value: f32) -> i32 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * 100.0).round() as i32
}
