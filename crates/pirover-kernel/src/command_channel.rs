//! [`CommandChannel`] – joystick samples to per-side motor commands.
//!
//! One channel exists per drive side.  The tilt axis (forward/back) maps
//! directly onto that side's speed; the pan axis is accepted but does not
//! influence the command.  Releasing the stick or letting it return to centre
//! always yields a stop for that side, with no intermediate value.
//!
//! Channels hold no state between calls, so "last command wins" is decided by
//! the session, not here.

use pirover_types::{Side, SideCommand};

/// Stateless translator for one joystick.
///
/// # Example
///
/// ```
/// use pirover_kernel::command_channel::CommandChannel;
/// use pirover_types::Side;
///
/// let left = CommandChannel::new(Side::Left);
/// assert_eq!(left.translate(0, 75).speed, 75);
/// assert_eq!(left.on_released().speed, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandChannel {
    side: Side,
}

impl CommandChannel {
    pub fn new(side: Side) -> Self {
        Self { side }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Map a joystick sample to a command.  `tilt` is clamped into the motor
    /// range; `pan` is reserved.
    pub fn translate(&self, _pan: i32, tilt: i32) -> SideCommand {
        SideCommand::new(self.side, tilt)
    }

    /// The stick was let go.
    pub fn on_released(&self) -> SideCommand {
        SideCommand::stop(self.side)
    }

    /// The stick came back to its rest position.
    pub fn on_returned_to_center(&self) -> SideCommand {
        SideCommand::stop(self.side)
    }
}
