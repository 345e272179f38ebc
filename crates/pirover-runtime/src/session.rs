//! [`Session`] – the data held for one rover connection.

use pirover_types::{MotorCommand, SessionInfo, SideCommand};

/// One control session.  Owned by the
/// [`SessionController`][crate::controller::SessionController]; lifecycle
/// state and render target live in the kernel types it composes.
#[derive(Debug, Clone)]
pub struct Session {
    info: SessionInfo,
    /// Most recent per-side request, forwarded or not.  Last write wins.
    pending: MotorCommand,
    /// Most recent pair the pipeline accepted.
    last_command: MotorCommand,
}

impl Session {
    pub fn new(stream_uri: impl Into<String>) -> Self {
        Self {
            info: SessionInfo::new(stream_uri),
            pending: MotorCommand::STOPPED,
            last_command: MotorCommand::STOPPED,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn stream_uri(&self) -> &str {
        &self.info.stream_uri
    }

    pub fn pending(&self) -> MotorCommand {
        self.pending
    }

    pub fn last_command(&self) -> MotorCommand {
        self.last_command
    }

    /// Overwrite the pending value for `cmd.side`.
    pub fn request(&mut self, cmd: SideCommand) {
        self.pending = self.pending.with_side(cmd);
    }

    /// Record that `cmd` reached the pipeline.
    pub fn commit(&mut self, cmd: SideCommand) {
        self.last_command = self.last_command.with_side(cmd);
    }
}
