use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Largest absolute speed a motor command may carry.  Commands are clamped
/// to `[-MOTOR_LIMIT, MOTOR_LIMIT]`.
pub const MOTOR_LIMIT: i16 = 100;

/// Clamp a raw input value into the symmetric motor range.
pub fn clamp_speed(raw: i32) -> i16 {
    raw.clamp(-i32::from(MOTOR_LIMIT), i32::from(MOTOR_LIMIT)) as i16
}

/// One of the two physical drive sides of the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Speed for a single side, as produced by one command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCommand {
    pub side: Side,
    pub speed: i16,
}

impl SideCommand {
    /// Build a command for `side`, clamping `raw` into the motor range.
    pub fn new(side: Side, raw: i32) -> Self {
        Self {
            side,
            speed: clamp_speed(raw),
        }
    }

    /// The stopped command for `side`.
    pub fn stop(side: Side) -> Self {
        Self { side, speed: 0 }
    }

    pub fn is_stop(&self) -> bool {
        self.speed == 0
    }
}

/// Immutable motor command pair for the two drive sides.
///
/// `{0, 0}` ([`MotorCommand::STOPPED`]) is the canonical stopped command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MotorCommand {
    pub left: i16,
    pub right: i16,
}

impl MotorCommand {
    pub const STOPPED: MotorCommand = MotorCommand { left: 0, right: 0 };

    /// Build a pair from raw values, clamping each component.
    pub fn new(left: i32, right: i32) -> Self {
        Self {
            left: clamp_speed(left),
            right: clamp_speed(right),
        }
    }

    /// Return a copy with `cmd` replacing the component for its side.
    pub fn with_side(self, cmd: SideCommand) -> Self {
        match cmd.side {
            Side::Left => Self {
                left: cmd.speed,
                ..self
            },
            Side::Right => Self {
                right: cmd.speed,
                ..self
            },
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self == Self::STOPPED
    }
}

/// Boolean-controlled rover accessories.  Entries are independent of each
/// other; any combination may be on at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accessory {
    Headlights,
    Taillights,
    Hazards,
}

impl Accessory {
    pub const ALL: [Accessory; 3] = [
        Accessory::Headlights,
        Accessory::Taillights,
        Accessory::Hazards,
    ];
}

impl fmt::Display for Accessory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessory::Headlights => write!(f, "headlights"),
            Accessory::Taillights => write!(f, "taillights"),
            Accessory::Hazards => write!(f, "hazards"),
        }
    }
}

/// Lifecycle states of the streaming pipeline.
///
/// `Finalized` is terminal.  Device and stream commands are accepted only in
/// `Initialized` through `Paused`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    SurfaceAttached,
    Playing,
    Paused,
    Finalized,
}

impl PipelineState {
    /// `true` for the states in which commands are forwarded to the pipeline.
    pub fn accepts_commands(self) -> bool {
        matches!(
            self,
            PipelineState::Initialized
                | PipelineState::SurfaceAttached
                | PipelineState::Playing
                | PipelineState::Paused
        )
    }

    /// `true` for the states in which a surface may be detached.
    pub fn accepts_surface_finalize(self) -> bool {
        matches!(
            self,
            PipelineState::SurfaceAttached | PipelineState::Playing | PipelineState::Paused
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Opaque identifier of a host display surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceHandle(pub u64);

impl fmt::Display for SurfaceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// A display surface the pipeline may render into, with its last known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderTarget {
    pub handle: SurfaceHandle,
    pub width: u32,
    pub height: u32,
}

/// Identity of one control session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Network locator of the video source.
    pub stream_uri: String,
}

impl SessionInfo {
    pub fn new(stream_uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            stream_uri: stream_uri.into(),
        }
    }
}

/// Error type shared by every rover crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoverError {
    #[error("Pipeline not ready: {operation} rejected in state {state}")]
    PipelineNotReady {
        operation: String,
        state: PipelineState,
    },

    #[error("Invalid surface handle: {0} was already destroyed")]
    InvalidSurfaceHandle(SurfaceHandle),

    #[error("Invalid transition: {operation} is not allowed in state {state}")]
    InvalidTransition {
        operation: String,
        state: PipelineState,
    },

    #[error("Pipeline fault during {operation}: {details}")]
    PipelineFault { operation: String, details: String },

    #[error("Native capability missing: {0}")]
    CapabilityMissing(String),

    #[error("Process runtime has not been initialised")]
    RuntimeNotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Control link error: {0}")]
    Link(String),
}

impl RoverError {
    pub fn not_ready(operation: &str, state: PipelineState) -> Self {
        RoverError::PipelineNotReady {
            operation: operation.to_string(),
            state,
        }
    }

    pub fn is_not_ready(&self) -> bool {
        matches!(self, RoverError::PipelineNotReady { .. })
    }
}
