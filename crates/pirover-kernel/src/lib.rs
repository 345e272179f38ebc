//! `pirover-kernel` – Session state & safety rules
//!
//! The pieces of the control session that decide *whether* and *in which
//! order* things reach the pipeline.  Nothing here is thread-safe on its own;
//! `pirover-runtime` wraps these types behind a single serialization point.
//!
//! # Modules
//!
//! - [`command_channel`] – [`CommandChannel`][command_channel::CommandChannel]:
//!   stateless translation of one joystick's samples into a per-side motor
//!   command.  Release and recentering always yield a stop.
//! - [`accessory`] – [`AccessoryState`][accessory::AccessoryState]:
//!   independent on/off accessory flags forwarded as device commands.
//! - [`surface`] – [`SurfaceAdapter`][surface::SurfaceAdapter]: tracks the
//!   host's display surface and attaches/detaches it on the pipeline.
//! - [`lifecycle`] – [`PipelineLifecycle`][lifecycle::PipelineLifecycle]:
//!   the pipeline state machine and its command forwarding policy.
//! - [`keep_awake`] – [`KeepAwake`][keep_awake::KeepAwake]: acquire-once /
//!   release-if-held wrapper around the wake lock.
//! - [`process`] – [`init_process`][process::init_process]: the process-wide
//!   backend runtime, initialised once before the first session.

pub mod accessory;
pub mod command_channel;
pub mod keep_awake;
pub mod lifecycle;
pub mod process;
pub mod surface;

pub use accessory::AccessoryState;
pub use command_channel::CommandChannel;
pub use keep_awake::KeepAwake;
pub use lifecycle::{PipelineLifecycle, ReadyOutcome};
pub use process::{ProcessRuntime, init_process, process_runtime};
pub use surface::{SurfaceAdapter, SurfacePhase};
