//! `pirover-hal` – collaborator seams of the rover control session.
//!
//! The session core never talks to a media backend, the OS power manager or
//! a UI toolkit directly.  It talks to the traits in this crate, so real
//! backends and test doubles are interchangeable.
//!
//! # Modules
//!
//! - [`pipeline`] – [`Pipeline`][pipeline::Pipeline] (outbound lifecycle and
//!   device operations) and [`PipelineListener`][pipeline::PipelineListener]
//!   (asynchronous ready / size-change notifications).
//! - [`wake_lock`] – [`WakeLock`][wake_lock::WakeLock]: the keep-awake
//!   resource held while the stream plays.
//! - [`layout`] – [`LayoutSink`][layout::LayoutSink]: UI layout feedback.
//! - [`control`] – [`ControlState`][control::ControlState]: the motor/light
//!   register block and its 12-byte wire packet.
//! - [`link`] – [`ControlLink`][link::ControlLink]: periodic UDP transmission
//!   of the control packet.
//! - [`sim`] – in-process simulated collaborators for tests and headless runs.

pub mod control;
pub mod layout;
pub mod link;
pub mod pipeline;
pub mod sim;
pub mod wake_lock;

pub use control::{ControlRegisters, ControlState, PACKET_LEN};
pub use layout::{LayoutSink, MediaSize};
pub use link::ControlLink;
pub use pipeline::{Pipeline, PipelineListener};
pub use sim::{PipelineCall, RecordingLayout, SimPipeline, SimProbe, SimWakeLock};
pub use wake_lock::WakeLock;
