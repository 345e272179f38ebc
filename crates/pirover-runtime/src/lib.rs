//! `pirover-runtime` – The rover control session
//!
//! Wires the kernel's state machine and policies into one session that a UI
//! host can drive from any thread.
//!
//! # Modules
//!
//! - [`controller`] – [`SessionController`][controller::SessionController]:
//!   the single serialization point.  Surface events, joystick samples,
//!   accessory toggles and the pipeline's ready notification all mutate the
//!   pipeline lifecycle under one lock; size notifications bypass it.
//! - [`session`] – [`Session`][session::Session]: stream locator, session
//!   identity, and the pending / last forwarded motor pair.
//! - [`layout`] – [`LayoutPump`][layout::LayoutPump]: hands media size
//!   changes from the pipeline thread to the UI's layout context.
//! - [`input`] – [`InputEvent`][input::InputEvent]: the inbound UI/input
//!   contract, plus [`GamepadAxes`][input::GamepadAxes] mapping a physical
//!   gamepad onto both joysticks.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod controller;
pub mod input;
pub mod layout;
pub mod session;
pub mod telemetry;

pub use controller::{CommandOutcome, SessionController, SessionStatus};
pub use input::{GamepadAxes, InputEvent};
pub use layout::LayoutPump;
pub use session::Session;
pub use telemetry::{TracerProviderGuard, init_tracing};
