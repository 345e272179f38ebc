//! [`ProcessRuntime`] – process-wide media backend initialisation.
//!
//! The backend is brought up exactly once per process, before any session is
//! created.  Initialisation checks that the host exposes both notification
//! entry points (ready and media-size change); a missing one is a fatal
//! [`RoverError::CapabilityMissing`].  Subsequent calls return the instance
//! that is already installed.

use std::sync::OnceLock;

use pirover_types::RoverError;
use tracing::{debug, info};

/// Description of the installed backend and the callbacks the host offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRuntime {
    pub backend: String,
    pub ready_callback: bool,
    pub size_callback: bool,
}

impl ProcessRuntime {
    /// A backend whose host provides both notification entry points.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ready_callback: true,
            size_callback: true,
        }
    }

    /// # Errors
    ///
    /// [`RoverError::CapabilityMissing`] naming the first absent callback.
    pub fn validate(&self) -> Result<(), RoverError> {
        if !self.ready_callback {
            return Err(RoverError::CapabilityMissing("on_ready".into()));
        }
        if !self.size_callback {
            return Err(RoverError::CapabilityMissing("on_size_changed".into()));
        }
        Ok(())
    }
}

static PROCESS: OnceLock<ProcessRuntime> = OnceLock::new();

/// Install the process runtime.  Idempotent: once a runtime is installed,
/// later calls return it without validating their argument.
pub fn init_process(runtime: ProcessRuntime) -> Result<&'static ProcessRuntime, RoverError> {
    if let Some(existing) = PROCESS.get() {
        debug!(backend = %existing.backend, "process runtime already initialised");
        return Ok(existing);
    }
    runtime.validate()?;
    let installed = PROCESS.get_or_init(|| runtime);
    info!(backend = %installed.backend, "process runtime initialised");
    Ok(installed)
}

/// The installed runtime, if [`init_process`] has succeeded.
pub fn process_runtime() -> Option<&'static ProcessRuntime> {
    PROCESS.get()
}
