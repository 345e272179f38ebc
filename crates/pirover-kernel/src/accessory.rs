//! [`AccessoryState`] – on/off flags for the rover's lights.
//!
//! Each accessory is independent; any combination may be on.  Setting a flag
//! forwards the value to the pipeline every time, even when it matches the
//! current value, and only records it once the pipeline accepted it.

use std::collections::HashMap;

use pirover_types::{Accessory, RoverError};
use tracing::debug;

use crate::lifecycle::PipelineLifecycle;

/// Last accepted value of every [`Accessory`].  All start `false`.
#[derive(Debug, Clone, Default)]
pub struct AccessoryState {
    states: HashMap<Accessory, bool>,
}

impl AccessoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, accessory: Accessory) -> bool {
        self.states.get(&accessory).copied().unwrap_or(false)
    }

    /// Forward `on` for `accessory` and record it.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::PipelineNotReady`] when the pipeline does not
    /// accept device commands; the recorded value is left unchanged.
    pub fn set(
        &mut self,
        accessory: Accessory,
        on: bool,
        lifecycle: &mut PipelineLifecycle,
    ) -> Result<(), RoverError> {
        lifecycle.set_accessory(accessory, on)?;
        debug!(%accessory, on, "accessory set");
        self.states.insert(accessory, on);
        Ok(())
    }

    /// Every accessory with its current value, in declaration order.
    pub fn snapshot(&self) -> Vec<(Accessory, bool)> {
        Accessory::ALL.iter().map(|a| (*a, self.get(*a))).collect()
    }
}
