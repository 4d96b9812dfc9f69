//! Engine registry.
//!
//! Populated once at worker startup; the dispatcher consults nothing else.
//! Availability is probed per engine (binary on PATH, model directory
//! present) so a deployment missing optional dependencies still registers
//! the engine and fails matching tasks with a descriptive error instead of
//! a routing hole.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::engine::{Engine, EngineInfo};
use crate::error::EngineError;

#[derive(Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn Engine>>,
    by_name: HashMap<String, usize>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine. Later registrations under the same name win.
    pub fn register<E: Engine + 'static>(&mut self, engine: E) {
        let name = engine.name().to_string();
        let available = engine.is_available();
        info!(engine = %name, available, "Registered engine");

        self.engines.push(Arc::new(engine));
        self.by_name.insert(name, self.engines.len() - 1);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.engines[i]))
    }

    /// Look up an engine and verify it is usable in this deployment.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Engine>, EngineError> {
        let engine = self.get(name).ok_or_else(|| EngineError::Unavailable {
            engine: name.to_string(),
            hint: "No such engine is registered in this deployment.".to_string(),
        })?;

        if !engine.is_available() {
            return Err(EngineError::Unavailable {
                engine: name.to_string(),
                hint: format!(
                    "Install the '{}' engine dependencies and restart the workers.",
                    name
                ),
            });
        }

        Ok(engine)
    }

    /// Snapshot for `GET /engines`.
    pub fn snapshot(&self) -> Vec<EngineInfo> {
        self.engines
            .iter()
            .map(|e| EngineInfo {
                name: e.name().to_string(),
                description: e.description().to_string(),
                supported_extensions: e
                    .supported_extensions()
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                available: e.is_available(),
            })
            .collect()
    }
}
