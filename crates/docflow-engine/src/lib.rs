//! # Processing Engines
//!
//! The contract between the worker runtime and the engines that turn inbound
//! files into Markdown (and optional JSON) artifacts, plus the pure routing
//! rules that map a submission onto an engine.
//!
//! Engines register at worker startup into an [`EngineRegistry`]; the
//! registry is the only thing the dispatcher consults for availability.
//! Heavy engines (OCR models, speech recognition, video demux) are external
//! collaborators wrapped as child processes; only the generic
//! document-to-markdown converter runs in-process.

pub mod convert;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod external;
pub mod registry;

pub use convert::MarkdownConvertEngine;
pub use dispatch::{choose_engine, names};
pub use engine::{Engine, EngineInfo, ParseOutput};
pub use error::EngineError;
pub use external::CommandEngine;
pub use registry::EngineRegistry;

/// Build the standard engine set for a worker process.
///
/// Every known engine is registered whether or not its backing CLI is
/// installed; availability is probed through the registry so a deployment
/// without, say, audio dependencies still reports the engine (unavailable)
/// and fails matching tasks with a descriptive error.
pub fn standard_registry() -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    registry.register(CommandEngine::pipeline());
    registry.register(CommandEngine::deepseek_ocr());
    registry.register(CommandEngine::paddleocr_vl());
    registry.register(CommandEngine::sensevoice());
    registry.register(CommandEngine::video());
    registry.register(MarkdownConvertEngine::new());
    registry
}
