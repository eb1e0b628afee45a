// src/lib.rs
// Public library surface for the runner binary and integration tests.

pub mod analyze;
pub mod config;
pub mod context;
pub mod cooldown;
pub mod engine;
pub mod feedback;
pub mod generate;
pub mod keylock;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod preference;
pub mod scheduler;
pub mod signal;
pub mod store;
pub mod telemetry;
pub mod trigger;

// ---- Re-exports for stable public API ----
pub use crate::config::InsightConfig;
pub use crate::engine::{EngineStores, InsightEngine, LogOutcome, MemoryBackend};
pub use crate::feedback::FeedbackSubmission;
pub use crate::generate::{GeneratedInsight, GenerationError, InsightGenerator};
pub use crate::model::{Insight, InsightKind, Log, Vote};
pub use crate::pipeline::PipelineOutcome;
pub use crate::trigger::{SkipReason, TriggerDecision};
