//! 核心编排层：错误类型与主控循环

pub mod error;
pub mod orchestrator;

pub use error::TutorError;
pub use orchestrator::{Orchestrator, OrchestratorConfig, TurnOutcome};
