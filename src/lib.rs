pub mod assembler;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod transport;

pub use crate::config::Config;
pub use crate::error::{ChatError, Result};
pub use crate::models::{ContentUnit, PendingAttachment, Role, Turn};
pub use crate::orchestrator::{ChatOrchestrator, Phase, Refusal, SendOutcome};
