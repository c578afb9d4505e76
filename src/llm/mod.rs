pub mod mock;
pub mod ollama;
pub mod prompt;
pub mod provider;
pub mod types;

pub use mock::MockGenerator;
pub use ollama::OllamaGenerator;
pub use provider::{generator_from_config, AnswerGenerator};
pub use types::{ChatMessage, ChatRequest};
