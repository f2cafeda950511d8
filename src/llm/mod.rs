//! LLM 客户端抽象与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{FailingLlmClient, MockLlmClient};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmMessage, LlmRole};
