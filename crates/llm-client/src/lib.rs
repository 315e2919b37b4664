//! Summarization clients: a remote text-generation endpoint and an offline template.

pub mod error;
pub mod summarizer;
pub mod template;

pub use error::{LlmError, LlmResult};
pub use summarizer::HttpSummarizer;
pub use template::TemplateSummarizer;
