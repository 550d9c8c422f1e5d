pub mod clients;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod orchestrator;
pub mod outline;
pub mod prompts;
pub mod rate_limit;

pub use error::{Result, WeaverError};
pub use orchestrator::{ArticleGenerator, ArticleResult, ErrorResult, GenerateResponse};
