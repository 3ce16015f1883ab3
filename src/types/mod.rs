// Public modules
pub mod chat_completion;
pub mod chat_completion_chunk;
pub mod chat_request;
pub mod error_object;
pub mod finish_reason;
pub mod message;
pub mod model_info;
pub mod usage;

// Re-exports
pub use chat_completion::{ChatCompletion, Choice, ResponseMessage};
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, Delta};
pub use chat_request::ChatRequest;
pub use error_object::{ErrorObject, ErrorResponse};
pub use finish_reason::FinishReason;
pub use message::{Message, Role};
pub use model_info::{ModelInfo, ModelList, ModelPricing};
pub use usage::Usage;
