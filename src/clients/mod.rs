pub mod llm_client;

pub use llm_client::{
    ContentPart, GenerationParams, ModelBackend, ModelRequest, OpenAiBackend, TextStream,
};
