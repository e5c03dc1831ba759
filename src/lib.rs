//! Movie recommendation chatbot.
//!
//! A typed or spoken query is first matched against the genre column of a CSV
//! movie table; when nothing matches, the whole table is handed to a local
//! text-generation model as context and its answer is returned instead.

pub mod chat;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod llm_interaction;
pub mod prompt;
pub mod resolver;
pub mod speech;
pub mod web_server;

pub use dataset::{Dataset, DatasetError, MovieRecord};
pub use llm_interaction::{GenerationError, GenerationParams, OllamaGenerator, TextGenerator};
pub use prompt::PromptTemplate;
pub use resolver::{AnswerSource, Resolution, Resolver};
pub use speech::{AudioClip, SpeechError, SpeechToText, WhisperTranscriber};
