// Defaults for external services and files, overridable from the environment.

use std::env;

lazy_static::lazy_static! {
    pub static ref OLLAMA_URL: String = env::var("OLLAMA_URL").unwrap_or_else(|_| "http://127.0.0.1:11434".to_string());
    pub static ref MOVIEBOT_MODEL: String = env::var("MOVIEBOT_MODEL").unwrap_or_else(|_| "flan-t5-base".to_string());
    // Whisper-compatible endpoint accepting a multipart `file` field.
    pub static ref STT_URL: String = env::var("MOVIEBOT_STT_URL").unwrap_or_else(|_| "http://127.0.0.1:9000/transcribe".to_string());
    pub static ref DATA_PATH: String = env::var("MOVIEBOT_DATA").unwrap_or_else(|_| "data/top_20_movie_dataset.csv".to_string());
    pub static ref TEMPLATES_DIR: String = env::var("MOVIEBOT_TEMPLATES").unwrap_or_else(|_| "templates".to_string());
}

pub const DEFAULT_PORT: u16 = 8501;
pub const MAX_NEW_TOKENS: u32 = 150;
pub const MAX_AUDIO_BYTES: usize = 10 * 1024 * 1024;

pub const NO_INFORMATION: &str = "No information found.";
