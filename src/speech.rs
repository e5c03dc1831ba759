//! Voice input: turns a recorded audio clip into query text.
//!
//! Capture itself happens outside this crate (browser upload or a file on
//! disk). A transcription either yields non-empty text or fails with one of
//! two kinds, each shown to the user as its own message.

use futures::future::BoxFuture;
use reqwest::{multipart, Client};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub const UNINTELLIGIBLE_MESSAGE: &str = "Could not understand audio.";
pub const SERVICE_ERROR_MESSAGE: &str = "Speech API returned an error.";

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech was not understood")]
    Unintelligible,
    #[error("speech recognition service error: {0}")]
    Service(String),
}

impl SpeechError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            SpeechError::Unintelligible => UNINTELLIGIBLE_MESSAGE,
            SpeechError::Service(_) => SERVICE_ERROR_MESSAGE,
        }
    }
}

/// A recorded clip as received from the caller.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Builds a clip from a file name, guessing the MIME type from its extension.
    pub fn from_file_name(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self {
            bytes,
            file_name,
            mime_type,
        }
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        _ => "application/octet-stream",
    }
}

pub trait SpeechToText: Send + Sync {
    fn transcribe<'a>(&'a self, clip: &'a AudioClip) -> BoxFuture<'a, Result<String, SpeechError>>;
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Client for a Whisper-style HTTP endpoint that accepts a multipart `file`
/// field and answers with `{"text": "..."}`.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    client: Client,
    url: String,
}

impl WhisperTranscriber {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    #[instrument(skip(self, clip), fields(url = %self.url, bytes = clip.bytes.len()))]
    async fn request(&self, clip: &AudioClip) -> Result<String, SpeechError> {
        if clip.bytes.is_empty() {
            warn!("Empty audio clip, nothing to transcribe");
            return Err(SpeechError::Unintelligible);
        }

        let part = multipart::Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.mime_type)
            .map_err(|e| SpeechError::Service(format!("invalid audio MIME type: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let resp = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Transcription request failed: {e:?}");
                SpeechError::Service(e.to_string())
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, %body, "Transcription service returned an error");
            return Err(SpeechError::Service(format!("{status} - {body}")));
        }

        let result: WhisperResponse = resp
            .json()
            .await
            .map_err(|e| SpeechError::Service(format!("invalid transcription response: {e}")))?;

        let text = result.text.trim();
        if text.is_empty() {
            warn!("Transcription came back empty");
            return Err(SpeechError::Unintelligible);
        }
        info!("User question (speech): {}", text);
        Ok(text.to_string())
    }
}

impl SpeechToText for WhisperTranscriber {
    fn transcribe<'a>(&'a self, clip: &'a AudioClip) -> BoxFuture<'a, Result<String, SpeechError>> {
        Box::pin(self.request(clip))
    }
}
