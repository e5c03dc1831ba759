use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::constants;
use crate::dataset::Dataset;
use crate::llm_interaction::OllamaGenerator;
use crate::prompt::PromptTemplate;
use crate::resolver::Resolver;
use crate::speech::WhisperTranscriber;

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_path: PathBuf,
    pub ollama_url: String,
    pub model: String,
    pub stt_url: String,
    pub templates_dir: PathBuf,
    pub prompt_template: PromptTemplate,
    /// Unset means generation requests wait as long as the service takes.
    pub llm_timeout: Option<Duration>,
    pub max_audio_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(constants::DATA_PATH.as_str()),
            ollama_url: constants::OLLAMA_URL.clone(),
            model: constants::MOVIEBOT_MODEL.clone(),
            stt_url: constants::STT_URL.clone(),
            templates_dir: PathBuf::from(constants::TEMPLATES_DIR.as_str()),
            prompt_template: PromptTemplate::default(),
            llm_timeout: None,
            max_audio_bytes: constants::MAX_AUDIO_BYTES,
        }
    }
}

impl Settings {
    pub fn load_dataset(&self) -> Result<Arc<Dataset>> {
        let dataset = Dataset::from_path(&self.data_path)
            .with_context(|| format!("Failed to load movie dataset from {}", self.data_path.display()))?;
        Ok(Arc::new(dataset))
    }

    pub fn generator(&self) -> Result<OllamaGenerator> {
        match self.llm_timeout {
            Some(timeout) => OllamaGenerator::with_timeout(&self.ollama_url, &self.model, timeout)
                .context("Failed to build text generation client"),
            None => Ok(OllamaGenerator::new(&self.ollama_url, &self.model)),
        }
    }

    pub fn transcriber(&self) -> WhisperTranscriber {
        WhisperTranscriber::new(&self.stt_url)
    }

    /// Loads the dataset and wires the resolver to the configured model.
    pub fn build_resolver(&self) -> Result<Resolver> {
        let dataset = self.load_dataset()?;
        let generator = self.generator()?;
        info!(
            records = dataset.len(),
            model = %self.model,
            url = %self.ollama_url,
            template = %self.prompt_template,
            "Resolver ready"
        );
        Ok(Resolver::new(dataset, Arc::new(generator)).with_template(self.prompt_template))
    }
}
