//! Query resolution: dataset lookup first, generative fallback on a miss.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::dataset::{Dataset, MovieRecord};
use crate::llm_interaction::{GenerationError, GenerationParams, TextGenerator};
use crate::prompt::PromptTemplate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Dataset,
    Generated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub source: AnswerSource,
    pub text: String,
    /// Number of dataset rows behind a `Dataset` answer; zero for generated ones.
    pub matches: usize,
}

pub struct Resolver {
    dataset: Arc<Dataset>,
    generator: Arc<dyn TextGenerator>,
    template: PromptTemplate,
    params: GenerationParams,
}

impl Resolver {
    pub fn new(dataset: Arc<Dataset>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            dataset,
            generator,
            template: PromptTemplate::default(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn template(&self) -> PromptTemplate {
        self.template
    }

    /// Answers `query` from the dataset when any genre contains it, otherwise asks the model.
    ///
    /// Generator failures are returned unchanged; nothing is retried.
    #[instrument(skip(self))]
    pub async fn resolve(&self, query: &str) -> Result<Resolution, GenerationError> {
        let query = query.trim();

        let hits = self.dataset.lookup(query);
        if !hits.is_empty() {
            info!(matches = hits.len(), "Answered from dataset");
            return Ok(Resolution {
                source: AnswerSource::Dataset,
                text: format_matches(&hits),
                matches: hits.len(),
            });
        }

        let prompt = self.template.build(self.dataset.context_blob(), query);
        debug!(template = %self.template, prompt_len = prompt.len(), "No dataset match, falling back to model");

        let generated = self.generator.generate(&prompt, self.params).await?;
        let text = generated.trim().to_string();
        info!(answer_len = text.len(), "Answered from model");

        Ok(Resolution {
            source: AnswerSource::Generated,
            text,
            matches: 0,
        })
    }
}

pub fn format_matches(records: &[&MovieRecord]) -> String {
    records
        .iter()
        .map(|record| record.format_line())
        .collect::<Vec<_>>()
        .join("\n")
}
