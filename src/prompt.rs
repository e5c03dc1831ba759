use std::fmt;
use std::str::FromStr;

use crate::constants::NO_INFORMATION;

/// How the fallback question is phrased to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptTemplate {
    /// Passes the user's text through as the question.
    #[default]
    Question,
    /// Wraps the text as a request to list movies and ratings for a genre.
    GenreListing,
}

impl PromptTemplate {
    pub fn build(&self, context_blob: &str, query: &str) -> String {
        match self {
            PromptTemplate::Question => format!(
                "Use the following data to answer the question. \
                 If not available, say '{NO_INFORMATION}'\n\n\
                 Data:\n{context_blob}\n\n\
                 Question: {query}\nAnswer:"
            ),
            PromptTemplate::GenreListing => format!(
                "Use the following movie data to answer the question. \
                 If no matching movies are found, say '{NO_INFORMATION}'\n\n\
                 Data:\n{context_blob}\n\n\
                 Question: List movies and their ratings for genre: {query}\nAnswer:"
            ),
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptTemplate::Question => f.write_str("question"),
            PromptTemplate::GenreListing => f.write_str("genre-listing"),
        }
    }
}

impl FromStr for PromptTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "question" => Ok(PromptTemplate::Question),
            "genre-listing" | "genre" => Ok(PromptTemplate::GenreListing),
            other => Err(format!(
                "unknown prompt template '{other}' (expected 'question' or 'genre-listing')"
            )),
        }
    }
}
