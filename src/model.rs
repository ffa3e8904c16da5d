use serde::{Deserialize, Serialize};

/// Text produced by `/extract`, `/transcribe` and `/transcribe-url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step: u64,
    pub instruction: String,
}

/// Ingredients and steps produced by `/parse`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedRecipe {
    pub ingredients: Vec<String>,
    pub steps: Vec<Step>,
}

/// A file part received from the client, ready to be re-sent upstream.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: axum::body::Bytes,
}

impl Upload {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
