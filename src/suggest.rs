//! AI subtask suggestions.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Breaks a task title into a few short steps.
///
/// Best effort: any failure yields an empty list and is never retried.
pub trait SubtaskSuggester {
    fn suggest(&self, title: &str) -> Vec<String>;
}

/// Used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSuggestions;

impl SubtaskSuggester for NoSuggestions {
    fn suggest(&self, _title: &str) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, thiserror::Error)]
enum SuggestError {
    #[error("request failed: {0}")]
    Http(Box<ureq::Error>),
    #[error("failed to read response: {0}")]
    Io(#[from] std::io::Error),
    #[error("unexpected response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response had no text")]
    Empty,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Gemini `generateContent` over HTTPS.
pub struct GeminiSuggester {
    api_key: String,
    model: String,
    base_url: String,
    agent: ureq::Agent,
}

impl GeminiSuggester {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(10))
                .timeout_read(Duration::from_secs(30))
                .build(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reads `GEMINI_API_KEY` (or `API_KEY`) and `GEMINI_MODEL`.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|k| !k.trim().is_empty())?;
        let suggester = Self::new(key);
        Some(match std::env::var("GEMINI_MODEL") {
            Ok(model) if !model.trim().is_empty() => suggester.with_model(model),
            _ => suggester,
        })
    }

    fn request(&self, title: &str) -> Result<Vec<String>, SuggestError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt(title) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": { "type": "ARRAY", "items": { "type": "STRING" } }
            }
        });
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .map_err(|e| SuggestError::Http(Box::new(e)))?
            .into_string()?;
        parse_suggestions(&response)
    }
}

impl SubtaskSuggester for GeminiSuggester {
    fn suggest(&self, title: &str) -> Vec<String> {
        if title.trim().is_empty() {
            return Vec::new();
        }
        match self.request(title) {
            Ok(steps) => {
                debug!(count = steps.len(), "received subtask suggestions");
                steps
            }
            Err(e) => {
                warn!(error = %e, "subtask suggestion failed");
                Vec::new()
            }
        }
    }
}

/// Picks the configured suggester, or [`NoSuggestions`] without a key.
pub fn suggester_from_env() -> Box<dyn SubtaskSuggester> {
    match GeminiSuggester::from_env() {
        Some(s) => Box::new(s),
        None => {
            debug!("no GEMINI_API_KEY set, subtask suggestions disabled");
            Box::new(NoSuggestions)
        }
    }
}

fn prompt(title: &str) -> String {
    format!(
        "Break down the task \"{title}\" into 3-5 small, actionable sub-steps. Keep them concise."
    )
}

fn parse_suggestions(response: &str) -> Result<Vec<String>, SuggestError> {
    let parsed: GenerateResponse = serde_json::from_str(response)?;
    let text = parsed
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
        .ok_or(SuggestError::Empty)?;
    let steps: Vec<String> = serde_json::from_str(&text)?;
    Ok(steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
