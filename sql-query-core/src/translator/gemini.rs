use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{
    database::Database,
    table::TableName,
    translator::{Answer, NlError, Translator, prompt, schema_context},
};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiSettings {
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<String>();
        match text.trim().is_empty() {
            true => None,
            false => Some(text),
        }
    }
}

/// Text-to-SQL over the Gemini `generateContent` API.
///
/// The key is only checked when a question is asked, so a client without one
/// can still be built and handed to the dispatcher.
pub struct GeminiTranslator {
    api_key: Option<String>,
    settings: GeminiSettings,
    client: Client,
}

impl GeminiTranslator {
    pub fn new(api_key: Option<String>, settings: GeminiSettings) -> Result<Self, NlError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| NlError::ApiUnavailable(format!("could not build HTTP client: {err}")))?;
        Ok(Self {
            api_key,
            settings,
            client,
        })
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, NlError> {
        let url = format!("{API_BASE}/models/{}:generateContent", self.settings.model);
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(&json!({
                "contents": [
                    {"role": "user", "parts": [{"text": prompt}]}
                ],
                "generationConfig": {"temperature": self.settings.temperature}
            }))
            .send()
            .await
            .map_err(|err| NlError::ApiUnavailable(format!("Gemini API error: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| NlError::ApiUnavailable(format!("failed to read response: {err}")))?;
        if !status.is_success() {
            return Err(NlError::ApiUnavailable(format!(
                "Gemini API error {status}: {body}"
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|err| {
            NlError::TranslationFailed(format!("failed to parse Gemini response: {err}"))
        })?;
        parsed
            .text()
            .ok_or_else(|| NlError::TranslationFailed("Gemini returned no text".into()))
    }
}

impl Translator for GeminiTranslator {
    async fn ask<D: Database>(
        &self,
        db: &mut D,
        question: &str,
        table: Option<&TableName>,
    ) -> Result<Answer, NlError> {
        let api_key = self.api_key.as_deref().ok_or(NlError::ApiKeyMissing)?;

        let schema = schema_context(db, table).await?;
        let reply = self
            .generate(api_key, &prompt::text_to_sql(question, &schema))
            .await?;
        let sql = prompt::extract_sql(&reply).ok_or_else(|| {
            NlError::TranslationFailed(format!("no SQL query found in model reply: {reply}"))
        })?;
        prompt::check_statement(&sql)?;
        info!("Generated SQL: {sql}");

        let rows = db
            .execute(&sql)
            .await
            .map_err(|err| NlError::TranslationFailed(format!("generated query failed: {err}")))?;
        let text = self
            .generate(api_key, &prompt::synthesize(question, &sql, &rows))
            .await?;
        Ok(Answer {
            text: text.trim().to_string(),
            sql: Some(sql),
        })
    }
}
