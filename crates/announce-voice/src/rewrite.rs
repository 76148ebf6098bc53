//! Optional language-model pass that turns a request into announcement copy.

use crate::error::VoiceError;
use crate::style::Style;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You are an announcement copywriter.
- Return a SHORT, polished announcement: max 2 sentences.
- Respect the requested style: friendly | formal | urgent | custom.
- Write the announcement in the requested language.
- Be inclusive and appropriate; avoid targeting protected traits (age, gender, etc.).
- If the request is unsafe/inappropriate, transform it into a safe, inclusive announcement.
- Output ONLY the announcement text, no quotes, no preface.";

/// Tone guidance for `style`. A `custom` style uses the caller's own
/// description when one is given.
pub fn style_note<'a>(style: &str, custom: Option<&'a str>) -> &'a str {
    if style.trim().eq_ignore_ascii_case("custom") {
        if let Some(note) = custom.map(str::trim).filter(|n| !n.is_empty()) {
            return note;
        }
    }
    Style::from_label(style).note()
}

/// Text-in, text-out copywriter.
#[async_trait]
pub trait AnnouncementWriter: Send + Sync + std::fmt::Debug {
    async fn rewrite(
        &self,
        text: &str,
        language: &str,
        style_note: &str,
    ) -> Result<String, VoiceError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiWriter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiWriter {
    pub fn new(api_key: impl Into<String>) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Rewrite(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl AnnouncementWriter for OpenAiWriter {
    async fn rewrite(
        &self,
        text: &str,
        language: &str,
        style_note: &str,
    ) -> Result<String, VoiceError> {
        let prompt = format!("LANGUAGE: {language}\nSTYLE: {style_note}\nUser request:\n{text}");
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.2,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::Rewrite(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(VoiceError::Rewrite(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| VoiceError::Rewrite(format!("invalid response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(VoiceError::Rewrite("model returned no text".to_string()));
        }
        tracing::debug!(model = %self.model, chars = content.len(), "announcement rewritten");
        Ok(content)
    }
}
