use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const CHAT_MODEL: &str = "gpt-4.1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Categories the model is allowed to answer with. Anything else is
/// normalised to an empty classification. The system prompt additionally
/// offers "Music", which this list deliberately does not accept.
pub const VALID_CATEGORIES: [&str; 17] = [
    "SNS",
    "Documentation",
    "Design",
    "Communication",
    "LLM",
    "Development",
    "Productivity",
    "Video Editing",
    "Entertainment",
    "File Management",
    "System & Utilities",
    "Game",
    "Education",
    "Finance",
    "Browsing",
    "Marketing",
    "E-commerce & Shopping",
];

const SYSTEM_PROMPT: &str = "You are a usage categorization expert. Based on the user's active application usage pattern, categorize their current behavior into one of the predefined categories.\n\n\
**Analysis Context:**\n\
- App Name: The specific application the user is currently using\n\
- Title: The window title or content description\n\
- URL: The web address or application context (if applicable)\n\n\
**Instructions:**\n\
1. Analyze the user's digital behavior pattern from the provided app usage data\n\
2. Consider the app's primary function and the specific context (title/URL)\n\
3. Infer the user's intent and activity type\n\
4. If user use youtube but title is not about entertainment, should categorize properly\n\
4. Respond with **exactly one** category from the list below\n\
5. **Do not provide explanations or additional text**\n\n\
**Categories:**\n\
SNS, Documentation, Design, Communication, LLM, Development, Productivity, Video Editing, Entertainment, File Management, System & Utilities, Game, Education, Finance, Browsing, Marketing, Music, E-commerce & Shopping";

/// Remote fallback categoriser consulted when no literal pattern matches.
///
/// Implementations must return a category from [`VALID_CATEGORIES`] or an
/// empty string when the answer is unusable; callers treat errors the same
/// way as empty answers.
#[async_trait]
pub trait UsageLlm: Send + Sync {
    async fn classify_usage(&self, app: &str, title: &str, url: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: &'static str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build LLM http client")?;

        Ok(Self { http, api_key })
    }

    fn build_prompt(app: &str, title: &str, url: &str) -> String {
        let mut parts = Vec::new();
        if !app.is_empty() {
            parts.push(format!("Application: {app}"));
        }
        if !title.is_empty() {
            parts.push(format!("Title: {title}"));
        }
        if !url.is_empty() {
            parts.push(format!("URL: {url}"));
        }
        parts.join("\n")
    }
}

#[async_trait]
impl UsageLlm for OpenAiClient {
    async fn classify_usage(&self, app: &str, title: &str, url: &str) -> Result<String> {
        let request = ChatRequest {
            model: CHAT_MODEL,
            temperature: 0.1,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: Self::build_prompt(app, title, url),
                },
            ],
        };

        let response = self
            .http
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("failed to call OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("OpenAI API error ({status}): {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to decode OpenAI response")?;

        let answer = match parsed.choices.first() {
            Some(choice) => choice.message.content.trim(),
            None => bail!("no response choices from OpenAI"),
        };

        Ok(validate_category(answer))
    }
}

/// Maps any answer outside the valid set to an empty classification.
pub(crate) fn validate_category(raw: &str) -> String {
    if VALID_CATEGORIES.contains(&raw) {
        raw.to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_categories_pass_through() {
        assert_eq!(validate_category("Development"), "Development");
        assert_eq!(validate_category("E-commerce & Shopping"), "E-commerce & Shopping");
    }

    #[test]
    fn test_unknown_answers_become_empty() {
        assert_eq!(validate_category("Coding"), "");
        assert_eq!(validate_category("development"), "");
        assert_eq!(validate_category(""), "");
    }

    #[test]
    fn test_music_is_prompted_but_not_accepted() {
        assert!(SYSTEM_PROMPT.contains("Music"));
        assert_eq!(validate_category("Music"), "");
    }

    #[test]
    fn test_prompt_skips_empty_parts() {
        let prompt = OpenAiClient::build_prompt("chrome", "", "https://a.example");
        assert_eq!(prompt, "Application: chrome\nURL: https://a.example");
    }

    #[test]
    fn test_request_wire_shape() {
        let request = ChatRequest {
            model: CHAT_MODEL,
            temperature: 0.1,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: "Application: mpv".to_string(),
                },
            ],
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4.1");
        assert_eq!(value["temperature"], 0.1);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "Application: mpv");
    }
}
