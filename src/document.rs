//! Document extraction via a hosted multimodal model.
//!
//! The raw PDF bytes are sent inline (base64) together with a fixed
//! instruction asking for a JSON object with `title`, `author` and
//! `summary`. Models like to wrap JSON in markdown fences, so every
//! "```json" and "```" marker is removed before parsing.
//!
//! A reply that still is not the expected object is not an error: the
//! upload goes through with [`ExtractedDocument::unparseable`] as its
//! result. Failures of the model call itself (network, auth, quota) are
//! returned to the caller.
//!
//! # Gemini request
//!
//! ```text
//! POST {base_url}/models/{model}:generateContent
//! x-goog-api-key: $GEMINI_API_KEY
//!
//! { "contents": [{ "parts": [
//!     { "inline_data": { "mime_type": "application/pdf", "data": "<base64>" } },
//!     { "text": "<prompt>" } ] }] }
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::{credential, ExtractionConfig};
use crate::error::ChefError;
use crate::models::ExtractedDocument;

pub const PDF_MIME_TYPE: &str = "application/pdf";

pub const EXTRACTION_PROMPT: &str = "Extract the Title, Author, and a 3-sentence summary of \
    this document. Return the result strictly as a JSON object with keys: 'title', 'author', \
    and 'summary'.";

/// A hosted model that answers a prompt about an attached document.
#[async_trait]
pub trait DocumentModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Send `document` and `prompt`, returning the model's text reply.
    async fn generate(&self, document: &[u8], mime_type: &str, prompt: &str) -> Result<String>;
}

/// Ask `model` for title, author and summary of a PDF.
///
/// The returned record has an empty `filename`; the caller attaches it.
pub async fn process_document(model: &dyn DocumentModel, pdf: &[u8]) -> Result<ExtractedDocument> {
    let reply = model
        .generate(pdf, PDF_MIME_TYPE, EXTRACTION_PROMPT)
        .await
        .with_context(|| format!("document extraction with {} failed", model.model_name()))?;

    Ok(match parse_extraction_reply(&reply) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(
                error = %e,
                reply_len = reply.len(),
                "model reply is not the expected JSON"
            );
            ExtractedDocument::unparseable()
        }
    })
}

#[derive(Deserialize)]
struct ExtractionReply {
    title: String,
    author: String,
    summary: String,
}

/// Parse a model reply into an [`ExtractedDocument`], fences removed.
pub fn parse_extraction_reply(reply: &str) -> Result<ExtractedDocument, serde_json::Error> {
    let cleaned = strip_code_fences(reply);
    let parsed: ExtractionReply = serde_json::from_str(&cleaned)?;
    Ok(ExtractedDocument {
        title: parsed.title,
        author: parsed.author,
        summary: parsed.summary,
        filename: String::new(),
    })
}

/// Remove every "```json" and "```" marker, then trim.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

// ============ Gemini ============

/// Client for the Gemini `generateContent` REST API.
///
/// The API key is read once at construction; a missing key only fails
/// when a document is actually submitted, so the server can start without it.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    api_key_env: String,
}

impl GeminiClient {
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: credential(&config.api_key_env),
            api_key_env: config.api_key_env.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl DocumentModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, document: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ChefError::MissingCredential {
            var: self.api_key_env.clone(),
        })?;

        let body = build_request_body(document, mime_type, prompt);
        tracing::debug!(model = %self.model, bytes = document.len(), "submitting document");

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("failed to reach the document extraction model")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChefError::ModelApi {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            }
            .into());
        }

        let json: Value = resp.json().await?;
        reply_text(&json).ok_or_else(|| ChefError::EmptyModelReply.into())
    }
}

fn build_request_body(document: &[u8], mime_type: &str, prompt: &str) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(document);
    json!({
        "contents": [{
            "parts": [
                { "inline_data": { "mime_type": mime_type, "data": data } },
                { "text": prompt }
            ]
        }]
    })
}

/// Concatenate the text parts of the first candidate.
fn reply_text(json: &Value) -> Option<String> {
    let parts = json["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedModel {
        reply: Result<String, String>,
    }

    #[async_trait]
    impl DocumentModel for CannedModel {
        fn model_name(&self) -> &str {
            "canned"
        }

        async fn generate(
            &self,
            _document: &[u8],
            mime_type: &str,
            prompt: &str,
        ) -> Result<String> {
            assert_eq!(mime_type, "application/pdf");
            assert_eq!(prompt, EXTRACTION_PROMPT);
            self.reply.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    const PLAIN: &str = r#"{"title": "Rust in Action", "author": "Tim McNamara",
        "summary": "A book. About Rust. With examples."}"#;

    #[tokio::test]
    async fn fenced_and_plain_replies_parse_identically() {
        let plain = CannedModel {
            reply: Ok(PLAIN.to_string()),
        };
        let fenced = CannedModel {
            reply: Ok(format!("```json\n{}\n```", PLAIN)),
        };

        let a = process_document(&plain, b"%PDF-1.7").await.unwrap();
        let b = process_document(&fenced, b"%PDF-1.7").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.title, "Rust in Action");
        assert_eq!(a.author, "Tim McNamara");
        assert!(a.filename.is_empty());
    }

    #[tokio::test]
    async fn non_json_reply_yields_placeholder() {
        let model = CannedModel {
            reply: Ok("I could not read this document, sorry.".to_string()),
        };
        let doc = process_document(&model, b"%PDF").await.unwrap();
        assert_eq!(doc.title, "Error");
        assert_eq!(doc.author, "Error");
        assert_eq!(doc.summary, "Could not parse AI response.");
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let model = CannedModel {
            reply: Err("quota exceeded".to_string()),
        };
        let err = process_document(&model, b"%PDF").await.unwrap_err();
        assert!(format!("{:#}", err).contains("quota exceeded"));
    }

    #[test]
    fn missing_keys_and_non_objects_fail_to_parse() {
        assert!(parse_extraction_reply(r#"{"title": "T", "author": "A"}"#).is_err());
        assert!(parse_extraction_reply(r#"["title", "author", "summary"]"#).is_err());
        assert!(parse_extraction_reply("").is_err());
    }

    #[test]
    fn fences_removed_anywhere() {
        assert_eq!(strip_code_fences("  ```json{\"a\":1}```  "), "{\"a\":1}");
        assert_eq!(strip_code_fences("x```y```json z"), "xy z");
    }

    #[test]
    fn request_body_carries_base64_pdf() {
        let body = build_request_body(b"hello", PDF_MIME_TYPE, "prompt");
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[0]["inline_data"]["data"], "aGVsbG8=");
        assert_eq!(parts[1]["text"], "prompt");
    }

    #[test]
    fn reply_text_joins_parts() {
        let json = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
        });
        assert_eq!(reply_text(&json).as_deref(), Some("{\"a\":1}"));
        assert_eq!(reply_text(&json!({ "candidates": [] })), None);
    }

    #[tokio::test]
    async fn gemini_without_key_reports_missing_credential() {
        let cfg = ExtractionConfig {
            api_key_env: "CHEFDESK_TEST_UNSET_GEMINI_KEY".to_string(),
            ..ExtractionConfig::default()
        };
        let client = GeminiClient::from_config(&cfg).unwrap();
        let err = client.generate(b"%PDF", PDF_MIME_TYPE, "p").await.unwrap_err();
        assert!(err.to_string().contains("CHEFDESK_TEST_UNSET_GEMINI_KEY"));
    }
}
