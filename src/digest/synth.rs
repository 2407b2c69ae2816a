// src/digest/synth.rs
//! Synthesis collaborator: turns numbered records into headline, intro,
//! sections and citations. Treated as an opaque, fallible capability.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::digest::DigestSection;
use crate::ingest::types::SourceRecord;

pub const DEFAULT_MESSAGES_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const TOOL_NAME: &str = "create_digest";

/// Citation exactly as the collaborator returned it; not yet trusted.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RawCitation {
    pub index: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SynthesisOutput {
    pub headline: String,
    pub intro: String,
    #[serde(default)]
    pub sections: Vec<DigestSection>,
    #[serde(default)]
    pub citations: Vec<RawCitation>,
}

#[async_trait]
pub trait DigestSynthesizer: Send + Sync {
    /// `records` is non-empty and 1-indexed for citation purposes.
    async fn synthesize(&self, records: &[SourceRecord], date: &str) -> Result<SynthesisOutput>;
    fn provider_name(&self) -> &'static str;
}

pub type DynSynthesizer = Arc<dyn DigestSynthesizer>;

/// Always fails; used when no credential is configured.
pub struct DisabledSynthesizer;

#[async_trait]
impl DigestSynthesizer for DisabledSynthesizer {
    async fn synthesize(&self, _records: &[SourceRecord], _date: &str) -> Result<SynthesisOutput> {
        bail!("synthesis is not configured")
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Numbered record list as it appears in the prompt.
pub fn format_records(records: &[SourceRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let summary = if r.summary.is_empty() {
                "(no summary)"
            } else {
                r.summary.as_str()
            };
            format!(
                "[{}] Source: {}\nTitle: {}\nDate: {}\nSummary: {}\nURL: {}",
                i + 1,
                r.source_name,
                r.title,
                r.published_at.to_rfc3339(),
                summary,
                r.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn build_prompt(topic: &str, records: &[SourceRecord], date: &str) -> String {
    format!(
        "You are a compassionate journalist writing a morning news digest about {topic} for affected residents. Today is {date}.

Below are numbered news articles. Write a CONCISE digest: keep each section to 2-3 sentences, total output must be brief.

CITATION RULES:
- Add [N] after specific facts, statistics, names, dollar amounts, or dates (e.g. \"Roads reopened[3]\").
- Only cite article numbers that actually support the statement. Do not cite things you made up.

ARTICLES:
{articles}

Call the {TOOL_NAME} tool with:
- headline: Short headline (e.g. '{topic} Morning Digest, {date}')
- intro: 1-2 sentences summarizing today's biggest themes, with [N] citations for any specific facts
- sections: 3-5 thematic sections, each with a heading and 2-3 sentences with [N] citations
  - Headings: 'Fire & Safety Updates', 'Recovery & Rebuilding', 'Community Resources', 'Insurance & Legal', 'Environment & Air Quality', 'Local Government', 'Notable Stories'
  - Surface deadlines, phone numbers, and resources when present
- citations: only articles you actually cited with [N], each with index, title, url, source",
        articles = format_records(records),
    )
}

fn tool_schema() -> serde_json::Value {
    json!({
        "name": TOOL_NAME,
        "description": "Create a structured morning news digest",
        "input_schema": {
            "type": "object",
            "properties": {
                "headline": { "type": "string" },
                "intro": { "type": "string" },
                "sections": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "heading": { "type": "string" },
                            "body": { "type": "string" }
                        },
                        "required": ["heading", "body"]
                    }
                },
                "citations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "index": { "type": "number" },
                            "title": { "type": "string" },
                            "url": { "type": "string" },
                            "source": { "type": "string" }
                        },
                        "required": ["index", "title", "url", "source"]
                    }
                }
            },
            "required": ["headline", "intro", "sections", "citations"]
        }
    })
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    max_tokens: u32,
    tools: Vec<serde_json::Value>,
    tool_choice: serde_json::Value,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

/// Pull the forced tool call out of a messages-API response body.
pub fn extract_tool_output(body: &str) -> Result<SynthesisOutput> {
    let resp: Resp = serde_json::from_str(body).context("parsing synthesis response")?;
    let input = resp
        .content
        .into_iter()
        .find(|b| b.kind == "tool_use")
        .and_then(|b| b.input)
        .ok_or_else(|| anyhow!("synthesis response has no tool_use block"))?;
    serde_json::from_value(input).context("decoding create_digest tool input")
}

/// Messages-API client forcing the `create_digest` tool.
pub struct AnthropicSynthesizer {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    topic: String,
    timeout: Duration,
}

impl AnthropicSynthesizer {
    pub fn new(http: reqwest::Client, api_key: String, model: String, topic: String) -> Self {
        Self {
            http,
            endpoint: DEFAULT_MESSAGES_ENDPOINT.to_string(),
            api_key,
            model,
            topic,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl DigestSynthesizer for AnthropicSynthesizer {
    async fn synthesize(&self, records: &[SourceRecord], date: &str) -> Result<SynthesisOutput> {
        if records.is_empty() {
            bail!("refusing to synthesize an empty record set");
        }
        let prompt = build_prompt(&self.topic, records, date);
        let req = Req {
            model: &self.model,
            max_tokens: 3000,
            tools: vec![tool_schema()],
            tool_choice: json!({ "type": "tool", "name": TOOL_NAME }),
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(self.timeout)
            .json(&req)
            .send()
            .await
            .context("synthesis http post()")?;
        let status = resp.status();
        let body = resp.text().await.context("synthesis http .text()")?;
        if !status.is_success() {
            bail!("synthesis api returned {status}");
        }

        extract_tool_output(&body)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
