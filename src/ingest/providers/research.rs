// src/ingest/providers/research.rs
//! Secondary source: a web-research chat API that answers with a numbered prose
//! listing plus a parallel list of citation URLs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ingest::prose::parse_listing;
use crate::ingest::types::{NewsSource, SourceRecord, SourceTier};

pub const DEFAULT_RESEARCH_ENDPOINT: &str = "https://api.perplexity.ai/chat/completions";

const SYSTEM_PROMPT: &str = "You are a news researcher. Find factual recent news only. \
Do not editorialize. Return a plain numbered list of news items.";

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    search_recency_filter: &'a str,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: String,
}

pub struct ResearchSource {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    query: String,
    fallback_label: String,
    timeout: Duration,
}

impl ResearchSource {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        model: String,
        query: String,
        fallback_label: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: DEFAULT_RESEARCH_ENDPOINT.to_string(),
            api_key,
            model,
            query,
            fallback_label,
            timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl NewsSource for ResearchSource {
    async fn fetch(&self) -> Result<Vec<SourceRecord>> {
        let req = Req {
            model: &self.model,
            search_recency_filter: "day",
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: &self.query,
                },
            ],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&req)
            .send()
            .await
            .context("research http post()")?
            .error_for_status()
            .context("research http status")?;
        let body: Resp = resp.json().await.context("research response json")?;

        let content = body
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or("");
        let records = parse_listing(content, &body.citations, Utc::now(), &self.fallback_label);
        tracing::info!(target: "ingest", count = records.len(), "research source returned records");
        Ok(records)
    }

    fn name(&self) -> &str {
        "research"
    }

    fn tier(&self) -> SourceTier {
        SourceTier::Secondary
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
