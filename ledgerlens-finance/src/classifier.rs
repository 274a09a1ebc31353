//! Categorization gateway: batch of descriptions in, one category per description out.
//!
//! Two implementations ship with the crate:
//! - `KeywordClassifier`: offline keyword rules from `ledgerlens_core::categorizer`
//! - `LlmClassifier`: any OpenAI-compatible chat-completions endpoint (Groq by default)

use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ledgerlens_core::Category;
use regex::Regex;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai";
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Return labels in input order. May return fewer labels than inputs;
    /// callers treat the missing tail as `Uncategorized`.
    async fn categorize(&self, descriptions: &[String]) -> Result<Vec<Category>>;
}

/// Deterministic keyword rules, no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &str {
        "keywords"
    }

    async fn categorize(&self, descriptions: &[String]) -> Result<Vec<Category>> {
        Ok(descriptions
            .iter()
            .map(|d| ledgerlens_core::categorize(d))
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Base URL without the `/v1/...` suffix.
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

/// Chat-completions backed classifier. Sends the whole batch in one prompt.
#[derive(Debug, Clone)]
pub struct LlmClassifier {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmClassifier {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn categorize(&self, descriptions: &[String]) -> Result<Vec<Category>> {
        #[derive(Serialize)]
        struct Msg {
            role: String,
            content: String,
        }

        #[derive(Serialize)]
        struct Req {
            model: String,
            messages: Vec<Msg>,
            temperature: f32,
            max_tokens: u32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = Req {
            model: self.config.model.clone(),
            messages: vec![Msg {
                role: "user".to_string(),
                content: build_prompt(descriptions),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .context("categorization request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("categorization service error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse categorization response")?;
        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(parse_labels(&content))
    }
}

/// Prompt listing the vocabulary and the descriptions, one per line.
pub fn build_prompt(descriptions: &[String]) -> String {
    let vocabulary = Category::ALL
        .iter()
        .map(|c| format!("'{}'", c.label()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Categorize the following financial transaction descriptions into one of these \
         categories: [{vocabulary}]. If a description doesn't fit, use '{uncategorized}'. \
         Return only a comma-separated list of categories, in the same order as the input \
         descriptions. \
         Example: 'Coffee Shop, Supermarket' -> 'Dining Out, Groceries'\n\n\
         Descriptions:\n{lines}",
        uncategorized = Category::Uncategorized.label(),
        lines = descriptions.join("\n"),
    )
}

static ENUMERATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*])\s*").expect("static regex"));

/// Split a model reply into labels. Comma-separated is expected; one label per
/// line is accepted as well. Unknown labels map to `Uncategorized`.
pub fn parse_labels(content: &str) -> Vec<Category> {
    let content = content.trim();
    if content.is_empty() {
        return Vec::new();
    }
    let sep = if content.contains(',') { ',' } else { '\n' };
    content
        .split(sep)
        .map(|raw| Category::from_label(&ENUMERATION.replace(raw, "")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answer one HTTP request with `status` and `body`; yields the raw request.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf);
                if let Some(end) = text.find("\r\n\r\n") {
                    let body_len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let l = l.to_ascii_lowercase();
                            l.strip_prefix("content-length:")
                                .and_then(|v| v.trim().parse::<usize>().ok())
                        })
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + body_len {
                        break;
                    }
                }
            }

            let reply = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(reply.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
            String::from_utf8_lossy(&buf).into_owned()
        });

        (base_url, handle)
    }

    fn local_classifier(base_url: String) -> LlmClassifier {
        let mut config = LlmConfig::groq("test-key");
        config.base_url = base_url;
        LlmClassifier {
            config,
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_keyword_classifier_keeps_order_and_length() {
        let descs = vec![
            "WHOLE FOODS MARKET".to_string(),
            "ZZQX 0042".to_string(),
            "Monthly rent".to_string(),
        ];
        let cats = KeywordClassifier.categorize(&descs).await.unwrap();
        assert_eq!(
            cats,
            vec![Category::Groceries, Category::Uncategorized, Category::Rent]
        );
    }

    #[tokio::test]
    async fn test_llm_classifier_maps_reply_to_categories() {
        let reply = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Groceries, Rent" } }]
        });
        let (base_url, server) = serve_once("200 OK", reply.to_string()).await;
        let classifier = local_classifier(base_url);

        let descs = vec!["WHOLE FOODS".to_string(), "LANDLORD".to_string()];
        let cats = classifier.categorize(&descs).await.unwrap();
        assert_eq!(cats, vec![Category::Groceries, Category::Rent]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions"), "{request}");
        assert!(request.contains("Bearer test-key"), "{request}");
        assert!(request.contains("LANDLORD"), "{request}");
    }

    #[tokio::test]
    async fn test_llm_classifier_non_success_status_is_error() {
        let (base_url, server) =
            serve_once("500 Internal Server Error", "upstream down".to_string()).await;
        let classifier = local_classifier(base_url);

        let err = classifier
            .categorize(&["WHOLE FOODS".to_string()])
            .await
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("categorization service error"), "{msg}");
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("upstream down"), "{msg}");
        server.await.unwrap();
    }

    #[test]
    fn test_parse_comma_separated() {
        let cats = parse_labels("Dining Out, Groceries,Travel");
        assert_eq!(cats, vec![Category::DiningOut, Category::Groceries, Category::Travel]);
    }

    #[test]
    fn test_parse_unknown_labels() {
        let cats = parse_labels("Pets, Groceries, ");
        assert_eq!(
            cats,
            vec![Category::Uncategorized, Category::Groceries, Category::Uncategorized]
        );
    }

    #[test]
    fn test_parse_numbered_lines() {
        let cats = parse_labels("1. Rent\n2. Salary\n3) Healthcare");
        assert_eq!(cats, vec![Category::Rent, Category::Salary, Category::Healthcare]);
    }

    #[test]
    fn test_parse_empty_reply() {
        assert!(parse_labels("  \n").is_empty());
    }

    #[test]
    fn test_prompt_lists_vocabulary_and_descriptions() {
        let prompt = build_prompt(&["Coffee Shop".to_string(), "Supermarket".to_string()]);
        for c in Category::ALL {
            assert!(prompt.contains(c.label()));
        }
        assert!(prompt.ends_with("Coffee Shop\nSupermarket"));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let mut cfg = LlmConfig::groq("key");
        cfg.base_url = "http://localhost:8080/".to_string();
        let c = LlmClassifier::new(cfg);
        assert_eq!(c.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
