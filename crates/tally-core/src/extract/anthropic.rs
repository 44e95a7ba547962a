//! Anthropic Messages API extraction backend
//!
//! One request per document: the document as a base64 `document` (PDF) or
//! `image` block, followed by the extraction prompt as a `text` block. The
//! first text block of the reply is parsed as the receipt. No retries.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::document::Document;
use super::parsing::parse_receipt_reply;
use super::prompt::EXTRACTION_PROMPT;
use super::types::ParsedReceipt;
use super::ReceiptExtractor;
use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, Result};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API request
#[derive(Debug, Serialize)]
pub struct MessagesRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
pub struct Message<'a> {
    pub role: &'static str,
    pub content: Vec<RequestBlock<'a>>,
}

/// Content blocks sent to the model
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestBlock<'a> {
    Document { source: Base64Source },
    Image { source: Base64Source },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
pub struct Base64Source {
    #[serde(rename = "type")]
    pub source_type: &'static str,
    pub media_type: &'static str,
    pub data: String,
}

impl<'a> MessagesRequest<'a> {
    /// Single user turn: the document, then the prompt
    pub fn for_document(model: &'a str, max_tokens: u32, document: &Document) -> Self {
        let source = Base64Source {
            source_type: "base64",
            media_type: document.kind.media_type(),
            data: document.base64(),
        };
        let document_block = if document.kind.is_image() {
            RequestBlock::Image { source }
        } else {
            RequestBlock::Document { source }
        };

        Self {
            model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content: vec![
                    document_block,
                    RequestBlock::Text {
                        text: EXTRACTION_PROMPT,
                    },
                ],
            }],
        }
    }
}

/// Anthropic Messages API response
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
    pub model: Option<String>,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl MessagesResponse {
    /// First text block of the reply
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ResponseBlock::Text { text } => Some(text.as_str()),
            ResponseBlock::Other => None,
        })
    }
}

/// Extraction backend calling the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicExtractor {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicExtractor {
    /// Build from settings; requires an API key
    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExtractionError::NotConfigured)?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ExtractionError::Transport)?;

        Ok(Self {
            http_client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Get the base URL
    pub fn host(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: &MessagesRequest<'_>) -> Result<MessagesResponse> {
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await
            .map_err(ExtractionError::Transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(status, "Messages API returned an error");
            return Err(ExtractionError::Api { status, body }.into());
        }

        let messages_response: MessagesResponse =
            response.json().await.map_err(ExtractionError::Transport)?;
        Ok(messages_response)
    }
}

#[async_trait]
impl ReceiptExtractor for AnthropicExtractor {
    async fn extract(&self, document: &Document) -> Result<ParsedReceipt> {
        let request = MessagesRequest::for_document(&self.model, self.max_tokens, document);

        debug!(
            model = %self.model,
            media_type = document.kind.media_type(),
            bytes = document.bytes.len(),
            "Sending receipt for extraction"
        );

        let response = self.send(&request).await?;

        debug!(
            stop_reason = ?response.stop_reason,
            output_tokens = response.usage.as_ref().map(|u| u.output_tokens),
            "Received extraction reply"
        );

        let text = response.text().ok_or(ExtractionError::MissingText)?;
        parse_receipt_reply(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::document::DocumentKind;

    #[test]
    fn test_pdf_request_shape() {
        let doc = Document::new(DocumentKind::Pdf, b"%PDF".to_vec());
        let request = MessagesRequest::for_document("claude-3-5-haiku-20241022", 4096, &doc);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "claude-3-5-haiku-20241022");
        assert_eq!(json["max_tokens"], 4096);
        let content = &json["messages"][0]["content"];
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(content[0]["type"], "document");
        assert_eq!(content[0]["source"]["type"], "base64");
        assert_eq!(content[0]["source"]["media_type"], "application/pdf");
        assert_eq!(content[0]["source"]["data"], "JVBERg==");
        assert_eq!(content[1]["type"], "text");
        assert_eq!(content[1]["text"], EXTRACTION_PROMPT);
    }

    #[test]
    fn test_image_request_shape() {
        let doc = Document::new(DocumentKind::Webp, vec![1, 2, 3]);
        let request = MessagesRequest::for_document("m", 10, &doc);
        let json = serde_json::to_value(&request).unwrap();
        let block = &json["messages"][0]["content"][0];
        assert_eq!(block["type"], "image");
        assert_eq!(block["source"]["media_type"], "image/webp");
    }

    #[test]
    fn test_response_first_text_block() {
        let response: MessagesResponse = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "first"},
                    {"type": "text", "text": "second"}
                ],
                "model": "m",
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();
        assert_eq!(response.text(), Some("first"));

        let empty: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn test_requires_api_key() {
        let config = ExtractionConfig::default();
        assert!(AnthropicExtractor::from_config(&config).is_err());

        let config = ExtractionConfig {
            api_key: Some("sk-test".to_string()),
            api_base: "http://localhost:9999/".to_string(),
            ..ExtractionConfig::default()
        };
        let backend = AnthropicExtractor::from_config(&config).unwrap();
        assert_eq!(backend.host(), "http://localhost:9999");
        assert_eq!(backend.model(), "claude-3-5-haiku-20241022");
    }

    mod against_mock_server {
        use super::*;
        use crate::error::Error;
        use crate::test_utils::{MockMessagesServer, MockReply};

        fn backend(server: &MockMessagesServer) -> AnthropicExtractor {
            AnthropicExtractor::from_config(&ExtractionConfig {
                api_base: server.url(),
                api_key: Some("sk-test".to_string()),
                ..ExtractionConfig::default()
            })
            .unwrap()
        }

        fn receipt_pdf() -> Document {
            Document::new(DocumentKind::Pdf, b"%PDF-1.4".to_vec())
        }

        #[tokio::test]
        async fn test_extracts_fenced_reply() {
            let server = MockMessagesServer::with_receipt().await;
            let parsed = backend(&server).extract(&receipt_pdf()).await.unwrap();

            assert_eq!(parsed.store_name, "Costco");
            assert_eq!(parsed.line_items.len(), 2);
            assert!(parsed.line_items[1].item_code.is_none());

            let requests = server.requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].api_key.as_deref(), Some("sk-test"));
            assert_eq!(requests[0].anthropic_version.as_deref(), Some(ANTHROPIC_VERSION));
            assert_eq!(requests[0].body["model"], "claude-3-5-haiku-20241022");
        }

        #[tokio::test]
        async fn test_api_error_status() {
            let server = MockMessagesServer::start(MockReply::Error {
                status: 529,
                body: "overloaded".to_string(),
            })
            .await;

            let err = backend(&server).extract(&receipt_pdf()).await.unwrap_err();
            match err {
                Error::Extraction(ExtractionError::Api { status, body }) => {
                    assert_eq!(status, 529);
                    assert_eq!(body, "overloaded");
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_missing_text_block() {
            let server = MockMessagesServer::start(MockReply::NoText).await;
            let err = backend(&server).extract(&receipt_pdf()).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Extraction(ExtractionError::MissingText)
            ));
        }

        #[tokio::test]
        async fn test_malformed_reply() {
            let server =
                MockMessagesServer::start(MockReply::Text("I could not read it".to_string()))
                    .await;
            let err = backend(&server).extract(&receipt_pdf()).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Extraction(ExtractionError::MalformedJson(_))
            ));
        }

        #[tokio::test]
        async fn test_transport_error() {
            // Nothing listens on port 9 (discard) in the test environment
            let backend = AnthropicExtractor::from_config(&ExtractionConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                api_key: Some("sk-test".to_string()),
                ..ExtractionConfig::default()
            })
            .unwrap();
            let err = backend.extract(&receipt_pdf()).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Extraction(ExtractionError::Transport(_))
            ));
        }
    }
}
