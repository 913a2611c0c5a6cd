//! PDF intake
//!
//! Sends the raw PDF to the extraction service and turns the conversation
//! it returns into a [`ConversationLog`].

use crate::config::UploadConfig;
use crate::core::conversation::ConversationLog;
use crate::core::llm::ChatMessage;
use crate::error::UploadError;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Multipart field the extraction service reads the file from.
pub const PDF_FIELD: &str = "pdf_file";

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    conversations: ExtractedConversations,
}

#[derive(Debug, Deserialize)]
struct ExtractedConversations {
    messages: Vec<ChatMessage>,
}

pub struct PdfExtractor {
    client: Client,
    endpoint: String,
}

impl PdfExtractor {
    pub fn new(config: &UploadConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }

    pub async fn extract_file(&self, path: &Path) -> Result<ConversationLog, UploadError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.pdf".to_string());
        self.extract(bytes, &file_name).await
    }

    pub async fn extract(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<ConversationLog, UploadError> {
        tracing::info!(
            "[PdfExtractor] Uploading {} ({} bytes) to {}",
            file_name,
            bytes.len(),
            self.endpoint
        );

        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().part(PDF_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("[PdfExtractor] Extraction failed with {}: {}", status, body);
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let extracted = response
            .json::<ExtractionResponse>()
            .await
            .map_err(|e| UploadError::Decode(e.to_string()))?;

        let log = ConversationLog::from_payload(extracted.conversations.messages)?;
        tracing::info!("[PdfExtractor] Extracted {} messages", log.len());
        Ok(log)
    }
}
