//! PDF form extraction: upload the document to the model files API, run a
//! JSON-mode completion that reads out text and form fields, then delete the
//! temporary upload.

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::errors::ImportError;

const EXTRACTION_SYSTEM_PROMPT: &str = "Extract all text from the PDF. Also identify form fields, their labels, types (text input, checkbox, dropdown, etc.), and any validation requirements. Return a comprehensive structured analysis of the form.";

const EXTRACTION_USER_PROMPT: &str = "Please extract all text content from this PDF form. Also identify form fields with their labels, types, and validation requirements. Format your response as JSON with text and formFields properties.";

#[derive(Debug, Deserialize)]
struct FileUploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Decode and sanity-check the request's base64 PDF payload. Runs before
/// any network call so encoding mistakes come back as 400s.
pub fn decode_pdf(pdf: &str) -> Result<Vec<u8>, ImportError> {
    if pdf.trim().is_empty() {
        return Err(ImportError::MissingPdf);
    }
    BASE64
        .decode(pdf.trim())
        .map_err(ImportError::InvalidPdfEncoding)
}

#[derive(Debug, Clone)]
pub struct PdfExtractor {
    http: reqwest::Client,
    api_base: String,
    model: String,
}

impl PdfExtractor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
        }
    }

    async fn upload_file(
        &self,
        api_key: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<String, ImportError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .context("building PDF upload part")?;
        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", part);

        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| ImportError::Upstream(err.to_string()))?;

        let upload = response
            .json::<FileUploadResponse>()
            .await
            .context("decoding file upload response")?;
        Ok(upload.id)
    }

    async fn delete_file(&self, api_key: &str, file_id: &str) {
        // Cleanup of the temporary upload; the extraction result stands
        // even if this fails.
        let result = self
            .http
            .delete(format!("{}/files/{}", self.api_base, file_id))
            .bearer_auth(api_key)
            .send()
            .await;
        if let Err(err) = result {
            tracing::warn!(%err, file_id, "failed to delete temporary PDF upload");
        }
    }

    /// Extract text and form fields from a base64-encoded PDF.
    ///
    /// Returns the model's JSON analysis with `filename` and `fileId`
    /// attached.
    pub async fn extract(
        &self,
        api_key: &str,
        pdf_base64: &str,
        filename: &str,
    ) -> Result<Value, ImportError> {
        let bytes = decode_pdf(pdf_base64)?;
        let file_id = self.upload_file(api_key, bytes, filename).await?;

        let extraction = self.run_extraction(api_key, &file_id).await;
        self.delete_file(api_key, &file_id).await;
        let mut result = extraction?;

        if let Some(obj) = result.as_object_mut() {
            obj.insert("filename".into(), json!(filename));
            obj.insert("fileId".into(), json!(file_id));
        }
        Ok(result)
    }

    async fn run_extraction(&self, api_key: &str, file_id: &str) -> Result<Value, ImportError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": EXTRACTION_SYSTEM_PROMPT },
                { "role": "user", "content": [
                    { "type": "file", "file_id": file_id },
                    { "type": "text", "text": EXTRACTION_USER_PROMPT },
                ]},
            ],
            "response_format": { "type": "json_object" },
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| ImportError::Upstream(err.to_string()))?;

        let completion = response
            .json::<CompletionResponse>()
            .await
            .context("decoding extraction completion")?;
        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ImportError::Upstream("extraction returned no choices".into()))?;

        let parsed =
            serde_json::from_str::<Value>(content).context("parsing extraction JSON content")?;
        Ok(parsed)
    }
}
