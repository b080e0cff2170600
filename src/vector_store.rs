//! Thin pass-through client for the upstream vector-store API: list stores,
//! create one, upload a file, attach a file. No business logic lives here.

use anyhow::Context;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::errors::ImportError;

/// A file upload as submitted by callers: name plus base64 content.
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct VectorStoreClient {
    http: reqwest::Client,
    api_base: String,
}

impl VectorStoreClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
        }
    }

    pub async fn list(&self, api_key: &str) -> Result<Value, ImportError> {
        let response = self
            .http
            .get(format!("{}/vector_stores", self.api_base))
            .bearer_auth(api_key)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| ImportError::Upstream(err.to_string()))?;
        let stores = response
            .json::<Value>()
            .await
            .context("decoding vector store list")?;
        Ok(stores)
    }

    pub async fn create(&self, api_key: &str, name: &str) -> Result<Value, ImportError> {
        let response = self
            .http
            .post(format!("{}/vector_stores", self.api_base))
            .bearer_auth(api_key)
            .json(&json!({ "name": name }))
            .send()
            .await?
            .error_for_status()
            .map_err(|err| ImportError::Upstream(err.to_string()))?;
        let store = response
            .json::<Value>()
            .await
            .context("decoding created vector store")?;
        Ok(store)
    }

    /// Upload a file to the files API, returning the upstream response
    /// (including the `id` later passed to `add_file`).
    pub async fn upload_file(&self, api_key: &str, file: &FileObject) -> Result<Value, ImportError> {
        let bytes = BASE64
            .decode(file.content.trim())
            .map_err(ImportError::InvalidPdfEncoding)?;
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str("application/octet-stream")
            .context("building upload part")?;
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
        let uploaded = response
            .json::<Value>()
            .await
            .context("decoding file upload response")?;
        Ok(uploaded)
    }

    pub async fn add_file(
        &self,
        api_key: &str,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<Value, ImportError> {
        let response = self
            .http
            .post(format!(
                "{}/vector_stores/{}/files",
                self.api_base, vector_store_id
            ))
            .bearer_auth(api_key)
            .json(&json!({ "file_id": file_id }))
            .send()
            .await?
            .error_for_status()
            .map_err(|err| ImportError::Upstream(err.to_string()))?;
        let attached = response
            .json::<Value>()
            .await
            .context("decoding add_file response")?;
        Ok(attached)
    }
}
