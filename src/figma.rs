//! Figma import: fetch a design file, collect its components, and map them
//! to VA Design System component ids.

use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ImportError;

const FIGMA_API_BASE: &str = "https://api.figma.com/v1";

static FILE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"figma\.com/file/([a-zA-Z0-9]+)").unwrap());

// Figma component names (substring match, first hit wins) to VA component
// ids. Order matters: more specific names come before their prefixes.
const COMPONENT_MAPPING: &[(&str, &str)] = &[
    ("Alert/Expandable", "alert-expandable"),
    ("Alert/Info", "alert"),
    ("Alert/Success", "alert"),
    ("Alert/Warning", "alert"),
    ("Alert/Error", "alert"),
    ("Alert", "alert"),
    ("Accordion", "accordion"),
    ("Banner", "banner"),
    ("Button/Primary", "buttons"),
    ("Button/Secondary", "buttons"),
    ("Button", "buttons"),
    ("Card", "card"),
    ("Form/Input", "forms"),
    ("Form/Checkbox", "forms"),
    ("Form/Select", "forms"),
    ("Form", "forms"),
    ("Progress Bar", "progress"),
    ("Progress", "progress"),
    ("Additional Info", "additional-info"),
];

/// One imported component, already mapped to a VA component id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedComponent {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub va_component_id: String,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    document: Node,
}

#[derive(Debug, Deserialize)]
struct Node {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    children: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    images: std::collections::HashMap<String, Option<String>>,
}

/// Extract the file key from a Figma file URL.
pub fn parse_file_key(url: &str) -> Result<String, ImportError> {
    FILE_KEY
        .captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| ImportError::InvalidFigmaUrl {
            url: url.to_string(),
        })
}

/// Map a Figma component name to a VA component id, if one matches.
pub fn map_component_name(name: &str) -> Option<&'static str> {
    COMPONENT_MAPPING
        .iter()
        .find(|(key, _)| name.contains(key))
        .map(|(_, id)| *id)
}

fn collect_components(node: &Node, out: &mut Vec<(String, String, String)>) {
    if node.kind == "COMPONENT" || node.kind == "COMPONENT_SET" {
        out.push((
            node.id.clone(),
            node.name.clone(),
            node.description.clone().unwrap_or_default(),
        ));
    }
    for child in &node.children {
        collect_components(child, out);
    }
}

#[derive(Debug, Clone)]
pub struct FigmaClient {
    http: reqwest::Client,
    api_base: String,
}

impl FigmaClient {
    pub fn new() -> Self {
        Self::with_base(FIGMA_API_BASE)
    }

    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    async fn get_file(&self, token: &str, file_key: &str) -> Result<FileResponse, ImportError> {
        let response = self
            .http
            .get(format!("{}/files/{}", self.api_base, file_key))
            .header("X-Figma-Token", token)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| ImportError::Upstream(err.to_string()))?;
        let file = response
            .json::<FileResponse>()
            .await
            .context("decoding Figma file response")?;
        Ok(file)
    }

    async fn get_images(
        &self,
        token: &str,
        file_key: &str,
        node_ids: &[String],
    ) -> Result<ImagesResponse, ImportError> {
        let response = self
            .http
            .get(format!("{}/images/{}", self.api_base, file_key))
            .query(&[("ids", node_ids.join(",")), ("format", "png".into()), ("scale", "2".into())])
            .header("X-Figma-Token", token)
            .send()
            .await?
            .error_for_status()
            .map_err(|err| ImportError::Upstream(err.to_string()))?;
        let images = response
            .json::<ImagesResponse>()
            .await
            .context("decoding Figma images response")?;
        Ok(images)
    }

    /// Import every mappable component from a Figma file URL.
    ///
    /// Walks the document tree for COMPONENT / COMPONENT_SET nodes, keeps
    /// only the ones whose names map to a VA component, and attaches
    /// rendered image URLs.
    pub async fn import_components(
        &self,
        token: &str,
        url: &str,
    ) -> Result<Vec<ImportedComponent>, ImportError> {
        if token.trim().is_empty() {
            return Err(ImportError::MissingFigmaToken);
        }
        if url.trim().is_empty() {
            return Err(ImportError::MissingFigmaUrl);
        }
        let file_key = parse_file_key(url)?;

        let file = self.get_file(token, &file_key).await?;
        let mut raw = Vec::new();
        collect_components(&file.document, &mut raw);

        let mut mapped: Vec<ImportedComponent> = raw
            .into_iter()
            .filter_map(|(id, name, description)| {
                map_component_name(&name).map(|va_id| ImportedComponent {
                    id,
                    name,
                    description,
                    image_url: None,
                    va_component_id: va_id.to_string(),
                })
            })
            .collect();

        tracing::debug!(count = mapped.len(), file_key, "mapped Figma components");

        if !mapped.is_empty() {
            let node_ids: Vec<String> = mapped.iter().map(|c| c.id.clone()).collect();
            let images = self.get_images(token, &file_key, &node_ids).await?;
            for component in &mut mapped {
                component.image_url = images.images.get(&component.id).cloned().flatten();
            }
        }

        Ok(mapped)
    }
}

impl Default for FigmaClient {
    fn default() -> Self {
        Self::new()
    }
}
