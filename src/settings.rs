//! App-scoped tool settings, exposed through GET/PUT endpoints and held in
//! server state. No ambient globals: the settings object lives in `AppState`
//! and every access goes through it.

use serde::{Deserialize, Serialize};

/// A selected vector store reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchLocation {
    #[serde(rename = "type", default = "approximate")]
    pub kind: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
}

fn approximate() -> String {
    "approximate".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchConfig {
    pub user_location: WebSearchLocation,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            user_location: WebSearchLocation {
                kind: approximate(),
                ..Default::default()
            },
        }
    }
}

/// Tool toggles and the selected vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSettings {
    #[serde(default)]
    pub file_search_enabled: bool,
    #[serde(default)]
    pub web_search_enabled: bool,
    #[serde(default = "enabled")]
    pub functions_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_store: Option<VectorStoreRef>,
    #[serde(default)]
    pub web_search_config: WebSearchConfig,
}

fn enabled() -> bool {
    true
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            file_search_enabled: false,
            web_search_enabled: false,
            functions_enabled: true,
            vector_store: None,
            web_search_config: WebSearchConfig::default(),
        }
    }
}
