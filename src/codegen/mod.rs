//! Heuristic post-processing of generated component source.

pub mod postprocess;

pub use postprocess::{finalize, normalize, strip_fences};

use serde::{Deserialize, Serialize};

pub const HTML_PLACEHOLDER: &str = "<!-- Component markup will appear here -->";
pub const CSS_PLACEHOLDER: &str = "/* Component styles will appear here */";
pub const JS_PLACEHOLDER: &str = "// Component code will appear here";

/// The three-way split of one generated source blob.
///
/// `js` always holds a top-level `App` entry point; the post-processor
/// synthesizes one when the generated text lacks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodePartition {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl Default for CodePartition {
    fn default() -> Self {
        Self {
            html: HTML_PLACEHOLDER.to_string(),
            css: CSS_PLACEHOLDER.to_string(),
            js: JS_PLACEHOLDER.to_string(),
        }
    }
}

impl CodePartition {
    /// True while no generation has replaced the initial placeholders.
    pub fn is_placeholder(&self) -> bool {
        self == &Self::default()
    }
}
