use serde::{Deserialize, Serialize};

/// Normalized output of a successful article extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleResult {
    pub title: Option<String>,
    pub content: String,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub length: Option<usize>,
    pub site_name: Option<String>,
}
