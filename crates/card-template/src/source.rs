//! Template store access.
//!
//! Templates come either from a local JSON file or from the remote
//! template store by id. Both return the same serialized document; the
//! store wraps it in a record carrying display metadata. A fetch failure
//! here is fatal for a batch (there is nothing to render without a
//! template), so errors propagate instead of degrading.

use crate::document::TemplateDocument;
use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A stored template: the document plus display metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Display thumbnail URL, unused by the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub document: TemplateDocument,
}

/// Load a template document from a local JSON file.
pub async fn load_template(path: impl AsRef<Path>) -> Result<TemplateDocument> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    let document = serde_json::from_slice(&bytes)?;
    Ok(document)
}

/// Fetch a template record from the store by id.
pub async fn fetch_template(base_url: &str, id: &str) -> Result<TemplateRecord> {
    let url = format!("{}/templates/{}", base_url.trim_end_matches('/'), id);
    let record = reqwest::get(&url).await?.error_for_status()?.json().await?;
    Ok(record)
}

/// Save a template document to a local JSON file.
pub async fn save_template(document: &TemplateDocument, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(document)?;
    tokio::fs::write(path.as_ref(), json).await?;
    Ok(())
}
