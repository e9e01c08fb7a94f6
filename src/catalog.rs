//! Source catalog (AltStore repository feed) parsing
//!
//! The catalog is a JSON object with an `apps` array. Only entries whose
//! `type` matches the configured package type are published; everything
//! else is filtered out before any entry is parsed strictly.

use crate::client::{expect_status, RetryPolicy};
use crate::{Error, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

/// One publishable application from the source feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub version: String,
    pub bundle_identifier: String,
    /// Package size in bytes
    pub size: u64,
    #[serde(rename = "downloadURL")]
    pub download_url: String,
    #[serde(rename = "iconURL")]
    pub icon_url: String,
    #[serde(default)]
    pub localized_description: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<i64>,
}

impl CatalogEntry {
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    apps: Vec<serde_json::Value>,
}

/// Download the catalog and keep entries of `package_type`, in source order
pub fn fetch_catalog(
    client: &Client,
    url: &str,
    package_type: i64,
    retry: &RetryPolicy,
) -> Result<Vec<CatalogEntry>> {
    let response = retry.send("Catalog request", || client.get(url))?;
    let response = expect_status(response, &[200], "Catalog request")?;
    let body = response.text()?;

    parse_catalog(&body, package_type)
}

/// Parse a catalog document
///
/// Entries of another type are dropped silently; entries of the wanted type
/// that lack a required field are dropped with a warning.
pub fn parse_catalog(body: &str, package_type: i64) -> Result<Vec<CatalogEntry>> {
    let document: CatalogDocument = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("catalog: {}", e)))?;

    let mut entries = Vec::new();
    for (index, raw) in document.apps.into_iter().enumerate() {
        if raw.get("type").and_then(serde_json::Value::as_i64) != Some(package_type) {
            continue;
        }

        match serde_json::from_value::<CatalogEntry>(raw) {
            Ok(entry) => entries.push(entry),
            Err(e) => eprintln!("  ⚠ Ignoring catalog entry #{}: {}", index, e),
        }
    }

    Ok(entries)
}
