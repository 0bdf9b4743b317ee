//! Additional pages the operator can attach to the platform navigation.

use serde::Deserialize;
use url::Url;

/// Validated input for a new additional page.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAdditionalPage {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub icon_svg: String,
}

impl NewAdditionalPage {
    /// Name and URL are required; the URL must be an absolute http(s) URL.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.url.trim().is_empty() {
            return Err("Args not valid".to_string());
        }
        let parsed = Url::parse(&self.url).map_err(|_| "URL not valid".to_string())?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err("URL not valid".to_string());
        }
        Ok(())
    }
}
