//! Configuration management for labelsleuth using the prefer crate.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pagination::DEFAULT_PAGE_SIZE;

/// Product name used in exported file names.
pub const DEFAULT_PRODUCT_NAME: &str = "Label_Sleuth";

const USER_AGENT: &str = concat!("labelsleuth/", env!("CARGO_PKG_VERSION"));

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root URL of the labeling backend.
    pub base_url: String,
    /// Workspace to operate on.
    pub workspace_id: String,
    /// Category labels are assigned for.
    pub category: Option<String>,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Elements shown per page in the main panel.
    pub elements_per_page: usize,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// User agent for HTTP requests.
    pub user_agent: String,
    /// Where downloaded label files are written.
    pub download_dir: PathBuf,
    /// Product name embedded in export file names.
    pub product_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        let download_dir = dirs::download_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));

        Self {
            base_url: "http://localhost:8000".to_string(),
            workspace_id: String::new(),
            category: None,
            token: None,
            elements_per_page: DEFAULT_PAGE_SIZE,
            request_timeout: 30,
            user_agent: USER_AGENT.to_string(),
            download_dir,
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub elements_per_page: Option<usize>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub request_timeout: Option<u64>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Download directory; `~` is expanded.
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

impl Config {
    /// Load configuration using prefer crate.
    /// Automatically discovers labelsleuth config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("labelsleuth").await {
            Ok(pref_config) => {
                let base_url: Option<String> = pref_config.get("base_url").ok();
                let workspace: Option<String> = pref_config.get("workspace").ok();
                let category: Option<String> = pref_config.get("category").ok();
                let token: Option<String> = pref_config.get("token").ok();
                let elements_per_page: Option<usize> =
                    pref_config.get("elements_per_page").ok();
                let request_timeout: Option<u64> = pref_config.get("request_timeout").ok();
                let user_agent: Option<String> = pref_config.get("user_agent").ok();
                let download_dir: Option<String> = pref_config.get("download_dir").ok();
                let product_name: Option<String> = pref_config.get("product_name").ok();

                Config {
                    base_url,
                    workspace,
                    category,
                    token,
                    elements_per_page,
                    request_timeout,
                    user_agent,
                    download_dir,
                    product_name,
                }
            }
            Err(_) => {
                // No config file found, use defaults
                Self::default()
            }
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref workspace) = self.workspace {
            settings.workspace_id = workspace.clone();
        }
        if let Some(ref category) = self.category {
            settings.category = Some(category.clone());
        }
        if let Some(ref token) = self.token {
            settings.token = Some(token.clone());
        }
        // Passed through as is; a zero is rejected when the workspace opens.
        if let Some(per_page) = self.elements_per_page {
            settings.elements_per_page = per_page;
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(ref dir) = self.download_dir {
            let path = shellexpand::tilde(dir);
            settings.download_dir = PathBuf::from(path.as_ref());
        }
        if let Some(ref product) = self.product_name {
            settings.product_name = product.clone();
        }
    }
}

/// Load settings from configuration (async version).
pub async fn load_settings() -> Settings {
    let config = Config::load().await;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.elements_per_page, 200);
        assert_eq!(settings.product_name, "Label_Sleuth");
        assert!(settings.workspace_id.is_empty());
        assert!(settings.user_agent.starts_with("labelsleuth/"));
    }

    #[test]
    fn test_apply_overrides() {
        let config = Config {
            workspace: Some("ws-1".to_string()),
            category: Some("12".to_string()),
            elements_per_page: Some(50),
            download_dir: Some("~/exports".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);

        assert_eq!(settings.workspace_id, "ws-1");
        assert_eq!(settings.category.as_deref(), Some("12"));
        assert_eq!(settings.elements_per_page, 50);
        assert!(settings.download_dir.ends_with("exports"));
        assert!(!settings.download_dir.starts_with("~"));
    }

    #[test]
    fn test_zero_page_size_passed_through() {
        let config = Config {
            elements_per_page: Some(0),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings);
        assert_eq!(settings.elements_per_page, 0);
    }
}
