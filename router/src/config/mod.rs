pub mod types;


pub use types::*;

use anyhow::Result;
use std::path::Path;

impl RouterConfig {
    /// Load routing rules from a file, dispatching on the extension.
    /// `.toml` and `.json` are supported, matching how rules are shipped
    /// by deployment tooling.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("rules file not found at {}", path.display());
        }
        let content = std::fs::read_to_string(path)?;
        let config: RouterConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some(ext) => anyhow::bail!("unsupported rules format: .{ext}, use .toml or .json"),
            None => anyhow::bail!("rules file has no extension, use .toml or .json"),
        };

        config.validate()?;
        tracing::info!(
            rules = config.rules.len(),
            total_paths = config.total_path_count(),
            "loaded routing rules"
        );
        Ok(config)
    }

    /// Structural checks that do not require compiling patterns. Pattern
    /// syntax and regex validity are checked later by `Router::new`.
    pub fn validate(&self) -> Result<()> {
        for (i, rule) in self.rules.iter().enumerate() {
            for path in &rule.paths {
                if path.backend.is_empty() {
                    anyhow::bail!(
                        "rule #{} path '{}' has no backend",
                        i, path.path
                    );
                }
                if !path.path.is_empty() && !path.path.starts_with('/') {
                    anyhow::bail!(
                        "rule #{} path '{}' must start with '/'",
                        i, path.path
                    );
                }
                for matcher in path.headers.iter().chain(path.queries.iter()) {
                    if matcher.key.is_empty() {
                        anyhow::bail!(
                            "rule #{} path '{}' has a matcher with no key",
                            i, path.path
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Total path count across all rules.
    pub fn total_path_count(&self) -> usize {
        self.rules.iter().map(|r| r.paths.len()).sum()
    }
}
