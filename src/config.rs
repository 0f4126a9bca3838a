use std::path::Path;

use serde::Deserialize;

use crate::engine::BuildOptions;

/// Configuration loaded from `depscope.toml` at the project root.
#[derive(Debug, Deserialize, Default)]
pub struct DepscopeConfig {
    /// Additional path patterns to exclude from discovery (beyond .gitignore
    /// and node_modules).
    pub exclude: Option<Vec<String>>,
    /// Link the whole package when symbol narrowing finds nothing. Defaults
    /// to on.
    pub package_fallback: Option<bool>,
    /// Exclude test files from every build.
    pub skip_tests: Option<bool>,
}

impl DepscopeConfig {
    /// Load configuration from `depscope.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or
    /// cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join("depscope.toml");

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("warning: failed to parse depscope.toml: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!("warning: failed to read depscope.toml: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Fold the file's settings into build options; CLI flags are applied on
    /// top by the caller.
    pub fn apply(&self, options: &mut BuildOptions) {
        if let Some(fallback) = self.package_fallback {
            options.package_fallback = fallback;
        }
        if let Some(skip) = self.skip_tests {
            options.skip_tests = skip;
        }
    }
}
