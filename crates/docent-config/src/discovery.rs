//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/docent/config.toml` (user config, or `DOCENT_CONFIG_DIR`)
//! 2. `./docent.toml` (project-local)
//! 3. an explicit `--config <path>`
//! 4. environment variables

use std::path::{Path, PathBuf};

use crate::{ConfigError, DocentConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "docent.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for XDG directory resolution.
const APP_NAME: &str = "docent";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "DOCENT_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged, validated configuration.
    pub config: DocentConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Problems that did not stop loading (unreadable layers, plaintext keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Where to look for config layers.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory holding `docent.toml`; the working directory when unset.
    pub project_dir: Option<PathBuf>,
    /// User config directory; `DOCENT_CONFIG_DIR` or the platform default when unset.
    pub config_dir: Option<PathBuf>,
    /// File given on the command line. Must exist.
    pub explicit: Option<PathBuf>,
}

/// Load configuration from all layers and the process environment.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let options = LoadOptions {
        explicit: explicit.map(Path::to_path_buf),
        ..Default::default()
    };
    load_config_with_options(&options, |name| std::env::var(name).ok())
}

/// Load configuration with explicit directories and environment lookup.
pub fn load_config_with_options(
    options: &LoadOptions,
    env: impl Fn(&str) -> Option<String>,
) -> Result<LoadedConfig> {
    let mut config = DocentConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User config: explicit dir, then env var, then platform default
    let user_config_path = match &options.config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => xdg_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project-local config
    let project_path = options
        .project_dir
        .as_ref()
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    // 3. Explicit file; errors are fatal here
    if let Some(path) = &options.explicit {
        config.merge(load_config_file(path)?);
        sources.push(ConfigSource {
            path: path.clone(),
            loaded: true,
        });
    }

    if config.llm.as_ref().is_some_and(|l| l.has_plaintext_api_key()) {
        warnings.push(
            "[llm] contains a plaintext API key. \
             Consider DOCENT_API_KEY or OPENAI_API_KEY instead."
                .to_string(),
        );
    }

    // 4. Environment
    config.apply_env(env)?;
    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery).
pub fn load_config_file(path: &Path) -> Result<DocentConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    DocentConfig::from_toml(&contents)
}

/// Path of the user config file.
pub fn xdg_config_path() -> Option<PathBuf> {
    xdg_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory.
///
/// Checks `DOCENT_CONFIG_DIR` first, then the platform default
/// (`~/.config/docent` on Linux).
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A missing file is skipped; an unreadable or malformed one becomes a
/// warning.
fn load_layer(config: &mut DocentConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::ToolPolicy;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn options(project: &TempDir, user: &TempDir) -> LoadOptions {
        LoadOptions {
            project_dir: Some(project.path().to_path_buf()),
            config_dir: Some(user.path().to_path_buf()),
            explicit: None,
        }
    }

    #[test]
    fn test_xdg_config_path_shape() {
        if let Some(p) = xdg_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/docent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();
        assert!(matches!(
            load_config_file(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_no_files_gives_defaults() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let loaded = load_config_with_options(&options(&project, &user), no_env).unwrap();
        assert_eq!(loaded.config, DocentConfig::new());
        assert!(loaded.loaded_from().is_empty());
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn test_layers_in_order() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let explicit_dir = TempDir::new().unwrap();

        fs::write(
            user.path().join("config.toml"),
            "[llm]\nmodel = \"user-model\"\n[tools]\npolicy = \"per_message\"\n",
        )
        .unwrap();
        fs::write(
            project.path().join("docent.toml"),
            "[llm]\nmodel = \"project-model\"\n[session]\nmax_recursion_depth = 3\n",
        )
        .unwrap();
        let explicit = explicit_dir.path().join("override.toml");
        fs::write(&explicit, "[session]\nmax_recursion_depth = 5\n").unwrap();

        let mut opts = options(&project, &user);
        opts.explicit = Some(explicit.clone());
        let loaded = load_config_with_options(&opts, no_env).unwrap();

        assert_eq!(loaded.config.llm().model, "project-model");
        assert_eq!(loaded.config.tools().policy, ToolPolicy::PerMessage);
        assert_eq!(loaded.config.session().max_recursion_depth, 5);
        assert_eq!(loaded.loaded_from().len(), 3);
        assert!(loaded.loaded_from().last().unwrap().ends_with("override.toml"));
    }

    #[test]
    fn test_env_beats_files() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("docent.toml"), "[llm]\nmodel = \"file\"\n").unwrap();

        let loaded = load_config_with_options(&options(&project, &user), |name| {
            (name == "DOCENT_MODEL").then(|| "env".to_string())
        })
        .unwrap();
        assert_eq!(loaded.config.llm().model, "env");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        let mut opts = options(&project, &user);
        opts.explicit = Some(project.path().join("missing.toml"));
        assert!(matches!(
            load_config_with_options(&opts, no_env),
            Err(ConfigError::ReadFile { .. })
        ));
    }

    #[test]
    fn test_malformed_layer_warns_but_continues() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("docent.toml"), "not valid toml {{{{").unwrap();

        let loaded = load_config_with_options(&options(&project, &user), no_env).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(
            project.path().join("docent.toml"),
            "[session]\nmax_recursion_depth = 0\n",
        )
        .unwrap();
        assert!(matches!(
            load_config_with_options(&options(&project, &user), no_env),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_plaintext_key_warning() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("docent.toml"), "[llm]\napi_key = \"sk-1\"\n").unwrap();
        let loaded = load_config_with_options(&options(&project, &user), no_env).unwrap();
        assert!(loaded.warnings[0].contains("plaintext"));
    }
}
