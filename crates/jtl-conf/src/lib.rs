//! Project and user settings for rendering templates.
//!
//! Settings are read, lowest precedence first, from the user config
//! directory (`jtl/jtl.toml`), `[tool.jtl]` in `pyproject.toml`, then
//! `.jtl.toml` and `jtl.toml` in the project root.

pub mod diagnostics;

use std::fs;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use jtl_runtime::Environment;
use jtl_runtime::FileSystemLoader;
use jtl_runtime::StrictMode;
use serde::Deserialize;
use thiserror::Error;

pub use crate::diagnostics::DiagnosticSeverity;
pub use crate::diagnostics::DiagnosticsConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
    #[error("Failed to read pyproject.toml")]
    PyprojectIo(#[from] std::io::Error),
    #[error("Failed to parse pyproject.toml TOML")]
    PyprojectParse(#[from] toml::de::Error),
    #[error("Failed to serialize extracted pyproject data")]
    PyprojectSerialize(#[from] toml::ser::Error),
}

#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub strict_undefined: bool,
    pub strict_filters: bool,
    pub strict_tests: bool,
    pub strict_functions: bool,
    pub allow_tag_override: bool,
    /// Template search path, relative paths resolved against the project root.
    pub template_dirs: Vec<Utf8PathBuf>,
    pub max_render_steps: Option<u64>,
    pub diagnostics: DiagnosticsConfig,
    #[serde(skip)]
    project_root: Utf8PathBuf,
}

impl Settings {
    pub fn new(project_root: &Utf8Path) -> Result<Self, ConfigError> {
        let user_config_file = ProjectDirs::from("", "", "jtl")
            .map(|dirs| dirs.config_dir().join("jtl.toml"))
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok());

        Self::load_from_paths(project_root, user_config_file.as_deref())
    }

    fn load_from_paths(
        project_root: &Utf8Path,
        user_config_path: Option<&Utf8Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(
                File::from(path.as_std_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let pyproject_path = project_root.join("pyproject.toml");
        if pyproject_path.exists() {
            let content = fs::read_to_string(&pyproject_path)?;
            let pyproject: toml::Value = toml::from_str(&content)?;

            let table = ["tool", "jtl"]
                .iter()
                .try_fold(&pyproject, |current, &key| current.get(key))
                .and_then(toml::Value::as_table);

            if let Some(table) = table {
                let section = toml::to_string(table)?;
                builder = builder.add_source(File::from_str(&section, FileFormat::Toml));
            }
        }

        for name in [".jtl.toml", "jtl.toml"] {
            builder = builder.add_source(
                File::from(project_root.join(name).as_std_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let config = builder.build()?;
        let mut settings: Settings = config.try_deserialize()?;
        settings.project_root = project_root.to_path_buf();
        tracing::debug!(root = %project_root, ?settings, "loaded settings");
        Ok(settings)
    }

    #[must_use]
    pub fn strict_mode(&self) -> StrictMode {
        StrictMode {
            undefined: self.strict_undefined,
            filters: self.strict_filters,
            tests: self.strict_tests,
            functions: self.strict_functions,
        }
    }

    /// `template_dirs` with relative entries joined onto the project root.
    #[must_use]
    pub fn template_dirs(&self) -> Vec<Utf8PathBuf> {
        self.template_dirs
            .iter()
            .map(|dir| {
                if dir.is_absolute() {
                    dir.clone()
                } else {
                    self.project_root.join(dir)
                }
            })
            .collect()
    }

    /// An environment configured from these settings.
    ///
    /// Templates are loaded from `template_dirs` when any are configured.
    /// Filters, tests, functions and tag renderers are left for the host to
    /// register.
    #[must_use]
    pub fn environment(&self) -> Environment {
        let mut env = Environment::new();
        env.set_strict(self.strict_mode());
        env.allow_tag_override(self.allow_tag_override);
        env.set_max_steps(self.max_render_steps);
        let dirs = self.template_dirs();
        if !dirs.is_empty() {
            env.set_loader(FileSystemLoader::new(dirs));
        }
        env
    }
}
