//! Run configuration.
//!
//! Layers, lowest first:
//! - built-in defaults
//! - `decl-schema.toml` / `.decl-schema.toml` in the working directory
//! - an explicit `--config` file
//! - environment variables (`DECL_SCHEMA__SECTION__KEY`)
//! - command line flags (applied by the CLI)
//!
//! ## Example config file:
//! ```toml
//! [roots]
//! base_class = "constructs.Construct"
//! props_param_index = 2
//! skip_prefixes = ["@cdktf/provider-aws."]
//!
//! [output]
//! envelope = "envelope.schema.json"
//! format = "pretty"
//! symbolic_alternatives = false
//!
//! [diagnostics]
//! emit = true
//! suppress = ["resource.pkg.Bucket"]
//! color = "auto"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::document::{RenderOptions, DEFAULT_RESOURCE_PATTERN};
use crate::roots::RootSelection;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub roots: RootsConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootsConfig {
    /// Classes must extend this one to become resources.
    #[serde(default = "default_base_class")]
    pub base_class: String,
    /// Initializer position of the properties parameter.
    #[serde(default = "default_props_param_index")]
    pub props_param_index: usize,
    #[serde(default)]
    pub skip_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Envelope document; the built-in skeleton when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<PathBuf>,
    #[serde(default = "default_resource_pattern")]
    pub resource_pattern: String,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub symbolic_alternatives: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Print the diagnostics tree after generation.
    #[serde(default)]
    pub emit: bool,
    /// Qualified node paths to silence.
    #[serde(default)]
    pub suppress: Vec<String>,
    #[serde(default)]
    pub color: ColorMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

fn default_base_class() -> String {
    "constructs.Construct".to_string()
}

fn default_props_param_index() -> usize {
    2
}

fn default_resource_pattern() -> String {
    DEFAULT_RESOURCE_PATTERN.to_string()
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            base_class: default_base_class(),
            props_param_index: default_props_param_index(),
            skip_prefixes: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            envelope: None,
            resource_pattern: default_resource_pattern(),
            format: OutputFormat::Pretty,
            symbolic_alternatives: false,
        }
    }
}

impl ColorMode {
    /// Resolve `auto` against whether stderr is a terminal.
    pub fn enabled(self) -> bool {
        use std::io::IsTerminal;
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stderr().is_terminal(),
        }
    }
}

impl Settings {
    /// Load from the default locations plus an optional explicit file.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["decl-schema.toml", ".decl-schema.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("DECL_SCHEMA")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("roots.skip_prefixes")
                .with_list_parse_key("diagnostics.suppress")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            selection: RootSelection {
                base_class: self.roots.base_class.clone(),
                props_param_index: self.roots.props_param_index,
                skip_prefixes: self.roots.skip_prefixes.clone(),
            },
            resource_pattern: self.output.resource_pattern.clone(),
            symbolic_alternatives: self.output.symbolic_alternatives,
        }
    }

    pub fn suppressed(&self) -> HashSet<String> {
        self.diagnostics.suppress.iter().cloned().collect()
    }
}
