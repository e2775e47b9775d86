//! CLI: manifest → declarative schema document
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{ColorMode, OutputFormat, Settings};
use crate::document::{default_envelope, render_full_schema};
use crate::loader::{load_type_system, LoadOptions};
use crate::roots::{select_roots, RootSummary};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile a type-system manifest into a JSON schema for declarative documents
#[derive(Parser, Debug)]
#[command(name = "decl-schema", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate the schema document
    Generate(GenerateOut),
    /// list the classes selected as resources, with their props types
    Roots(RootsOut),
    /// print the effective configuration
    Config(ConfigOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more manifest files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// JQ pre-process filter for each manifest; every output is one assembly
    #[arg(long)]
    jq_expr: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct SelectionSettings {
    /// configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// classes must extend this base class to become resources
    #[arg(long)]
    base_class: Option<String>,

    /// initializer position of the properties parameter
    #[arg(long)]
    props_index: Option<usize>,

    /// skip classes whose fqn starts with this prefix (repeatable)
    #[arg(long)]
    skip_prefix: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    selection: SelectionSettings,

    /// envelope document to splice definitions into
    #[arg(long)]
    envelope: Option<PathBuf>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// print the diagnostics tree
    #[arg(long)]
    warnings: bool,

    /// silence a diagnostics node by its qualified path (repeatable)
    #[arg(long)]
    suppress: Vec<String>,

    /// offer symbolic references next to every property
    #[arg(long)]
    symbolic: bool,

    /// colored diagnostics
    #[arg(long, value_enum)]
    color: Option<ColorMode>,

    /// output layout
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct RootsOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    selection: SelectionSettings,
}

#[derive(clap::Parser, Debug)]
struct ConfigOut {
    /// configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_options(&self) -> LoadOptions {
        LoadOptions { inputs: self.input.clone(), jq_expr: self.jq_expr.clone() }
    }
}

impl SelectionSettings {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref()).context("failed to load configuration")?;
        if let Some(base) = &self.base_class {
            settings.roots.base_class = base.clone();
        }
        if let Some(ix) = self.props_index {
            settings.roots.props_param_index = ix;
        }
        settings.roots.skip_prefixes.extend(self.skip_prefix.iter().cloned());
        Ok(settings)
    }
}

impl GenerateOut {
    fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = self.selection.settings()?;
        if let Some(envelope) = &self.envelope {
            settings.output.envelope = Some(envelope.clone());
        }
        if let Some(format) = self.format {
            settings.output.format = format;
        }
        if let Some(color) = self.color {
            settings.diagnostics.color = color;
        }
        settings.output.symbolic_alternatives |= self.symbolic;
        settings.diagnostics.emit |= self.warnings;
        settings.diagnostics.suppress.extend(self.suppress.iter().cloned());
        Ok(settings)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(())
                }
                let settings = target.settings()?;
                let colors = settings.diagnostics.color.enabled();
                colored::control::set_override(colors);

                let types = load_type_system(&target.input_settings.load_options())?;
                let envelope = match settings.output.envelope.as_deref() {
                    Some(path) => read_envelope(path)?,
                    None => default_envelope(&settings.output.resource_pattern),
                };
                let rendered = render_full_schema(&types, envelope, &settings.render_options())?;

                let schema_src = match settings.output.format {
                    OutputFormat::Pretty => serde_json::to_string_pretty(&rendered.document)?,
                    OutputFormat::Compact => serde_json::to_string(&rendered.document)?,
                };
                write_output(target.out.as_deref(), &schema_src)?;

                if settings.diagnostics.emit {
                    rendered.diagnostics.print(&settings.suppressed(), colors);
                }
                eprintln!(
                    "generated {} resources ({} warnings, {} errors)",
                    rendered.resources.len(),
                    rendered.diagnostics.warning_count(),
                    rendered.diagnostics.error_count(),
                );
                Ok(())
            }
            Command::Roots(target) => {
                let settings = target.selection.settings()?;
                let types = load_type_system(&target.input_settings.load_options())?;
                let mut diagnostics = crate::diagnostics::Diagnostics::new();
                let roots = select_roots(&types, &settings.render_options().selection, &mut diagnostics)?;
                let summaries: Vec<RootSummary> = roots.iter().map(|r| r.summary()).collect();
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                Ok(())
            }
            Command::Config(target) => {
                let settings = Settings::load(target.config.as_deref()).context("failed to load configuration")?;
                print!("{}", settings.to_toml()?);
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_envelope(path: &Path) -> anyhow::Result<serde_json::Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read envelope {}", path.display()))?;
    let origin = path.to_string_lossy();
    Ok(crate::path_de::from_str_with_path(&source, &origin)?)
}

fn write_output(out: Option<&Path>, src: &str) -> anyhow::Result<()> {
    let Some(out) = out else {
        println!("{src}");
        return Ok(());
    };
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, src).with_context(|| format!("failed to write {}", out.display()))?;
    info!(path = %out.display(), "schema written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_flags_parse() {
        let cli = CommandLineInterface::try_parse_from([
            "decl-schema", "generate", "--input", "a.json", "b/*.json",
            "--warnings", "--suppress", "resource.x.A", "--color", "never", "--props-index", "1",
        ]).unwrap();
        let Command::Generate(g) = cli.cmd else { panic!("expected generate") };
        assert_eq!(g.input_settings.input, ["a.json", "b/*.json"]);
        assert!(g.warnings);
        assert_eq!(g.suppress, ["resource.x.A"]);
        assert_eq!(g.color, Some(ColorMode::Never));
        assert_eq!(g.selection.props_index, Some(1));
    }

    #[test]
    fn input_is_required() {
        assert!(CommandLineInterface::try_parse_from(["decl-schema", "generate"]).is_err());
    }

    #[test]
    fn write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/schema.json");
        write_output(Some(&out), "{}").unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "{}");
    }
}
