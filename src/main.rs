//! Visa Wizard CLI
//!
//! Drives an application session from the command line: list the catalog,
//! inspect required forms, or run the whole pipeline over document files.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use visa_wizard::catalog::FormCatalog;
use visa_wizard::config::WizardConfig;
use visa_wizard::extractor::TextFieldExtractor;
use visa_wizard::state::{field_label, NewDocument};
use visa_wizard::ApplicationSession;

#[derive(Debug, Parser)]
#[command(name = "visa-wizard", version, about = "Fill visa application forms from your documents")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "VISA_WIZARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write the effective configuration to the config file
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
    /// List supported jurisdictions and their visa types
    List,
    /// Show the forms a visa type requires
    Forms {
        jurisdiction: String,
        visa_type: String,
    },
    /// Fill every required form from the given documents and print the result as JSON
    Apply {
        #[arg(long, short)]
        jurisdiction: String,
        #[arg(long, short = 't')]
        visa_type: String,
        /// Correct a field after extraction: "Form Name:fieldId=value"
        #[arg(long = "set", value_parser = parse_edit)]
        edits: Vec<FieldEdit>,
        /// Fail instead of finalizing forms with empty fields
        #[arg(long)]
        require_complete: bool,
        #[arg(required = true)]
        documents: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldEdit {
    form_name: String,
    field_id: String,
    value: String,
}

fn parse_edit(raw: &str) -> Result<FieldEdit, String> {
    let (target, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FORM:FIELD=VALUE, got '{raw}'"))?;
    let (form_name, field_id) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("expected FORM:FIELD before '=', got '{target}'"))?;
    if form_name.trim().is_empty() || field_id.trim().is_empty() {
        return Err(format!("form and field must be non-empty in '{raw}'"));
    }
    Ok(FieldEdit {
        form_name: form_name.trim().to_string(),
        field_id: field_id.trim().to_string(),
        value: value.to_string(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WizardConfig::load_from(path)?,
        None => WizardConfig::load()?,
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    match cli.command {
        Command::Init { force } => init_config(&config, cli.config.as_deref(), force)?,
        Command::List => {
            let catalog = config.load_catalog()?;
            for jurisdiction in catalog.jurisdictions().await? {
                println!(
                    "{} {} ({}) - {}",
                    jurisdiction.flag, jurisdiction.name, jurisdiction.code, jurisdiction.description
                );
                for label in jurisdiction.visa_type_labels() {
                    println!("    {label}");
                }
            }
        }
        Command::Forms {
            jurisdiction,
            visa_type,
        } => {
            let catalog = config.load_catalog()?;
            for form in catalog.resolve(&jurisdiction, &visa_type).await? {
                println!("{} - {}", form.form_name, form.description);
                for field in &form.fields {
                    println!("    {field:<20} {}", field_label(field));
                }
            }
        }
        Command::Apply {
            jurisdiction,
            visa_type,
            edits,
            require_complete,
            documents,
        } => {
            let mut options = config.session_options();
            options.require_complete_forms |= require_complete;

            let catalog = Arc::new(config.load_catalog()?);
            let session = ApplicationSession::new(catalog, Arc::new(TextFieldExtractor::new()))
                .with_options(options);
            session.select_jurisdiction(&jurisdiction)?;
            session.select_visa_type(&visa_type)?;
            session.begin_upload().await?;

            let mut files = Vec::with_capacity(documents.len());
            for path in &documents {
                files.push(read_document(path).await?);
            }
            session.add_documents(files)?;
            session.begin_processing().await?;

            for edit in edits {
                session.edit_field(&edit.form_name, &edit.field_id, edit.value)?;
            }
            let finalized = session.finalize()?;
            println!("{}", serde_json::to_string_pretty(&finalized)?);
        }
    }

    Ok(())
}

fn init_config(config: &WizardConfig, path: Option<&Path>, force: bool) -> Result<()> {
    let target = path
        .map(Path::to_path_buf)
        .or_else(WizardConfig::config_path)
        .context("no config directory on this platform")?;
    if target.exists() && !force {
        bail!("{} already exists (use --force to replace it)", target.display());
    }
    let written = match path {
        Some(path) => {
            config.save_to(path)?;
            path.to_path_buf()
        }
        None => config.save()?,
    };
    println!("wrote {}", written.display());
    Ok(())
}

async fn read_document(path: &Path) -> Result<NewDocument> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("not a file path: {}", path.display()))?;
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(NewDocument::new(name, content))
}
