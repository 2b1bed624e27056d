//! Sheet Projector CLI
//!
//! Converts workbooks to JSON content, generates enum schemas and Rust types,
//! and validates converted data.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sheet_projector::{ConvertReport, Converter, RustGenerator, SchemaLoader, ToolConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheet-projector")]
#[command(about = "Schema-guided conversion of spreadsheets into JSON content")]
struct Cli {
    /// Configuration file, layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Restrict to these contents (repeatable)
    #[arg(long = "content", global = true)]
    contents: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate enum schemas, convert workbooks and validate the output
    Convert {
        /// Skip validation of the produced data files
        #[arg(long)]
        skip_validate: bool,
    },

    /// Generate Rust types for the selected contents
    Gencode {
        /// Output directory (defaults to `paths.code_dir`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate converted data files against their schemas
    Validate,

    /// Collect enum values and write enum schemas
    Genenum {
        /// Collect from converted data files instead of workbooks
        #[arg(long)]
        from_data: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ToolConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let contents = config.select(&cli.contents);
    if contents.is_empty() {
        warn!("no contents selected");
        return Ok(());
    }

    let converter = Converter::new(&config);

    match cli.command {
        Commands::Convert { skip_validate } => {
            for content in &contents {
                converter.generate_enums(content)?;
            }

            let mut report = ConvertReport::default();
            for content in &contents {
                report.merge(converter.convert_content(content)?);
            }
            info!(
                written = report.written.len(),
                unchanged = report.unchanged.len(),
                failed = report.failed.len(),
                "conversion finished"
            );
            for (file, reason) in &report.failed {
                println!("❌ {}: {}", file.display(), reason);
            }

            if !skip_validate && config.validation.after_convert {
                validate(&converter, &contents, config.validation.strict)?;
            }
            if !report.is_ok() {
                bail!("{} file(s) failed to convert", report.failed.len());
            }
        }

        Commands::Gencode { output } => {
            let dir = output.unwrap_or_else(|| config.paths.code_dir.clone());
            let mut generator = RustGenerator::new();
            for content in &contents {
                let schema = SchemaLoader::load(&config.schema_path(content))?;
                let module = generator.generate(&content.name, &schema);
                info!(content = %content.name, types = module.type_count, "generated");
            }
            generator
                .write(&dir)
                .with_context(|| format!("failed to write generated code to {}", dir.display()))?;
            println!("✅ Generated {} module(s) in {}", generator.modules().len(), dir.display());
        }

        Commands::Validate => validate(&converter, &contents, config.validation.strict)?,

        Commands::Genenum { from_data } => {
            for content in &contents {
                let written = if from_data {
                    converter.generate_enums_from_data(content)?
                } else {
                    converter.generate_enums(content)?
                };
                match written {
                    Some((path, outcome)) => println!("✅ {}: {} ({:?})", content.name, path.display(), outcome),
                    None => println!("   {}: no enum columns", content.name),
                }
            }
        }
    }

    Ok(())
}

fn validate(
    converter: &Converter<'_>,
    contents: &[&sheet_projector::ContentConfig],
    strict: bool,
) -> anyhow::Result<()> {
    let mut failed = 0;
    for content in contents {
        let report = converter.validate_content(content)?;
        for (file, errors) in &report.failed {
            println!("❌ {} ({} error(s))", file.display(), errors.len());
            for error in errors {
                println!("   {}", error);
            }
        }
        failed += report.failed.len();
    }

    if failed == 0 {
        println!("✅ All data files valid");
    } else if strict {
        bail!("{} data file(s) failed validation", failed);
    } else {
        warn!(failed, "validation failures ignored (strict = false)");
    }
    Ok(())
}
