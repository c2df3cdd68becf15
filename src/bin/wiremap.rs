//! Wiremap CLI
//!
//! Command-line interface for rendering schema documents and mapping
//! artifacts from definition files, and for processing payloads.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use wiremap::{
    load_definition, load_document, ErrorMode, ProcessError, Registry, Schema,
};

#[derive(Parser)]
#[command(name = "wiremap")]
#[command(about = "Render schema documents and path mappings from versioned definitions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the JSON Schema document for a version
    Schema {
        /// Definition file
        definition: PathBuf,

        /// Version id (default: latest)
        #[arg(long, short)]
        version: Option<String>,

        /// Referenced definition files, loaded in order
        #[arg(long)]
        include: Vec<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Render the mapping artifact for a version
    Mapping {
        /// Definition file
        definition: PathBuf,

        /// Version id (default: latest)
        #[arg(long, short)]
        version: Option<String>,

        /// Referenced definition files, loaded in order
        #[arg(long)]
        include: Vec<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List a definition's versions in declaration order
    Versions {
        /// Definition file
        definition: PathBuf,

        /// Referenced definition files, loaded in order
        #[arg(long)]
        include: Vec<PathBuf>,
    },

    /// Transform an external payload into its internal shape
    Process {
        /// Definition file
        definition: PathBuf,

        /// Payload file to process
        payload: PathBuf,

        /// Version id (default: latest)
        #[arg(long, short)]
        version: Option<String>,

        /// Referenced definition files, loaded in order
        #[arg(long)]
        include: Vec<PathBuf>,

        /// Validate the payload against the rendered schema first
        #[arg(long)]
        validate: bool,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Schema {
            definition,
            version,
            include,
            output,
            pretty,
        } => run_schema(&definition, version, &include, output, pretty),

        Commands::Mapping {
            definition,
            version,
            include,
            output,
            pretty,
        } => run_mapping(&definition, version, &include, output, pretty),

        Commands::Versions {
            definition,
            include,
        } => run_versions(&definition, &include),

        Commands::Process {
            definition,
            payload,
            version,
            include,
            validate,
            json,
            pretty,
        } => run_process(&definition, &payload, version, &include, validate, json, pretty),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Load the includes in order, then the target definition against them.
fn load_target(definition: &PathBuf, includes: &[PathBuf]) -> Result<Schema, u8> {
    let mut registry = Registry::new();
    for include in includes {
        let schema = load_definition(include, &registry).map_err(|e| {
            eprintln!("Error loading {}: {}", include.display(), e);
            e.exit_code() as u8
        })?;
        registry.insert(schema.name().to_string(), std::sync::Arc::new(schema));
    }

    load_definition(definition, &registry).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn pick_version(schema: &Schema, version: Option<String>) -> Result<String, u8> {
    match version {
        Some(version) => Ok(version),
        None => match schema.latest() {
            Some(latest) => Ok(latest.to_string()),
            None => {
                eprintln!("Error: schema \"{}\" declares no versions", schema.name());
                Err(2)
            }
        },
    }
}

fn write_output(
    value: &serde_json::Value,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_schema(
    definition: &PathBuf,
    version: Option<String>,
    includes: &[PathBuf],
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load_target(definition, includes)?;
    let version = pick_version(&schema, version)?;

    let document = schema.document(&version).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&document, output, pretty)
}

fn run_mapping(
    definition: &PathBuf,
    version: Option<String>,
    includes: &[PathBuf],
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load_target(definition, includes)?;
    let version = pick_version(&schema, version)?;

    let mapping = schema.mapping(&version).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&mapping, output, pretty)
}

fn run_versions(definition: &PathBuf, includes: &[PathBuf]) -> Result<(), u8> {
    let schema = load_target(definition, includes)?;
    for id in schema.version_ids() {
        println!("{}", id);
    }
    Ok(())
}

fn run_process(
    definition: &PathBuf,
    payload_path: &PathBuf,
    version: Option<String>,
    includes: &[PathBuf],
    validate: bool,
    json_output: bool,
    pretty: bool,
) -> Result<(), u8> {
    let schema = load_target(definition, includes)?;
    let version = pick_version(&schema, version)?;

    let payload = load_document(payload_path).map_err(|e| {
        eprintln!("Error loading payload: {}", e);
        e.exit_code() as u8
    })?;

    let outcome = schema
        .process_with_mode(&payload, &version, validate, ErrorMode::Result)
        .map_err(|e: ProcessError| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;

    if json_output {
        let rendered = serde_json::to_value(&outcome).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        write_output(&rendered, None, pretty)?;
        return if outcome.valid { Ok(()) } else { Err(1) };
    }

    if outcome.valid {
        match &outcome.value {
            Some(value) => write_output(value, None, pretty),
            None => Ok(()),
        }
    } else {
        eprintln!("Validation failed:");
        for error in &outcome.errors {
            eprintln!("  {}", error);
        }
        Err(1)
    }
}
