//! AssetMap CLI - build, inspect and bind static assets
//!
//! Commands: build, manifest, bindings, builtin
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on binding errors, 1 on any other failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use assetmap_core::{
    BuildConfig, BuildMode, BuildPipeline, BuiltinOptions, Compression, Compressor, PipelineError,
    Scope,
};

#[derive(Parser)]
#[command(name = "assetmap-cli")]
#[command(about = "AssetMap CLI - Asset Manifest & Binding Generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file (default: ./assets.json if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct Overrides {
    /// Input directories, `dir` or `scope=dir`
    #[arg(short, long, value_delimiter = ',')]
    inputs: Vec<String>,

    /// Directory holding assets.hpp, assets.cpp and assets.js
    #[arg(short, long)]
    bindings: Option<PathBuf>,

    /// Guard entries with `#ifndef SYMBOL`: SYMBOL:path[:path...]
    #[arg(long = "ifndef")]
    ifndef: Vec<String>,

    /// Show debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect, publish and bind
    Build {
        #[command(flatten)]
        overrides: Overrides,

        /// Public output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        compression: Option<Compression>,

        #[arg(long)]
        sourcemaps: Option<bool>,

        /// Patch existing bindings instead of regenerating them
        #[arg(short, long)]
        update: bool,
    },

    /// Print the collected manifest
    Manifest {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Collect and bind without publishing
    Bindings {
        #[command(flatten)]
        overrides: Overrides,

        #[arg(short, long)]
        update: bool,
    },

    /// Embed compressed assets in a generated C++ class
    Builtin {
        #[command(flatten)]
        overrides: Overrides,

        /// Name of the generated class
        #[arg(long)]
        classname: Option<String>,

        /// Prefix of every registered URI
        #[arg(long)]
        uri_root: Option<String>,

        #[arg(long, value_enum)]
        compression: Option<Compressor>,

        /// Output path without extension
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn apply(config: &mut BuildConfig, overrides: &Overrides) -> Result<(), PipelineError> {
    if !overrides.inputs.is_empty() {
        config.inputs = overrides.inputs.iter().map(|s| Scope::parse(s)).collect();
    }
    if let Some(dir) = &overrides.bindings {
        config.bindings_dir = dir.clone();
    }
    for rule in &overrides.ifndef {
        config.add_exclusion(rule)?;
    }
    config.verbose |= overrides.verbose;
    Ok(())
}

fn mode(update: bool) -> BuildMode {
    if update {
        BuildMode::Update
    } else {
        BuildMode::Generate
    }
}

fn run(cli: Cli) -> Result<serde_json::Value, PipelineError> {
    let mut config = BuildConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { overrides, output, compression, sourcemaps, update } => {
            apply(&mut config, &overrides)?;
            if let Some(output) = output {
                config.output = output;
            }
            if let Some(compression) = compression {
                config.compression = compression;
            }
            if let Some(sourcemaps) = sourcemaps {
                config.source_maps = sourcemaps;
            }
            let report = BuildPipeline::new(config).run(mode(update))?;
            Ok(serde_json::to_value(report)?)
        }

        Commands::Manifest { overrides } => {
            apply(&mut config, &overrides)?;
            let rows = BuildPipeline::new(config).manifest_listing()?;
            Ok(serde_json::to_value(rows)?)
        }

        Commands::Bindings { overrides, update } => {
            apply(&mut config, &overrides)?;
            let report = BuildPipeline::new(config).run_bindings(mode(update))?;
            Ok(serde_json::to_value(report)?)
        }

        Commands::Builtin { overrides, classname, uri_root, compression, output } => {
            apply(&mut config, &overrides)?;
            let mut options = match (config.builtin.take(), &classname, &uri_root) {
                (Some(options), _, _) => options,
                (None, Some(classname), Some(uri_root)) => BuiltinOptions::new(classname, uri_root),
                (None, _, _) => {
                    return Err(PipelineError::Config(
                        "builtin needs --classname and --uri-root".into(),
                    ))
                }
            };
            if let Some(classname) = classname {
                options.classname = classname;
            }
            if let Some(uri_root) = uri_root {
                options.uri_root = uri_root;
            }
            if let Some(compression) = compression {
                options.compression = compression;
            }
            if let Some(output) = output {
                options.output = output;
            }
            config.builtin = Some(options);
            let report = BuildPipeline::new(config).run_bindings(BuildMode::Builtin)?;
            Ok(serde_json::to_value(report)?)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(value) => {
            let output = serde_json::json!({
                "success": true,
                "result": value,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(text) => {
                    println!("{}", text);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            let subjects = match &e {
                PipelineError::Binding(b) => b.subjects(),
                _ => vec![],
            };
            let output = serde_json::json!({
                "success": false,
                "error": e.to_string(),
                "subjects": subjects,
            });
            println!("{}", output);
            if e.is_binding() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
