//! gearbox CLI - resolve environment manifests from the command line
//!
//! Usage:
//!   gearbox gen qa gearbox.toml
//!   gearbox gen qa gearbox.toml -o json --keys DB_HOST,DB_PORT
//!   gearbox check gearbox.toml
//!   gearbox envs gearbox.toml

use clap::{Parser, Subcommand};
use colored::Colorize;
use gearbox_core::output::unescape_delimiter;
use gearbox_core::{
    decode_environment, render, GearOptions, KeyFilter, Manifest, OutputFormat, RenderOptions,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// gearbox - Resolve environment manifests into flat configuration
#[derive(Parser)]
#[command(name = "gearbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve one environment and print it
    Gen {
        /// Environment to resolve
        env: String,

        /// Manifest file
        manifest: PathBuf,

        /// Output format: dotenv, json, raw
        #[arg(short, long, default_value = "dotenv")]
        output: String,

        /// Only include these keys, in this order (comma separated)
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,

        /// Exclude these keys (comma separated); applied before --keys
        #[arg(long, value_delimiter = ',')]
        not: Vec<String>,

        /// Separator for raw output; `\n` and `\t` are interpreted
        #[arg(long)]
        sep: Option<String>,

        /// Prefix dotenv lines with `export`
        #[arg(long)]
        export: bool,

        /// Keep key case in dotenv output
        #[arg(long)]
        preserve: bool,

        /// Skip encrypted entries
        #[arg(long)]
        no_enc: bool,

        /// Resolve source files one at a time
        #[arg(long)]
        serial: bool,
    },

    /// Decode environments without reading any source file
    Check {
        /// Manifest file
        manifest: PathBuf,

        /// Environments to check (default: all)
        envs: Vec<String>,
    },

    /// List the environments declared in a manifest
    Envs {
        /// Manifest file
        manifest: PathBuf,
    },
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Gen {
            env,
            manifest,
            output,
            keys,
            not,
            sep,
            export,
            preserve,
            no_enc,
            serial,
        } => {
            let format = match output.parse::<OutputFormat>() {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("{}", e.to_string().red());
                    return ExitCode::from(2);
                }
            };
            let render_options = RenderOptions {
                format,
                export,
                preserve,
                delimiter: sep.as_deref().map(unescape_delimiter),
            };
            let filter = KeyFilter {
                keys,
                not,
                skip_encrypted: no_enc,
            };
            let gear_options = GearOptions {
                parallel: !serial,
                skip_encrypted: no_enc,
                ..Default::default()
            };
            cmd_gen(&env, &manifest, gear_options, &filter, &render_options)
        }

        Commands::Check { manifest, envs } => cmd_check(&manifest, &envs),

        Commands::Envs { manifest } => cmd_envs(&manifest),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn load_manifest(path: &Path) -> Result<Manifest, String> {
    Manifest::load(path).map_err(|e| format!("Failed to load {}: {}", path.display(), e))
}

fn cmd_gen(
    env: &str,
    manifest_path: &Path,
    gear_options: GearOptions,
    filter: &KeyFilter,
    render_options: &RenderOptions,
) -> ExitCode {
    if let Err(e) = render_options.validate() {
        eprintln!("{}", e.to_string().red());
        return ExitCode::from(2);
    }

    let manifest = match load_manifest(manifest_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let result = manifest
        .resolve(env, gear_options)
        .and_then(|map| filter.apply(map))
        .and_then(|map| render(&map, render_options));

    match result {
        Ok(content) => {
            if content.ends_with('\n') {
                print!("{}", content);
            } else {
                println!("{}", content);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_check(manifest_path: &Path, envs: &[String]) -> ExitCode {
    let manifest = match load_manifest(manifest_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let selected: Vec<&str> = if envs.is_empty() {
        manifest.environment_names()
    } else {
        envs.iter().map(String::as_str).collect()
    };

    let mut all_valid = true;
    for env in selected {
        match manifest.environment(env).and_then(decode_environment) {
            Ok(entries) => {
                let sourced = entries.values().filter(|e| e.needs_source()).count();
                println!(
                    "{} {}: {} entries ({} from source files)",
                    "✓".green(),
                    env,
                    entries.len(),
                    sourced
                );
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), env, e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn cmd_envs(manifest_path: &Path) -> ExitCode {
    let manifest = match load_manifest(manifest_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    for env in manifest.environment_names() {
        println!("{}", env);
    }
    ExitCode::SUCCESS
}
