//! hoconf CLI - inspect and resolve HOCON configuration files
//!
//! Usage:
//!   hoconf get config.conf database.host
//!   hoconf dump config.conf --format json
//!   hoconf check config.conf other.conf

use clap::{Parser, Subcommand};
use colored::Colorize;
use hoconf_core::{Config, ConfigValue, Number, ResolveOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// hoconf - HOCON configuration with lazy substitution resolution
#[derive(Parser)]
#[command(name = "hoconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a specific value from the configuration
    Get {
        /// Configuration file
        file: PathBuf,

        /// Path to the value (e.g. database.host)
        path: String,

        /// Print the raw value without resolving substitutions
        #[arg(long)]
        raw: bool,

        /// Fall back to environment variables for missing paths
        #[arg(short, long)]
        env: bool,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the whole configuration, resolved
    Dump {
        /// Configuration file
        file: PathBuf,

        /// Print the raw tree without resolving substitutions
        #[arg(long)]
        raw: bool,

        /// Fall back to environment variables for missing paths
        #[arg(short, long)]
        env: bool,

        /// Keep unresolvable substitutions instead of failing
        #[arg(long)]
        allow_unresolved: bool,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Quick syntax check without resolving
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Get {
            file,
            path,
            raw,
            env,
            format,
        } => cmd_get(file, &path, raw, env, &format),

        Commands::Dump {
            file,
            raw,
            env,
            allow_unresolved,
            format,
        } => cmd_dump(file, raw, env, allow_unresolved, &format),

        Commands::Check { files } => cmd_check(files),
    }
}

fn load(file: &PathBuf) -> Result<Config, ExitCode> {
    Config::parse_file(file).map_err(|e| {
        eprintln!("{} {}", "✗".red(), e);
        ExitCode::from(2)
    })
}

fn resolve_with(config: Config, env: bool, allow_unresolved: bool) -> Result<Config, ExitCode> {
    let options = ResolveOptions::new()
        .with_use_system_environment(env)
        .with_allow_unresolved(allow_unresolved);
    config.resolve(options).map_err(|e| {
        eprintln!("{} {}", "✗".red(), e);
        ExitCode::FAILURE
    })
}

fn cmd_get(file: PathBuf, path: &str, raw: bool, env: bool, format: &str) -> ExitCode {
    let config = match load(&file) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let config = if raw {
        config
    } else {
        match resolve_with(config, env, false) {
            Ok(c) => c,
            Err(code) => return code,
        }
    };

    match config.get(path) {
        Ok(value) => {
            if format == "json" {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&value_to_json(value)).unwrap_or_default()
                );
            } else {
                println!("{}", value);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_dump(file: PathBuf, raw: bool, env: bool, allow_unresolved: bool, format: &str) -> ExitCode {
    let config = match load(&file) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let config = if raw {
        config
    } else {
        match resolve_with(config, env, allow_unresolved) {
            Ok(c) => c,
            Err(code) => return code,
        }
    };

    let root = ConfigValue::Object(config.root().clone());
    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&value_to_json(&root)).unwrap_or_default()
        );
    } else {
        println!("{}", root);
    }
    ExitCode::SUCCESS
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        match Config::parse_file(&file) {
            Ok(_) => {
                println!("{} {}: valid HOCON", "✓".green(), file.display());
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Convert a hoconf value to serde_json::Value
///
/// Unresolved values render as their textual form, so `--raw` and
/// `--allow-unresolved` dumps stay valid JSON.
fn value_to_json(value: &ConfigValue) -> serde_json::Value {
    match value {
        ConfigValue::Null(_) => serde_json::Value::Null,
        ConfigValue::Bool(_, b) => serde_json::Value::Bool(*b),
        ConfigValue::Number(_, Number::Int(i)) => serde_json::Value::Number((*i).into()),
        ConfigValue::Number(_, Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ConfigValue::String(_, s) => serde_json::Value::String(s.clone()),
        ConfigValue::List(list) => {
            serde_json::Value::Array(list.items().iter().map(value_to_json).collect())
        }
        ConfigValue::Object(obj) => {
            let map: serde_json::Map<String, serde_json::Value> = obj
                .entries()
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
        other => serde_json::Value::String(other.to_string()),
    }
}
