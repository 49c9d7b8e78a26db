//! Command-line interface for inspecting native extension modules.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dynext_core::config::{env_vars, DEFAULT_LOG_FILTER};
use dynext_core::{
    diagnostics, resolve_library_path, DescriptorFields, ExtensionDescriptor, ExtensionSystem,
    MetadataFilter, RegistryConfig,
};
use serde::Serialize;

/// Dynext - discover and inspect native extension modules.
#[derive(Parser, Debug)]
#[command(name = "dynext")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Report loading progress.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List extensions found in a directory.
    List {
        /// Directory to scan.
        dir: PathBuf,
        /// Also scan sub-directories.
        #[arg(short, long)]
        recursive: bool,
        /// Only load files whose name starts with this prefix.
        #[arg(long)]
        prefix: Option<String>,
        /// Only show extensions implementing this interface.
        #[arg(short, long)]
        interface: Option<String>,
        /// Metadata filter, repeatable. Same key: any value, different keys: all.
        #[arg(short, long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
        /// Accept modules built by a different compiler.
        #[arg(long)]
        no_verify_compiler: bool,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show the extensions provided by one module file.
    Inspect {
        /// Module file; the platform prefix and extension may be omitted.
        file: PathBuf,
        /// Accept modules built by a different compiler.
        #[arg(long)]
        no_verify_compiler: bool,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

/// JSON view of a descriptor.
#[derive(Serialize)]
struct DescriptorView<'a> {
    #[serde(flatten)]
    fields: &'a DescriptorFields,
    library: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Command::List {
            dir,
            recursive,
            prefix,
            interface,
            filters,
            no_verify_compiler,
            json,
        } => {
            let mut filter: MetadataFilter = filters.into_iter().collect();
            if let Some(interface) = interface {
                filter.insert(dynext_core::descriptor::keys::INTERFACE_NAME, interface);
            }
            let options = ListOptions {
                recursive,
                prefix,
                filter,
                config: registry_config(args.verbose, no_verify_compiler),
                json,
            };
            run_list(&dir, options)
        }
        Command::Inspect {
            file,
            no_verify_compiler,
            json,
        } => run_inspect(&file, registry_config(args.verbose, no_verify_compiler), json),
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    // Diagnostics already reach the user through the message handler.
    let default_filter = if verbose {
        format!("dynext=debug,{}=off", diagnostics::TARGET)
    } else {
        format!("{},{}=off", DEFAULT_LOG_FILTER, diagnostics::TARGET)
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .init();
    }
}

fn registry_config(verbose: bool, no_verify_compiler: bool) -> RegistryConfig {
    RegistryConfig::new()
        .with_verify_compiler(!no_verify_compiler)
        .with_debug_output(verbose)
}

fn new_system(config: RegistryConfig) -> ExtensionSystem {
    let mut system = ExtensionSystem::with_config(config);
    system.set_message_handler(|msg| eprintln!("{msg}"));
    system
}

/// Parse a `KEY=VALUE` metadata filter.
fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("invalid filter '{raw}': expected KEY=VALUE")),
    }
}

struct ListOptions {
    recursive: bool,
    prefix: Option<String>,
    filter: MetadataFilter,
    config: RegistryConfig,
    json: bool,
}

/// List extensions in a directory.
fn run_list(dir: &Path, options: ListOptions) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Directory not found: {}", dir.display());
    }

    let mut system = new_system(options.config);
    let accepted = match &options.prefix {
        Some(prefix) => system.search_directory_with_prefix(dir, prefix, options.recursive),
        None => system.search_directory(dir, options.recursive),
    };
    tracing::debug!(accepted, "Scanned {}", dir.display());

    let extensions = system.extensions_matching(&options.filter);
    print_extensions(&extensions, dir, options.json)
}

/// Show the extensions of one module.
fn run_inspect(file: &Path, config: RegistryConfig, json: bool) -> Result<()> {
    let resolved = resolve_library_path(file)
        .with_context(|| format!("Extension module not found: {}", file.display()))?;

    let mut system = new_system(config);
    system.add_library(&resolved);

    print_extensions(&system.extensions(), &resolved, json)
}

fn print_extensions(extensions: &[ExtensionDescriptor], source: &Path, json: bool) -> Result<()> {
    if json {
        let views: Vec<DescriptorView<'_>> = extensions
            .iter()
            .filter_map(|descriptor| {
                Some(DescriptorView {
                    fields: descriptor.fields()?,
                    library: descriptor
                        .library_path()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default(),
                })
            })
            .collect();
        let output =
            serde_json::to_string_pretty(&views).context("Failed to serialize extensions")?;
        println!("{output}");
        return Ok(());
    }

    if extensions.is_empty() {
        println!("No extensions found in {}", source.display());
        return Ok(());
    }

    println!("Found {} extension(s) in {}", extensions.len(), source.display());
    for (index, descriptor) in extensions.iter().enumerate() {
        println!();
        println!("[{}] {} ({})", index + 1, descriptor.name(), descriptor.interface_name());
        print!("{descriptor}");
    }

    Ok(())
}
