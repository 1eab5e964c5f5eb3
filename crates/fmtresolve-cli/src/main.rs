use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use fmtresolve_core::global::{GlobalPathLocator, PackageManagerKind};
use fmtresolve_core::module::node::{NodeBridge, NodeModuleLoader};
use fmtresolve_core::module::ModuleLoader;
use fmtresolve_core::prompt::ChoicePrompt;
use fmtresolve_core::workspace::WorkspaceFolders;
use fmtresolve_core::{Document, FormatterModule, ModuleResolver, ResolverSettings};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "fmtresolve")]
#[command(about = "Resolve which formatter module and config apply to a file", long_about = None)]
struct Cli {
    /// JSON settings file (camelCase keys)
    #[arg(long, value_name = "FILE", global = true)]
    settings: Option<PathBuf>,

    /// Workspace folder; repeat for multi-root workspaces
    #[arg(long = "workspace", value_name = "DIR", global = true)]
    workspaces: Vec<PathBuf>,

    /// Package name of the formatting library
    #[arg(long, default_value = "prettier", global = true)]
    package: String,

    /// Path of the bundled formatter module
    #[arg(long, value_name = "PATH", global = true)]
    bundled: Option<PathBuf>,

    #[command(flatten)]
    overrides: SettingOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags layered over the settings file.
#[derive(Args)]
struct SettingOverrides {
    #[arg(long, value_name = "PATH", global = true)]
    prettier_path: Option<String>,

    #[arg(long, value_name = "PATH", global = true)]
    config_path: Option<String>,

    #[arg(long, global = true)]
    resolve_global_modules: bool,

    #[arg(long, global = true)]
    only_use_local_version: bool,

    #[arg(long, global = true)]
    require_config: bool,

    #[arg(long, global = true)]
    no_editor_config: bool,
}

impl SettingOverrides {
    fn apply(&self, settings: &mut ResolverSettings) {
        if let Some(path) = &self.prettier_path {
            settings.prettier_path = Some(path.clone());
        }
        if let Some(path) = &self.config_path {
            settings.config_path = Some(path.clone());
        }
        settings.resolve_global_modules |= self.resolve_global_modules;
        settings.only_use_local_version |= self.only_use_local_version;
        settings.require_config |= self.require_config;
        if self.no_editor_config {
            settings.use_editor_config = false;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print which module would format a file
    Resolve {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Print the resolved configuration for a file as JSON
    Config {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Print the global install root of a package manager
    GlobalRoot {
        #[arg(value_name = "MANAGER")]
        manager: PackageManagerKind,
    },
    /// Format a file with the resolved module and write it to stdout
    Format {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

/// Asks on stderr and reads a 1-based index from stdin.
struct StdinPrompt;

#[async_trait]
impl ChoicePrompt for StdinPrompt {
    async fn choose(&self, placeholder: &str, options: &[&str]) -> Option<usize> {
        eprintln!("{}", placeholder);
        for (i, option) in options.iter().enumerate() {
            eprintln!("  {}) {}", i + 1, option);
        }

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .filter(|i| *i < options.len()),
        }
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}

fn build_resolver(cli: &Cli) -> Result<ModuleResolver> {
    let Some(bundled_path) = &cli.bundled else {
        bail!("--bundled is required for this command");
    };
    let loader = Arc::new(NodeModuleLoader::new(NodeBridge::new()?));
    let bundled = loader
        .load(&absolute(bundled_path)?)
        .context("Failed to load the bundled module")?;

    let mut workspace = WorkspaceFolders::new(
        cli.workspaces
            .iter()
            .map(|dir| absolute(dir))
            .collect::<Result<Vec<_>>>()?,
    );
    if workspace.is_empty() {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        info!("No workspace folder given; using {}", cwd.display());
        workspace = WorkspaceFolders::new([cwd]);
    }

    Ok(
        ModuleResolver::new(cli.package.clone(), bundled, loader, Arc::new(StdinPrompt))
            .with_workspace(workspace),
    )
}

async fn resolve_module(
    resolver: &ModuleResolver,
    path: &Path,
    settings: &ResolverSettings,
) -> Result<Arc<dyn FormatterModule>> {
    match resolver.get_instance(path, settings).await? {
        Some(module) => Ok(module),
        None => bail!("No usable {} module for {}", resolver.package_name(), path.display()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => ResolverSettings::load(path)?,
        None => ResolverSettings::default(),
    };
    cli.overrides.apply(&mut settings);

    match &cli.command {
        Commands::Resolve { path } => {
            let resolver = build_resolver(&cli)?;
            let path = absolute(path)?;
            let module = resolve_module(&resolver, &path, &settings).await?;
            let origin = resolver
                .origin(&module)
                .map_or_else(|| "unknown".to_string(), |origin| origin.to_string());
            println!("{} {}", origin, module.version().unwrap_or("unknown"));
        }
        Commands::Config { path } => {
            let resolver = build_resolver(&cli)?;
            let document = Document::from_path(absolute(path)?)
                .context("File path cannot be expressed as a file URL")?;
            let config = resolver.get_resolved_config(&document, &settings).await?;
            println!("{}", serde_json::to_string_pretty(&config.to_json())?);
        }
        Commands::GlobalRoot { manager } => {
            match GlobalPathLocator::new().global_root(*manager)? {
                Some(root) => println!("{}", root.display()),
                None => bail!("No global root found for {}", manager),
            }
        }
        Commands::Format { path } => {
            let resolver = build_resolver(&cli)?;
            let path = absolute(path)?;
            let source = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let module = resolve_module(&resolver, &path, &settings).await?;
            let file_info = module.file_info(&path, None)?;
            if file_info.ignored {
                info!("{} is ignored", path.display());
                print!("{}", source);
                return Ok(());
            }

            let document = Document::from_path(&path)
                .context("File path cannot be expressed as a file URL")?;
            let Some(mut options) = resolver
                .resolve_config(module.as_ref(), &document, &settings)
                .format_options()
            else {
                info!("Skipping {}", path.display());
                print!("{}", source);
                return Ok(());
            };

            options.insert(
                "filepath".to_string(),
                serde_json::Value::from(path.to_string_lossy().into_owned()),
            );
            if let Some(parser) = file_info.inferred_parser {
                options.insert("parser".to_string(), serde_json::Value::from(parser));
            }
            print!("{}", module.format(&source, &options)?);
        }
    }
    Ok(())
}
