use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    config::IndexConfig,
    coordinator::IndexCoordinator,
    jdk::ModuleStatus,
    types::{ModuleId, TypeIndex},
};

#[derive(Parser)]
#[command(name = "jdk-type-index")]
#[command(about = "Index the top-level types of the JDK and of Java classpaths")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// JDK install directory (defaults to $JAVA_HOME)
    #[arg(long, global = true)]
    pub java_home: Option<PathBuf>,

    /// Fallback cache directory (defaults to $HOME)
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// JSON config file with java_home, home and modules
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Module to index; repeat to replace the built-in list
    #[arg(short, long = "module", global = true)]
    pub modules: Vec<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Top-level types of the JDK modules (cached)
    Jdk {
        /// Ignore the cache and regenerate it
        #[arg(short, long)]
        refresh: bool,

        /// Print every type name
        #[arg(short, long)]
        list: bool,
    },

    /// Top-level types of the given classpath roots (never cached)
    Classpath {
        /// Directories or jar files
        #[arg(required = true)]
        roots: Vec<PathBuf>,

        /// Print every type name
        #[arg(short, long)]
        list: bool,
    },

    /// Per-module status of the runtime image
    Modules,
}

impl Args {
    /// Environment, then config file, then flags
    pub fn index_config(&self) -> Result<IndexConfig> {
        let mut config = match &self.config {
            Some(path) => IndexConfig::from_env_and_file(path)?,
            None => IndexConfig::from_env(),
        };

        if let Some(java_home) = &self.java_home {
            config.java_home = Some(java_home.clone());
        }
        if let Some(home) = &self.home {
            config.home = Some(home.clone());
        }
        if !self.modules.is_empty() {
            config.modules = self.modules.iter().cloned().map(ModuleId::from).collect();
        }

        Ok(config)
    }
}

pub async fn run(args: Args) -> Result<()> {
    let coordinator = Arc::new(IndexCoordinator::new(args.index_config()?));

    match args.command {
        Commands::Jdk { refresh, list } => {
            let index = blocking(&coordinator, move |c| {
                Ok(if refresh { c.refresh_jdk_index() } else { c.jdk_index() })
            })
            .await?;
            print_index("JDK", &index, list, args.json)
        }
        Commands::Classpath { roots, list } => {
            let index = blocking(&coordinator, move |c| {
                c.classpath_index(roots).context("Failed to scan classpath")
            })
            .await?;
            print_index("classpath", &index, list, args.json)
        }
        Commands::Modules => {
            let enumeration = blocking(&coordinator, |c| Ok(c.module_report())).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&enumeration.modules)?);
                return Ok(());
            }

            println!("📦 Runtime image: {}", coordinator.image().describe());
            for report in &enumeration.modules {
                match &report.status {
                    ModuleStatus::Indexed { types } => println!("  ✅ {:<40} {} types", report.module, types),
                    ModuleStatus::Missing => println!("  ➖ {:<40} missing", report.module),
                    ModuleStatus::Unreadable { reason } => println!("  ⚠️  {:<40} {}", report.module, reason),
                }
            }
            println!(
                "📚 {} classes from {} of {} modules",
                enumeration.index.len(),
                enumeration.indexed_modules(),
                enumeration.modules.len()
            );
            Ok(())
        }
    }
}

/// Indexing is synchronous filesystem work; keep it off the async workers
async fn blocking<T, F>(coordinator: &Arc<IndexCoordinator>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&IndexCoordinator) -> Result<T> + Send + 'static,
{
    let coordinator = Arc::clone(coordinator);
    tokio::task::spawn_blocking(move || work(&coordinator))
        .await
        .context("Indexing task panicked")?
}

fn print_index(label: &str, index: &TypeIndex, list: bool, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(index)?);
        return Ok(());
    }

    if list {
        for name in index.iter() {
            println!("{}", name);
        }
    }
    println!("📚 Found {} top-level classes in the {}", index.len(), label);
    Ok(())
}
