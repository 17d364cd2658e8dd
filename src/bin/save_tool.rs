use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use savedata::{PersistenceConfig, PersistenceContext};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "save-tool")]
#[command(about = "Operator tooling for savedata save directories")]
struct Cli {
    /// Persistent storage root (defaults to $SAVEDATA_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete every save file
    Clear,
    /// Print the saves directory, or the root when it does not exist yet
    Path,
    /// List the save files on disk
    List,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match cli.root {
        Some(root) => PersistenceConfig::new(root),
        None => PersistenceConfig::from_env()
            .map_err(|err| anyhow!("{err}; pass --root or set SAVEDATA_ROOT"))?,
    };
    let context = PersistenceContext::new(config);

    match cli.command {
        Command::Clear => {
            let removed = context
                .clear_all_saved_data()
                .context("failed to clear save directory")?;
            println!("Removed {removed} file(s) from {}", context.directory_path().display());
        }
        Command::Path => {
            let path = if context.directory_exists() {
                context.directory_path().to_path_buf()
            } else {
                context.config().root.clone()
            };
            println!("{}", path.display());
        }
        Command::List => {
            let keys = context
                .store()
                .saved_keys()
                .context("failed to list save directory")?;
            for key in keys {
                println!("{key}");
            }
        }
    }

    Ok(())
}
