use anyhow::Result;
use clap::{Parser, Subcommand};
use shorty::config::{Config, StorageBackend};
use shorty::storage;

#[derive(Parser)]
#[command(name = "shorty-admin")]
#[command(about = "Shorty storage maintenance CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the number of stored URLs and distinct users
    Stats,
    /// Check that the storage backend is reachable
    Ping,
    /// List the live short URLs of a user
    List {
        /// User ID (sub claim of the user's token)
        user_id: String,
    },
    /// Rewrite the memory backend's persistence file without superseded lines
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let storage = storage::connect(&config.storage).await?;

    match cli.command {
        Commands::Stats => {
            let urls = storage.count_urls().await?;
            let users = storage.count_users().await?;
            println!("URLs:  {}", urls);
            println!("Users: {}", users);
        }
        Commands::Ping => {
            storage.ping().await?;
            println!("✓ Storage is reachable");
        }
        Commands::List { user_id } => {
            let mappings = storage.list_by_user(&user_id).await?;
            if mappings.is_empty() {
                println!("No short URLs found for user '{}'.", user_id);
            } else {
                println!("{:<12} {}", "Short key", "Short URL  →  Original URL");
                println!("{}", "-".repeat(80));
                for mapping in mappings {
                    println!(
                        "{:<12} {}/{}  →  {}",
                        mapping.short_key, config.base_url, mapping.short_key, mapping.original_url
                    );
                }
            }
        }
        Commands::Compact => {
            if config.storage.backend != StorageBackend::Memory
                || config.storage.file_path.is_none()
            {
                println!("⚠ Compaction only applies to the memory backend with FILE_STORAGE_PATH set");
            } else {
                // Closing the memory backend rewrites the file
                storage.close().await?;
                println!("✓ Compacted persistence file");
                return Ok(());
            }
        }
    }

    storage.close().await?;
    Ok(())
}
