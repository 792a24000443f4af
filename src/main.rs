use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storefront_media::app::App;
use storefront_media::models::VariantFiles;
use storefront_media::policy::LEGACY_MAX_WIDTH;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "storefront-media")]
#[command(about = "Generate and delete size-capped WebP variants of uploaded images")]
struct CliArgs {
    /// Output directory; overrides MEDIA_OUTPUT_DIR.
    #[arg(long, global = true, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate thumb, medium, large and original variants and print them as JSON.
    Process {
        source: PathBuf,
        /// Base name for the variant files; defaults to the source file name.
        #[arg(long)]
        base_name: Option<String>,
    },
    /// Single-variant quality-only downscale.
    Legacy {
        source: PathBuf,
        output: PathBuf,
        #[arg(long, default_value_t = LEGACY_MAX_WIDTH)]
        max_width: u32,
    },
    /// Delete variant files and prune the directory if it ends up empty.
    Delete {
        #[arg(long)]
        thumb: Option<String>,
        #[arg(long)]
        medium: Option<String>,
        #[arg(long)]
        large: Option<String>,
        #[arg(long)]
        original: Option<String>,
    },
}

async fn run(args: CliArgs) -> storefront_media::Result<()> {
    let app = App::new(args.out_dir)?;

    match args.command {
        Command::Process { source, base_name } => {
            let set = app.process(&source, base_name.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&set)?);
        }
        Command::Legacy {
            source,
            output,
            max_width,
        } => {
            let result = app.legacy(&source, &output, max_width).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Delete {
            thumb,
            medium,
            large,
            original,
        } => {
            let files = VariantFiles {
                original,
                thumb,
                medium,
                large,
            };
            let removed = app.delete(&files).await;
            println!("{}", removed);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_media=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => {
            info!("Done");
            Ok(())
        }
        Err(e) => {
            error!("Media command failed: {}", e);
            std::process::exit(1);
        }
    }
}
