use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, warn};

use fmd_client::api::location::{decode_picture, Location};
use fmd_client::{ClientConfig, Command, Credentials, FmdClient, LocationProvider, LocationQuery, Result};

#[derive(Parser)]
#[command(name = "fmd")]
#[command(about = "Client for a FindMyDevice server")]
#[command(version)]
struct Cli {
    /// Server base URL
    #[arg(long, env = "FMD_URL")]
    url: String,

    /// Device / account id
    #[arg(long, env = "FMD_ID")]
    id: String,

    /// Account password
    #[arg(long, env = "FMD_PASSWORD", hide_env_values = true)]
    password: String,

    /// Requested session length in seconds
    #[arg(long, default_value_t = fmd_client::config::DEFAULT_SESSION_DURATION)]
    session: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download and decrypt stored locations
    Locations {
        /// Number of most recent locations
        #[arg(long, default_value_t = 1, conflicts_with = "all")]
        count: usize,
        /// Every stored location, oldest first
        #[arg(long)]
        all: bool,
    },
    /// Download and decrypt pictures into a directory
    Pictures {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Send a raw command string, e.g. "ring" or "camera front"
    Command { text: String },
    /// Ask the device for a new location (all, gps, cell, last)
    Locate {
        #[arg(default_value = "all")]
        provider: String,
    },
    /// Save the account's data export to a file
    Export { file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fmd failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::new(&cli.url).with_session_duration(cli.session);
    let mut client = FmdClient::connect(config, Credentials::new(cli.id, cli.password)).await?;

    match cli.command {
        Commands::Locations { count, all } => {
            let query = if all {
                LocationQuery::all()
            } else {
                LocationQuery::latest(count)
            };
            for blob in client.locations(&query).await? {
                let plaintext = match client.decrypt_blob(&blob) {
                    Ok(plaintext) => plaintext,
                    Err(e) if e.is_no_data() => continue,
                    Err(e) => return Err(e),
                };
                match Location::from_json(&plaintext) {
                    Ok(location) => println!("{}", serde_json::to_string(&location).unwrap_or_default()),
                    Err(_) => println!("{}", String::from_utf8_lossy(&plaintext)),
                }
            }
        }
        Commands::Pictures { out, count } => {
            tokio::fs::create_dir_all(&out).await?;
            for (i, blob) in client.pictures(count).await?.iter().enumerate() {
                let image = match client.decrypt_blob(blob).and_then(|p| decode_picture(&p)) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!(index = i, error = %e, "Skipping picture");
                        continue;
                    }
                };
                let path = picture_path(&out, i, &image);
                tokio::fs::write(&path, &image).await?;
                println!("{}", path.display());
            }
        }
        Commands::Command { text } => {
            let command: Command = text.parse().unwrap_or_else(|never| match never {});
            client.send_command(&command).await?;
        }
        Commands::Locate { provider } => {
            let provider: LocationProvider = provider.parse().unwrap_or_default();
            client.request_location(provider).await?;
        }
        Commands::Export { file } => {
            let mut out = tokio::fs::File::create(&file).await?;
            let written = client.export_data(&mut out).await?;
            println!("{written} bytes written to {}", file.display());
        }
    }
    Ok(())
}

fn picture_path(dir: &Path, index: usize, image: &[u8]) -> PathBuf {
    let ext = if image.starts_with(b"\x89PNG") { "png" } else { "jpg" };
    dir.join(format!("picture_{index}.{ext}"))
}
