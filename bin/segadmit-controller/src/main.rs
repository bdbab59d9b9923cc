//! SegAdmit Controller - segment admission command line
//!
//! Admits segment files into a table, shows committed segment records and
//! computes segment checksums.

mod controller;

use anyhow::Result;
use clap::{Parser, Subcommand};
use controller::AdmitParams;
use segadmit_common::SegmentCrc;
use segadmit_upload::UploadHeaders;
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "segadmit-controller")]
#[command(about = "SegAdmit segment admission controller")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/segadmit/controller.toml")]
    config: PathBuf,

    /// Log level (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Metadata database path (overrides the config file)
    #[arg(long)]
    metadata_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Admit a segment file
    Admit {
        /// Table name (`_OFFLINE` is appended unless a type suffix is present)
        #[arg(long)]
        table: String,
        /// Segment name
        #[arg(long)]
        segment: String,
        /// Staged segment file
        #[arg(long)]
        file: PathBuf,
        /// Segment crc; computed from the file if omitted
        #[arg(long)]
        crc: Option<u64>,
        /// Index creation time in epoch milliseconds; defaults to now
        #[arg(long)]
        creation_time: Option<u64>,
        /// Final location; defaults to `<segment_root>/<table>/<segment>`
        #[arg(long)]
        final_uri: Option<String>,
        /// Location recorded for consumers; defaults to the final location
        #[arg(long)]
        download_uri: Option<String>,
        /// Only admit if the committed crc equals this value
        #[arg(long)]
        if_match: Option<String>,
        /// JSON custom map modifier
        #[arg(long)]
        custom_map_modifier: Option<String>,
        /// Crypter the segment was encrypted with
        #[arg(long)]
        crypter: Option<String>,
        /// Leave the file in place instead of copying it to the final location
        #[arg(long)]
        no_move: bool,
        /// Do not take the upload lock
        #[arg(long)]
        no_parallel_push_protection: bool,
    },
    /// Show a committed segment record
    Show {
        #[arg(long)]
        table: String,
        #[arg(long)]
        segment: String,
    },
    /// Compute the crc of a segment file
    Crc {
        #[arg(long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = controller::load_config(&args.config)?;
    if let Some(path) = args.metadata_path {
        config.metadata.path = path;
    }
    let log_level = controller::log_level(args.log_level, &config);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Commands::Admit {
            table,
            segment,
            file,
            crc,
            creation_time,
            final_uri,
            download_uri,
            if_match,
            custom_map_modifier,
            crypter,
            no_move,
            no_parallel_push_protection,
        } => {
            let params = AdmitParams {
                table,
                segment,
                file,
                crc,
                creation_time,
                final_uri,
                download_uri,
                headers: UploadHeaders {
                    if_match,
                    custom_map_modifier,
                    crypter,
                },
                no_move,
                no_parallel_push_protection,
            };
            let request = controller::admit_request(&config, params)?;
            let store = controller::open_store(&config)?;
            let coordinator = controller::build_coordinator(&config, store);

            info!("Admitting {} from {}", request.key(), request.staging_path.display());
            let result = coordinator.admit_segment(request).await;
            info!(stats = ?coordinator.stats().snapshot(), "Admission finished");
            match result {
                Ok(outcome) => {
                    println!("{}", serde_json::to_string_pretty(&outcome)?);
                }
                Err(e) => {
                    error!("Admission failed: {}", e);
                    let body = json!({
                        "error": e.to_string(),
                        "status": e.http_status_code(),
                        "retryable": e.is_retryable(),
                    });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    std::process::exit(1);
                }
            }
        }
        Commands::Show { table, segment } => {
            let key = controller::segment_key(&table, &segment)?;
            let store = controller::open_store(&config)?;
            match store.read(&key).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => {
                    error!("No record for {}", key);
                    std::process::exit(1);
                }
            }
        }
        Commands::Crc { file } => {
            let crc = SegmentCrc::compute_file(&file)?;
            println!("{}", json!({ "crc": crc.value, "length": crc.length }));
        }
    }

    Ok(())
}
