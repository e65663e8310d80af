// SPDX-License-Identifier: GPL-3.0-only

use barcode_scanner::DecoderKind;
use barcode_scanner::backends::camera::CameraBackendType;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "barcode-scanner")]
#[command(about = "Scan barcodes continuously from a camera or an image folder")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Scan until a barcode is found (or forever with --continuous)
    Scan {
        #[command(flatten)]
        source: SourceArgs,

        /// Device id to open (from 'barcode-scanner list')
        #[arg(short, long)]
        device: Option<String>,

        /// Barcode formats to decode
        #[arg(long, value_enum)]
        decoder: Option<DecoderArg>,

        /// Keep scanning after a detection
        #[arg(short, long)]
        continuous: bool,

        /// Print detections as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Decode a single image file
    Decode {
        /// Image to decode
        image: PathBuf,

        /// Barcode formats to decode
        #[arg(long, value_enum)]
        decoder: Option<DecoderArg>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where frames come from; overrides the config file
#[derive(Args, Clone, Default)]
pub struct SourceArgs {
    /// Camera backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Image directory for the file backend
    #[arg(short, long)]
    source: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    V4l2,
    File,
}

impl From<BackendArg> for CameraBackendType {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::V4l2 => CameraBackendType::V4l2,
            BackendArg::File => CameraBackendType::FileSource,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DecoderArg {
    /// EAN, UPC, Code 128, QR and more
    All,
    /// QR codes only
    Qr,
}

impl From<DecoderArg> for DecoderKind {
    fn from(arg: DecoderArg) -> Self {
        match arg {
            DecoderArg::All => DecoderKind::MultiFormat,
            DecoderArg::Qr => DecoderKind::Qr,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=barcode_scanner=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { source } => cli::list_cameras(source),
        Commands::Scan {
            source,
            device,
            decoder,
            continuous,
            json,
        } => cli::scan(source, device, decoder.map(Into::into), continuous, json),
        Commands::Decode {
            image,
            decoder,
            json,
        } => cli::decode_image(&image, decoder.map(Into::into), json),
    }
}
