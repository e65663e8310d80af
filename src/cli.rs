// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning continuously from a camera
//! - Decoding a single image file

use crate::SourceArgs;
use barcode_scanner::backends::camera::{self, file_source};
use barcode_scanner::scanner::{self, DecodeEngine, DeviceCatalog};
use barcode_scanner::{Config, DecoderKind, DetectionEvent, ScanController, ScanState};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info};

/// Load the config file and apply command-line overrides
fn load_config(source: SourceArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if let Some(backend) = source.backend {
        config.backend = backend.into();
    }
    if let Some(dir) = source.source {
        config.backend = camera::CameraBackendType::FileSource;
        config.image_directory = Some(dir);
    }
    debug!(?config, "Effective configuration");
    Ok(config)
}

/// List all available cameras
pub fn list_cameras(source: SourceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(source)?;
    let runtime = tokio::runtime::Runtime::new()?;

    let catalog = DeviceCatalog::new(camera::get_backend(&config));
    let listing = runtime.block_on(catalog.list_devices());

    if let Some(failure) = listing.failure {
        return Err(failure.into());
    }
    if listing.devices.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", config.backend);
    println!();
    for (index, device) in listing.devices.iter().enumerate() {
        if device.label.is_some() {
            println!("  [{}] {}  {}", index, device.id, device.display_name());
        } else {
            println!("  [{}] {}", index, device.id);
        }
    }

    Ok(())
}

/// Scan from a camera, printing detections until done or interrupted
pub fn scan(
    source: SourceArgs,
    device: Option<String>,
    decoder: Option<DecoderKind>,
    continuous: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(source)?;
    if continuous {
        config.pause_on_detect = false;
    }
    if let Some(decoder) = decoder {
        config.decoder = decoder;
    }
    let device = device.or_else(|| config.preferred_device.clone());

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_scan(config, device, continuous, json))
}

async fn run_scan(
    config: Config,
    device: Option<String>,
    continuous: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (detections_tx, mut detections) = mpsc::unbounded_channel();
    let controller = ScanController::from_config(&config)
        .on_detected(move |event| {
            let _ = detections_tx.send(event.clone());
        })
        .build();

    let interrupted = Arc::new(Notify::new());
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.notify_one())?;
    }

    let listing = controller.refresh_devices().await?;
    if let Some(failure) = &listing.failure {
        eprintln!("Warning: {}", failure);
    }

    controller.start(device).await?;
    let mut state = controller.watch();
    let mut found = 0usize;
    let mut announced = false;

    let outcome: Result<(), Box<dyn std::error::Error>> = loop {
        {
            let snapshot = state.borrow_and_update();
            if snapshot.state == ScanState::Error {
                let message = snapshot
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "scan failed".to_string());
                break Err(message.into());
            }
        }

        if !announced
            && !json
            && let Some(id) = controller.active_device()
        {
            eprintln!("Scanning with {} (Ctrl+C to stop)", id);
            announced = true;
        }

        tokio::select! {
            _ = interrupted.notified() => {
                info!(found, "Interrupted");
                break Ok(());
            }
            Some(event) = detections.recv() => {
                print_detection(&event, json);
                found += 1;
                if !continuous {
                    break Ok(());
                }
                if let Err(e) = controller.clear_result() {
                    break Err(e.into());
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
            }
        }
    };

    controller.dispose().await?;
    outcome
}

fn print_detection(event: &DetectionEvent, json: bool) {
    if json {
        let line = serde_json::json!({
            "payload": event.payload,
            "detected_at": event.detected_at.to_rfc3339(),
            "generation": event.generation,
        });
        println!("{}", line);
    } else {
        println!("{}", event.payload);
    }
}

/// Run the decode engine once on an image file
pub fn decode_image(
    path: &Path,
    decoder: Option<DecoderKind>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let frame = file_source::load_image_as_frame(path)?;
    // Still images are decoded at full resolution unless they are huge
    let engine = scanner::create_engine(
        decoder.unwrap_or(config.decoder),
        config
            .max_decode_dimension
            .max(frame.width.max(frame.height).min(4096)),
    );
    debug!(engine = engine.name(), "Decoding {}", path.display());

    match engine.decode(&frame)? {
        Some(payload) => {
            if json {
                let line = serde_json::json!({
                    "path": path.display().to_string(),
                    "payload": payload,
                });
                println!("{}", line);
            } else {
                println!("{}", payload);
            }
            Ok(())
        }
        None => Err(format!("No barcode found in {}", path.display()).into()),
    }
}
