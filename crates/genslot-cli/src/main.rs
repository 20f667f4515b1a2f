//! genslot CLI: run one generation slot, or manage the local history and
//! collection.
//!
//! Provider endpoints come from GENSLOT_*_API_URL; credentials from
//! IMAGE_API_KEY, VISION_API_KEY and VIDEO_API_KEY, or `--set KEY=VALUE`.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use genslot_cli::{summarize_asset, truncate_string, write_results, AssetSummary};
use genslot_codec::encode_file;
use genslot_core::models::{
    CollectionItem, EncodedImage, GenerationMode, ImageConfig, SlotId, SlotInputs, SlotPatch,
    SlotStatus, VideoProfile, VideoQuality,
};
use genslot_core::{Config, EnvSettings, MapSettings};
use genslot_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use genslot_providers::create_providers;
use genslot_storage::{runtime, CollectionSink, HistorySink, RecordStore};
use genslot_worker::SlotOrchestrator;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "genslot", about = "Generation slot runner")]
struct Cli {
    /// Log format: pretty or json
    #[arg(long, global = true, env = "GENSLOT_LOG_FORMAT", default_value = "pretty")]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one slot and wait for its result
    Run(RunArgs),
    /// Completed generations
    History {
        #[command(subcommand)]
        sub: HistoryCommands,
    },
    /// Saved assets
    Collection {
        #[command(subcommand)]
        sub: CollectionCommands,
    },
}

#[derive(Args)]
struct RunArgs {
    /// edit, generate, multi, combine, video or analyze
    #[arg(long, default_value = "edit")]
    mode: GenerationMode,
    /// Prompt or question
    #[arg(long)]
    prompt: String,
    /// Reference images (start frame for video)
    images: Vec<PathBuf>,
    /// End frame; selects the keyframe video profile
    #[arg(long)]
    end_frame: Option<PathBuf>,
    #[arg(long)]
    aspect_ratio: Option<String>,
    #[arg(long)]
    resolution: Option<String>,
    /// Video duration in seconds
    #[arg(long)]
    duration_secs: Option<u32>,
    /// Ask the video provider for an audio track
    #[arg(long)]
    audio: bool,
    /// Save produced images to the collection
    #[arg(long)]
    save: bool,
    /// Write inline image results to this directory
    #[arg(long)]
    output: Option<PathBuf>,
    /// Setting override, e.g. --set IMAGE_MODEL=image-edit-v2
    #[arg(long = "set", value_name = "KEY=VALUE")]
    settings: Vec<String>,
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// List entries, newest first
    List {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Delete entries by id
    Delete { ids: Vec<Uuid> },
    /// Delete every entry
    Clear,
}

#[derive(Subcommand)]
enum CollectionCommands {
    /// List saved assets, newest first
    List,
    /// Add image files
    Add { files: Vec<PathBuf> },
    /// Delete an item by id
    Delete { id: Uuid },
    /// Delete every item
    Clear,
}

#[derive(Serialize)]
struct RunReport {
    slot_id: SlotId,
    status: SlotStatus,
    task_id: Option<String>,
    error: Option<String>,
    results: Vec<AssetSummary>,
    files: Vec<PathBuf>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn load_image(path: &Path) -> anyhow::Result<EncodedImage> {
    let file = encode_file(path).with_context(|| format!("Read {}", path.display()))?;
    Ok(file.transport)
}

fn build_inputs(args: &RunArgs) -> anyhow::Result<SlotInputs> {
    let images = args
        .images
        .iter()
        .map(|path| load_image(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut inputs = SlotInputs::new(args.mode, args.prompt.clone()).with_images(images);
    inputs.save_to_collection = args.save;
    inputs.image_config = ImageConfig {
        aspect_ratio: args.aspect_ratio.clone(),
        resolution: args.resolution.clone(),
    };

    if args.mode == GenerationMode::Video {
        let (aspect_ratio, duration_secs, resolution) = match VideoProfile::default() {
            VideoProfile::Audio {
                aspect_ratio,
                duration_secs,
                resolution,
                ..
            }
            | VideoProfile::Keyframe {
                aspect_ratio,
                duration_secs,
                resolution,
                ..
            } => (aspect_ratio, duration_secs, resolution),
        };
        let aspect_ratio = args.aspect_ratio.clone().unwrap_or(aspect_ratio);
        let duration_secs = args.duration_secs.unwrap_or(duration_secs);
        let resolution = args.resolution.clone().unwrap_or(resolution);

        inputs.video_profile = Some(match &args.end_frame {
            Some(path) => {
                if args.audio {
                    bail!("--audio is not available with --end-frame");
                }
                VideoProfile::Keyframe {
                    aspect_ratio,
                    duration_secs,
                    resolution,
                    end_frame: Some(load_image(path)?),
                    quality: VideoQuality::default(),
                }
            }
            None => VideoProfile::Audio {
                aspect_ratio,
                duration_secs,
                resolution,
                generate_audio: args.audio,
            },
        });
    } else if args.end_frame.is_some() {
        bail!("--end-frame is only valid in video mode");
    }

    Ok(inputs)
}

async fn run(config: &Config, store: Arc<dyn RecordStore>, args: RunArgs) -> anyhow::Result<()> {
    let settings = MapSettings::from_pairs(args.settings.iter().map(String::as_str))?
        .over(EnvSettings);
    let providers = create_providers(config, Arc::new(settings))?;
    let inputs = build_inputs(&args)?;

    let (tx, mut rx) = mpsc::channel(8);
    let orchestrator = SlotOrchestrator::from_config(config, providers, store).with_events(tx);

    let first = orchestrator.store().slots().await.first().map(|s| s.id);
    let slot_id = match first {
        Some(id) => orchestrator.update_slot(id, SlotPatch::new().inputs(inputs)).await?.id,
        None => orchestrator.add_slot(inputs).await?.id,
    };

    let mut slot = orchestrator.run_slot(slot_id).await?;
    if slot.status == SlotStatus::Polling {
        tracing::info!(
            slot_id = %slot_id,
            task_id = ?slot.task_id,
            "Waiting for remote task"
        );
        let deadline = config.max_poll_duration() + config.poll_interval() * 2;
        loop {
            match tokio::time::timeout(deadline, rx.recv()).await {
                Ok(Some((id, _))) if id == slot_id => break,
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => {
                    orchestrator.shutdown().await;
                    bail!("Timed out waiting for slot {}", slot_id);
                }
            }
        }
        slot = orchestrator
            .store()
            .get(slot_id)
            .await
            .context("Slot disappeared while polling")?;
    }
    orchestrator.shutdown().await;

    let files = match &args.output {
        Some(dir) => write_results(dir, slot_id, &slot.results).await?,
        None => Vec::new(),
    };

    print_json(&RunReport {
        slot_id,
        status: slot.status,
        task_id: slot.task_id.clone(),
        error: slot.error.clone(),
        results: slot.results.iter().map(summarize_asset).collect(),
        files,
    })?;

    if slot.status == SlotStatus::Failed {
        bail!(
            "Generation failed: {}",
            slot.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn history(store: Arc<dyn RecordStore>, sub: HistoryCommands) -> anyhow::Result<()> {
    let sink = HistorySink::new(store);
    match sub {
        HistoryCommands::List { limit } => {
            let entries = sink.list().await?;
            let rows: Vec<serde_json::Value> = entries
                .iter()
                .take(limit)
                .map(|entry| {
                    serde_json::json!({
                        "id": entry.id,
                        "timestamp": entry.timestamp,
                        "mode": entry.mode,
                        "prompt": truncate_string(&entry.prompt, 60),
                        "sources": entry.source_images.len(),
                        "results": entry.results.iter().map(summarize_asset).collect::<Vec<_>>(),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
        HistoryCommands::Delete { ids } => {
            let deleted = sink.delete_many(&ids).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
        HistoryCommands::Clear => {
            let deleted = sink.clear().await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
    }
    Ok(())
}

async fn collection(store: Arc<dyn RecordStore>, sub: CollectionCommands) -> anyhow::Result<()> {
    let sink = CollectionSink::new(store);
    match sub {
        CollectionCommands::List => {
            let items = sink.list().await?;
            let rows: Vec<serde_json::Value> = items
                .iter()
                .map(|item| {
                    serde_json::json!({
                        "id": item.id,
                        "created_at": item.created_at,
                        "file_name": item.file_name,
                        "asset": summarize_asset(&item.preview),
                    })
                })
                .collect();
            print_json(&rows)?;
        }
        CollectionCommands::Add { files } => {
            let mut added = Vec::with_capacity(files.len());
            for path in &files {
                let item = CollectionItem::from_upload(load_image(path)?);
                sink.add(&item).await?;
                added.push(item.id);
            }
            print_json(&serde_json::json!({ "added": added }))?;
        }
        CollectionCommands::Delete { id } => {
            if !sink.delete(id).await? {
                bail!("Collection item {} not found", id);
            }
            print_json(&serde_json::json!({ "deleted": 1 }))?;
        }
        CollectionCommands::Clear => {
            let deleted = sink.clear().await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(None, cli.log_format)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let config = Config::from_env().context("Invalid configuration")?;
    let store = runtime::init(&config)
        .await
        .context("Failed to open record store")?;

    let result = match cli.command {
        Commands::Run(args) => run(&config, store, args).await,
        Commands::History { sub } => history(store, sub).await,
        Commands::Collection { sub } => collection(store, sub).await,
    };

    runtime::teardown();
    shutdown_telemetry().await;
    result
}
