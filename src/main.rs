use clap::{Parser, Subcommand};
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use petecho_client::{
    app_state::AppState,
    config::ClientConfig,
    models::{
        event::{GeneratedImage, JobEvent},
        job::MemorySlot,
    },
    orchestrator::{JobHandle, JobOrchestrator},
    services::transport::Backend,
};

type CliResult = Result<bool, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "petecho", version, about = "Pet Echoes photo generation client")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, env = "PETECHO_LOG_JSON", default_value_t = false)]
    log_json: bool,

    /// Print collected metrics in Prometheus text format on exit
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the memorial photo from a pet photo
    Generate {
        photo: PathBuf,
        /// Output file (extension follows the generated format when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Stylize up to four memory photos concurrently; slot = position
    Memory {
        #[arg(required = true, num_args = 1..=4)]
        photos: Vec<PathBuf>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Check backend health
    Health,
    /// Download the studio background image
    StudioBackground {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ClientConfig::from_env().expect("Failed to load configuration from environment");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    metrics::describe_counter!("petecho_jobs_submitted_total", "Photos accepted by the backend");
    metrics::describe_counter!("petecho_jobs_completed_total", "Jobs that produced an image");
    metrics::describe_counter!("petecho_jobs_failed_total", "Jobs that ended with an error");
    metrics::describe_counter!("petecho_jobs_cancelled_total", "Jobs cancelled before finishing");
    metrics::describe_histogram!(
        "petecho_job_duration_seconds",
        "Time from upload to terminal result"
    );

    tracing::info!(backend = %config.backend_url, "Initializing petecho client");

    let state = AppState::from_config(&config).expect("Failed to initialize HTTP backend");
    let orchestrator = JobOrchestrator::new(state);

    let ctrl_c = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling jobs");
            ctrl_c.cancel_all();
        }
    });

    let result = match cli.command {
        Command::Generate { photo, out } => generate(&orchestrator, &photo, out).await,
        Command::Memory { photos, out_dir } => memory(&orchestrator, photos, &out_dir).await,
        Command::Health => health(&orchestrator).await,
        Command::StudioBackground { out } => studio_background(&orchestrator, out).await,
    };

    if cli.print_metrics {
        println!("{}", prometheus_handle.render());
    }

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn generate(orchestrator: &JobOrchestrator, photo: &Path, out: Option<PathBuf>) -> CliResult {
    let image = tokio::fs::read(photo).await?;
    let mut events = std::pin::pin!(orchestrator.process_primary_photo(image).into_stream());

    while let Some(event) = events.next().await {
        match event {
            JobEvent::Status { text } => println!("{text}"),
            JobEvent::Processing { .. } => {}
            JobEvent::Finished(Ok(generated)) => {
                let path = out.unwrap_or_else(|| default_output("memorial", &generated));
                write_image(&path, &generated).await?;
                return Ok(true);
            }
            JobEvent::Finished(Err(e)) => {
                tracing::warn!(error = %e, "Memorial photo failed");
                return Ok(false);
            }
        }
    }

    println!("Cancelled");
    Ok(false)
}

async fn memory(orchestrator: &JobOrchestrator, photos: Vec<PathBuf>, out_dir: &Path) -> CliResult {
    let mut handles = Vec::with_capacity(photos.len());
    for (index, photo) in photos.iter().enumerate() {
        let slot = MemorySlot::new(u8::try_from(index)?)?;
        let image = tokio::fs::read(photo).await?;
        handles.push((slot, orchestrator.process_memory_photo(image, slot)));
    }

    let results = futures::future::join_all(
        handles
            .into_iter()
            .map(|(slot, handle)| follow_memory_slot(slot, handle, out_dir)),
    )
    .await;

    let mut all_ok = true;
    for result in results {
        all_ok &= result?;
    }
    Ok(all_ok)
}

async fn follow_memory_slot(slot: MemorySlot, handle: JobHandle, out_dir: &Path) -> CliResult {
    let mut events = std::pin::pin!(handle.into_stream());

    while let Some(event) = events.next().await {
        match event {
            JobEvent::Processing { active: true } => println!("[slot {slot}] processing"),
            JobEvent::Processing { active: false } | JobEvent::Status { .. } => {}
            JobEvent::Finished(Ok(generated)) => {
                let path = out_dir.join(format!("memory-{slot}.{}", generated.extension()));
                write_image(&path, &generated).await?;
                println!("[slot {slot}] saved {}", path.display());
                return Ok(true);
            }
            JobEvent::Finished(Err(e)) => {
                println!("[slot {slot}] {}", e.user_message());
                tracing::warn!(slot = %slot, error = %e, "Memory photo failed");
                return Ok(false);
            }
        }
    }

    println!("[slot {slot}] cancelled");
    Ok(false)
}

async fn health(orchestrator: &JobOrchestrator) -> CliResult {
    let report = orchestrator.state().backend.health().await?;
    println!(
        "{} {}",
        report.status,
        report.version.as_deref().unwrap_or("(unknown version)")
    );
    Ok(report.is_healthy())
}

async fn studio_background(orchestrator: &JobOrchestrator, out: Option<PathBuf>) -> CliResult {
    let background = orchestrator.state().loader.load_studio_background().await?;
    let path = out.unwrap_or_else(|| default_output("studio-background", &background));
    write_image(&path, &background).await?;
    Ok(true)
}

fn default_output(stem: &str, image: &GeneratedImage) -> PathBuf {
    PathBuf::from(format!("{stem}.{}", image.extension()))
}

async fn write_image(path: &Path, image: &GeneratedImage) -> std::io::Result<()> {
    tokio::fs::write(path, &image.bytes).await?;
    println!(
        "Saved {}x{} image to {}",
        image.width,
        image.height,
        path.display()
    );
    Ok(())
}
