use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use stackwatch_lib::backend::{SimulatedBackend, SimulatorOptions};
use stackwatch_lib::config::ControllerConfig;
use stackwatch_lib::controller::{Screen, StackOverview};
use stackwatch_lib::logging::init_tracing;
use stackwatch_lib::progress::{Phase, ProgressView};

#[derive(Parser)]
#[command(name = "stack-cli")]
#[command(about = "Drive the stack overview against a simulated indexing backend", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "demo")]
    project: String,

    /// Source folders to attach (comma separated)
    #[arg(short, long, value_delimiter = ',', default_value = "/photos/demo")]
    folders: Vec<String>,

    /// Photos generated per folder
    #[arg(long, default_value_t = 12)]
    photos: usize,

    /// Burst gap applied before the first run
    #[arg(short = 'g', long)]
    burst_gap: Option<u64>,

    /// Regroup with this burst gap once the first run is done
    #[arg(short = 'r', long)]
    restack_to: Option<u64>,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Regrouping discards existing thumbnails
    #[arg(long)]
    drop_thumbnails_on_restack: bool,
}

async fn follow_progress(screen: &Screen, pb: &ProgressBar) {
    while screen.is_polling() {
        let view = ProgressView::from_status(&screen.state().await.status);
        if view.phase != Phase::Idle {
            pb.set_length(view.total as u64);
            pb.set_position(view.done as u64);
        }
        pb.set_message(view.label());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    // Let the trailing stacks fetch land.
    tokio::time::sleep(Duration::from_millis(100)).await;
    pb.finish_with_message("Idle");
}

fn progress_bar() -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

async fn print_stacks(screen: &Screen) {
    let state = screen.state().await;
    println!();
    println!(
        "{:<8} {:<8} {:<28} {:<6} {:<6} {:<10}",
        "STACK", "PHOTOS", "EARLIEST", "RAW", "JPEG", "THUMBNAIL"
    );
    println!("{}", "-".repeat(70));
    for stack in &state.stacks {
        println!(
            "{:<8} {:<8} {:<28} {:<6} {:<6} {:<10}",
            stack.stack_id,
            stack.photo_count,
            stack.earliest_capture_time.as_deref().unwrap_or("-"),
            stack.has_raw,
            stack.has_jpeg,
            if stack.thumbnail_path.is_some() { "ready" } else { "missing" }
        );
    }
    println!();
    println!("📊 {} stack(s) in {} folder(s)", state.stacks.len(), state.folders.len());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let backend = Arc::new(SimulatedBackend::new(SimulatorOptions {
        photos_per_folder: cli.photos,
        preserve_thumbnails_on_restack: !cli.drop_thumbnails_on_restack,
        ..Default::default()
    }));
    let mut overview = match &cli.config {
        Some(path) => StackOverview::from_config_file(backend.clone(), backend.clone(), path)?,
        None => StackOverview::new(backend.clone(), backend.clone(), ControllerConfig::default()),
    };

    println!(
        "🚀 stack-cli v{}: opening project '{}'",
        stackwatch_lib::get_app_version(),
        cli.project
    );
    let screen = overview.activate(&cli.project).await?;

    if let Some(gap) = cli.burst_gap {
        screen.open_reconfigure().await?;
        screen.edit_reconfigure(gap)?;
        screen.commit_reconfigure().await?;
    }

    for folder in &cli.folders {
        match screen.add_folder(folder).await? {
            Some(action) => println!("   + {folder} ({})", action.command_name()),
            None => println!("   + {folder}"),
        }
    }

    follow_progress(&screen, &progress_bar()?).await;
    print_stacks(&screen).await;

    if let Some(gap) = cli.restack_to {
        let current = screen.open_reconfigure().await?;
        println!();
        println!("🔄 Regrouping: burst gap {current}s -> {gap}s");
        screen.edit_reconfigure(gap)?;
        let outcome = screen.commit_reconfigure().await?;
        if let Some(action) = outcome.auto_action {
            println!("   follow-up: {}", action.command_name());
            follow_progress(&screen, &progress_bar()?).await;
        }
        print_stacks(&screen).await;
    }

    let warnings = overview
        .logs()
        .get_logs(Some(&cli.project))
        .into_iter()
        .filter(|e| e.level == stackwatch_lib::logging::LogLevel::Warning)
        .count();
    if warnings > 0 {
        eprintln!("⚠️  {warnings} command(s) rejected, see log output");
    }

    overview.deactivate();
    Ok(())
}
