mod app;

use std::path::PathBuf;

use bubble_space::config::EngineConfig;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON file holding the bubble table; created on first save.
    #[arg(long, default_value = "bubbles.json")]
    store: PathBuf,
    /// CMS document (`{"add": [...]}`) merged into the store before start.
    #[arg(long)]
    import: Option<PathBuf>,
    /// Engine tuning file; defaults are used for missing keys.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bubbles with a priority above this are shown at start.
    #[arg(long, default_value_t = 0)]
    min_priority: i32,
    /// Seed for auto-placement.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    max_fps: Option<u32>,
    #[arg(long, default_value_t = 1280.0)]
    width: f32,
    #[arg(long, default_value_t = 800.0)]
    height: f32,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bubble_space=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|error| {
            tracing::warn!(error = %format!("{error:#}"), "using default engine config");
            EngineConfig::default()
        }),
        None => EngineConfig::default(),
    };
    if let Some(max_fps) = args.max_fps {
        config.max_fps = max_fps;
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([args.width, args.height]),
        ..Default::default()
    };

    let launch = app::Launch {
        store_path: args.store,
        import_path: args.import,
        min_priority: args.min_priority,
        seed: args.seed,
        config,
    };
    eframe::run_native(
        "bubble-space",
        options,
        Box::new(move |cc| Ok(Box::new(app::BubbleSpaceApp::new(cc, launch)))),
    )
}
