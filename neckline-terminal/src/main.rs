/// Neckline Terminal - jewelry overlay preview
///
/// Drives the overlay with a keyboard-controlled stand-in face and draws the
/// result as ASCII. Logs go to a file so they do not tear the display.
use anyhow::Context;
use clap::Parser;
use neckline_core::{
    asset::load_selection, inspect_model, AssetCatalog, AssetLoader, AssetStore, Config,
    DirAssetStore, LoadedAsset, OverlaySelection, OverlayState,
};
use neckline_terminal::{selection_cycle, TerminalApp};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Preview necklaces and pendants on a simulated face
#[derive(Parser, Debug)]
#[command(name = "neckline-terminal", version, about, long_about = None)]
struct Args {
    /// Asset id from the catalog, or a path below the asset root
    asset: Option<String>,

    /// Treat the asset as a flat image instead of an OBJ mesh
    #[arg(long)]
    image: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Asset root directory (overrides config)
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Start with the back camera (no mirroring)
    #[arg(long)]
    back_camera: bool,

    /// Print statistics about the asset and exit
    #[arg(long)]
    info: bool,

    /// Log file path
    #[arg(long, default_value = "neckline-terminal.log")]
    log_file: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = File::create(&args.log_file)
        .with_context(|| format!("creating log file {}", args.log_file.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(log_file)).with_ansi(false))
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting neckline-terminal v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let root = args.assets.clone().unwrap_or_else(|| config.assets.root.clone());
    let store: Arc<dyn AssetStore> = Arc::new(DirAssetStore::new(root));
    let catalog = Arc::new(AssetCatalog::from_config(&config.assets));

    let initial = args.asset.as_deref().map(|id| {
        if args.image {
            OverlaySelection::Image(id.into())
        } else {
            OverlaySelection::Mesh(id.into())
        }
    });

    if args.info {
        let selection = initial.context("--info needs an asset")?;
        return print_info(store.as_ref(), &catalog, &selection);
    }

    // Loads run on the blocking pool; the main thread owns the terminal
    let runtime = tokio::runtime::Runtime::new()?;
    let loader = AssetLoader::new(Arc::clone(&store), Arc::clone(&catalog), runtime.handle().clone());

    let selections = selection_cycle(initial, &catalog);

    let state = OverlayState::new(config.pose, config.gesture);
    let mut app = TerminalApp::new(state, loader, selections, !args.back_camera)?;
    app.run()?;

    info!("Shutting down");
    Ok(())
}

fn print_info(
    store: &dyn AssetStore,
    catalog: &AssetCatalog,
    selection: &OverlaySelection,
) -> anyhow::Result<()> {
    let path = catalog
        .resolve(selection)
        .context("nothing selected")?;
    println!("{} -> {}", selection, path.display());

    if let OverlaySelection::Mesh(_) = selection {
        let bytes = store.open(&path)?;
        let stats = inspect_model(&bytes);
        println!(
            "  lines: {} v, {} vt, {} vn, {} f",
            stats.vertex_count, stats.tex_coord_count, stats.normal_count, stats.face_count
        );
        if !stats.materials.is_empty() {
            println!("  materials: {}", stats.materials.join(", "));
        }
    }

    match load_selection(store, catalog, selection)? {
        LoadedAsset::Mesh(mesh) => {
            println!(
                "  mesh: {} vertices, {} triangles",
                mesh.vertex_count(),
                mesh.triangle_count()
            );
            if let Some((min, max)) = mesh.bounds() {
                println!(
                    "  bounds: ({:.3}, {:.3}, {:.3}) .. ({:.3}, {:.3}, {:.3})",
                    min.x, min.y, min.z, max.x, max.y, max.z
                );
            }
        }
        LoadedAsset::Image(image) => {
            println!("  image: {}x{}", image.width, image.height);
        }
    }

    Ok(())
}
