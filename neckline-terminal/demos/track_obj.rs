/// Example: Track an OBJ necklace on the simulated face
///
/// Usage: cargo run --example track_obj -- path/to/necklace.obj

use neckline_core::{
    AssetCatalog, AssetLoader, DirAssetStore, OverlaySelection, OverlayState,
};
use neckline_terminal::TerminalApp;
use std::env;
use std::io;
use std::sync::Arc;

fn main() -> io::Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <obj-file>", args[0]);
        return Ok(());
    }

    let obj_path = &args[1];
    println!("Tracking {} (press Q to quit)...", obj_path);

    let runtime = tokio::runtime::Runtime::new()?;
    let loader = AssetLoader::new(
        Arc::new(DirAssetStore::new(".")),
        Arc::new(AssetCatalog::default()),
        runtime.handle().clone(),
    );

    let selections = vec![
        OverlaySelection::Mesh(obj_path.as_str().into()),
        OverlaySelection::None,
    ];
    let mut app = TerminalApp::new(OverlayState::default(), loader, selections, true)?;
    app.run()
}
