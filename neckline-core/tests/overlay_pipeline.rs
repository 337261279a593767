//! End-to-end tests: asset bytes and detections in, render data out.

use neckline_core::{
    asset::load_selection, frame_feed, AssetCatalog, AssetLoader, Config, FaceDetection,
    FrameInput, IndexedMesh, LoadError, MemoryAssetStore, OverlaySelection, OverlayState, Phase,
    Rect, RenderAsset, Size, ViewGeometry,
};
use neckline_core::pose::{AnchorSource, TrackUpdate};
use std::sync::Arc;

const QUAD: &str = "\
# one textured quad
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl gold
f 1/1/1 2/2/1 3/3/1 4/4/1
";

const CONFIG: &str = r#"
[assets]
root = "unused"

[assets.meshes]
quad = "models/quad.obj"
hollow = "models/hollow.obj"
"#;

fn setup() -> (Arc<MemoryAssetStore>, Arc<AssetCatalog>, Config) {
    let config = Config::from_str(CONFIG).unwrap();
    let store = MemoryAssetStore::new()
        .with("models/quad.obj", QUAD)
        .with("models/hollow.obj", "v 0 0 0\nv 1 0 0\n");
    let catalog = AssetCatalog::from_config(&config.assets);
    (Arc::new(store), Arc::new(catalog), config)
}

fn phone_view(front: bool) -> ViewGeometry {
    ViewGeometry::new(Size::new(1080.0, 1920.0), Size::new(720.0, 1280.0), front)
}

#[test]
fn quad_loads_through_the_catalog() {
    let (store, catalog, _) = setup();
    let loaded = load_selection(store.as_ref(), &catalog, &OverlaySelection::Mesh("QUAD".into()));
    let mesh: Arc<IndexedMesh> = match loaded {
        Ok(neckline_core::LoadedAsset::Mesh(mesh)) => mesh,
        other => panic!("expected a mesh, got {:?}", other),
    };
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.triangle_count(), 2);
    assert_eq!(mesh.indices(), &[0, 1, 2, 0, 2, 3]);
}

#[test]
fn mesh_without_faces_is_a_terminal_failure() {
    let (store, catalog, _) = setup();
    let result = load_selection(store.as_ref(), &catalog, &OverlaySelection::Mesh("hollow".into()));
    assert_eq!(result, Err(LoadError::Empty));
}

#[test]
fn tracked_face_flows_into_render_data() {
    let (store, catalog, config) = setup();
    let mut state = OverlayState::new(config.pose, config.gesture);

    let selection = OverlaySelection::Mesh("quad".into());
    let ticket = state.select(selection.clone()).unwrap();
    let result = load_selection(store.as_ref(), &catalog, ticket.selection());
    state.apply_load(ticket, result);
    assert_eq!(state.phase(), Phase::Ready(selection));

    let face = FaceDetection::new(Rect::from_origin_size(260.0, 540.0, 200.0, 200.0));
    assert_eq!(
        state.update_frame(FrameInput::new(Some(face), phone_view(true))),
        TrackUpdate::Accepted
    );

    let data = state.render_data();
    let transform = data.transform.unwrap();
    assert_eq!(transform.source, AnchorSource::BoundingBox);
    assert!((transform.scale - 0.4).abs() < 1e-6);
    // Box centered on x = 360 in the image, which is the middle of the view either way
    assert!((transform.anchor.x - 540.0).abs() < 1e-3);
    assert!((transform.anchor.y - (740.0 * 1.5 + 20.0)).abs() < 1e-3);
    assert!(matches!(data.asset, RenderAsset::Mesh { .. }));
}

#[test]
fn rejected_face_does_not_move_the_overlay() {
    let mut state = OverlayState::default();
    let good = FaceDetection::new(Rect::from_origin_size(100.0, 100.0, 100.0, 100.0));
    let tiny = FaceDetection::new(Rect::from_origin_size(500.0, 900.0, 100.0, 99.99));

    state.update_frame(FrameInput::new(Some(good), phone_view(false)));
    let before = state.current_transform();
    assert_eq!(
        state.update_frame(FrameInput::new(Some(tiny), phone_view(false))),
        TrackUpdate::Rejected
    );
    assert_eq!(state.current_transform(), before);
}

#[tokio::test]
async fn last_selection_wins_under_background_loading() {
    let (store, catalog, _) = setup();
    let mut loader = AssetLoader::current(store, catalog);
    let mut state = OverlayState::default();

    loader.request(&mut state, OverlaySelection::Mesh("hollow".into()));
    loader.request(&mut state, OverlaySelection::Mesh("missing".into()));
    let last = loader
        .request(&mut state, OverlaySelection::Mesh("quad".into()))
        .unwrap();

    let mut seen = 0;
    while seen < 3 {
        let completion = loader.next_completion().await.unwrap();
        state.apply_load(completion.ticket, completion.result);
        seen += 1;
    }

    assert_eq!(state.generation(), last.generation());
    assert!(state.is_ready());
    assert_eq!(state.current_mesh().unwrap().triangle_count(), 2);
}

#[tokio::test]
async fn frame_feed_delivers_newest_detection_only() {
    let (publisher, mut subscriber) = frame_feed();
    let mut state = OverlayState::default();

    let producer = tokio::spawn(async move {
        for i in 0..5 {
            let x = 100.0 + i as f32 * 10.0;
            let face = FaceDetection::new(Rect::from_origin_size(x, 100.0, 150.0, 150.0));
            publisher.publish(FrameInput::new(Some(face), phone_view(false)));
        }
    });
    producer.await.unwrap();

    let frame = subscriber.take_latest().unwrap();
    state.update_frame(frame);
    let detection = state.current_detection().unwrap();
    assert_eq!(detection.bounding_box.left, 140.0);
    assert!(subscriber.take_latest().is_none());
}
