/// Neckline Core Library - jewelry overlay logic shared by every front end
///
/// This library provides the platform-independent part of the overlay:
/// OBJ mesh loading, face-anchored pose solving, and the overlay state
/// machine that sequences asset loads and combines automatic tracking with
/// the user's manual adjustment.

pub mod asset;
pub mod config;
pub mod error;
pub mod geometry;
#[cfg(feature = "background")]
pub mod loader;
pub mod obj;
pub mod overlay;
pub mod pose;
pub mod transform;

// Re-export commonly used types
pub use asset::{AssetCatalog, AssetId, AssetStore, DirAssetStore, ImageAsset, LoadedAsset, MemoryAssetStore, OverlaySelection};
pub use config::Config;
pub use error::{Error, LoadError, Result};
pub use geometry::IndexedMesh;
#[cfg(feature = "background")]
pub use loader::{frame_feed, AssetLoader, FramePublisher, FrameSubscriber};
pub use obj::{inspect_model, load_mesh, load_mesh_with_report};
pub use overlay::{ApplyOutcome, FrameInput, LoadTicket, OverlayState, Phase, RenderAsset, RenderData};
pub use pose::{FaceDetection, Landmark, PlacementTransform, PoseParams, Rect, Size, ViewGeometry};
pub use transform::{GestureDelta, ManualAdjustment, RotationState, Transform};
