//! Asset selection, storage and decoding.
//!
//! An [`OverlaySelection`] names what the user picked; the [`AssetCatalog`]
//! turns it into a path, an [`AssetStore`] turns the path into bytes, and
//! [`load_selection`] turns the bytes into a mesh or an image.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AssetConfig;
use crate::error::LoadError;
use crate::geometry::IndexedMesh;
use crate::obj;
use crate::pose::Size;

/// Name of a jewelry asset, either a catalog key or a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What the user has chosen to wear
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum OverlaySelection {
    #[default]
    None,
    Image(AssetId),
    Mesh(AssetId),
}

impl OverlaySelection {
    pub fn asset_id(&self) -> Option<&AssetId> {
        match self {
            OverlaySelection::None => None,
            OverlaySelection::Image(id) | OverlaySelection::Mesh(id) => Some(id),
        }
    }
}

impl fmt::Display for OverlaySelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlaySelection::None => f.write_str("none"),
            OverlaySelection::Image(id) => write!(f, "image '{}'", id),
            OverlaySelection::Mesh(id) => write!(f, "mesh '{}'", id),
        }
    }
}

/// A decoded flat jewelry image, RGBA8 rows top to bottom
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageAsset {
    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }
}

/// A successfully loaded asset, ready to hand to a renderer
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedAsset {
    Image(Arc<ImageAsset>),
    Mesh(Arc<IndexedMesh>),
}

/// Source of raw asset bytes
pub trait AssetStore: Send + Sync {
    /// Read the whole asset, `LoadError::NotFound` if it cannot be opened
    fn open(&self, path: &Path) -> Result<Vec<u8>, LoadError>;
}

/// Assets below a directory on disk
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for DirAssetStore {
    fn open(&self, path: &Path) -> Result<Vec<u8>, LoadError> {
        let full = self.root.join(path);
        std::fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                LoadError::NotFound(full.display().to_string())
            }
            _ => LoadError::Io(format!("{}: {}", full.display(), e)),
        })
    }
}

/// Assets held in memory, for tests and targets without a filesystem
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetStore {
    files: HashMap<PathBuf, Arc<Vec<u8>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), Arc::new(bytes.into()));
    }

    pub fn with(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl AssetStore for MemoryAssetStore {
    fn open(&self, path: &Path) -> Result<Vec<u8>, LoadError> {
        self.files
            .get(path)
            .map(|bytes| bytes.as_ref().clone())
            .ok_or_else(|| LoadError::NotFound(path.display().to_string()))
    }
}

/// Maps asset ids to store paths
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    meshes: BTreeMap<String, PathBuf>,
    images: BTreeMap<String, PathBuf>,
}

impl AssetCatalog {
    pub fn new(meshes: BTreeMap<String, PathBuf>, images: BTreeMap<String, PathBuf>) -> Self {
        Self { meshes, images }
    }

    pub fn from_config(config: &AssetConfig) -> Self {
        Self::new(config.meshes.clone(), config.images.clone())
    }

    /// Store path for a selection.
    ///
    /// Ids are matched case-insensitively against the catalog; anything else
    /// is taken as a path in its own right.
    pub fn resolve(&self, selection: &OverlaySelection) -> Option<PathBuf> {
        let (table, id) = match selection {
            OverlaySelection::None => return None,
            OverlaySelection::Image(id) => (&self.images, id),
            OverlaySelection::Mesh(id) => (&self.meshes, id),
        };

        let key = id.as_str().to_lowercase();
        Some(
            table
                .get(&key)
                .cloned()
                .unwrap_or_else(|| PathBuf::from(id.as_str())),
        )
    }

    pub fn mesh_ids(&self) -> impl Iterator<Item = &str> {
        self.meshes.keys().map(String::as_str)
    }

    pub fn image_ids(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

/// Decode PNG or JPEG bytes into an RGBA image
pub fn load_image(data: &[u8]) -> Result<ImageAsset, LoadError> {
    let decoded = image::load_from_memory(data).map_err(|e| LoadError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(LoadError::Empty);
    }

    Ok(ImageAsset {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Resolve, read and decode the asset behind a selection
pub fn load_selection(
    store: &dyn AssetStore,
    catalog: &AssetCatalog,
    selection: &OverlaySelection,
) -> Result<LoadedAsset, LoadError> {
    let path = catalog
        .resolve(selection)
        .ok_or_else(|| LoadError::NotFound("no asset selected".to_string()))?;
    debug!("Loading {} from {}", selection, path.display());

    let bytes = store.open(&path)?;

    match selection {
        OverlaySelection::Mesh(_) => {
            let (mesh, report) = obj::load_mesh_with_report(&bytes)?;
            if !report.is_clean() {
                warn!(
                    "Recovered from bad geometry in {}: {:?}",
                    path.display(),
                    report
                );
            }
            debug!(
                "Loaded mesh {}: {} vertices, {} triangles",
                path.display(),
                mesh.vertex_count(),
                mesh.triangle_count()
            );
            Ok(LoadedAsset::Mesh(Arc::new(mesh)))
        }
        OverlaySelection::Image(_) => {
            let image = load_image(&bytes)?;
            debug!(
                "Loaded image {}: {}x{}",
                path.display(),
                image.width,
                image.height
            );
            Ok(LoadedAsset::Image(Arc::new(image)))
        }
        OverlaySelection::None => Err(LoadError::NotFound("no asset selected".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 215, 0, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    fn catalog() -> AssetCatalog {
        let mut meshes = BTreeMap::new();
        meshes.insert("chain".to_string(), PathBuf::from("models/chain.obj"));
        let mut images = BTreeMap::new();
        images.insert("pendant".to_string(), PathBuf::from("images/pendant.png"));
        AssetCatalog::new(meshes, images)
    }

    #[test]
    fn test_resolve() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve(&OverlaySelection::Mesh("Chain".into())),
            Some(PathBuf::from("models/chain.obj"))
        );
        assert_eq!(
            catalog.resolve(&OverlaySelection::Mesh("custom/ring.obj".into())),
            Some(PathBuf::from("custom/ring.obj"))
        );
        assert_eq!(catalog.resolve(&OverlaySelection::None), None);
    }

    #[test]
    fn test_load_mesh_selection() {
        let store = MemoryAssetStore::new().with("models/chain.obj", TRIANGLE);
        let loaded = load_selection(&store, &catalog(), &OverlaySelection::Mesh("chain".into())).unwrap();
        match loaded {
            LoadedAsset::Mesh(mesh) => assert_eq!(mesh.triangle_count(), 1),
            other => panic!("expected a mesh, got {:?}", other),
        }
    }

    #[test]
    fn test_load_image_selection() {
        let store = MemoryAssetStore::new().with("images/pendant.png", tiny_png());
        let loaded = load_selection(&store, &catalog(), &OverlaySelection::Image("pendant".into())).unwrap();
        match loaded {
            LoadedAsset::Image(image) => {
                assert_eq!((image.width, image.height), (4, 2));
                assert_eq!(image.pixels.len(), 4 * 2 * 4);
                assert_eq!(&image.pixels[..4], &[255, 215, 0, 255]);
            }
            other => panic!("expected an image, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_asset_is_not_found() {
        let store = MemoryAssetStore::new();
        let result = load_selection(&store, &catalog(), &OverlaySelection::Mesh("chain".into()));
        assert!(matches!(result, Err(LoadError::NotFound(_))));
    }

    #[test]
    fn test_dir_store_missing_file() {
        let store = DirAssetStore::new(std::env::temp_dir().join("neckline-does-not-exist"));
        assert!(matches!(
            store.open(Path::new("nothing.obj")),
            Err(LoadError::NotFound(_))
        ));
    }

    #[test]
    fn test_garbage_image_fails_to_decode() {
        assert!(matches!(load_image(b"not an image"), Err(LoadError::Decode(_))));
    }
}
