//! The overlay state machine.
//!
//! [`OverlayState`] is the single owner of what the user selected, what has
//! been loaded for it, the last trusted face detection and the manual
//! adjustment. Loads are sequenced with request tickets: every selection
//! bumps a generation counter, and a load result is only applied while its
//! ticket still matches. The last request always wins.
//!
//! ```text
//! Empty ──select──▶ Loading ──ok──▶ Ready
//!   ▲                  │  ▲            │
//!   └─────failure──────┘  └──select────┘
//! ```

use std::sync::Arc;

use nalgebra::Point2;
use tracing::{debug, info, warn};

use crate::asset::{ImageAsset, LoadedAsset, OverlaySelection};
use crate::error::LoadError;
use crate::geometry::IndexedMesh;
use crate::pose::{
    fallback_outline, image_placement, solve, FaceDetection, FaceTrack, ImagePlacement,
    PlacementTransform, PoseParams, Size, TrackUpdate, ViewGeometry,
};
use crate::transform::{GestureDelta, GestureLimits, ManualAdjustment};

/// Identifies one load request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    selection: OverlaySelection,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn selection(&self) -> &OverlaySelection {
        &self.selection
    }
}

/// What happened to a load result handed to [`OverlayState::apply_load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The asset is now current
    Applied,
    /// The load failed and the overlay is empty
    Failed,
    /// A newer selection superseded the request; the result was dropped
    Stale,
}

/// Externally visible state of the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Loading(OverlaySelection),
    Ready(OverlaySelection),
}

#[derive(Debug, Clone)]
enum AssetSlot {
    Empty,
    Loading,
    Ready(LoadedAsset),
}

/// One processed camera frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameInput {
    /// `None` when the detector reported no face
    pub detection: Option<FaceDetection>,
    pub view: ViewGeometry,
}

impl FrameInput {
    pub fn new(detection: Option<FaceDetection>, view: ViewGeometry) -> Self {
        Self { detection, view }
    }

    /// Image size as the detector sees it after applying the sensor rotation
    pub fn oriented_image_size(raw: Size, rotation_degrees: i32) -> Size {
        if rotation_degrees.rem_euclid(180) == 0 {
            raw
        } else {
            Size::new(raw.height, raw.width)
        }
    }
}

/// What the renderer should draw this frame
#[derive(Debug, Clone, PartialEq)]
pub enum RenderAsset {
    None,
    /// A face is tracked but no asset is ready; draw the outline
    Placeholder { outline: Vec<Point2<f32>> },
    Image {
        image: Arc<ImageAsset>,
        /// `None` while no face is tracked
        placement: Option<ImagePlacement>,
    },
    Mesh { mesh: Arc<IndexedMesh> },
}

/// Snapshot handed to the render backend
#[derive(Debug, Clone, PartialEq)]
pub struct RenderData {
    pub selection: OverlaySelection,
    pub asset: RenderAsset,
    /// Combined automatic and manual placement, `None` while no face is tracked
    pub transform: Option<PlacementTransform>,
}

/// Owner of the selected asset, the tracked face and the manual adjustment
#[derive(Debug, Clone)]
pub struct OverlayState {
    params: PoseParams,
    limits: GestureLimits,
    selection: OverlaySelection,
    generation: u64,
    slot: AssetSlot,
    track: FaceTrack,
    view: ViewGeometry,
    pose: Option<PlacementTransform>,
    adjustment: ManualAdjustment,
}

impl Default for OverlayState {
    fn default() -> Self {
        Self::new(PoseParams::default(), GestureLimits::default())
    }
}

impl OverlayState {
    pub fn new(params: PoseParams, limits: GestureLimits) -> Self {
        Self {
            params,
            limits,
            selection: OverlaySelection::None,
            generation: 0,
            slot: AssetSlot::Empty,
            track: FaceTrack::new(),
            view: ViewGeometry::default(),
            pose: None,
            adjustment: ManualAdjustment::default(),
        }
    }

    /// Request a new asset, pre-empting any load in flight.
    ///
    /// Returns the ticket the eventual load result must carry, or `None`
    /// when the selection is cleared.
    pub fn select(&mut self, selection: OverlaySelection) -> Option<LoadTicket> {
        self.generation += 1;
        self.selection = selection.clone();

        if selection == OverlaySelection::None {
            debug!("Selection cleared");
            self.slot = AssetSlot::Empty;
            return None;
        }

        info!("Selected {} (request {})", selection, self.generation);
        self.slot = AssetSlot::Loading;
        Some(LoadTicket {
            generation: self.generation,
            selection,
        })
    }

    /// Apply the result of a load, unless a newer selection superseded it
    pub fn apply_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<LoadedAsset, LoadError>,
    ) -> ApplyOutcome {
        if ticket.generation != self.generation {
            debug!(
                "Dropping stale load of {} (request {}, current {})",
                ticket.selection, ticket.generation, self.generation
            );
            return ApplyOutcome::Stale;
        }

        match result {
            Ok(asset) => {
                info!("Loaded {}", ticket.selection);
                self.slot = AssetSlot::Ready(asset);
                ApplyOutcome::Applied
            }
            Err(e) => {
                warn!("Failed to load {}: {}", ticket.selection, e);
                self.slot = AssetSlot::Empty;
                ApplyOutcome::Failed
            }
        }
    }

    /// Feed one frame through the acceptance gate and re-solve the pose
    pub fn update_frame(&mut self, frame: FrameInput) -> TrackUpdate {
        self.view = frame.view;
        let update = self.track.observe(frame.detection, &self.params);
        if update == TrackUpdate::Rejected {
            debug!("Face too small, keeping the last accepted detection");
        }

        self.pose = self
            .track
            .current()
            .map(|detection| solve(detection, &self.view, &self.params));
        update
    }

    /// Switch between front and back camera; the tracked face does not carry over
    pub fn switch_camera(&mut self, is_front_facing: bool) {
        debug!("Camera switched, front facing: {}", is_front_facing);
        self.view.is_front_facing = is_front_facing;
        self.track.clear();
        self.pose = None;
    }

    /// Fold a gesture step into the manual adjustment
    pub fn apply_gesture(&mut self, delta: &GestureDelta) {
        self.adjustment.apply(delta, &self.limits);
    }

    /// Replace the manual adjustment wholesale, clamping its scale
    pub fn set_adjustment(&mut self, adjustment: ManualAdjustment) {
        self.adjustment = ManualAdjustment {
            scale: adjustment
                .scale
                .clamp(self.limits.min_scale, self.limits.max_scale),
            rotation: adjustment.rotation,
        };
    }

    pub fn reset_adjustment(&mut self) {
        self.adjustment = ManualAdjustment::default();
    }

    pub fn adjustment(&self) -> &ManualAdjustment {
        &self.adjustment
    }

    pub fn selection(&self) -> &OverlaySelection {
        &self.selection
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn params(&self) -> &PoseParams {
        &self.params
    }

    pub fn view(&self) -> &ViewGeometry {
        &self.view
    }

    pub fn phase(&self) -> Phase {
        match &self.slot {
            AssetSlot::Empty => Phase::Empty,
            AssetSlot::Loading => Phase::Loading(self.selection.clone()),
            AssetSlot::Ready(_) => Phase::Ready(self.selection.clone()),
        }
    }

    /// An asset is loaded for the current selection
    pub fn is_ready(&self) -> bool {
        matches!(self.slot, AssetSlot::Ready(_))
    }

    /// A trusted face is being followed
    pub fn is_tracking(&self) -> bool {
        self.pose.is_some()
    }

    pub fn current_detection(&self) -> Option<&FaceDetection> {
        self.track.current()
    }

    pub fn current_mesh(&self) -> Option<Arc<IndexedMesh>> {
        match &self.slot {
            AssetSlot::Ready(LoadedAsset::Mesh(mesh)) => Some(Arc::clone(mesh)),
            _ => None,
        }
    }

    pub fn current_2d_asset(&self) -> Option<Arc<ImageAsset>> {
        match &self.slot {
            AssetSlot::Ready(LoadedAsset::Image(image)) => Some(Arc::clone(image)),
            _ => None,
        }
    }

    /// Placement with the manual adjustment applied, `None` while untracked
    pub fn tracked_transform(&self) -> Option<PlacementTransform> {
        self.pose.as_ref().map(|pose| self.combine(pose))
    }

    /// Placement with the manual adjustment applied.
    ///
    /// While no face is tracked this is the default placement carrying only
    /// the manual adjustment.
    pub fn current_transform(&self) -> PlacementTransform {
        self.tracked_transform()
            .unwrap_or_else(|| self.combine(&PlacementTransform::default()))
    }

    /// Everything the renderer needs for one frame
    pub fn render_data(&self) -> RenderData {
        let transform = self.tracked_transform();

        let asset = match &self.slot {
            AssetSlot::Ready(LoadedAsset::Mesh(mesh)) => RenderAsset::Mesh {
                mesh: Arc::clone(mesh),
            },
            AssetSlot::Ready(LoadedAsset::Image(image)) => RenderAsset::Image {
                image: Arc::clone(image),
                placement: transform.as_ref().map(|t| {
                    image_placement(&image.size(), t, self.adjustment.scale, &self.params)
                }),
            },
            AssetSlot::Empty | AssetSlot::Loading => {
                match (&self.selection, &transform, self.track.current()) {
                    (OverlaySelection::None, _, _) => RenderAsset::None,
                    (_, Some(t), Some(detection)) => RenderAsset::Placeholder {
                        outline: fallback_outline(
                            t,
                            detection.bounding_box.width(),
                            &self.params,
                        ),
                    },
                    _ => RenderAsset::None,
                }
            }
        };

        RenderData {
            selection: self.selection.clone(),
            asset,
            transform,
        }
    }

    fn combine(&self, pose: &PlacementTransform) -> PlacementTransform {
        PlacementTransform {
            scale: pose.scale * self.adjustment.scale,
            roll_degrees: pose.roll_degrees + self.adjustment.rotation.roll,
            rotation: pose.rotation.combined(&self.adjustment.rotation),
            ..*pose
        }
    }
}
