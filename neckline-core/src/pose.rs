//! Face-anchored pose solving.
//!
//! Detections arrive in the coordinate space of the captured camera image;
//! overlays are drawn in the coordinate space of the displayed view. The
//! preview scales the image to *cover* the view (aspect-fill) and, for the
//! front camera, shows it mirrored. [`screen_transform`] maps between the two
//! and [`solve`] turns a detection into a [`PlacementTransform`].
//!
//! Nothing in this module fails: missing landmarks fall back to the bounding
//! box and degenerate sizes fall back to the identity mapping.

use std::collections::HashMap;

use nalgebra::{Matrix3, Matrix4, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::transform::{RotationState, Transform};

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True unless both sides are positive and finite
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Axis-aligned rectangle in image pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin_size(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

/// Named facial landmarks a detector may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Landmark {
    /// Bottom of the mouth, used as the chin reference
    Chin,
    LeftCheek,
    RightCheek,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    NoseBase,
    MouthLeft,
    MouthRight,
}

/// One face as reported by the external detector, in image space
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FaceDetection {
    pub bounding_box: Rect,
    pub landmarks: HashMap<Landmark, Point2<f32>>,
    /// Head Euler angles in degrees
    pub head_euler: RotationState,
}

impl FaceDetection {
    pub fn new(bounding_box: Rect) -> Self {
        Self {
            bounding_box,
            ..Self::default()
        }
    }

    pub fn with_landmark(mut self, landmark: Landmark, x: f32, y: f32) -> Self {
        self.landmarks.insert(landmark, Point2::new(x, y));
        self
    }

    pub fn with_head_euler(mut self, pitch: f32, yaw: f32, roll: f32) -> Self {
        self.head_euler = RotationState::new(pitch, yaw, roll);
        self
    }

    pub fn landmark(&self, landmark: Landmark) -> Option<Point2<f32>> {
        self.landmarks.get(&landmark).copied()
    }
}

/// Displayed view, captured image and camera facing for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewGeometry {
    pub view_size: Size,
    pub image_size: Size,
    pub is_front_facing: bool,
}

impl ViewGeometry {
    pub fn new(view_size: Size, image_size: Size, is_front_facing: bool) -> Self {
        Self {
            view_size,
            image_size,
            is_front_facing,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.view_size.is_degenerate() || self.image_size.is_degenerate()
    }

    /// Aspect-fill factor from image pixels to view pixels (1.0 when degenerate)
    pub fn fill_scale(&self) -> f32 {
        if self.is_degenerate() {
            return 1.0;
        }
        (self.view_size.width / self.image_size.width)
            .max(self.view_size.height / self.image_size.height)
    }

    /// Centering offset of the scaled image inside the view (zero when degenerate)
    pub fn fill_offset(&self) -> Vector2<f32> {
        if self.is_degenerate() {
            return Vector2::zeros();
        }
        let scale = self.fill_scale();
        Vector2::new(
            (self.view_size.width - self.image_size.width * scale) / 2.0,
            (self.view_size.height - self.image_size.height * scale) / 2.0,
        )
    }
}

/// Tuned constants of the solver.
///
/// These are calibrations for typical phone-to-face distances, not derived
/// values; every one can be overridden from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseParams {
    /// Anchor drop below the chin, as a fraction of the measured face width
    pub neck_drop_ratio: f32,
    /// Anchor drop below the face box when landmarks are missing
    pub box_neck_offset_px: f32,
    /// Distance from the anchor to the secondary neck point in box mode
    pub box_neck_length_px: f32,
    /// Average face-box side that maps to a scale of `scale_multiplier`
    pub reference_face_px: f32,
    pub scale_multiplier: f32,
    /// Smallest accepted face box area in image pixels
    pub min_face_area: f32,
    /// Flat image width as a multiple of the face width
    pub image_width_ratio: f32,
    /// Fraction of the image height drawn above the anchor
    pub image_overlap_ratio: f32,
    /// Vertices of the placeholder outline
    pub outline_points: usize,
    /// Placeholder outline width as a fraction of the face box width
    pub outline_width_ratio: f32,
}

impl Default for PoseParams {
    fn default() -> Self {
        Self {
            neck_drop_ratio: 0.4,
            box_neck_offset_px: 20.0,
            box_neck_length_px: 80.0,
            reference_face_px: 400.0,
            scale_multiplier: 0.8,
            min_face_area: 100.0 * 100.0,
            image_width_ratio: 1.3,
            image_overlap_ratio: 0.3,
            outline_points: 20,
            outline_width_ratio: 0.8,
        }
    }
}

/// Which inputs produced an anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorSource {
    Landmarks,
    BoundingBox,
    /// No face has been tracked yet
    Untracked,
}

/// Where and how to draw the overlay, in view space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementTransform {
    pub anchor: Point2<f32>,
    /// Second point further down the neck
    pub neck_end: Point2<f32>,
    pub scale: f32,
    /// In-plane rotation for flat images
    pub roll_degrees: f32,
    /// Full rotation for meshes
    pub rotation: RotationState,
    pub face_width_px: f32,
    pub source: AnchorSource,
}

impl Default for PlacementTransform {
    fn default() -> Self {
        Self {
            anchor: Point2::origin(),
            neck_end: Point2::origin(),
            scale: 1.0,
            roll_degrees: 0.0,
            rotation: RotationState::zero(),
            face_width_px: 0.0,
            source: AnchorSource::Untracked,
        }
    }
}

impl PlacementTransform {
    /// Model matrix placing a mesh in view pixels.
    ///
    /// One mesh unit spans `units_px` view pixels at scale 1. Mesh Y points
    /// up while view Y points down, so Y is flipped.
    pub fn model_matrix(&self, units_px: f32) -> Matrix4<f32> {
        let s = self.scale * units_px;
        Transform::translation_matrix(self.anchor.x, self.anchor.y, 0.0)
            * Transform::scale_matrix(s, -s, s)
            * Transform::rotation_matrix(&self.rotation)
    }
}

/// Map an image-space point into view space.
///
/// Degenerate geometry returns the point unchanged.
pub fn screen_transform(point: Point2<f32>, view: &ViewGeometry) -> Point2<f32> {
    if view.is_degenerate() {
        return point;
    }

    let scale = view.fill_scale();
    let offset = view.fill_offset();
    let x = point.x * scale + offset.x;
    let y = point.y * scale + offset.y;

    if view.is_front_facing {
        Point2::new(view.view_size.width - x, y)
    } else {
        Point2::new(x, y)
    }
}

/// Scale factor from the image-space face box size
pub fn face_scale(bounding_box: &Rect, params: &PoseParams) -> f32 {
    let average = (bounding_box.width() + bounding_box.height()) / 2.0;
    if params.reference_face_px > 0.0 {
        average / params.reference_face_px * params.scale_multiplier
    } else {
        params.scale_multiplier
    }
}

/// Whether a detection is large enough to be trusted.
///
/// Inverted boxes are rejected even though their area comes out positive.
pub fn accepts(detection: &FaceDetection, params: &PoseParams) -> bool {
    let bbox = &detection.bounding_box;
    bbox.width() > 0.0 && bbox.height() > 0.0 && bbox.area() >= params.min_face_area
}

/// Turn a detection into a placement, preferring landmarks over the face box
pub fn solve(detection: &FaceDetection, view: &ViewGeometry, params: &PoseParams) -> PlacementTransform {
    let scale = face_scale(&detection.bounding_box, params);
    let rotation = detection.head_euler;

    let landmarks = (
        detection.landmark(Landmark::Chin),
        detection.landmark(Landmark::LeftCheek),
        detection.landmark(Landmark::RightCheek),
    );

    if let (Some(chin), Some(left), Some(right)) = landmarks {
        let chin = screen_transform(chin, view);
        let left = screen_transform(left, view);
        let right = screen_transform(right, view);

        let face_width = (left.x - right.x).abs();
        let drop = face_width * params.neck_drop_ratio;
        let center_x = (left.x + right.x) / 2.0;
        let anchor = Point2::new(center_x, chin.y + drop);

        return PlacementTransform {
            anchor,
            neck_end: Point2::new(center_x, anchor.y + drop),
            scale,
            roll_degrees: rotation.roll,
            rotation,
            face_width_px: face_width,
            source: AnchorSource::Landmarks,
        };
    }

    let bbox = &detection.bounding_box;
    let top_left = screen_transform(Point2::new(bbox.left, bbox.top), view);
    let bottom_right = screen_transform(Point2::new(bbox.right, bbox.bottom), view);

    // Mirroring swaps left and right, so measure without assuming order
    let center_x = (top_left.x + bottom_right.x) / 2.0;
    let bottom = top_left.y.max(bottom_right.y);
    let anchor = Point2::new(center_x, bottom + params.box_neck_offset_px);

    PlacementTransform {
        anchor,
        neck_end: Point2::new(center_x, anchor.y + params.box_neck_length_px),
        scale,
        roll_degrees: rotation.roll,
        rotation,
        face_width_px: (bottom_right.x - top_left.x).abs(),
        source: AnchorSource::BoundingBox,
    }
}

/// Outcome of feeding one frame to a [`FaceTrack`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackUpdate {
    Accepted,
    /// Too small to trust; the previous detection is still in effect
    Rejected,
    /// The detector saw no face
    Cleared,
}

/// The last detection that passed the acceptance gate
#[derive(Debug, Clone, Default)]
pub struct FaceTrack {
    retained: Option<FaceDetection>,
}

impl FaceTrack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one frame; `None` means the detector reported zero faces
    pub fn observe(&mut self, detection: Option<FaceDetection>, params: &PoseParams) -> TrackUpdate {
        match detection {
            Some(detection) if accepts(&detection, params) => {
                self.retained = Some(detection);
                TrackUpdate::Accepted
            }
            Some(_) => TrackUpdate::Rejected,
            None => {
                self.retained = None;
                TrackUpdate::Cleared
            }
        }
    }

    pub fn current(&self) -> Option<&FaceDetection> {
        self.retained.as_ref()
    }

    pub fn clear(&mut self) {
        self.retained = None;
    }
}

/// Where a flat jewelry image lands in the view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub rotation_degrees: f32,
    /// Rotation pivot, the anchor
    pub pivot: Point2<f32>,
}

impl ImagePlacement {
    /// Affine map from source image pixels to view pixels
    pub fn matrix(&self, image_size: &Size) -> Matrix3<f32> {
        let sx = if image_size.width > 0.0 { self.width / image_size.width } else { 0.0 };
        let sy = if image_size.height > 0.0 { self.height / image_size.height } else { 0.0 };
        let pivot = self.pivot.coords;

        Matrix3::new_translation(&pivot)
            * Matrix3::new_rotation(self.rotation_degrees.to_radians())
            * Matrix3::new_translation(&-pivot)
            * Matrix3::new_translation(&Vector2::new(self.left, self.top))
            * Matrix3::new_nonuniform_scaling(&Vector2::new(sx, sy))
    }
}

/// Size and place a flat image below the chin, keeping its aspect ratio
pub fn image_placement(
    image_size: &Size,
    placement: &PlacementTransform,
    user_scale: f32,
    params: &PoseParams,
) -> ImagePlacement {
    let width = placement.face_width_px * params.image_width_ratio * user_scale;
    let height = if image_size.width > 0.0 {
        width * image_size.height / image_size.width
    } else {
        0.0
    };

    ImagePlacement {
        left: placement.anchor.x - width / 2.0,
        top: placement.anchor.y - height * params.image_overlap_ratio,
        width,
        height,
        rotation_degrees: placement.roll_degrees,
        pivot: placement.anchor,
    }
}

/// Closed elliptical necklace outline around the anchor, for drawing while no asset is ready
pub fn fallback_outline(
    placement: &PlacementTransform,
    face_box_width: f32,
    params: &PoseParams,
) -> Vec<Point2<f32>> {
    let neck_width = face_box_width * params.outline_width_ratio;
    let radius_x = neck_width / 2.0;
    let radius_y = neck_width / 4.0;
    let count = params.outline_points.max(3);

    (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            Point2::new(
                placement.anchor.x + radius_x * angle.cos(),
                placement.anchor.y + radius_y * angle.sin(),
            )
        })
        .collect()
}
