/// Neckline Web - WASM bindings for the jewelry overlay
///
/// The page fetches assets and runs the face detector itself; this module
/// owns the overlay state and hands back buffers and matrices for WebGL.
/// Fetches are asynchronous on the JS side, so every request returns a
/// generation number that must come back with the bytes.
use nalgebra::Point2;
use neckline_core::asset::load_image;
use neckline_core::pose::{FaceDetection, Landmark, Rect, Size, ViewGeometry};
use neckline_core::{
    load_mesh, ApplyOutcome, FrameInput, GestureDelta, LoadError, LoadTicket, LoadedAsset,
    OverlaySelection, OverlayState, RenderAsset, Transform,
};
use std::sync::Arc;
use wasm_bindgen::prelude::*;

/// Depth range of the screen projection, in view pixels
const PROJECTION_DEPTH: f32 = 10_000.0;

#[wasm_bindgen]
pub struct WebOverlay {
    state: OverlayState,
    pending: Vec<LoadTicket>,
    view: ViewGeometry,
}

impl Default for WebOverlay {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl WebOverlay {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebOverlay {
        WebOverlay {
            state: OverlayState::default(),
            pending: Vec::new(),
            view: ViewGeometry::new(Size::default(), Size::default(), true),
        }
    }

    /// Describe the preview; `rotation_degrees` is the sensor rotation of the camera image
    pub fn set_view(
        &mut self,
        view_width: f32,
        view_height: f32,
        image_width: f32,
        image_height: f32,
        rotation_degrees: i32,
        front_facing: bool,
    ) {
        if front_facing != self.view.is_front_facing {
            self.state.switch_camera(front_facing);
        }
        self.view = ViewGeometry::new(
            Size::new(view_width, view_height),
            FrameInput::oriented_image_size(Size::new(image_width, image_height), rotation_degrees),
            front_facing,
        );
    }

    /// Start a mesh request; returns the generation to pass to `deliver`
    pub fn request_mesh(&mut self, id: &str) -> f64 {
        self.request(OverlaySelection::Mesh(id.into()))
    }

    /// Start an image request; returns the generation to pass to `deliver`
    pub fn request_image(&mut self, id: &str) -> f64 {
        self.request(OverlaySelection::Image(id.into()))
    }

    pub fn clear_selection(&mut self) {
        self.request(OverlaySelection::None);
    }

    /// Hand over fetched bytes; true when they became the current asset
    pub fn deliver(&mut self, generation: f64, bytes: &[u8]) -> bool {
        let Some(ticket) = self.take_ticket(generation) else {
            return false;
        };
        let result = match ticket.selection() {
            OverlaySelection::Mesh(_) => load_mesh(bytes).map(|m| LoadedAsset::Mesh(Arc::new(m))),
            OverlaySelection::Image(_) => load_image(bytes).map(|i| LoadedAsset::Image(Arc::new(i))),
            OverlaySelection::None => Err(LoadError::Empty),
        };
        self.state.apply_load(ticket, result) == ApplyOutcome::Applied
    }

    /// Report a failed fetch
    pub fn fail(&mut self, generation: f64, message: &str) {
        if let Some(ticket) = self.take_ticket(generation) {
            self.state
                .apply_load(ticket, Err(LoadError::NotFound(message.to_string())));
        }
    }

    /// Feed one detection in image pixels.
    ///
    /// `landmarks` is either empty or `[chin_x, chin_y, left_cheek_x,
    /// left_cheek_y, right_cheek_x, right_cheek_y]`.
    #[allow(clippy::too_many_arguments)]
    pub fn update_face(
        &mut self,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        pitch: f32,
        yaw: f32,
        roll: f32,
        landmarks: &[f32],
    ) {
        let mut detection = FaceDetection::new(Rect::new(left, top, right, bottom))
            .with_head_euler(pitch, yaw, roll);
        if let [cx, cy, lx, ly, rx, ry] = *landmarks {
            detection = detection
                .with_landmark(Landmark::Chin, cx, cy)
                .with_landmark(Landmark::LeftCheek, lx, ly)
                .with_landmark(Landmark::RightCheek, rx, ry);
        }
        self.state
            .update_frame(FrameInput::new(Some(detection), self.view));
    }

    /// The detector found no face this frame
    pub fn no_face(&mut self) {
        self.state.update_frame(FrameInput::new(None, self.view));
    }

    pub fn pinch(&mut self, factor: f32) {
        self.state.apply_gesture(&GestureDelta::scale(factor));
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.state.apply_gesture(&GestureDelta::rotate(dx, dy));
    }

    pub fn reset_adjustment(&mut self) {
        self.state.reset_adjustment();
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    pub fn is_tracking(&self) -> bool {
        self.state.is_tracking()
    }

    pub fn mesh_positions(&self) -> Vec<f32> {
        self.state
            .current_mesh()
            .map(|m| m.position_buffer())
            .unwrap_or_default()
    }

    pub fn mesh_normals(&self) -> Vec<f32> {
        self.state
            .current_mesh()
            .map(|m| m.normal_buffer())
            .unwrap_or_default()
    }

    pub fn mesh_tex_coords(&self) -> Vec<f32> {
        self.state
            .current_mesh()
            .map(|m| m.tex_coord_buffer())
            .unwrap_or_default()
    }

    pub fn mesh_indices(&self) -> Vec<u16> {
        self.state
            .current_mesh()
            .map(|m| m.indices().to_vec())
            .unwrap_or_default()
    }

    /// Column-major model matrix into view pixels, empty while untracked
    pub fn model_matrix(&self, units_px: f32) -> Vec<f32> {
        self.state
            .tracked_transform()
            .map(|t| t.model_matrix(units_px).as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Column-major projection from view pixels to clip space
    pub fn projection_matrix(&self) -> Vec<f32> {
        Transform::screen_projection(&self.view.view_size, PROJECTION_DEPTH)
            .as_slice()
            .to_vec()
    }

    /// `[left, top, width, height, rotation_degrees, pivot_x, pivot_y]`, empty when nothing to draw
    pub fn image_placement(&self) -> Vec<f32> {
        match self.state.render_data().asset {
            RenderAsset::Image {
                placement: Some(p),
                ..
            } => vec![
                p.left,
                p.top,
                p.width,
                p.height,
                p.rotation_degrees,
                p.pivot.x,
                p.pivot.y,
            ],
            _ => Vec::new(),
        }
    }

    /// Interleaved x, y of the placeholder outline, empty unless it should be drawn
    pub fn outline(&self) -> Vec<f32> {
        match self.state.render_data().asset {
            RenderAsset::Placeholder { outline } => flatten(&outline),
            _ => Vec::new(),
        }
    }

    /// Anchor in view pixels, empty while untracked
    pub fn anchor(&self) -> Vec<f32> {
        self.state
            .tracked_transform()
            .map(|t| vec![t.anchor.x, t.anchor.y])
            .unwrap_or_default()
    }
}

impl WebOverlay {
    fn request(&mut self, selection: OverlaySelection) -> f64 {
        // Anything older can only come back stale
        self.pending.clear();
        match self.state.select(selection) {
            Some(ticket) => {
                let generation = ticket.generation() as f64;
                self.pending.push(ticket);
                generation
            }
            None => self.state.generation() as f64,
        }
    }

    fn take_ticket(&mut self, generation: f64) -> Option<LoadTicket> {
        let index = self
            .pending
            .iter()
            .position(|t| t.generation() as f64 == generation)?;
        Some(self.pending.swap_remove(index))
    }
}

fn flatten(points: &[Point2<f32>]) -> Vec<f32> {
    points.iter().flat_map(|p| [p.x, p.y]).collect()
}
