/// Keyboard-driven stand-in for a face detector
use neckline_core::pose::{FaceDetection, Landmark, Rect, Size};

/// Smallest face side the simulator will produce
const MIN_FACE_PX: f32 = 20.0;

/// A synthetic face in camera-image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedFace {
    pub center_x: f32,
    pub center_y: f32,
    /// Side length of the square face box
    pub size: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    /// Report chin and cheek landmarks, not only the box
    pub landmarks: bool,
    /// Whether the detector currently sees the face
    pub visible: bool,
}

impl SimulatedFace {
    /// Face centered in the upper half of the image, a third of its width
    pub fn centered(image: Size) -> Self {
        Self {
            center_x: image.width / 2.0,
            center_y: image.height * 0.35,
            size: image.width / 3.0,
            pitch: 0.0,
            yaw: 0.0,
            roll: 0.0,
            landmarks: true,
            visible: true,
        }
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.center_x += dx;
        self.center_y += dy;
    }

    pub fn resize(&mut self, factor: f32) {
        self.size = (self.size * factor).max(MIN_FACE_PX);
    }

    pub fn turn(&mut self, dpitch: f32, dyaw: f32, droll: f32) {
        self.pitch += dpitch;
        self.yaw += dyaw;
        self.roll += droll;
    }

    /// What a detector would report for this frame
    pub fn detect(&self) -> Option<FaceDetection> {
        if !self.visible {
            return None;
        }

        let half = self.size / 2.0;
        let bounding_box = Rect::new(
            self.center_x - half,
            self.center_y - half,
            self.center_x + half,
            self.center_y + half,
        );
        let detection =
            FaceDetection::new(bounding_box).with_head_euler(self.pitch, self.yaw, self.roll);

        if !self.landmarks {
            return Some(detection);
        }

        Some(
            detection
                .with_landmark(Landmark::Chin, self.center_x, self.center_y + self.size * 0.4)
                .with_landmark(
                    Landmark::LeftCheek,
                    self.center_x - self.size * 0.35,
                    self.center_y + self.size * 0.1,
                )
                .with_landmark(
                    Landmark::RightCheek,
                    self.center_x + self.size * 0.35,
                    self.center_y + self.size * 0.1,
                ),
        )
    }
}
