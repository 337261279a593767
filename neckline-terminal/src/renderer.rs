/// ASCII rasterizer for the terminal preview
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix4, Point2, Point3};
use neckline_core::geometry::face_normal;
use neckline_core::pose::{ImagePlacement, Size};
use neckline_core::{ImageAsset, IndexedMesh};
use std::io::Write;

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Glyph for the placeholder outline
const OUTLINE_CHAR: char = 'o';

/// Glyph for the neck anchor
const ANCHOR_CHAR: char = 'X';

/// Glyph for the simulated face box
const FACE_CHAR: char = '~';

/// Renders view-space overlays into a grid of terminal cells.
///
/// The view is a virtual pixel canvas; each cell covers `cell_width` by
/// `cell_height` view pixels.
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    cell_width: f32,
    cell_height: f32,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize, view: Size) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            cell_width: view.width / width.max(1) as f32,
            cell_height: view.height / height.max(1) as f32,
            depth_buffer: vec![f32::NEG_INFINITY; size],
            char_buffer: vec![' '; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Character at a cell, for inspection
    pub fn cell(&self, x: usize, y: usize) -> Option<char> {
        if x < self.width && y < self.height {
            Some(self.char_buffer[y * self.width + x])
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::NEG_INFINITY);
        self.char_buffer.fill(' ');
    }

    /// Rasterize a mesh whose model matrix maps it into view pixels
    pub fn render_mesh(&mut self, mesh: &IndexedMesh, model_matrix: &Matrix4<f32>) {
        for triangle in mesh.triangles() {
            let placed = triangle.map(|p| model_matrix.transform_point(&p));
            self.render_triangle(&placed);
        }
    }

    fn render_triangle(&mut self, triangle: &[Point3<f32>; 3]) {
        // The model matrix flips Y, so winding is not reliable; shade both sides
        let normal = face_normal(triangle);
        let brightness = normal.z.abs().clamp(0.0, 1.0);

        // Keep visible triangles off the blank end of the ramp
        let steps = (LUMINOSITY_RAMP.len() - 2) as f32;
        let char_index = 1 + (brightness * steps) as usize;
        let character = LUMINOSITY_RAMP[char_index.min(LUMINOSITY_RAMP.len() - 1)];

        let coords: Vec<(f32, f32, f32)> = triangle
            .iter()
            .map(|p| (p.x / self.cell_width, p.y / self.cell_height, p.z))
            .collect();
        self.rasterize_triangle(&coords, character);
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32)], character: char) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                if let Some((w0, w1, w2)) =
                    barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), (px, py))
                {
                    let inside = (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0)
                        || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0);
                    if inside {
                        // Mesh +Z faces the viewer
                        let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;

                        let idx = y as usize * self.width + x as usize;
                        if depth > self.depth_buffer[idx] {
                            self.depth_buffer[idx] = depth;
                            self.char_buffer[idx] = character;
                        }
                    }
                }
            }
        }
    }

    /// Sample a flat image through its placement, one pixel per cell center
    pub fn render_image(&mut self, image: &ImageAsset, placement: &ImagePlacement) {
        let Some(inverse) = placement.matrix(&image.size()).try_inverse() else {
            return;
        };

        for y in 0..self.height {
            for x in 0..self.width {
                let view_point = Point2::new(
                    (x as f32 + 0.5) * self.cell_width,
                    (y as f32 + 0.5) * self.cell_height,
                );
                let source = inverse.transform_point(&view_point);
                if source.x < 0.0 || source.y < 0.0 {
                    continue;
                }
                let (sx, sy) = (source.x as u32, source.y as u32);
                if sx >= image.width || sy >= image.height {
                    continue;
                }

                let offset = ((sy * image.width + sx) * 4) as usize;
                let Some(rgba) = image.pixels.get(offset..offset + 4) else {
                    continue;
                };
                if rgba[3] < 128 {
                    continue;
                }

                let luma = (0.299 * rgba[0] as f32 + 0.587 * rgba[1] as f32 + 0.114 * rgba[2] as f32) / 255.0;
                let steps = (LUMINOSITY_RAMP.len() - 2) as f32;
                let char_index = 1 + (luma * steps).round() as usize;
                let character = LUMINOSITY_RAMP[char_index.min(LUMINOSITY_RAMP.len() - 1)];
                self.plot_cell(x, y, character);
            }
        }
    }

    /// Closed polyline through view-space points
    pub fn render_outline(&mut self, points: &[Point2<f32>]) {
        for (i, start) in points.iter().enumerate() {
            let end = points[(i + 1) % points.len()];
            self.render_line(*start, end, OUTLINE_CHAR);
        }
    }

    /// Axis-aligned rectangle outline in view pixels
    pub fn render_face_box(&mut self, top_left: Point2<f32>, bottom_right: Point2<f32>) {
        let top_right = Point2::new(bottom_right.x, top_left.y);
        let bottom_left = Point2::new(top_left.x, bottom_right.y);
        self.render_line(top_left, top_right, FACE_CHAR);
        self.render_line(top_right, bottom_right, FACE_CHAR);
        self.render_line(bottom_right, bottom_left, FACE_CHAR);
        self.render_line(bottom_left, top_left, FACE_CHAR);
    }

    pub fn render_anchor(&mut self, anchor: Point2<f32>) {
        self.plot(anchor, ANCHOR_CHAR);
    }

    fn render_line(&mut self, start: Point2<f32>, end: Point2<f32>, character: char) {
        let dx = (end.x - start.x) / self.cell_width;
        let dy = (end.y - start.y) / self.cell_height;
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;

        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            self.plot(start + (end - start) * t, character);
        }
    }

    fn plot(&mut self, point: Point2<f32>, character: char) {
        let x = (point.x / self.cell_width).floor();
        let y = (point.y / self.cell_height).floor();
        if x >= 0.0 && y >= 0.0 {
            self.plot_cell(x as usize, y as usize, character);
        }
    }

    fn plot_cell(&mut self, x: usize, y: usize, character: char) {
        if x < self.width && y < self.height {
            let idx = y * self.width + x;
            self.char_buffer[idx] = character;
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for y in 0..self.height {
            for x in 0..self.width {
                let idx = y * self.width + x;
                let c = self.char_buffer[idx];

                // Color based on character intensity
                let color = match c {
                    ' ' | '.' | ':' => Color::DarkGrey,
                    '-' | '=' => Color::Grey,
                    '+' | '*' => Color::White,
                    '#' | '%' | '@' => Color::Yellow,
                    OUTLINE_CHAR => Color::DarkYellow,
                    ANCHOR_CHAR => Color::Red,
                    FACE_CHAR => Color::Cyan,
                    _ => Color::White,
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use neckline_core::load_mesh;
    use neckline_core::PlacementTransform;

    fn renderer() -> AsciiRenderer {
        // 10x10 cells over a 100x200 view: 10 px wide, 20 px tall cells
        AsciiRenderer::new(10, 10, Size::new(100.0, 200.0))
    }

    fn filled(renderer: &AsciiRenderer) -> usize {
        (0..renderer.height())
            .flat_map(|y| (0..renderer.width()).map(move |x| (x, y)))
            .filter(|&(x, y)| renderer.cell(x, y) != Some(' '))
            .count()
    }

    #[test]
    fn test_mesh_lands_at_anchor() {
        let quad = load_mesh(b"v -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nf 1 2 3 4\n").unwrap();
        let placement = PlacementTransform {
            anchor: Point2::new(50.0, 100.0),
            ..PlacementTransform::default()
        };

        let mut renderer = renderer();
        renderer.render_mesh(&quad, &placement.model_matrix(20.0));

        // 40x40 px square centered on (50, 100): columns 3..=6, rows 4..=5
        assert_eq!(renderer.cell(5, 5), Some('@'));
        assert_eq!(renderer.cell(0, 0), Some(' '));
        assert_eq!(filled(&renderer), 8);
    }

    #[test]
    fn test_outline_and_anchor() {
        let mut renderer = renderer();
        renderer.render_outline(&[
            Point2::new(5.0, 10.0),
            Point2::new(95.0, 10.0),
            Point2::new(95.0, 190.0),
        ]);
        renderer.render_anchor(Point2::new(55.0, 110.0));

        assert_eq!(renderer.cell(0, 0), Some(OUTLINE_CHAR));
        assert_eq!(renderer.cell(9, 0), Some(OUTLINE_CHAR));
        assert_eq!(renderer.cell(9, 9), Some(OUTLINE_CHAR));
        assert_eq!(renderer.cell(5, 5), Some(ANCHOR_CHAR));
    }

    #[test]
    fn test_image_respects_alpha() {
        // Left half opaque white, right half transparent
        let mut pixels = Vec::new();
        for x in 0..2 {
            let alpha = if x == 0 { 255 } else { 0 };
            pixels.extend_from_slice(&[255, 255, 255, alpha]);
        }
        let image = ImageAsset { width: 2, height: 1, pixels };
        let placement = ImagePlacement {
            left: 0.0,
            top: 0.0,
            width: 100.0,
            height: 200.0,
            rotation_degrees: 0.0,
            pivot: Point2::origin(),
        };

        let mut renderer = renderer();
        renderer.render_image(&image, &placement);
        assert_eq!(renderer.cell(2, 3), Some('@'));
        assert_eq!(renderer.cell(7, 3), Some(' '));
        assert_eq!(filled(&renderer), 50);
    }

    #[test]
    fn test_clear() {
        let mut renderer = renderer();
        renderer.render_anchor(Point2::new(1.0, 1.0));
        renderer.clear();
        assert_eq!(filled(&renderer), 0);
    }
}
