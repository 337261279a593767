/// Terminal preview of the jewelry overlay
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self},
};
use nalgebra::Point2;
use neckline_core::pose::screen_transform;
use neckline_core::{
    frame_feed, AssetCatalog, AssetLoader, FrameInput, FramePublisher, FrameSubscriber, GestureDelta,
    IndexedMesh, OverlaySelection, OverlayState, Phase, PoseParams, RenderAsset, Size,
    ViewGeometry,
};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub mod face;
pub mod renderer;

pub use face::SimulatedFace;
pub use renderer::AsciiRenderer;

/// View pixels covered by one terminal cell
const CELL_WIDTH_PX: f32 = 8.0;
const CELL_HEIGHT_PX: f32 = 16.0;

/// Simulated camera resolution relative to the view
const IMAGE_TO_VIEW: f32 = 0.5;

/// Rows reserved for the status lines
const STATUS_ROWS: u16 = 2;

/// View pixels one mesh unit covers at scale 1, so that the mesh spans
/// `reference_face_px` along its widest horizontal or vertical extent
pub fn mesh_units_px(mesh: &IndexedMesh, params: &PoseParams) -> f32 {
    match mesh.bounds() {
        Some((min, max)) => {
            let extent = (max.x - min.x).max(max.y - min.y);
            if extent > 0.0 {
                params.reference_face_px / extent
            } else {
                1.0
            }
        }
        None => 1.0,
    }
}

/// Asset picker order: the requested asset, nothing, then every catalog mesh
/// and image, each selection listed once
pub fn selection_cycle(
    initial: Option<OverlaySelection>,
    catalog: &AssetCatalog,
) -> Vec<OverlaySelection> {
    let candidates = initial
        .into_iter()
        .chain(std::iter::once(OverlaySelection::None))
        .chain(catalog.mesh_ids().map(|id| OverlaySelection::Mesh(id.into())))
        .chain(catalog.image_ids().map(|id| OverlaySelection::Image(id.into())));

    let mut cycle = Vec::new();
    for selection in candidates {
        let duplicate = cycle
            .iter()
            .any(|known| same_asset(known, &selection, catalog));
        if !duplicate {
            cycle.push(selection);
        }
    }
    cycle
}

/// Two selections name the same asset once catalog ids are resolved
fn same_asset(a: &OverlaySelection, b: &OverlaySelection, catalog: &AssetCatalog) -> bool {
    match (a, b) {
        (OverlaySelection::None, OverlaySelection::None) => true,
        (OverlaySelection::Mesh(_), OverlaySelection::Mesh(_))
        | (OverlaySelection::Image(_), OverlaySelection::Image(_)) => {
            catalog.resolve(a) == catalog.resolve(b)
        }
        _ => false,
    }
}

/// Main application struct for the terminal overlay preview
pub struct TerminalApp {
    state: OverlayState,
    loader: AssetLoader,
    selections: Vec<OverlaySelection>,
    selection_index: usize,
    face: SimulatedFace,
    publisher: FramePublisher,
    frames: FrameSubscriber,
    view: ViewGeometry,
    renderer: AsciiRenderer,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    /// `selections` is the cycle order of the asset picker; the first entry is loaded at start
    pub fn new(
        state: OverlayState,
        loader: AssetLoader,
        selections: Vec<OverlaySelection>,
        front_facing: bool,
    ) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        let rows = height.saturating_sub(STATUS_ROWS).max(1);

        let view_size = Size::new(width as f32 * CELL_WIDTH_PX, rows as f32 * CELL_HEIGHT_PX);
        let image_size = Size::new(view_size.width * IMAGE_TO_VIEW, view_size.height * IMAGE_TO_VIEW);
        let (publisher, frames) = frame_feed();

        let mut selections = selections;
        if selections.is_empty() {
            selections.push(OverlaySelection::None);
        }

        let mut app = Self {
            state,
            loader,
            selections,
            selection_index: 0,
            face: SimulatedFace::centered(image_size),
            publisher,
            frames,
            view: ViewGeometry::new(view_size, image_size, front_facing),
            renderer: AsciiRenderer::new(width as usize, rows as usize, view_size),
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        };
        app.state.switch_camera(front_facing);
        app.select_current();
        Ok(app)
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_millis(1000 / 30); // 30 FPS target

        while self.running {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::from_millis(0))? {
                self.handle_input()?;
            }

            self.update();
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        if let Event::Key(KeyEvent { code, .. }) = event::read()? {
            let step = self.face.size * 0.1;
            match code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.running = false;
                }
                // Simulated face
                KeyCode::Up => self.face.translate(0.0, -step),
                KeyCode::Down => self.face.translate(0.0, step),
                KeyCode::Left => self.face.translate(-step, 0.0),
                KeyCode::Right => self.face.translate(step, 0.0),
                KeyCode::Char('+') | KeyCode::Char('=') => self.face.resize(1.1),
                KeyCode::Char('-') => self.face.resize(1.0 / 1.1),
                KeyCode::Char('e') => self.face.turn(0.0, 0.0, 5.0),
                KeyCode::Char('r') => self.face.turn(0.0, 0.0, -5.0),
                KeyCode::Char('h') => self.face.visible = !self.face.visible,
                KeyCode::Char('l') => self.face.landmarks = !self.face.landmarks,
                // Manual adjustment
                KeyCode::Char('w') => self.state.apply_gesture(&GestureDelta::rotate(-5.0, 0.0)),
                KeyCode::Char('s') => self.state.apply_gesture(&GestureDelta::rotate(5.0, 0.0)),
                KeyCode::Char('a') => self.state.apply_gesture(&GestureDelta::rotate(0.0, -5.0)),
                KeyCode::Char('d') => self.state.apply_gesture(&GestureDelta::rotate(0.0, 5.0)),
                KeyCode::Char('x') => self.state.apply_gesture(&GestureDelta::scale(1.1)),
                KeyCode::Char('z') => self.state.apply_gesture(&GestureDelta::scale(1.0 / 1.1)),
                KeyCode::Char('0') => self.state.reset_adjustment(),
                // Camera and asset
                KeyCode::Char('c') => {
                    self.view.is_front_facing = !self.view.is_front_facing;
                    self.state.switch_camera(self.view.is_front_facing);
                }
                KeyCode::Char('n') | KeyCode::Tab => self.cycle_selection(1),
                KeyCode::Char('p') | KeyCode::BackTab => {
                    self.cycle_selection(self.selections.len() - 1)
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn cycle_selection(&mut self, step: usize) {
        self.selection_index = (self.selection_index + step) % self.selections.len();
        self.select_current();
    }

    fn select_current(&mut self) {
        let selection = self.selections[self.selection_index].clone();
        info!("Switching overlay to {}", selection);
        self.loader.request(&mut self.state, selection);
    }

    fn update(&mut self) {
        // The simulated detector publishes; the overlay consumes only the newest frame
        self.publisher
            .publish(FrameInput::new(self.face.detect(), self.view));
        if let Some(frame) = self.frames.take_latest() {
            self.state.update_frame(frame);
        }

        let applied = self.loader.drain_into(&mut self.state);
        if applied > 0 {
            debug!("Applied {} finished load(s)", applied);
        }
    }

    fn render(&mut self) -> io::Result<()> {
        self.renderer.clear();

        if let Some(detection) = self.state.current_detection() {
            let bbox = &detection.bounding_box;
            let a = screen_transform(Point2::new(bbox.left, bbox.top), &self.view);
            let b = screen_transform(Point2::new(bbox.right, bbox.bottom), &self.view);
            self.renderer.render_face_box(
                Point2::new(a.x.min(b.x), a.y.min(b.y)),
                Point2::new(a.x.max(b.x), a.y.max(b.y)),
            );
        }

        let data = self.state.render_data();
        match (&data.asset, &data.transform) {
            (RenderAsset::Mesh { mesh }, Some(transform)) => {
                let units = mesh_units_px(mesh, self.state.params());
                self.renderer.render_mesh(mesh, &transform.model_matrix(units));
            }
            (RenderAsset::Image { image, placement: Some(placement) }, _) => {
                self.renderer.render_image(image, placement);
            }
            (RenderAsset::Placeholder { outline }, _) => {
                self.renderer.render_outline(outline);
            }
            _ => {}
        }
        if let Some(transform) = &data.transform {
            self.renderer.render_anchor(transform.anchor);
        }

        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;
        self.renderer.draw(&mut stdout)?;

        let phase = match self.state.phase() {
            Phase::Empty => "empty".to_string(),
            Phase::Loading(selection) => format!("loading {}", selection),
            Phase::Ready(selection) => format!("{}", selection),
        };
        let transform = self.state.current_transform();
        let status = format!(
            "Neckline | {} | {} | {} camera | scale {:.2} | FPS: {:.1}",
            phase,
            if self.state.is_tracking() { "tracking" } else { "no face" },
            if self.view.is_front_facing { "front" } else { "back" },
            transform.scale,
            self.fps
        );

        let rows = self.renderer.height() as u16;
        queue!(
            stdout,
            cursor::MoveTo(0, rows),
            terminal::Clear(terminal::ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(status),
            cursor::MoveTo(0, rows + 1),
            terminal::Clear(terminal::ClearType::CurrentLine),
            SetForegroundColor(Color::DarkGrey),
            Print("Arrows/+-/E R=Face H=Hide L=Landmarks | WASD/Z X/0=Adjust | C=Camera N/P=Asset | Q=Quit"),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neckline_core::load_mesh;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    #[test]
    fn test_mesh_units_fit_reference_width() {
        let mesh = load_mesh(b"v -2 0 0\nv 2 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(mesh_units_px(&mesh, &PoseParams::default()), 100.0);
    }

    fn catalog() -> AssetCatalog {
        let mut meshes = BTreeMap::new();
        meshes.insert("chain".to_string(), PathBuf::from("models/chain.obj"));
        meshes.insert("ring".to_string(), PathBuf::from("models/ring.obj"));
        let mut images = BTreeMap::new();
        images.insert("chain".to_string(), PathBuf::from("images/chain.png"));
        AssetCatalog::new(meshes, images)
    }

    #[test]
    fn test_cycle_lists_catalog_id_once() {
        let cycle = selection_cycle(Some(OverlaySelection::Mesh("Chain".into())), &catalog());
        assert_eq!(
            cycle,
            vec![
                OverlaySelection::Mesh("Chain".into()),
                OverlaySelection::None,
                OverlaySelection::Mesh("ring".into()),
                OverlaySelection::Image("chain".into()),
            ]
        );
    }

    #[test]
    fn test_cycle_keeps_unlisted_path() {
        let cycle = selection_cycle(Some(OverlaySelection::Mesh("custom/pendant.obj".into())), &catalog());
        assert_eq!(cycle.len(), 5);
        assert_eq!(cycle[0], OverlaySelection::Mesh("custom/pendant.obj".into()));

        assert_eq!(selection_cycle(None, &catalog()).len(), 4);
    }

    #[test]
    fn test_flat_point_mesh_units() {
        let mesh = load_mesh(b"v 1 1 0\nv 1 1 0\nv 1 1 0\nf 1 2 3\n").unwrap();
        assert_eq!(mesh_units_px(&mesh, &PoseParams::default()), 1.0);
    }
}
