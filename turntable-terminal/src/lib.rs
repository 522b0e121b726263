/// Terminal front-end: crossterm input and output around the core viewer loop
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal,
};
use std::io::{self, stdout, Write};
use std::time::{Duration, Instant};
use turntable_core::{Clock, InteractionController, LoadedAsset, ViewerConfig};

pub mod renderer;

pub use renderer::AsciiRenderer;

/// Approximate pixel size of one terminal cell; mouse cell positions are
/// scaled by these before reaching the controller.
pub const CELL_WIDTH_PX: f32 = 8.0;
pub const CELL_HEIGHT_PX: f32 = 16.0;

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    controller: InteractionController,
    renderer: AsciiRenderer,
    clock: Clock,
    running: bool,
    last_fps_sample: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(config: ViewerConfig, asset: LoadedAsset) -> io::Result<Self> {
        let (columns, rows) = terminal::size()?;
        Ok(Self::with_size(config, asset, columns, rows))
    }

    /// Build the app for a terminal of `columns` x `rows` cells. The top row
    /// is reserved for the status line.
    pub fn with_size(config: ViewerConfig, asset: LoadedAsset, columns: u16, rows: u16) -> Self {
        let (width, height) = scene_size(columns, rows);
        let (pixel_width, pixel_height) = pixel_size(width, height);

        let mut controller = InteractionController::new(config, pixel_width, pixel_height);
        if let Some(bounds) = asset.model.bounds() {
            controller.camera_mut().frame(&bounds);
        }
        controller.attach_model(asset);

        Self {
            controller,
            renderer: AsciiRenderer::new(width, height),
            clock: Clock::new(),
            running: true,
            last_fps_sample: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        }
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(
            stdout(),
            DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show
        )?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_fps = self.controller.config().render.target_fps.max(1);
        let target_frame_time = Duration::from_secs(1) / target_fps;

        while self.running {
            let frame_start = Instant::now();

            // Drain pending input without blocking the frame
            while event::poll(Duration::ZERO)? {
                self.handle_event(event::read()?);
            }

            let delta_time = self.clock.delta();
            self.render_frame(delta_time);
            self.present()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            let window = now - self.last_fps_sample;
            if window.as_secs() >= 1 {
                self.fps = self.frame_count as f32 / window.as_secs_f32();
                self.frame_count = 0;
                self.last_fps_sample = now;
            }
        }

        Ok(())
    }

    /// Route one terminal event to the viewer.
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent {
                code: KeyCode::Char('q') | KeyCode::Esc,
                kind: KeyEventKind::Press,
                ..
            }) => {
                self.running = false;
            }
            Event::Mouse(MouseEvent {
                kind, column, row, ..
            }) => {
                let (x, y) = cell_to_pixels(column, row);
                match kind {
                    MouseEventKind::Down(MouseButton::Left) => self.controller.pointer_down(x, y),
                    MouseEventKind::Drag(MouseButton::Left) => self.controller.pointer_move(x, y),
                    MouseEventKind::Up(_) => self.controller.pointer_up(),
                    _ => {}
                }
            }
            Event::Resize(columns, rows) => self.resize(columns, rows),
            _ => {}
        }
    }

    fn resize(&mut self, columns: u16, rows: u16) {
        let (width, height) = scene_size(columns, rows);
        let (pixel_width, pixel_height) = pixel_size(width, height);
        log::debug!("terminal resized to {columns}x{rows}");
        self.renderer.resize(width, height);
        self.controller.camera_mut().set_viewport(pixel_width, pixel_height);
    }

    /// Advance the viewer by `delta_time` seconds and rasterize the frame.
    pub fn render_frame(&mut self, delta_time: f32) {
        match self.controller.on_frame(delta_time, &mut self.renderer) {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    pub fn renderer(&self) -> &AsciiRenderer {
        &self.renderer
    }

    fn present(&mut self) -> io::Result<()> {
        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 1))?;
        self.renderer.draw(&mut stdout)?;

        // Status line
        let status = match self.controller.model() {
            Some(model) => format!(
                "Turntable | FPS: {:.1} | {} triangles | yaw {:+.2} pitch {:+.2} | Drag=Rotate Q=Quit",
                self.fps,
                model.triangle_count(),
                model.orientation.yaw(),
                model.orientation.pitch()
            ),
            None => format!("Turntable | FPS: {:.1} | no model | Q=Quit", self.fps),
        };
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(status),
            ResetColor
        )?;

        stdout.flush()
    }
}

fn scene_size(columns: u16, rows: u16) -> (usize, usize) {
    (columns.max(1) as usize, rows.saturating_sub(1).max(1) as usize)
}

fn pixel_size(width: usize, height: usize) -> (u32, u32) {
    (
        (width as f32 * CELL_WIDTH_PX) as u32,
        (height as f32 * CELL_HEIGHT_PX) as u32,
    )
}

fn cell_to_pixels(column: u16, row: u16) -> (f32, f32) {
    (column as f32 * CELL_WIDTH_PX, row as f32 * CELL_HEIGHT_PX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use turntable_core::{Mesh, Model, Primitive};

    fn cube_app() -> TerminalApp {
        let model = Model::from_mesh(Mesh::new("cube").with_primitive(Primitive::cube(2.0)));
        TerminalApp::with_size(ViewerConfig::default(), LoadedAsset::new(model), 80, 25)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    fn yaw_pitch(app: &TerminalApp) -> (f32, f32) {
        let orientation = app.controller().model().unwrap().orientation;
        (orientation.yaw(), orientation.pitch())
    }

    #[test]
    fn test_drag_rotates_by_pixel_delta() {
        let mut app = cube_app();
        app.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 10, 5));
        app.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), 15, 7));

        let (yaw, pitch) = yaw_pitch(&app);
        assert!((yaw - 5.0 * CELL_WIDTH_PX * 0.001).abs() < 1e-6);
        assert!((pitch - 2.0 * CELL_HEIGHT_PX * 0.001).abs() < 1e-6);

        app.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 15, 7));
        assert!(!app.controller().is_dragging());
    }

    #[test]
    fn test_right_button_does_not_drag() {
        let mut app = cube_app();
        app.handle_event(mouse(MouseEventKind::Down(MouseButton::Right), 10, 5));
        app.handle_event(mouse(MouseEventKind::Drag(MouseButton::Right), 20, 5));
        assert_eq!(yaw_pitch(&app), (0.0, 0.0));
    }

    #[test]
    fn test_frames_auto_rotate_and_draw() {
        let mut app = cube_app();
        app.render_frame(1.0 / 30.0);
        app.render_frame(1.0 / 30.0);

        let (yaw, _) = yaw_pitch(&app);
        assert!((yaw - 0.01).abs() < 1e-6);
        let renderer = app.renderer();
        let lit: usize = (0..renderer.height())
            .map(|y| renderer.row(y).trim().len())
            .sum();
        assert!(lit > 0);
    }

    #[test]
    fn test_quit_keys() {
        let mut app = cube_app();
        app.handle_event(Event::Key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE)));
        assert!(app.is_running());
        app.handle_event(Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(!app.is_running());
    }

    #[test]
    fn test_resize_reserves_status_line() {
        let mut app = cube_app();
        app.handle_event(Event::Resize(100, 40));
        assert_eq!(app.renderer().width(), 100);
        assert_eq!(app.renderer().height(), 39);
        let camera = app.controller().camera();
        let expected = (100.0 * CELL_WIDTH_PX) / (39.0 * CELL_HEIGHT_PX);
        assert!((camera.aspect - expected).abs() < 1e-4);
    }
}
