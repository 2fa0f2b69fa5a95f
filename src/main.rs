use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use lumen_viewer::app::{format_summary, prepare_frame, ViewerState};
use lumen_viewer::render::{FrameBuilder, Renderer};
use lumen_viewer::{
    DecodeOnlyUploader, KeyCode, Model, NamedKey, ObjImporter, SceneDescription, UniformRecorder,
};

const PIXELS_PER_SCROLL_LINE: f64 = 40.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let mut scene = match &options.scene {
        Some(path) => SceneDescription::from_file(path)
            .with_context(|| format!("failed to load scene {}", path.display()))?,
        None => SceneDescription::default(),
    };
    if let Some(model) = &options.model {
        scene.model = model.clone();
    }

    if options.summary_only {
        run_headless(scene, &options)
    } else {
        run_interactive(scene, &options)
    }
}

/// Loads everything, prepares one frame against a recording shader and
/// prints what happened.
fn run_headless(scene: SceneDescription, options: &CliOptions) -> Result<()> {
    let mut uploader = DecodeOnlyUploader::new();
    let model = Model::load(&scene.model, &ObjImporter::new(), &mut uploader);
    let camera = scene.camera.build();
    let mut recorder = UniformRecorder::new();
    prepare_frame(&mut recorder, &camera, &scene, &model, options.aspect());
    print!("{}", format_summary(&scene, &model, &recorder));
    Ok(())
}

fn run_interactive(scene: SceneDescription, options: &CliOptions) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = ViewerApp {
        size: LogicalSize::new(options.width, options.height),
        viewer: ViewerState::new(scene),
        gpu: None,
        last_error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated abnormally")?;

    if let Some(err) = app.last_error {
        return Err(err);
    }
    Ok(())
}

struct Gpu {
    window: Arc<Window>,
    renderer: Renderer,
    model: Model,
}

struct ViewerApp {
    size: LogicalSize<u32>,
    viewer: ViewerState,
    gpu: Option<Gpu>,
    last_error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn init_gpu(&mut self, event_loop: &ActiveEventLoop) -> Result<Gpu> {
        let attributes = Window::default_attributes()
            .with_title("lumen-viewer")
            .with_inner_size(self.size);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );

        let mut renderer = block_on(Renderer::new(Arc::clone(&window)))?;
        let model = Model::load(&self.viewer.scene.model, &ObjImporter::new(), renderer.textures());
        renderer.upload_model(&model);

        let grabbed = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
        if let Err(err) = grabbed {
            warn!("unable to grab the cursor: {err}");
        }
        window.set_cursor_visible(false);

        Ok(Gpu {
            window,
            renderer,
            model,
        })
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.viewer.update() {
            event_loop.exit();
            return Ok(());
        }
        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };

        let mut frame = FrameBuilder::new();
        prepare_frame(
            &mut frame,
            &self.viewer.camera,
            &self.viewer.scene,
            &gpu.model,
            gpu.renderer.aspect(),
        );
        match gpu.renderer.render(&frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = gpu.window.inner_size();
                gpu.renderer.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => return Err(anyhow!("GPU is out of memory")),
            Err(err) => info!("skipping frame: {err}"),
        }
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.viewer.key_down(key),
            ElementState::Released => self.viewer.key_up(key),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match self.init_gpu(event_loop) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(err) => {
                self.last_error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        if window_id != gpu.renderer.window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => gpu.renderer.resize(size),
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => {
                        (position.y / PIXELS_PER_SCROLL_LINE) as f32
                    }
                };
                self.viewer.scroll(lines);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw(event_loop) {
                    self.last_error = Some(err);
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.viewer.mouse_motion(dx as f32, dy as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn map_keycode(code: WinitKey) -> Option<KeyCode> {
    const LETTERS: [(WinitKey, char); 26] = [
        (WinitKey::KeyA, 'A'),
        (WinitKey::KeyB, 'B'),
        (WinitKey::KeyC, 'C'),
        (WinitKey::KeyD, 'D'),
        (WinitKey::KeyE, 'E'),
        (WinitKey::KeyF, 'F'),
        (WinitKey::KeyG, 'G'),
        (WinitKey::KeyH, 'H'),
        (WinitKey::KeyI, 'I'),
        (WinitKey::KeyJ, 'J'),
        (WinitKey::KeyK, 'K'),
        (WinitKey::KeyL, 'L'),
        (WinitKey::KeyM, 'M'),
        (WinitKey::KeyN, 'N'),
        (WinitKey::KeyO, 'O'),
        (WinitKey::KeyP, 'P'),
        (WinitKey::KeyQ, 'Q'),
        (WinitKey::KeyR, 'R'),
        (WinitKey::KeyS, 'S'),
        (WinitKey::KeyT, 'T'),
        (WinitKey::KeyU, 'U'),
        (WinitKey::KeyV, 'V'),
        (WinitKey::KeyW, 'W'),
        (WinitKey::KeyX, 'X'),
        (WinitKey::KeyY, 'Y'),
        (WinitKey::KeyZ, 'Z'),
    ];
    const DIGITS: [WinitKey; 10] = [
        WinitKey::Digit0,
        WinitKey::Digit1,
        WinitKey::Digit2,
        WinitKey::Digit3,
        WinitKey::Digit4,
        WinitKey::Digit5,
        WinitKey::Digit6,
        WinitKey::Digit7,
        WinitKey::Digit8,
        WinitKey::Digit9,
    ];
    const FUNCTIONS: [WinitKey; 12] = [
        WinitKey::F1,
        WinitKey::F2,
        WinitKey::F3,
        WinitKey::F4,
        WinitKey::F5,
        WinitKey::F6,
        WinitKey::F7,
        WinitKey::F8,
        WinitKey::F9,
        WinitKey::F10,
        WinitKey::F11,
        WinitKey::F12,
    ];

    let named = match code {
        WinitKey::Space => Some(NamedKey::Space),
        WinitKey::Enter => Some(NamedKey::Enter),
        WinitKey::Tab => Some(NamedKey::Tab),
        WinitKey::ArrowLeft => Some(NamedKey::Left),
        WinitKey::ArrowRight => Some(NamedKey::Right),
        WinitKey::ArrowUp => Some(NamedKey::Up),
        WinitKey::ArrowDown => Some(NamedKey::Down),
        WinitKey::Escape => Some(NamedKey::Escape),
        WinitKey::ShiftLeft => Some(NamedKey::LeftShift),
        WinitKey::ShiftRight => Some(NamedKey::RightShift),
        WinitKey::ControlLeft => Some(NamedKey::LeftCtrl),
        WinitKey::ControlRight => Some(NamedKey::RightCtrl),
        _ => None,
    };
    if let Some(named) = named {
        return Some(KeyCode::Named(named));
    }
    if let Some((_, letter)) = LETTERS.iter().find(|(key, _)| *key == code) {
        return Some(KeyCode::Character(*letter));
    }
    if let Some(digit) = DIGITS.iter().position(|key| *key == code) {
        return Some(KeyCode::Digit(digit as u8));
    }
    FUNCTIONS
        .iter()
        .position(|key| *key == code)
        .map(|index| KeyCode::Function(index as u8 + 1))
}

struct CliOptions {
    scene: Option<PathBuf>,
    model: Option<PathBuf>,
    summary_only: bool,
    width: u32,
    height: u32,
}

impl CliOptions {
    const USAGE: &'static str =
        "Usage: lumen-viewer [SCENE.xml] [--model PATH] [--summary-only] [--width N] [--height N]";

    fn parse() -> Result<Self> {
        let mut options = Self {
            scene: None,
            model: None,
            summary_only: false,
            width: 800,
            height: 600,
        };
        let mut args = env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => options.summary_only = true,
                "--model" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--model needs a path. {}", Self::USAGE))?;
                    options.model = Some(PathBuf::from(value));
                }
                "--width" => options.width = parse_dimension("--width", args.next())?,
                "--height" => options.height = parse_dimension("--height", args.next())?,
                "-h" | "--help" => return Err(anyhow!(Self::USAGE)),
                other if other.starts_with("--") => {
                    return Err(anyhow!("Unknown argument: {other}. {}", Self::USAGE));
                }
                other => {
                    if options.scene.is_some() {
                        return Err(anyhow!("Only one scene file may be given. {}", Self::USAGE));
                    }
                    options.scene = Some(PathBuf::from(other));
                }
            }
        }
        Ok(options)
    }

    fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

fn parse_dimension(flag: &str, value: Option<String>) -> Result<u32> {
    let value = value.ok_or_else(|| anyhow!("{flag} needs a value"))?;
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("{flag} expects a positive integer, got {value}")),
    }
}
