use anyhow::{anyhow, bail, Result};
use arit_experiment::{ExperimentStateMachine, InputEvent, OutputWriter};
use arit_render::{load_font, FrameStats, SkiaRenderer};
use arit_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

use crate::{finish_session, Session};

type Experiment = ExperimentStateMachine<HighPrecisionTimer, StdRng, OutputWriter>;

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    experiment: Experiment,
    renderer: Option<SkiaRenderer>,
    response_key: KeyCode,
    summary_path: PathBuf,
    last_frame: Option<u64>,
    refresh_rate: Option<f64>,

    summary_written: bool,
    should_exit: bool,
}

impl App {
    pub fn new(session: Session) -> Result<Self> {
        let key_name = &session.config.presentation.response_key;
        let response_key = response_key_code(key_name)
            .ok_or_else(|| anyhow!("unsupported response key {key_name:?}"))?;
        let Session {
            config,
            schedule,
            rng,
            writer,
            summary_path,
        } = session;
        let experiment =
            ExperimentStateMachine::new(config, schedule, HighPrecisionTimer::new(), rng, writer);

        Ok(Self {
            window: None,
            pixels: None,
            experiment,
            renderer: None,
            response_key,
            summary_path,
            last_frame: None,
            refresh_rate: None,
            summary_written: false,
            should_exit: false,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "starting task window"
        );

        let result = event_loop.run_app(&mut self);
        self.write_summary();
        result.map_err(Into::into)
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("No monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let presentation = &self.experiment.config.presentation;
        let mut window_attributes = Window::default_attributes()
            .with_title("ARIT")
            .with_resizable(false);
        window_attributes = if presentation.full_screen {
            window_attributes.with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
        } else {
            window_attributes.with_inner_size(LogicalSize::new(1280.0, 800.0))
        };

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale_factor = window.scale_factor(),
            refresh_hz = ?self.refresh_rate,
            "display configured"
        );

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let font = load_font(presentation.font_path.as_deref());
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            presentation.pixels_per_cm,
            font,
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);

        Ok(())
    }

    /// One display frame: record the interval, step the task, draw.
    fn frame(&mut self) -> Result<()> {
        let timer = &mut self.experiment.timer;
        let now = timer.now();
        if let Some(last) = self.last_frame {
            let interval = timer.elapsed(last);
            timer.record_frame(interval);
        }
        self.last_frame = Some(now);

        self.experiment.update()?;
        if self.experiment.is_finished() {
            self.should_exit = true;
            return Ok(());
        }

        let (Some(pix), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            bail!("frame requested before the window surface exists");
        };
        let scene = self.experiment.scene();
        let stats: FrameStats =
            renderer.render_frame(&scene, pix.frame_mut(), &self.experiment.timer)?;
        let t = self.experiment.timer.now();
        pix.render()?;
        let present = self.experiment.timer.elapsed(t);

        trace!(
            present_ms = present.as_secs_f64() * 1e3,
            clear_ms = stats.clear.as_secs_f64() * 1e3,
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            total_ms = stats.total.as_secs_f64() * 1e3,
            "frame"
        );
        Ok(())
    }

    fn handle_key(&mut self, event: &KeyEvent) -> Result<()> {
        if event.repeat {
            return Ok(());
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return Ok(());
        };
        let pressed = event.state == ElementState::Pressed;
        let input = match (code, pressed) {
            (KeyCode::Escape, true) => InputEvent::Abort,
            (k, true) if k == self.response_key => InputEvent::ResponseDown,
            (k, false) if k == self.response_key => InputEvent::ResponseUp,
            (KeyCode::KeyY, true) => InputEvent::Yes,
            (KeyCode::KeyN, true) => InputEvent::No,
            (_, true) => InputEvent::Continue,
            (_, false) => return Ok(()),
        };
        debug!(?input, "key");
        self.experiment.handle_event(input)?;
        if self.experiment.is_finished() {
            self.should_exit = true;
        }
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                warn!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                warn!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = self.renderer.as_mut() {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                warn!(error = %e, "failed to resize canvas");
            }
        }
        info!(width = new_size.width, height = new_size.height, "display resized");
    }

    fn write_summary(&mut self) {
        if self.summary_written {
            return;
        }
        self.summary_written = true;
        if let Err(e) = finish_session(&self.experiment.summary(), &self.summary_path) {
            error!(error = %e, "failed to write session summary");
        }
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.write_summary();
        self.should_exit = true;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!(error = %e, "failed to create window and surface");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let result: Result<()> = match event {
            WindowEvent::CloseRequested => {
                self.experiment.handle_event(InputEvent::Abort).map_err(Into::into)
            }
            WindowEvent::RedrawRequested => {
                let result = self.frame();
                if let Some(win) = &self.window {
                    win.request_redraw();
                }
                result
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(&event),
            WindowEvent::Resized(sz) => {
                self.handle_resize(sz);
                Ok(())
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.handle_resize(size);
                }
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            error!(error = %e, "session stopped");
            self.should_exit = true;
        }
        if self.should_exit || self.experiment.is_finished() {
            self.cleanup_and_exit(event_loop);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

/// Maps a configured key name to its physical key.
pub fn response_key_code(name: &str) -> Option<KeyCode> {
    let name = name.trim().to_ascii_lowercase();
    Some(match name.as_str() {
        "space" => KeyCode::Space,
        "return" | "enter" => KeyCode::Enter,
        "left" => KeyCode::ArrowLeft,
        "right" => KeyCode::ArrowRight,
        "up" => KeyCode::ArrowUp,
        "down" => KeyCode::ArrowDown,
        "lshift" => KeyCode::ShiftLeft,
        "rshift" => KeyCode::ShiftRight,
        "lctrl" => KeyCode::ControlLeft,
        "rctrl" => KeyCode::ControlRight,
        "a" => KeyCode::KeyA,
        "b" => KeyCode::KeyB,
        "c" => KeyCode::KeyC,
        "d" => KeyCode::KeyD,
        "f" => KeyCode::KeyF,
        "j" => KeyCode::KeyJ,
        "k" => KeyCode::KeyK,
        "l" => KeyCode::KeyL,
        "m" => KeyCode::KeyM,
        "s" => KeyCode::KeyS,
        "z" => KeyCode::KeyZ,
        "slash" => KeyCode::Slash,
        _ => return None,
    })
}
