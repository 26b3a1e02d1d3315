use std::{
    collections::VecDeque,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use cgmath::Deg;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalSize},
    error::EventLoopError,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::{
    config::RendererConfig,
    error::{fatal, or_fatal},
    gfx::{
        camera::{Camera, CameraController, Projection},
        rendering::RenderEngine,
        scene::Scene,
    },
};

const TITLE: &str = "SSAO Viewer";

/// Frame rate over a sliding one-second window
#[derive(Debug, Default)]
pub struct FpsCounter {
    frames: VecDeque<Instant>,
    last_report: Option<Instant>,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    /// Records a frame at `now`; returns the rate at most once per second.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        self.frames.push_back(now);
        while let Some(&oldest) = self.frames.front() {
            if now.saturating_duration_since(oldest) <= Self::WINDOW {
                break;
            }
            self.frames.pop_front();
        }

        let last = *self.last_report.get_or_insert(now);
        if now.saturating_duration_since(last) < Self::WINDOW {
            return None;
        }
        self.last_report = Some(now);
        Some(self.frames.len())
    }
}

/// Interactive viewer: one window, one scene, a fly camera
pub struct ViewerApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    model_path: PathBuf,
    config: RendererConfig,
    window: Option<Arc<Window>>,
    render_engine: Option<RenderEngine>,
    scene: Option<Scene>,
    camera: Camera,
    controller: CameraController,
    projection: Projection,
    fps: FpsCounter,
    vsync: bool,
}

impl ViewerApp {
    /// Creates the viewer; the window, device and scene are created once the
    /// event loop resumes.
    pub fn new(model_path: impl Into<PathBuf>, config: RendererConfig) -> Result<Self, EventLoopError> {
        let event_loop = EventLoop::new()?;
        let projection = Projection::new(config.width, config.height, Deg(45.0), 0.1, 1000.0);

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                model_path: model_path.into(),
                config,
                window: None,
                render_engine: None,
                scene: None,
                camera: Camera::default(),
                controller: CameraController::default(),
                projection,
                fps: FpsCounter::default(),
                vsync: false,
            },
        })
    }

    /// Run the application (consumes self and starts the event loop)
    pub fn run(mut self) -> Result<(), EventLoopError> {
        let Some(event_loop) = self.event_loop.take() else {
            return Ok(());
        };
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self.app_state)
    }
}

impl AppState {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.projection.resize(width, height);
        let (Some(render_engine), Some(scene)) = (self.render_engine.as_mut(), self.scene.as_mut()) else {
            return;
        };
        render_engine.resize(width, height);
        if let Err(err) = scene.resize(render_engine.device(), width, height) {
            fatal(&err);
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state == ElementState::Pressed && !event.repeat {
            match event.physical_key {
                PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                PhysicalKey::Code(KeyCode::KeyV) => {
                    self.vsync = !self.vsync;
                    if let Some(render_engine) = self.render_engine.as_mut() {
                        render_engine.set_vsync(self.vsync);
                    }
                    log::info!("VSync {}", if self.vsync { "on" } else { "off" });
                }
                _ => {}
            }
        }
        self.controller.process_keyed_events(event);
    }

    fn redraw(&mut self) {
        let (Some(render_engine), Some(scene), Some(window)) =
            (self.render_engine.as_mut(), self.scene.as_mut(), self.window.as_ref())
        else {
            return;
        };

        let now = Instant::now();
        self.controller.update(&mut self.camera, now);

        let (projection, camera) = (&self.projection, &self.camera);
        let plan = render_engine.render_frame(|frame| scene.render(frame, projection, camera));
        if let Some(plan) = plan {
            log::trace!("Recorded frame: {:?}", plan.draw_counts());
        }

        if let Some(fps) = self.fps.tick(now) {
            window.set_title(&format!("{TITLE} ({:?}) - {fps} fps", scene.renderer_kind()));
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title(TITLE)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {err}");
                event_loop.exit();
                return;
            }
        };

        let (width, height) = window.inner_size().into();
        let render_engine = or_fatal(pollster::block_on(RenderEngine::new(window.clone(), width, height)));

        let (width, height) = render_engine.get_surface_size();
        self.config = self.config.clone().with_size(width, height);
        self.projection.resize(width, height);

        let scene = or_fatal(Scene::load(
            render_engine.device(),
            render_engine.queue(),
            &self.model_path,
            &self.config,
            render_engine.surface_format(),
        ));

        self.window = Some(window);
        self.render_engine = Some(render_engine);
        self.scene = Some(scene);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event_loop, &event),
            WindowEvent::Resized(PhysicalSize { width, height }) => self.resize(width, height),
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if self.scene.is_none() {
            return;
        }
        self.controller.process_events(&event, &mut self.camera);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_reports_once_per_second() {
        let start = Instant::now();
        let mut fps = FpsCounter::default();

        let mut reports = Vec::new();
        for frame in 0..=120 {
            // 60 frames per second for two seconds
            if let Some(rate) = fps.tick(start + Duration::from_millis(frame * 1000 / 60)) {
                reports.push(rate);
            }
        }
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|rate| (60..=61).contains(rate)), "{reports:?}");
    }

    #[test]
    fn test_fps_window_drops_old_frames() {
        let start = Instant::now();
        let mut fps = FpsCounter::default();
        for frame in 0..10 {
            fps.tick(start + Duration::from_millis(frame));
        }
        assert_eq!(fps.tick(start + Duration::from_secs(3)), Some(1));
    }
}
