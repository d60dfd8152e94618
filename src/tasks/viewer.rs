mod gesture;
mod scene;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

pub use gesture::DragGesture;
use scene::{DropZoneScene, FrameParams};

use crate::config::Configuration;
use crate::events::DragEvent;
use crate::processing::decode::ImageProcessor;
use crate::processing::layout::preview_rect;
use crate::tasks::drop_zone::AppState;

#[derive(Debug)]
enum ViewerEvent {
    StateChanged,
    Cancelled,
}

/// Window title for a given state: the configured title followed by the
/// current color, or by the last error while one is pending.
pub fn window_title(base: &str, state: &AppState) -> String {
    match &state.last_error {
        Some(err) => format!("{base} | {err}"),
        None => format!("{base} | {}", state.background_css()),
    }
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    processor: Arc<ImageProcessor>,
    events: Sender<DragEvent>,
    state: watch::Receiver<AppState>,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    scene: Option<DropZoneScene>,
    gesture: DragGesture,
    started: Instant,
    pending_redraw: bool,
    title: String,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        cancel: CancellationToken,
        processor: Arc<ImageProcessor>,
        events: Sender<DragEvent>,
        state: watch::Receiver<AppState>,
    ) -> Self {
        Self {
            cfg,
            cancel,
            processor,
            events,
            state,
            window: None,
            surface: None,
            surface_config: None,
            device: None,
            queue: None,
            scene: None,
            gesture: DragGesture::default(),
            started: Instant::now(),
            pending_redraw: false,
            title: String::new(),
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let title = window_title(&self.cfg.window_title, &self.state.borrow());
        let attrs = WindowAttributes::default()
            .with_title(title.clone())
            .with_inner_size(LogicalSize::new(
                self.cfg.window_width,
                self.cfg.window_height,
            ));
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                self.title = title;
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create drop window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("drop-zone-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "drop surface configured",
        );

        self.scene = Some(DropZoneScene::new(&device, &queue, format));
        self.surface = Some(surface);
        self.surface_config = Some(config);
        self.device = Some(device);
        self.queue = Some(queue);
        self.pending_redraw = true;
        Ok(())
    }

    fn handle_resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        let (Some(surface), Some(device), Some(config)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.surface_config.as_mut(),
        ) else {
            return;
        };

        config.width = new_size.width.max(1);
        config.height = new_size.height.max(1);
        surface.configure(device, config);
        debug!(
            width = config.width,
            height = config.height,
            "drop surface resized",
        );
        self.request_redraw();
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(surface), Some(device), Some(queue), Some(config), Some(window)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.queue.as_ref(),
            self.surface_config.as_ref(),
            self.window.clone(),
        ) else {
            return;
        };
        let Some(scene) = self.scene.as_mut() else {
            return;
        };

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("drop surface lost; reconfiguring");
                self.handle_resize(window.inner_size());
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("drop surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("drop surface acquisition timed out");
                return;
            }
            Err(err) => {
                warn!(error = %err, "drop surface reported an error; retrying");
                self.handle_resize(window.inner_size());
                return;
            }
        };

        let state = self.state.borrow().clone();
        scene.sync_preview(device, queue, &state);

        let rect = state.source_image.as_ref().map(|preview| {
            let (w, h) = preview.image.dimensions();
            preview_rect(w, h, config.width, config.height, self.cfg.preview_margin)
        });
        if let Some(rect) = rect {
            let (w, h) = rect.size();
            self.processor.observe_layout(w, h);
        }

        scene.update(
            queue,
            &state,
            &FrameParams {
                surface_size: (config.width, config.height),
                preview_rect: rect,
                seconds: self.started.elapsed().as_secs_f32(),
                spinner_period: self.cfg.spinner_period.as_secs_f32(),
                drag_over_dim: self.cfg.drag_over_dim,
            },
        );

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("drop-zone-encoder"),
        });
        scene.draw(&mut encoder, &view);
        queue.submit(std::iter::once(encoder.finish()));
        window.pre_present_notify();
        frame.present();

        // the spinner animates for as long as a drop is being processed
        self.pending_redraw = state.is_computing;
    }

    fn request_redraw(&mut self) {
        self.pending_redraw = true;
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn forward(&self, event: DragEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "drop zone is not keeping up; drag event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("drop zone has stopped; ignoring drag event");
            }
        }
    }

    fn refresh_title(&mut self) {
        let title = window_title(&self.cfg.window_title, &self.state.borrow());
        if title == self.title {
            return;
        }
        if let Some(window) = self.window.as_ref() {
            window.set_title(&title);
        }
        self.title = title;
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.device.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("drop window close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::HoveredFile(path) => {
                debug!(path = %path.display(), "file hovered");
                if let Some(event) = self.gesture.hovered() {
                    self.forward(event);
                }
            }
            WindowEvent::HoveredFileCancelled => {
                if let Some(event) = self.gesture.cancelled() {
                    self.forward(event);
                }
            }
            WindowEvent::DroppedFile(path) => {
                debug!(path = %path.display(), "file dropped");
                self.gesture.dropped(path);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(event) = self.gesture.flush() {
            self.forward(event);
        }
        if self.pending_redraw {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::StateChanged => {
                self.refresh_title();
                self.request_redraw();
            }
            ViewerEvent::Cancelled => {
                info!("drop window received cancellation event");
                event_loop.exit();
            }
        }
    }
}

/// Run the drop window on the calling thread until it is closed or `cancel`
/// fires. Must be called from within a Tokio runtime.
pub fn run_windowed(
    cfg: Configuration,
    processor: Arc<ImageProcessor>,
    events: Sender<DragEvent>,
    state: watch::Receiver<AppState>,
    cancel: CancellationToken,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build drop window event loop")?;

    let cancel_task = {
        let cancel = cancel.clone();
        let proxy = event_loop.create_proxy();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let state_task = {
        let mut state = state.clone();
        let proxy = event_loop.create_proxy();
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                if proxy.send_event(ViewerEvent::StateChanged).is_err() {
                    break;
                }
            }
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, processor, events, state);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();
    state_task.abort();

    run_result.context("drop window event loop failed")
}
