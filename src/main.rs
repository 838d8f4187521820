// =============================================================================
// REVO RENDERER - Hello Triangle
// =============================================================================
//
// Opens one fixed-size window and draws a hard-coded triangle into it every
// frame until the window is closed.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  Window shell (winit, polled from the frame loop)               │
// │    └── Renderer                                                 │
// │          └── Device + Swapchain + Pipeline                      │
// │                └── Command buffer (re-recorded per frame)       │
// │                      └── Synchronization (fence, semaphores)    │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Poll window events (close request / Escape)
// 2. Wait for the previous frame's fence
// 3. Acquire swapchain image
// 4. Record and submit commands
// 5. Present rendered image to screen
//
// =============================================================================

use anyhow::{bail, Context, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use revo_renderer::{AshInstance, Config, Renderer, ShaderSet};
use std::time::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    // Initialize logging
    init_logging();

    log::info!("Starting Vulkan renderer");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        config.window.title
    );
    log::info!("Present mode: {}", config.graphics.present_mode);

    let mut event_loop = EventLoop::new().context("Failed to create event loop")?;

    let attributes = Window::default_attributes()
        .with_title(&config.window.title)
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        // The swapchain is never rebuilt for a new window size
        .with_resizable(false);
    let mut shell = Shell::new(attributes);

    // Pump until the platform hands us a window
    let window = loop {
        let status = event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut shell);
        if let Some(error) = shell.create_error.take() {
            bail!("Failed to create window: {}", error);
        }
        if let Some(window) = shell.window.take() {
            break window;
        }
        if let PumpStatus::Exit(code) = status {
            bail!("Event loop exited with code {} before a window was created", code);
        }
    };

    let display = window.display_handle()?.as_raw();
    let window_handle = window.window_handle()?.as_raw();

    let instance = AshInstance::new(&config.window.title, display, config.validation_enabled())
        .context("Failed to create Vulkan instance")?;
    let surface = instance
        .create_surface(display, window_handle)
        .context("Failed to create window surface")?;
    let shaders = ShaderSet::load(&config.shaders.vertex, &config.shaders.fragment)
        .context("Failed to load shaders")?;

    let size = window.inner_size();
    let mut renderer = Renderer::new(
        surface,
        vk::Extent2D {
            width: size.width,
            height: size.height,
        },
        shaders,
        config.render_settings(),
    )
    .context("Failed to initialize renderer")?;
    log::info!("Vulkan initialized successfully!");

    let mut fps = FpsCounter::new();
    let frames = renderer
        .run_until(|| {
            if config.debug.show_fps {
                if let Some((rate, frame_ms)) = fps.tick() {
                    window.set_title(&format!(
                        "{} - {:.0} FPS ({:.2}ms)",
                        config.window.title, rate, frame_ms
                    ));
                }
            }

            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut shell);
            shell.close_requested || matches!(status, PumpStatus::Exit(_))
        })
        .context("Frame loop failed")?;

    log::info!("Presented {} frames, cleaning up", frames);
    Ok(())
}

fn init_logging() {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
}

// =============================================================================
// WINDOW SHELL
// =============================================================================

/// Receives window events between frames. Owns the window only until it
/// has been created; `main` takes it from there.
struct Shell {
    attributes: WindowAttributes,
    created: bool,
    window: Option<Window>,
    create_error: Option<String>,
    close_requested: bool,
}

impl Shell {
    fn new(attributes: WindowAttributes) -> Self {
        Self {
            attributes,
            created: false,
            window: None,
            create_error: None,
            close_requested: false,
        }
    }
}

impl ApplicationHandler for Shell {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created {
            return;
        }
        self.created = true;

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => self.window = Some(window),
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    self.close_requested = true;
                }
            }
            _ => {}
        }
    }
}

// =============================================================================
// FPS COUNTER
// =============================================================================

struct FpsCounter {
    frame_count: u32,
    last_frame_time: Instant,
    last_update: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            frame_count: 0,
            last_frame_time: now,
            last_update: now,
        }
    }

    /// Count one frame. Once per second returns (frames per second, last
    /// frame time in ms).
    fn tick(&mut self) -> Option<(f32, f32)> {
        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_update).as_secs_f32();
        if elapsed < 1.0 {
            return None;
        }

        let rate = self.frame_count as f32 / elapsed;
        self.frame_count = 0;
        self.last_update = now;
        Some((rate, frame_time * 1000.0))
    }
}
