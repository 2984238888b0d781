use std::sync::Arc;
use std::time::Instant;

use winit::{
    event::*,
    event_loop::EventLoop,
    keyboard::{Key, NamedKey},
    window::Window,
};

use doorway_drive::{
    config::GameConfig,
    controller::{GameSession, InputEvent, Navigation},
    error::Result,
    logging, ui,
    assets::AssetLoader,
    view::{GpuContext, RenderState},
};

struct App {
    window: Arc<Window>,
    gpu: GpuContext,
    render: RenderState,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    session: GameSession,
    started: Instant,
}

/// winit key to the DOM `KeyboardEvent.key` spelling the controller understands
fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(s) => Some(s.to_string()),
        Key::Named(NamedKey::Space) => Some(" ".to_string()),
        Key::Named(NamedKey::ArrowLeft) => Some("ArrowLeft".to_string()),
        Key::Named(NamedKey::ArrowRight) => Some("ArrowRight".to_string()),
        Key::Named(NamedKey::ArrowUp) => Some("ArrowUp".to_string()),
        Key::Named(NamedKey::ArrowDown) => Some("ArrowDown".to_string()),
        _ => None,
    }
}

impl App {
    async fn new(window: Arc<Window>, config: GameConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuContext::new_native(window.clone(), size.width, size.height).await?;
        let render = RenderState::new(&gpu);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let session = GameSession::new(config, AssetLoader::new(), size.width, size.height, 0.0);

        Ok(Self {
            window,
            gpu,
            render,
            egui_ctx,
            egui_state,
            session,
            started: Instant::now(),
        })
    }

    fn now_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns true when egui took the event
    fn input(&mut self, event: &WindowEvent) -> bool {
        if self.egui_state.on_window_event(self.window.as_ref(), event).consumed {
            return true;
        }

        let input = match event {
            WindowEvent::KeyboardInput { event: KeyEvent { state, logical_key, .. }, .. } => {
                key_name(logical_key).map(|key| match state {
                    ElementState::Pressed => InputEvent::KeyDown(key),
                    ElementState::Released => InputEvent::KeyUp(key),
                })
            }
            WindowEvent::Focused(false) => Some(InputEvent::FocusLost),
            WindowEvent::Occluded(occluded) => Some(InputEvent::VisibilityChanged { visible: !occluded }),
            _ => None,
        };

        match input {
            Some(input) => {
                self.session.handle_input(&input);
                true
            }
            None => false,
        }
    }

    fn resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        if size.width > 0 && size.height > 0 {
            self.render.resize(&self.gpu.device, &self.gpu.surface, size.width, size.height);
            self.session.resize(size.width, size.height);
        }
    }

    /// One frame. Returns where the player wants to go once the dialog is answered.
    fn frame(&mut self) -> Result<Option<Navigation>> {
        let now = self.now_ms();
        let report = self.session.tick(now);
        if report.won {
            tracing::info!("goal reached in {}", self.session.hud.timer_text);
        }

        let raw_input = self.egui_state.take_egui_input(&self.window);
        let frame = ui::UiFrame {
            hud: &self.session.hud,
            dialog: self.session.dialog(),
            show_timer: true,
            debug_keys: self.session.config.debug_keys,
        };
        let (mut output, choice) = ui::build_ui(&self.egui_ctx, raw_input, &frame);
        self.egui_state
            .handle_platform_output(&self.window, std::mem::take(&mut output.platform_output));

        let dpr = self.window.scale_factor() as f32;
        let primitives = self.egui_ctx.tessellate(std::mem::take(&mut output.shapes), dpr);
        self.render.set_ui(primitives, output, dpr);
        self.render.draw_frame(&self.gpu, &self.session.scene, &self.session.camera)?;

        Ok(choice.map(|choice| self.session.choose(choice)))
    }
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = GameConfig::default();
    let (width, height) = config.canvas_size;
    let event_loop = EventLoop::new()?;
    let window_attributes = Window::default_attributes()
        .with_title("Doorway Drive")
        .with_inner_size(winit::dpi::LogicalSize::new(width, height));
    let window = Arc::new(event_loop.create_window(window_attributes)?);

    let mut app = pollster::block_on(App::new(window, config))?;
    tracing::info!("native session started");

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { ref event, window_id } if window_id == app.window.id() => {
            if app.input(event) {
                return;
            }
            match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => app.resize(*size),
                WindowEvent::RedrawRequested => match app.frame() {
                    Ok(None) => {}
                    Ok(Some(Navigation::Visit(url))) => {
                        tracing::info!("open {url} in a browser to visit");
                        elwt.exit();
                    }
                    Ok(Some(Navigation::Quit)) => elwt.exit(),
                    Err(e) => {
                        tracing::error!("render failed: {e}");
                        elwt.exit();
                    }
                },
                _ => {}
            }
        }
        Event::AboutToWait => app.window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
