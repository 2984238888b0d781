pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod physics;
pub mod ui;
pub mod utils;

// MVC Architecture
pub mod controller;
pub mod model;
pub mod view;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        use std::cell::{Cell, RefCell};
        use std::rc::Rc;

        use wasm_bindgen::closure::Closure;
        use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
        use web_sys::{Document, Element, Event, HtmlCanvasElement, KeyboardEvent, MouseEvent, Window};

        use assets::AssetLoader;
        use config::GameConfig;
        use controller::input::wasm::keyboard_event_to_input;
        use controller::{GameSession, InputEvent, Navigation};
        use error::GameError;
        use view::{GpuContext, RenderState};
    }
}

/// Keys the page would otherwise use for scrolling
#[cfg(target_arch = "wasm32")]
const CAPTURED_KEYS: [&str; 5] = [" ", "ArrowUp", "ArrowDown", "ArrowLeft", "ArrowRight"];

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    logging::init();
    let config = GameConfig::default();
    let (width, height) = config.canvas_size;
    let (window, document, canvas) = init_canvas(width, height)?;
    setup_app(window, document, canvas, config).await?;
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn now_ms(window: &Window) -> f64 {
    window.performance().map(|p| p.now()).unwrap_or(0.0)
}

/// Main application setup for WASM
#[cfg(target_arch = "wasm32")]
async fn setup_app(
    window: Window,
    document: Document,
    canvas: HtmlCanvasElement,
    config: GameConfig,
) -> error::Result<()> {
    let gpu = GpuContext::new(&canvas, canvas.width(), canvas.height()).await?;
    let mut render_state = RenderState::new(&gpu);

    let hud_interval_ms = config.hud_interval_ms;
    let debug_keys = config.debug_keys;
    let session = Rc::new(RefCell::new(GameSession::new(
        config,
        AssetLoader::new(),
        gpu.config.width,
        gpu.config.height,
        now_ms(&window),
    )));
    let egui_events: Rc<RefCell<Vec<egui::Event>>> = Rc::new(RefCell::new(Vec::new()));
    let egui_ctx = egui::Context::default();

    setup_input_listeners(&document, &window, &canvas, session.clone(), egui_events.clone())?;
    let timer_el = create_timer_element(&document)?;
    let interval = start_timer_interval(&window, timer_el.clone(), session.clone(), hud_interval_ms)?;

    let f = RcCellCallback::new(window.clone(), {
        let window = window.clone();
        move || {
            let now = now_ms(&window);
            handle_resize(&window, &canvas, &gpu, &mut render_state, &session);

            let report = session.borrow_mut().tick(now);
            if report.won {
                // freeze the DOM clock on the final time
                if let Some(id) = interval.take() {
                    window.clear_interval_with_handle(id);
                }
                timer_el.set_text_content(Some(&session.borrow().timer.display(now)));
            }

            let dpr = window.device_pixel_ratio() as f32;
            egui_ctx.set_pixels_per_point(dpr);
            let raw_input = ui::raw_input(
                render_state.width,
                render_state.height,
                dpr,
                now,
                egui_events.borrow_mut().drain(..).collect(),
            );
            let choice = {
                let session = session.borrow();
                let frame = ui::UiFrame {
                    hud: &session.hud,
                    dialog: session.dialog(),
                    show_timer: false,
                    debug_keys,
                };
                let (mut output, choice) = ui::build_ui(&egui_ctx, raw_input, &frame);
                let primitives = egui_ctx.tessellate(std::mem::take(&mut output.shapes), dpr);
                render_state.set_ui(primitives, output, dpr);
                if let Err(e) = render_state.draw_frame(&gpu, &session.scene, &session.camera) {
                    tracing::error!("{e}");
                }
                choice
            };

            if let Some(choice) = choice {
                let nav = session.borrow_mut().choose(choice);
                navigate(&window, nav);
            }
        }
    });
    f.start();

    tracing::info!("session started");
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn navigate(window: &Window, nav: Navigation) {
    let result = match nav {
        Navigation::Visit(url) => window.location().set_href(&url),
        Navigation::Quit => window.close(),
    };
    if let Err(e) = result {
        tracing::warn!("navigation failed: {e:?}");
    }
}

/// Match the canvas and surface to the window size
#[cfg(target_arch = "wasm32")]
fn handle_resize(
    window: &Window,
    canvas: &HtmlCanvasElement,
    gpu: &GpuContext,
    render_state: &mut RenderState,
    session: &Rc<RefCell<GameSession>>,
) {
    if let (Ok(w), Ok(h)) = (window.inner_width(), window.inner_height()) {
        let (Some(w), Some(h)) = (w.as_f64(), h.as_f64()) else { return };
        let (nw, nh) = (w as u32, h as u32);
        if render_state.resize(&gpu.device, &gpu.surface, nw, nh) {
            canvas.set_width(render_state.width);
            canvas.set_height(render_state.height);
            session.borrow_mut().resize(render_state.width, render_state.height);
        }
    }
}

/// Setup all input event listeners
#[cfg(target_arch = "wasm32")]
fn setup_input_listeners(
    document: &Document,
    window: &Window,
    canvas: &HtmlCanvasElement,
    session: Rc<RefCell<GameSession>>,
    egui_events: Rc<RefCell<Vec<egui::Event>>>,
) -> error::Result<()> {
    let listen = |target: &web_sys::EventTarget, name: &str, f: &js_sys::Function| {
        target
            .add_event_listener_with_callback(name, f)
            .map_err(|e| GameError::Dom(format!("{name} listener: {e:?}")))
    };

    // Keyboard down
    {
        let session = session.clone();
        let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            if CAPTURED_KEYS.contains(&e.key().as_str()) {
                e.prevent_default();
            }
            session.borrow_mut().handle_input(&keyboard_event_to_input(&e, true));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        listen(document, "keydown", keydown.as_ref().unchecked_ref())?;
        keydown.forget();
    }

    // Keyboard up
    {
        let session = session.clone();
        let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            session.borrow_mut().handle_input(&keyboard_event_to_input(&e, false));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        listen(document, "keyup", keyup.as_ref().unchecked_ref())?;
        keyup.forget();
    }

    // Focus loss - release all drive keys
    {
        let session = session.clone();
        let blur = Closure::wrap(Box::new(move |_e: Event| {
            session.borrow_mut().handle_input(&InputEvent::FocusLost);
        }) as Box<dyn FnMut(Event)>);
        listen(window, "blur", blur.as_ref().unchecked_ref())?;
        blur.forget();
    }

    // Visibility change
    {
        let session = session.clone();
        let doc = document.clone();
        let visibility = Closure::wrap(Box::new(move |_e: Event| {
            let visible = !doc.hidden();
            session.borrow_mut().handle_input(&InputEvent::VisibilityChanged { visible });
        }) as Box<dyn FnMut(Event)>);
        listen(document, "visibilitychange", visibility.as_ref().unchecked_ref())?;
        visibility.forget();
    }

    // Mouse feeds egui only
    {
        let events = egui_events.clone();
        let mousemove = Closure::wrap(Box::new(move |e: MouseEvent| {
            let pos = egui::pos2(e.offset_x() as f32, e.offset_y() as f32);
            events.borrow_mut().push(egui::Event::PointerMoved(pos));
        }) as Box<dyn FnMut(MouseEvent)>);
        listen(canvas, "mousemove", mousemove.as_ref().unchecked_ref())?;
        mousemove.forget();
    }

    for (name, pressed) in [("mousedown", true), ("mouseup", false)] {
        let events = egui_events.clone();
        let click = Closure::wrap(Box::new(move |e: MouseEvent| {
            let button = match e.button() {
                1 => egui::PointerButton::Middle,
                2 => egui::PointerButton::Secondary,
                _ => egui::PointerButton::Primary,
            };
            events.borrow_mut().push(egui::Event::PointerButton {
                pos: egui::pos2(e.offset_x() as f32, e.offset_y() as f32),
                button,
                pressed,
                modifiers: egui::Modifiers::default(),
            });
        }) as Box<dyn FnMut(MouseEvent)>);
        listen(canvas, name, click.as_ref().unchecked_ref())?;
        click.forget();
    }

    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn create_timer_element(document: &Document) -> error::Result<Element> {
    let body = document.body().ok_or_else(|| GameError::Dom("no body on document".into()))?;
    let el = document
        .create_element("div")
        .map_err(|e| GameError::Dom(format!("timer element: {e:?}")))?;
    el.set_id("timer");
    el.set_text_content(Some("00:00:000"));
    el.set_attribute(
        "style",
        "position:absolute;top:8px;right:12px;font:20px monospace;color:#fff;text-shadow:0 0 4px #000",
    )
    .map_err(|e| GameError::Dom(format!("timer style: {e:?}")))?;
    body.append_child(&el).map_err(|e| GameError::Dom(format!("timer append: {e:?}")))?;
    Ok(el)
}

/// Refresh the DOM clock every `period_ms`. The handle is taken when the interval is cleared.
#[cfg(target_arch = "wasm32")]
fn start_timer_interval(
    window: &Window,
    el: Element,
    session: Rc<RefCell<GameSession>>,
    period_ms: i32,
) -> error::Result<Rc<Cell<Option<i32>>>> {
    let win = window.clone();
    let tick = Closure::wrap(Box::new(move || {
        let text = session.borrow().timer.display(now_ms(&win));
        el.set_text_content(Some(&text));
    }) as Box<dyn FnMut()>);
    let id = window
        .set_interval_with_callback_and_timeout_and_arguments_0(tick.as_ref().unchecked_ref(), period_ms)
        .map_err(|e| GameError::Dom(format!("setInterval: {e:?}")))?;
    tick.forget();
    Ok(Rc::new(Cell::new(Some(id))))
}

#[cfg(target_arch = "wasm32")]
fn init_canvas(width: u32, height: u32) -> error::Result<(Window, Document, HtmlCanvasElement)> {
    let window = web_sys::window().ok_or_else(|| GameError::Dom("no global `window`".into()))?;
    let document = window.document().ok_or_else(|| GameError::Dom("no document on window".into()))?;
    let body = document.body().ok_or_else(|| GameError::Dom("no body on document".into()))?;
    let canvas = document
        .create_element("canvas")
        .map_err(|e| GameError::Dom(format!("{e:?}")))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| GameError::Dom("failed to create canvas".into()))?;
    canvas.set_width(width);
    canvas.set_height(height);
    body.append_child(&canvas).map_err(|e| GameError::Dom(format!("{e:?}")))?;
    Ok((window, document, canvas))
}

/// requestAnimationFrame loop around a boxed frame callback
#[cfg(target_arch = "wasm32")]
struct RcCellCallback {
    inner: Rc<RefCell<Box<dyn FnMut()>>>,
    window: Window,
}

#[cfg(target_arch = "wasm32")]
impl RcCellCallback {
    fn new(window: Window, f: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(f))),
            window,
        }
    }

    fn request_frame(window: &Window, callback: &Closure<dyn FnMut()>) {
        if let Err(e) = window.request_animation_frame(callback.as_ref().unchecked_ref()) {
            tracing::error!("requestAnimationFrame failed: {e:?}");
        }
    }

    fn start(self) {
        let inner = self.inner.clone();
        let window = self.window.clone();

        let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let callback_clone = callback.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            inner.borrow_mut().as_mut()();

            if let Some(cb) = callback_clone.borrow().as_ref() {
                Self::request_frame(&window, cb);
            }
        }) as Box<dyn FnMut()>));

        if let Some(cb) = callback.borrow().as_ref() {
            Self::request_frame(&self.window, cb);
        }

        // Leak the closure to keep it alive
        std::mem::forget(callback);
    }
}
