//! Browser front-end: DOM input, the `requestAnimationFrame` loop and
//! asset fetching.

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use turntable_core::gltf_loader::PendingGltf;
use turntable_core::stl::parse_stl;
use turntable_core::{Clock, InteractionController, LoadedAsset, ViewerConfig};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use crate::assets::{decode_image, resolve_url, CubeFaces, RgbaImage};
use crate::gpu::GpuRenderer;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Info) {
        web_sys::console::warn_1(&JsValue::from_str(&format!("logger setup failed: {e}")));
    }
    Ok(())
}

struct ViewerState {
    controller: InteractionController,
    renderer: GpuRenderer,
    clock: Clock,
    canvas: web_sys::HtmlCanvasElement,
}

impl ViewerState {
    fn frame(&mut self) {
        self.fit_canvas();
        let delta_time = self.clock.delta();
        if let Err(e) = self.controller.on_frame(delta_time, &mut self.renderer) {
            log::error!("render: {e}");
        }
    }

    /// Follow CSS size changes of the canvas.
    fn fit_canvas(&mut self) {
        let (width, height) = physical_canvas_size(&self.canvas);
        if (width, height) == self.renderer.size() {
            return;
        }
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.renderer.resize(width, height);
        self.controller.camera_mut().set_viewport(width, height);
    }
}

/// A model viewer mounted on a canvas element.
#[wasm_bindgen]
pub struct WebViewer {
    state: Rc<RefCell<ViewerState>>,
}

#[wasm_bindgen]
impl WebViewer {
    /// Mount on the canvas with id `canvas_id`, start the frame loop and
    /// begin fetching the model and skybox named in the config.
    pub async fn attach(
        canvas_id: String,
        config_toml: Option<String>,
    ) -> Result<WebViewer, JsValue> {
        let config = match config_toml {
            Some(text) => ViewerConfig::from_toml_str(&text).map_err(to_js)?,
            None => ViewerConfig::default(),
        };

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("missing document"))?;
        let canvas: web_sys::HtmlCanvasElement = element_by_id(&document, &canvas_id)?;

        let (width, height) = physical_canvas_size(&canvas);
        canvas.set_width(width);
        canvas.set_height(height);

        let renderer = GpuRenderer::new(
            wgpu::SurfaceTarget::Canvas(canvas.clone()),
            width,
            height,
            &config.render,
        )
        .await
        .map_err(to_js)?;

        let assets = config.assets.clone();
        let state = Rc::new(RefCell::new(ViewerState {
            controller: InteractionController::new(config, width, height),
            renderer,
            clock: Clock::new(),
            canvas,
        }));

        install_input(&document, &state)?;
        start_animation_loop(state.clone())?;
        spawn_local(load_model(state.clone(), assets.model));
        spawn_local(load_skybox(state.clone(), assets.skybox));

        Ok(WebViewer { state })
    }

    #[wasm_bindgen(js_name = modelLoaded)]
    pub fn model_loaded(&self) -> bool {
        self.state.borrow().controller.model().is_some()
    }

    /// Euler rotation `[x, y, z]` of the model, empty before it loads.
    pub fn orientation(&self) -> Vec<f32> {
        self.state
            .borrow()
            .controller
            .model()
            .map(|model| {
                let o = model.orientation;
                vec![o.x, o.y, o.z]
            })
            .unwrap_or_default()
    }
}

fn install_input(
    document: &web_sys::Document,
    state: &Rc<RefCell<ViewerState>>,
) -> Result<(), JsValue> {
    let target: &web_sys::EventTarget = document.as_ref();

    listen(target, "mousedown", state, true, |s, e: web_sys::MouseEvent| {
        s.controller
            .pointer_down(e.client_x() as f32, e.client_y() as f32)
    })?;
    listen(target, "mousemove", state, true, |s, e: web_sys::MouseEvent| {
        s.controller
            .pointer_move(e.client_x() as f32, e.client_y() as f32)
    })?;
    listen(target, "mouseup", state, true, |s, _: web_sys::MouseEvent| {
        s.controller.pointer_up()
    })?;

    listen(target, "touchstart", state, false, |s, e: web_sys::TouchEvent| {
        s.controller.touch_start(&touch_points(&e))
    })?;
    listen(target, "touchmove", state, false, |s, e: web_sys::TouchEvent| {
        e.prevent_default();
        s.controller.touch_move(&touch_points(&e))
    })?;
    listen(target, "touchend", state, true, |s, _: web_sys::TouchEvent| {
        s.controller.touch_end()
    })?;

    Ok(())
}

/// Register `handler` for `name` events on `target` for the page's lifetime.
fn listen<E, F>(
    target: &web_sys::EventTarget,
    name: &str,
    state: &Rc<RefCell<ViewerState>>,
    passive: bool,
    handler: F,
) -> Result<(), JsValue>
where
    E: JsCast + 'static,
    F: Fn(&mut ViewerState, E) + 'static,
{
    let state = state.clone();
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |event: web_sys::Event| {
        if let Ok(event) = event.dyn_into::<E>() {
            handler(&mut state.borrow_mut(), event);
        }
    });

    let options = web_sys::AddEventListenerOptions::new();
    options.set_passive(passive);
    target.add_event_listener_with_callback_and_add_event_listener_options(
        name,
        closure.as_ref().unchecked_ref(),
        &options,
    )?;
    closure.forget();
    Ok(())
}

fn touch_points(event: &web_sys::TouchEvent) -> Vec<(f32, f32)> {
    let touches = event.touches();
    (0..touches.length())
        .filter_map(|i| touches.get(i))
        .map(|touch| (touch.client_x() as f32, touch.client_y() as f32))
        .collect()
}

fn start_animation_loop(state: Rc<RefCell<ViewerState>>) -> Result<(), JsValue> {
    let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut(f64)>>));
    let next = callback.clone();
    *callback.borrow_mut() = Some(Closure::new(move |_timestamp: f64| {
        state.borrow_mut().frame();

        if let Some(closure) = next.borrow().as_ref() {
            if let Err(e) = request_animation_frame(closure) {
                log::error!("requestAnimationFrame: {e:?}");
            }
        }
    }));

    let first = callback.borrow();
    if let Some(closure) = first.as_ref() {
        request_animation_frame(closure)?;
    }
    Ok(())
}

fn request_animation_frame(closure: &Closure<dyn FnMut(f64)>) -> Result<i32, JsValue> {
    web_sys::window()
        .ok_or_else(|| JsValue::from_str("missing window"))?
        .request_animation_frame(closure.as_ref().unchecked_ref())
}

async fn load_model(state: Rc<RefCell<ViewerState>>, url: String) {
    match fetch_asset(&url).await {
        Ok(asset) => {
            state.borrow_mut().controller.attach_model(asset);
        }
        Err(e) => log::error!("failed to load model {url}: {e:?}"),
    }
}

async fn fetch_asset(url: &str) -> Result<LoadedAsset, JsValue> {
    let bytes = fetch_bytes(url).await?;
    if url.to_ascii_lowercase().ends_with(".stl") {
        return parse_stl(&bytes).map_err(to_js);
    }

    let mut pending = PendingGltf::parse(&bytes).map_err(to_js)?;
    for buffer in pending.external_buffers().to_vec() {
        let data = fetch_bytes(&resolve_url(url, &buffer.uri)).await?;
        pending.resolve(buffer.index, data);
    }
    pending.finish().map_err(to_js)
}

async fn load_skybox(state: Rc<RefCell<ViewerState>>, urls: [String; 6]) {
    match fetch_cube(&urls).await {
        Ok(cube) => state.borrow_mut().renderer.set_skybox(&cube),
        Err(e) => log::warn!("skybox unavailable, keeping the clear colour: {e:?}"),
    }
}

async fn fetch_cube(urls: &[String; 6]) -> Result<CubeFaces, JsValue> {
    // Faces often share one image; fetch each URL once.
    let mut decoded: Vec<(&str, RgbaImage)> = Vec::new();
    for url in urls {
        if decoded.iter().any(|(seen, _)| *seen == url.as_str()) {
            continue;
        }
        let bytes = fetch_bytes(url).await?;
        decoded.push((url.as_str(), decode_image(url, &bytes).map_err(to_js)?));
    }

    let faces: Vec<RgbaImage> = urls
        .iter()
        .filter_map(|url| {
            decoded
                .iter()
                .find(|(seen, _)| *seen == url.as_str())
                .map(|(_, image)| image.clone())
        })
        .collect();
    let faces: [RgbaImage; 6] = faces
        .try_into()
        .map_err(|_| JsValue::from_str("expected six skybox faces"))?;
    CubeFaces::new(faces).map_err(to_js)
}

async fn fetch_bytes(path: &str) -> Result<Vec<u8>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;
    let resp = JsFuture::from(window.fetch_with_str(path)).await?;
    let resp: web_sys::Response = resp.dyn_into()?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!(
            "GET {path}: HTTP {}",
            resp.status()
        )));
    }

    let ab = JsFuture::from(resp.array_buffer()?).await?;
    Ok(js_sys::Uint8Array::new(&ab).to_vec())
}

fn element_by_id<T: JsCast>(document: &web_sys::Document, id: &str) -> Result<T, JsValue> {
    let el = document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("missing element #{id}")))?;
    el.dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("element #{id} has unexpected type")))
}

fn physical_canvas_size(canvas: &web_sys::HtmlCanvasElement) -> (u32, u32) {
    let cw = canvas.client_width().max(1) as f64;
    let ch = canvas.client_height().max(1) as f64;
    let dpr = web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0)
        .max(0.1);

    let w = (cw * dpr).round().max(1.0) as u32;
    let h = (ch * dpr).round().max(1.0) as u32;
    (w, h)
}

fn to_js(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}
