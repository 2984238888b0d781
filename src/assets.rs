use std::future::Future;
use std::rc::Rc;

use glam::Mat4;
use once_cell::unsync::OnceCell;

use crate::error::{GameError, Result};
use crate::utils::{Mesh, Vertex};

/// Write-once slot filled when an asynchronous load completes
pub type AssetSlot<T> = Rc<OnceCell<T>>;

/// Face files of a cubemap directory, in layer order (+X, -X, +Y, -Y, +Z, -Z)
pub const CUBE_FACES: [&str; 6] = ["posx.jpg", "negx.jpg", "posy.jpg", "negy.jpg", "posz.jpg", "negz.jpg"];

/// Decoded RGBA8 pixels ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            rgba: color.repeat((width * height) as usize),
        }
    }
}

/// Six square faces of one size, see [`CUBE_FACES`] for the order
#[derive(Debug, Clone, PartialEq)]
pub struct CubeFaces {
    pub size: u32,
    pub faces: Vec<ImageData>,
}

impl CubeFaces {
    pub fn new(path: &str, faces: Vec<ImageData>) -> Result<Self> {
        let size = faces.first().map(|f| f.width).unwrap_or(0);
        let valid = faces.len() == CUBE_FACES.len()
            && size > 0
            && faces.iter().all(|f| f.width == size && f.height == size);
        if !valid {
            return Err(GameError::CubemapFaces { path: path.to_string() });
        }
        Ok(Self { size, faces })
    }
}

/// One-line description for load logs
pub trait AssetData: 'static {
    fn summary(&self) -> String;
}

impl AssetData for Mesh {
    fn summary(&self) -> String {
        format!("{} vertices", self.vertices.len())
    }
}

impl AssetData for ImageData {
    fn summary(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl AssetData for CubeFaces {
    fn summary(&self) -> String {
        format!("6 x {}x{}", self.size, self.size)
    }
}

/// Something requested by path. Cloning shares the same slot.
#[derive(Debug)]
pub struct Asset<T> {
    path: Rc<str>,
    slot: AssetSlot<T>,
}

impl<T> Clone for Asset<T> {
    fn clone(&self) -> Self {
        Self { path: self.path.clone(), slot: self.slot.clone() }
    }
}

impl<T> Asset<T> {
    pub fn pending(path: &str) -> Self {
        Self {
            path: Rc::from(path),
            slot: Rc::new(OnceCell::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }

    /// Fill the slot. Later calls are ignored and return false.
    pub fn resolve(&self, value: T) -> bool {
        self.slot.set(value).is_ok()
    }
}

pub type ModelAsset = Asset<Mesh>;
pub type TextureAsset = Asset<ImageData>;
pub type CubemapAsset = Asset<CubeFaces>;

fn deliver<T: AssetData>(asset: &Asset<T>, result: Result<T>) {
    match result {
        Ok(value) => {
            tracing::info!("loaded {} ({})", asset.path(), value.summary());
            asset.resolve(value);
        }
        Err(e) => tracing::warn!("{}", e),
    }
}

/// Starts asset loads and delivers the results into [`Asset`] slots.
///
/// On wasm each load is a `spawn_local` task that resolves its slot directly.
/// Natively loads run on a worker thread and are handed over in [`Self::poll`],
/// which the frame loop calls once per tick.
pub struct AssetLoader {
    enabled: bool,
    /// Returns true while its load is still running
    #[cfg(not(target_arch = "wasm32"))]
    pending: Vec<Box<dyn FnMut() -> bool>>,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self {
            enabled: true,
            #[cfg(not(target_arch = "wasm32"))]
            pending: Vec::new(),
        }
    }

    /// A loader whose slots never resolve (headless runs and tests)
    pub fn offline() -> Self {
        Self {
            enabled: false,
            #[cfg(not(target_arch = "wasm32"))]
            pending: Vec::new(),
        }
    }

    /// glTF model, flattened into one mesh
    pub fn request_model(&mut self, path: &str) -> ModelAsset {
        self.request(path, |path: String| async move { load_model(&path).await })
    }

    /// Single image file decoded to RGBA8
    pub fn request_texture(&mut self, path: &str) -> TextureAsset {
        self.request(path, |path: String| async move { load_texture(&path).await })
    }

    /// Directory holding the six [`CUBE_FACES`] images
    pub fn request_cubemap(&mut self, dir: &str) -> CubemapAsset {
        self.request(dir, |dir: String| async move { load_cubemap(&dir).await })
    }

    fn request<T, F, Fut>(&mut self, path: &str, load: F) -> Asset<T>
    where
        T: AssetData + Send,
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + 'static,
    {
        let asset = Asset::pending(path);
        if self.enabled {
            self.start(asset.clone(), load);
        }
        asset
    }

    #[cfg(target_arch = "wasm32")]
    fn start<T, F, Fut>(&mut self, asset: Asset<T>, load: F)
    where
        T: AssetData + Send,
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + 'static,
    {
        let path = asset.path().to_string();
        wasm_bindgen_futures::spawn_local(async move {
            deliver(&asset, load(path).await);
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn start<T, F, Fut>(&mut self, asset: Asset<T>, load: F)
    where
        T: AssetData + Send,
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + 'static,
    {
        use std::sync::mpsc::{channel, TryRecvError};

        let (tx, rx) = channel();
        let path = asset.path().to_string();
        std::thread::spawn(move || {
            let _ = tx.send(pollster::block_on(load(path)));
        });
        self.pending.push(Box::new(move || match rx.try_recv() {
            Ok(result) => {
                deliver(&asset, result);
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => false,
        }));
    }

    /// Hand finished native loads to their slots. No-op on wasm.
    pub fn poll(&mut self) {
        #[cfg(not(target_arch = "wasm32"))]
        self.pending.retain_mut(|still_running| still_running());
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "wasm32")]
async fn fetch_bytes(path: &str) -> Result<Vec<u8>> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let fetch_err = |reason: String| GameError::AssetFetch { path: path.to_string(), reason };

    let window = web_sys::window().ok_or_else(|| GameError::Dom("no global `window`".into()))?;
    let resp = JsFuture::from(window.fetch_with_str(path))
        .await
        .map_err(|e| fetch_err(format!("{e:?}")))?;
    let resp: web_sys::Response = resp
        .dyn_into()
        .map_err(|_| fetch_err("fetch did not return a Response".into()))?;
    if !resp.ok() {
        return Err(fetch_err(format!("HTTP {}", resp.status())));
    }
    let buffer = JsFuture::from(resp.array_buffer().map_err(|e| fetch_err(format!("{e:?}")))?)
        .await
        .map_err(|e| fetch_err(format!("{e:?}")))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

#[cfg(not(target_arch = "wasm32"))]
async fn fetch_bytes(path: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| GameError::AssetFetch {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve a buffer URI relative to the directory of the model file
fn sibling_path(model_path: &str, uri: &str) -> String {
    match model_path.rfind('/') {
        Some(i) => format!("{}/{}", &model_path[..i], uri),
        None => uri.to_string(),
    }
}

/// Fetch a glTF file and its external buffers and flatten it into one mesh
pub async fn load_model(path: &str) -> Result<Mesh> {
    let bytes = fetch_bytes(path).await?;
    let gltf = gltf::Gltf::from_slice(&bytes).map_err(|source| GameError::AssetParse {
        path: path.to_string(),
        source,
    })?;

    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .ok_or_else(|| GameError::AssetBuffer { path: path.to_string() })?,
            // embedded data URIs are not supported, export with a .bin next to the model
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                return Err(GameError::AssetBuffer { path: path.to_string() });
            }
            gltf::buffer::Source::Uri(uri) => fetch_bytes(&sibling_path(path, uri)).await?,
        };
        buffers.push(data);
    }

    Ok(flatten_document(&gltf.document, &buffers))
}

/// Decode any supported image format into RGBA8
pub fn decode_image(path: &str, bytes: &[u8]) -> Result<ImageData> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|source| GameError::ImageDecode { path: path.to_string(), source })?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData { width, height, rgba: rgba.into_raw() })
}

pub async fn load_texture(path: &str) -> Result<ImageData> {
    let bytes = fetch_bytes(path).await?;
    decode_image(path, &bytes)
}

/// Fetch the six faces under `dir`. Any missing or mismatched face fails the whole set.
pub async fn load_cubemap(dir: &str) -> Result<CubeFaces> {
    let mut faces = Vec::with_capacity(CUBE_FACES.len());
    for face in CUBE_FACES {
        faces.push(load_texture(&format!("{dir}/{face}")).await?);
    }
    CubeFaces::new(dir, faces)
}

/// Bake every triangle primitive of the default scene into a single mesh,
/// with node transforms applied and the base colour written per vertex
pub fn flatten_document(document: &gltf::Document, buffers: &[Vec<u8>]) -> Mesh {
    let mut out = Mesh::empty();
    let scene = document.default_scene().or_else(|| document.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            flatten_node(&node, Mat4::IDENTITY, buffers, &mut out);
        }
    }
    out
}

fn flatten_node(node: &gltf::Node, parent: Mat4, buffers: &[Vec<u8>], out: &mut Mesh) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.as_slice()));
            let Some(positions) = reader.read_positions() else { continue };
            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(n) => n.collect(),
                None => vec![[0.0, 1.0, 0.0]; positions.len()],
            };
            let uvs: Vec<[f32; 2]> = match reader.read_tex_coords(0) {
                Some(t) => t.into_f32().collect(),
                None => vec![[0.0, 0.0]; positions.len()],
            };
            let color = primitive.material().pbr_metallic_roughness().base_color_factor();

            let part = Mesh {
                vertices: positions
                    .iter()
                    .zip(normals.iter())
                    .zip(uvs.iter())
                    .map(|((p, n), uv)| Vertex { pos: *p, normal: *n, color, uv: *uv })
                    .collect(),
                indices: match reader.read_indices() {
                    Some(indices) => indices.into_u32().collect(),
                    None => (0..positions.len() as u32).collect(),
                },
            };
            out.append_transformed(&part, world);
        }
    }

    for child in node.children() {
        flatten_node(&child, world, buffers, out);
    }
}
