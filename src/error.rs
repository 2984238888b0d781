use thiserror::Error;

/// Errors surfaced during setup and asset loading.
///
/// Nothing in the running game returns these; asset failures are logged and the
/// affected visual simply never appears.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("DOM error: {0}")]
    Dom(String),

    #[error("GPU init failed: {0}")]
    Gpu(String),

    #[error("failed to fetch asset `{path}`: {reason}")]
    AssetFetch { path: String, reason: String },

    #[error("failed to parse model `{path}`")]
    AssetParse {
        path: String,
        #[source]
        source: gltf::Error,
    },

    #[error("model `{path}` is missing buffer data")]
    AssetBuffer { path: String },

    #[error("failed to decode image `{path}`")]
    ImageDecode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("cubemap `{path}` needs six square faces of one size")]
    CubemapFaces { path: String },
}

pub type Result<T> = std::result::Result<T, GameError>;

#[cfg(target_arch = "wasm32")]
impl From<GameError> for wasm_bindgen::JsValue {
    fn from(e: GameError) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}
