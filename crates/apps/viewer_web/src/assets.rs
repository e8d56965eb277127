//! Asset downloads: textures over `gloo-net`, the label font through
//! `document.fonts`.

use gloo_net::http::Request;
use runtime::AssetError;
use wasm_bindgen_futures::JsFuture;

/// WebGL2 guarantees 2048; larger images are scaled down before upload.
pub const MAX_TEXTURE_DIMENSION: u32 = 2048;

/// Tightly packed RGBA8 pixels, row-major from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub fn decode_texture(bytes: &[u8], max_dimension: u32) -> Result<DecodedImage, AssetError> {
    let img = image::load_from_memory(bytes).map_err(|e| AssetError::Decode(e.to_string()))?;
    let mut rgba = img.to_rgba8();
    let (w, h) = rgba.dimensions();
    let longest = w.max(h);
    if longest > max_dimension.max(1) {
        let scale = f64::from(max_dimension.max(1)) / f64::from(longest);
        let new_w = ((f64::from(w) * scale).round() as u32).max(1);
        let new_h = ((f64::from(h) * scale).round() as u32).max(1);
        rgba = image::imageops::resize(
            &rgba,
            new_w,
            new_h,
            image::imageops::FilterType::Triangle,
        );
    }
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

async fn fetch_binary(url: &str) -> Result<Vec<u8>, AssetError> {
    let resp = Request::get(url)
        .send()
        .await
        .map_err(|e| AssetError::Fetch(e.to_string()))?;
    if !resp.ok() {
        return Err(AssetError::Fetch(format!("{url}: HTTP {}", resp.status())));
    }
    resp.binary()
        .await
        .map_err(|e| AssetError::Fetch(e.to_string()))
}

pub async fn fetch_texture(url: &str) -> Result<DecodedImage, AssetError> {
    let bytes = fetch_binary(url).await?;
    decode_texture(&bytes, MAX_TEXTURE_DIMENSION)
}

/// Resolves once the browser has the face for `font` (CSS shorthand) ready.
pub async fn load_font(font: &str) -> Result<(), AssetError> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| AssetError::Fetch("document missing".to_string()))?;
    let promise = document.fonts().load(font);
    JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|e| AssetError::Fetch(format!("{font}: {e:?}")))
}
