//! Decoded shape mask render request.

use std::fmt;

use sha2::{Digest, Sha256};
use shapemask_api_types::{ShapeIdRepr, ShapeMaskRequest};

use super::error::DecodeError;

const CACHE_KEY_PREFIX: &str = "shape";
const FINGERPRINT_BYTES: usize = 6;

/// Mirroring applied to the rendered mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flip {
    #[default]
    None,
    Horizontal,
    Vertical,
    Both,
}

impl Flip {
    pub fn from_flags(horizontal: bool, vertical: bool) -> Self {
        match (horizontal, vertical) {
            (false, false) => Flip::None,
            (true, false) => Flip::Horizontal,
            (false, true) => Flip::Vertical,
            (true, true) => Flip::Both,
        }
    }

    /// Parse the `flip` query parameter (`h`, `v`, `hv` or `vh`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Some(Flip::None),
            "h" => Some(Flip::Horizontal),
            "v" => Some(Flip::Vertical),
            "hv" | "vh" => Some(Flip::Both),
            _ => None,
        }
    }

    pub fn horizontal(self) -> bool {
        matches!(self, Flip::Horizontal | Flip::Both)
    }

    pub fn vertical(self) -> bool {
        matches!(self, Flip::Vertical | Flip::Both)
    }

    /// Canonical query/cache-key form; `None` when no mirroring applies.
    pub fn as_param(self) -> Option<&'static str> {
        match self {
            Flip::None => None,
            Flip::Horizontal => Some("h"),
            Flip::Vertical => Some("v"),
            Flip::Both => Some("hv"),
        }
    }
}

/// Immutable, validated render request.
///
/// The cache key is derived once during decoding from every field that
/// changes the rendered bytes. The session key identifies the principal and
/// never contributes to the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ShapeMaskContext {
    shape_id: u64,
    color: Option<String>,
    flip: Flip,
    session_key: String,
    cache_key: String,
}

impl ShapeMaskContext {
    /// Decode a raw JSON request descriptor.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let request: ShapeMaskRequest = serde_json::from_slice(raw)?;
        Self::from_request(request)
    }

    pub fn from_request(request: ShapeMaskRequest) -> Result<Self, DecodeError> {
        let shape_id = parse_shape_id(&request.shape_id)?;
        let color = request.color.as_deref().map(normalize_color).transpose()?;
        let flip = decode_flip(&request)?;

        let session_key = request.session_key.trim();
        if session_key.is_empty() {
            return Err(DecodeError::invalid("session_key", "must not be empty"));
        }
        // Forwarded upstream as a header value.
        if !session_key.chars().all(|c| c.is_ascii_graphic()) {
            return Err(DecodeError::invalid(
                "session_key",
                "must be printable ASCII without whitespace",
            ));
        }

        let cache_key = derive_cache_key(shape_id, color.as_deref(), flip);

        Ok(Self {
            shape_id,
            color,
            flip,
            session_key: session_key.to_string(),
            cache_key,
        })
    }

    pub fn shape_id(&self) -> u64 {
        self.shape_id
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn flip(&self) -> Flip {
        self.flip
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// Only explicitly colored renders are stable enough to cache.
    pub fn has_explicit_color(&self) -> bool {
        self.color.is_some()
    }

    /// Short digest of the session key, safe to log.
    pub fn session_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.session_key.as_bytes()).to_vec();
        hex::encode(&digest[..FINGERPRINT_BYTES])
    }
}

impl fmt::Debug for ShapeMaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeMaskContext")
            .field("shape_id", &self.shape_id)
            .field("color", &self.color)
            .field("flip", &self.flip)
            .field("session", &self.session_fingerprint())
            .field("cache_key", &self.cache_key)
            .finish()
    }
}

fn parse_shape_id(repr: &ShapeIdRepr) -> Result<u64, DecodeError> {
    match repr {
        ShapeIdRepr::Number(id) => Ok(*id),
        ShapeIdRepr::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|err| DecodeError::invalid("shape_id", format!("`{text}`: {err}"))),
    }
}

fn decode_flip(request: &ShapeMaskRequest) -> Result<Flip, DecodeError> {
    let param = match request.flip.as_deref() {
        None => Flip::None,
        Some(value) => Flip::parse(value)
            .ok_or_else(|| DecodeError::invalid("flip", format!("`{value}` is not h, v or hv")))?,
    };
    Ok(Flip::from_flags(
        request.flip_horizontal || param.horizontal(),
        request.flip_vertical || param.vertical(),
    ))
}

fn normalize_color(value: &str) -> Result<String, DecodeError> {
    let trimmed = value.trim();
    let hex_digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

    if !matches!(hex_digits.len(), 6 | 8) || !hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DecodeError::invalid(
            "color",
            format!("`{value}` is not RRGGBB or RRGGBBAA hex"),
        ));
    }

    Ok(hex_digits.to_ascii_uppercase())
}

fn derive_cache_key(shape_id: u64, color: Option<&str>, flip: Flip) -> String {
    let mut key = format!("{CACHE_KEY_PREFIX}:{shape_id}");
    if let Some(color) = color {
        key.push_str(":color=");
        key.push_str(color);
    }
    if let Some(flip) = flip.as_param() {
        key.push_str(":flip=");
        key.push_str(flip);
    }
    key
}
