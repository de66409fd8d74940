//! # Resources
//!
//! A resource is one file from an archive, decoded ("doctored") into the form
//! the engine consumes and then frozen. The cache hands out `Arc<Resource>`;
//! nothing outside the cache can mutate or free the payload, and a handle
//! keeps its payload alive even after the archive is freed.

use bulletrain_core::{extension, sid, sid_str, NameKey, Sid};

/// What kind of asset a resource is, inferred from its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// PNG image (GUI graphics, sprite sheets).
    Image,
    /// Raw in-game texture data (`.bin`).
    Texture,
    /// MIDI music.
    Midi,
    /// Ogg sound.
    Sound,
    /// Lua script.
    Script,
    /// Plain text.
    String,
    /// Level tile data.
    Map,
    /// Anything else; the caller is expected to know.
    Other,
}

const PNG_HASH: Sid = sid(b".png");
const BIN_HASH: Sid = sid(b".bin");
const MID_HASH: Sid = sid(b".mid");
const OGG_HASH: Sid = sid(b".ogg");
const LUA_HASH: Sid = sid(b".lua");
const TXT_HASH: Sid = sid(b".txt");
const MAP_HASH: Sid = sid(b".map");

/// Precomputed extension hashes. The string is kept to confirm a hash match.
const EXTENSIONS: [(Sid, &str, ResourceType); 7] = [
    (PNG_HASH, ".png", ResourceType::Image),
    (BIN_HASH, ".bin", ResourceType::Texture),
    (MID_HASH, ".mid", ResourceType::Midi),
    (OGG_HASH, ".ogg", ResourceType::Sound),
    (LUA_HASH, ".lua", ResourceType::Script),
    (TXT_HASH, ".txt", ResourceType::String),
    (MAP_HASH, ".map", ResourceType::Map),
];

impl ResourceType {
    /// Infers the type from the extension of `name`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let ext = extension(name);
        let hash = sid_str(ext);
        EXTENSIONS
            .iter()
            .find(|(h, e, _)| *h == hash && *e == ext)
            .map_or(Self::Other, |(_, _, kind)| *kind)
    }
}

/// PNG file signature.
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// A PNG whose header has been validated.
///
/// Pixel decoding belongs to the renderer; the cache keeps the encoded bytes
/// and the dimensions read from the IHDR chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// The encoded file.
    pub encoded: Box<[u8]>,
}

impl ImageData {
    /// Reads the dimensions from a PNG's IHDR chunk.
    ///
    /// Returns `None` if `bytes` is not a PNG.
    #[must_use]
    pub fn from_png(bytes: &[u8]) -> Option<(u32, u32)> {
        if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
            return None;
        }
        let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        Some((width, height))
    }
}

/// Decoded payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceData {
    /// A validated image.
    Image(ImageData),
    /// UTF-8 text (strings and scripts).
    Text(String),
    /// Anything kept as raw bytes.
    Bytes(Box<[u8]>),
}

/// One loaded file.
#[derive(Debug)]
pub struct Resource {
    key: NameKey,
    kind: ResourceType,
    size: usize,
    data: ResourceData,
}

impl Resource {
    /// Doctors raw file bytes into their in-memory form.
    ///
    /// Images get their header validated and text gets decoded. When a file
    /// does not match its extension the raw bytes are kept and a warning is
    /// logged; the type tag still reflects the extension.
    #[must_use]
    pub fn doctor(key: NameKey, kind: ResourceType, raw: Vec<u8>) -> Self {
        let size = raw.len();
        let data = match kind {
            ResourceType::Image => match ImageData::from_png(&raw) {
                Some((width, height)) => ResourceData::Image(ImageData {
                    width,
                    height,
                    encoded: raw.into_boxed_slice(),
                }),
                None => {
                    tracing::warn!(resource = %key, "Image is not a PNG, keeping raw bytes");
                    ResourceData::Bytes(raw.into_boxed_slice())
                }
            },
            ResourceType::String | ResourceType::Script => match String::from_utf8(raw) {
                Ok(text) => ResourceData::Text(text),
                Err(err) => {
                    tracing::warn!(resource = %key, "Text is not UTF-8, keeping raw bytes");
                    ResourceData::Bytes(err.into_bytes().into_boxed_slice())
                }
            },
            ResourceType::Texture
            | ResourceType::Midi
            | ResourceType::Sound
            | ResourceType::Map
            | ResourceType::Other => ResourceData::Bytes(raw.into_boxed_slice()),
        };
        Self {
            key,
            kind,
            size,
            data,
        }
    }

    /// The (SID, name) key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &NameKey {
        &self.key
    }

    /// The stored name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// The identifier.
    #[inline]
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.key.sid()
    }

    /// Type inferred from the extension.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceType {
        self.kind
    }

    /// Size of the file in the archive, in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The decoded payload.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &ResourceData {
        &self.data
    }

    /// The file's bytes, whatever the payload form.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            ResourceData::Image(image) => &image.encoded,
            ResourceData::Text(text) => text.as_bytes(),
            ResourceData::Bytes(bytes) => bytes,
        }
    }

    /// Text payload, if this resource decoded as text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            ResourceData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Image payload, if this resource decoded as an image.
    #[must_use]
    pub fn as_image(&self) -> Option<&ImageData> {
        match &self.data {
            ResourceData::Image(image) => Some(image),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut png = PNG_SIGNATURE.to_vec();
    png.extend_from_slice(&13u32.to_be_bytes());
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&width.to_be_bytes());
    png.extend_from_slice(&height.to_be_bytes());
    png.extend_from_slice(&[8, 6, 0, 0, 0]);
    png
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_extension() {
        assert_eq!(ResourceType::from_name("b.png"), ResourceType::Image);
        assert_eq!(ResourceType::from_name("tex.bin"), ResourceType::Texture);
        assert_eq!(ResourceType::from_name("theme.mid"), ResourceType::Midi);
        assert_eq!(ResourceType::from_name("boom.ogg"), ResourceType::Sound);
        assert_eq!(ResourceType::from_name("boss.lua"), ResourceType::Script);
        assert_eq!(ResourceType::from_name("a.txt"), ResourceType::String);
        assert_eq!(ResourceType::from_name("lvl1.map"), ResourceType::Map);
        assert_eq!(ResourceType::from_name("notes.md"), ResourceType::Other);
        assert_eq!(ResourceType::from_name("Makefile"), ResourceType::Other);
        // Case matters, as in the archive format
        assert_eq!(ResourceType::from_name("B.PNG"), ResourceType::Other);
    }

    #[test]
    fn test_doctor_text() {
        let res = Resource::doctor(
            NameKey::new("a.txt"),
            ResourceType::String,
            b"hello\n".to_vec(),
        );
        assert_eq!(res.as_text(), Some("hello\n"));
        assert_eq!(res.size(), 6);
        assert_eq!(res.bytes(), b"hello\n");
    }

    #[test]
    fn test_doctor_png() {
        let png = png_header(32, 16);
        let res = Resource::doctor(NameKey::new("b.png"), ResourceType::Image, png.clone());
        let image = res.as_image().unwrap();
        assert_eq!((image.width, image.height), (32, 16));
        assert_eq!(res.bytes(), png.as_slice());
        assert_eq!(res.size(), png.len());
    }

    #[test]
    fn test_doctor_falls_back_to_bytes() {
        let res = Resource::doctor(
            NameKey::new("b.png"),
            ResourceType::Image,
            b"not a png".to_vec(),
        );
        assert_eq!(res.kind(), ResourceType::Image);
        assert!(res.as_image().is_none());
        assert_eq!(res.bytes(), b"not a png");

        let res = Resource::doctor(
            NameKey::new("bad.txt"),
            ResourceType::String,
            vec![0xff, 0xfe],
        );
        assert!(res.as_text().is_none());
        assert_eq!(res.size(), 2);
    }
}
