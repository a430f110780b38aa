//! Decoder capability registry.
//!
//! Which source containers can be opened depends on how the binary was
//! built: TIFF, PNG, JPEG and WebP are always compiled in through the
//! `image` crate, HEIC only with the `heif` feature (libheif). The registry
//! is filled once by [`init`] and is read-only afterwards; backends hold a
//! `&'static` reference to it.

use super::format::SourceFormat;
use std::sync::OnceLock;

/// Upload extensions and the container each one is expected to hold.
const EXTENSION_CANDIDATES: &[(&str, SourceFormat)] = &[
    ("tif", SourceFormat::Tiff),
    ("tiff", SourceFormat::Tiff),
    ("png", SourceFormat::Png),
    ("jpg", SourceFormat::Jpeg),
    ("jpeg", SourceFormat::Jpeg),
    ("heic", SourceFormat::Heic),
    ("heif", SourceFormat::Heic),
    ("webp", SourceFormat::WebP),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecRegistry {
    formats: Vec<SourceFormat>,
}

impl CodecRegistry {
    /// Registry for the decoders compiled into this build.
    pub fn builtin() -> Self {
        let mut formats = vec![
            SourceFormat::Tiff,
            SourceFormat::Png,
            SourceFormat::Jpeg,
            SourceFormat::WebP,
        ];
        if cfg!(feature = "heif") {
            formats.push(SourceFormat::Heic);
        }
        Self { formats }
    }

    /// Registry limited to `formats`.
    pub fn with_formats(formats: &[SourceFormat]) -> Self {
        Self {
            formats: formats.to_vec(),
        }
    }

    pub fn supports(&self, format: SourceFormat) -> bool {
        self.formats.contains(&format)
    }

    pub fn formats(&self) -> &[SourceFormat] {
        &self.formats
    }

    /// Extensions accepted at upload time.
    ///
    /// HEIC extensions are accepted even without a decoder, so such uploads
    /// fail validation with a message naming the missing decoder instead of
    /// an extension error.
    pub fn upload_extensions(&self) -> Vec<&'static str> {
        EXTENSION_CANDIDATES
            .iter()
            .filter(|(_, format)| self.supports(*format) || *format == SourceFormat::Heic)
            .map(|(ext, _)| *ext)
            .collect()
    }
}

static REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();

/// Register the compiled-in decoders. Idempotent; call once at startup.
pub fn init() -> &'static CodecRegistry {
    REGISTRY.get_or_init(|| {
        let registry = CodecRegistry::builtin();
        tracing::debug!(formats = ?registry.formats(), "Codec registry initialized");
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_raster_formats() {
        let registry = CodecRegistry::builtin();
        for format in [
            SourceFormat::Tiff,
            SourceFormat::Png,
            SourceFormat::Jpeg,
            SourceFormat::WebP,
        ] {
            assert!(registry.supports(format), "{format}");
        }
        assert_eq!(registry.supports(SourceFormat::Heic), cfg!(feature = "heif"));
    }

    #[test]
    fn init_returns_the_same_registry() {
        let a = init();
        let b = init();
        assert!(std::ptr::eq(a, b));
    }

    #[test]
    fn upload_extensions_include_heic() {
        let registry = CodecRegistry::with_formats(&[SourceFormat::Png]);
        let exts = registry.upload_extensions();
        assert_eq!(exts, vec!["png", "heic", "heif"]);
    }

    #[test]
    fn upload_extensions_for_builtin() {
        let exts = CodecRegistry::builtin().upload_extensions();
        for expected in ["tif", "tiff", "png", "jpg", "jpeg", "heic", "heif", "webp"] {
            assert!(exts.contains(&expected), "missing {expected}");
        }
    }
}
