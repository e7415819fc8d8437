//! Sampled 2D textures

use ash::vk;
use std::path::PathBuf;

use super::{FrameworkError, FrameworkResult};
use crate::app::RenderTarget;
use crate::vk_utils::{Image, ImageData, Sampler};

#[derive(Debug, Clone)]
enum TextureSource {
    File(PathBuf),
    Bytes(Vec<u8>),
    Pixels(ImageData),
}

/// Builder for [`Texture`]
///
/// Defaults: sRGB, linear filtering, repeat addressing, full mip chain.
#[derive(Debug, Clone)]
pub struct TextureBuilder {
    source: Option<TextureSource>,
    filter: vk::Filter,
    address_mode: vk::SamplerAddressMode,
    mipmaps: bool,
    srgb: bool,
}

impl Default for TextureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureBuilder {
    /// Builder with no image yet
    pub fn new() -> Self {
        Self {
            source: None,
            filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            mipmaps: true,
            srgb: true,
        }
    }

    /// Load a PNG or JPEG file at build time
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new().with_source(TextureSource::File(path.into()))
    }

    /// Decode an encoded image held in memory
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new().with_source(TextureSource::Bytes(bytes.into()))
    }

    /// Use already decoded pixels
    pub fn from_image_data(image: ImageData) -> Self {
        Self::new().with_source(TextureSource::Pixels(image))
    }

    fn with_source(mut self, source: TextureSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Magnification and minification filter
    pub fn with_filter(mut self, filter: vk::Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Addressing mode for U, V and W
    pub fn with_address_mode(mut self, address_mode: vk::SamplerAddressMode) -> Self {
        self.address_mode = address_mode;
        self
    }

    /// Generate a mip chain
    pub fn with_mipmaps(mut self, enabled: bool) -> Self {
        self.mipmaps = enabled;
        self
    }

    /// Treat pixels as sRGB color (true) or linear data such as normal maps (false)
    pub fn with_srgb(mut self, srgb: bool) -> Self {
        self.srgb = srgb;
        self
    }

    fn format(&self) -> vk::Format {
        if self.srgb {
            vk::Format::R8G8B8A8_SRGB
        } else {
            vk::Format::R8G8B8A8_UNORM
        }
    }

    fn decode(source: TextureSource) -> FrameworkResult<ImageData> {
        let image = match source {
            TextureSource::File(path) => ImageData::from_file(path)?,
            TextureSource::Bytes(bytes) => ImageData::from_bytes(&bytes)?,
            TextureSource::Pixels(image) => image,
        };
        Ok(image)
    }

    /// Decode, upload and create the sampler
    pub fn build(self, target: &RenderTarget) -> FrameworkResult<Texture> {
        let format = self.format();
        let source = self
            .source
            .ok_or_else(|| FrameworkError::InvalidInput("texture has no image source".to_string()))?;
        let pixels = Self::decode(source)?;

        let mip_levels = if self.mipmaps { pixels.mip_levels() } else { 1 };
        let image = Image::from_rgba8(
            target.context.clone(),
            pixels.width,
            pixels.height,
            &pixels.data,
            format,
            mip_levels,
        )?;
        let sampler = Sampler::new(target.context.clone(), self.filter, self.address_mode, image.mip_levels())?;

        log::debug!(
            "Texture {}x{} uploaded with {} mip levels",
            pixels.width,
            pixels.height,
            image.mip_levels()
        );

        Ok(Texture { image, sampler })
    }
}

/// GPU image with its sampler
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Image view for descriptor writes
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Size of mip level 0
    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }

    /// Number of mip levels actually created
    pub fn mip_levels(&self) -> u32 {
        self.image.mip_levels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = TextureBuilder::new();
        assert!(builder.source.is_none());
        assert_eq!(builder.filter, vk::Filter::LINEAR);
        assert_eq!(builder.address_mode, vk::SamplerAddressMode::REPEAT);
        assert!(builder.mipmaps);
        assert_eq!(builder.format(), vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn test_linear_format() {
        let builder = TextureBuilder::from_bytes(Vec::new()).with_srgb(false);
        assert_eq!(builder.format(), vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_decode_sources() {
        let pixels = ImageData::solid_color(2, 2, [1, 2, 3, 4]);
        let decoded = TextureBuilder::decode(TextureSource::Pixels(pixels.clone())).unwrap();
        assert_eq!(decoded, pixels);

        let garbage = TextureBuilder::decode(TextureSource::Bytes(b"nope".to_vec()));
        assert!(matches!(garbage, Err(FrameworkError::Asset(_))));

        let missing = TextureBuilder::decode(TextureSource::File("missing/texture.png".into()));
        assert!(missing.is_err());
    }
}
