//! Asset loading helpers: image decoding and small file utilities

use std::path::Path;
use thiserror::Error;

/// Errors raised while loading models or images
#[derive(Error, Debug)]
pub enum AssetError {
    /// Reading the file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The OBJ parser rejected the input
    #[error("OBJ load error: {0}")]
    Obj(#[from] tobj::LoadError),

    /// The image decoder rejected the input
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// The input decoded but is unusable
    #[error("Invalid asset data: {0}")]
    InvalidData(String),
}

/// Decoded RGBA8 image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Tightly packed RGBA8 pixels, row-major, top row first
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ImageData {
    /// Decode an image file (PNG or JPEG) to RGBA8
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        log::debug!("Loading image from: {:?}", path);

        let rgba = image::open(path)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!("Loaded image {}x{} from {:?}", width, height, path);

        Self::validated(rgba.into_raw(), width, height)
    }

    /// Decode an in-memory encoded image to RGBA8
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Loaded image {}x{} from memory", width, height);

        Self::validated(rgba.into_raw(), width, height)
    }

    /// Wrap raw RGBA8 pixels, checking the size
    pub fn from_rgba8(data: Vec<u8>, width: u32, height: u32) -> Result<Self, AssetError> {
        Self::validated(data, width, height)
    }

    fn validated(data: Vec<u8>, width: u32, height: u32) -> Result<Self, AssetError> {
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidData(format!("image has zero size {}x{}", width, height)));
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(AssetError::InvalidData(format!(
                "expected {} bytes for {}x{} RGBA8, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self { data, width, height })
    }

    /// Uniformly colored image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        Self {
            data: color.repeat(pixel_count),
            width,
            height,
        }
    }

    /// Two-color checkerboard with square cells of `cell` pixels
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let mut data = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let color = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                data.extend_from_slice(&color);
            }
        }
        Self {
            data,
            width: size,
            height: size,
        }
    }

    /// RGBA value at `(x, y)`
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.data[offset..offset + 4]);
        Some(pixel)
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Full mip chain length for this image
    pub fn mip_levels(&self) -> u32 {
        mip_levels(self.width, self.height)
    }
}

/// Number of levels in a full mip chain down to 1x1
pub fn mip_levels(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    32 - largest.leading_zeros()
}

/// Read a whole file into memory
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    log::trace!("Read {} bytes from {:?}", bytes.len(), path);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.width, 4);
        assert_eq!(img.height, 4);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(img.pixel(3, 3), Some([255, 0, 0, 255]));
        assert_eq!(img.pixel(4, 0), None);
    }

    #[test]
    fn test_checkerboard_alternates_cells() {
        let white = [255; 4];
        let black = [0, 0, 0, 255];
        let img = ImageData::checkerboard(8, 2, white, black);
        assert_eq!(img.pixel(0, 0), Some(white));
        assert_eq!(img.pixel(1, 1), Some(white));
        assert_eq!(img.pixel(2, 0), Some(black));
        assert_eq!(img.pixel(0, 2), Some(black));
        assert_eq!(img.pixel(2, 2), Some(white));
    }

    #[test]
    fn test_mip_levels() {
        assert_eq!(mip_levels(1, 1), 1);
        assert_eq!(mip_levels(2, 1), 2);
        assert_eq!(mip_levels(256, 256), 9);
        assert_eq!(mip_levels(300, 20), 9);
        assert_eq!(mip_levels(1024, 768), 11);
        assert_eq!(mip_levels(0, 0), 1);
    }

    #[test]
    fn test_from_rgba8_checks_size() {
        assert!(ImageData::from_rgba8(vec![0; 16], 2, 2).is_ok());
        assert!(matches!(
            ImageData::from_rgba8(vec![0; 15], 2, 2),
            Err(AssetError::InvalidData(_))
        ));
        assert!(ImageData::from_rgba8(Vec::new(), 0, 0).is_err());
    }

    #[test]
    fn test_png_round_trip_through_decoder() {
        let source = ImageData::checkerboard(4, 1, [10, 20, 30, 255], [200, 100, 50, 255]);
        let buffer = image::RgbaImage::from_raw(4, 4, source.data.clone()).unwrap();
        let mut encoded = std::io::Cursor::new(Vec::new());
        buffer.write_to(&mut encoded, image::ImageFormat::Png).unwrap();

        let decoded = ImageData::from_bytes(encoded.get_ref()).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(ImageData::from_bytes(b"not an image"), Err(AssetError::Image(_))));
    }

    #[test]
    fn test_read_missing_file() {
        assert!(matches!(read_file("definitely/not/here.bin"), Err(AssetError::Io(_))));
    }
}
