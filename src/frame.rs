use crate::error::{GifweaveError, GifweaveResult};

/// One decoded frame: an owned RGB8 buffer, row-major, `width * height * 3` bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 3],
        }
    }

    pub fn from_rgb8(width: u32, height: u32, data: Vec<u8>) -> GifweaveResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| GifweaveError::decode("frame buffer size overflow"))?;
        if data.len() != expected {
            return Err(GifweaveError::decode(format!(
                "frame buffer has invalid size: got {} bytes, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 3
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let i = self.offset(x, y);
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    pub fn to_image(&self) -> image::RgbImage {
        image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("RawFrame invariant: data.len() == width * height * 3")
    }

    pub fn from_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

/// Resize one frame to the target width, preserving aspect ratio.
pub fn resize_to_width(frame: &RawFrame, width: u32) -> RawFrame {
    if width == 0 || width == frame.width {
        return frame.clone();
    }
    let ratio = f64::from(frame.width) / f64::from(frame.height);
    let height = ((f64::from(width) / ratio).round() as u32).max(1);
    let resized = image::imageops::resize(
        &frame.to_image(),
        width,
        height,
        image::imageops::FilterType::Triangle,
    );
    RawFrame::from_image(resized)
}

/// The final normalization stage: resize every frame when a target width is
/// configured. `nogrow` skips the resize when it would enlarge the frames.
pub fn resize_frames(frames: Vec<RawFrame>, width: Option<u32>, nogrow: bool) -> Vec<RawFrame> {
    let Some(width) = width else {
        return frames;
    };
    if nogrow && frames.first().is_some_and(|f| width > f.width) {
        return frames;
    }
    frames
        .into_iter()
        .map(|f| resize_to_width(&f, width))
        .collect()
}
