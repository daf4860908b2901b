use std::{
    fs::File,
    io::{BufWriter, Write as _},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;
use rand::Rng;

use crate::{
    error::{GifweaveError, GifweaveResult},
    frame::RawFrame,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Gif,
    Mp4,
    Png,
    Jpg,
}

impl Format {
    pub fn parse(s: &str) -> GifweaveResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gif" => Ok(Self::Gif),
            "mp4" => Ok(Self::Mp4),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            other => Err(GifweaveError::config(format!(
                "unknown output format '{other}' (expected gif, mp4, png or jpg)"
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::parse(ext).ok()
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Gif => "gif",
            Self::Mp4 => "mp4",
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
}

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    /// Output file, or a directory that receives a randomly named file.
    pub output: PathBuf,
    /// Format used when `output` has no extension of its own.
    pub format: Format,
    pub delay_ms: u32,
    /// GIF looping: negative plays once, zero loops forever, positive is an
    /// explicit repeat count.
    pub loop_count: i32,
}

/// Resolve the final output file. A path with a known extension is used
/// as-is (its parent is created); a bare path is treated as a directory
/// that gets a random CVCVCV basename in the configured format.
pub fn resolve_output_path<R: Rng>(
    cfg: &EncodeConfig,
    rng: &mut R,
) -> GifweaveResult<(PathBuf, Format)> {
    match Format::from_path(&cfg.output) {
        Some(fmt) => {
            ensure_parent_dir(&cfg.output)?;
            Ok((cfg.output.clone(), fmt))
        }
        None => {
            std::fs::create_dir_all(&cfg.output).with_context(|| {
                format!("failed to make output directory '{}'", cfg.output.display())
            })?;
            let name = format!("{}.{}", random_slug(rng), cfg.format.extension());
            Ok((cfg.output.join(name), cfg.format))
        }
    }
}

pub fn ensure_parent_dir(path: &Path) -> GifweaveResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to make output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Pronounceable random basename: consonant-vowel pairs.
pub fn random_slug<R: Rng>(rng: &mut R) -> String {
    const CONSONANTS: &[u8] = b"bcdfghjklmnpqrstvwxyz";
    const VOWELS: &[u8] = b"aeiou";
    let mut out = String::with_capacity(6);
    for _ in 0..3 {
        out.push(CONSONANTS[rng.gen_range(0..CONSONANTS.len())] as char);
        out.push(VOWELS[rng.gen_range(0..VOWELS.len())] as char);
    }
    out
}

/// Encode the ordered frame sequence into the requested container,
/// preserving frame order.
pub fn encode(
    frames: &[RawFrame],
    path: &Path,
    format: Format,
    delay_ms: u32,
    loop_count: i32,
) -> GifweaveResult<()> {
    let Some(first) = frames.first() else {
        return Err(GifweaveError::encode("no frames to encode"));
    };

    match format {
        Format::Gif => encode_gif(frames, path, delay_ms, loop_count),
        Format::Mp4 => {
            let fps = 1000.0 / f64::from(delay_ms.max(1));
            let mut encoder = FfmpegEncoder::new(path, first.width, first.height, fps)?;
            for frame in frames {
                encoder.encode_frame(frame)?;
            }
            encoder.finish()
        }
        Format::Png | Format::Jpg => {
            let img_format = match format {
                Format::Png => image::ImageFormat::Png,
                _ => image::ImageFormat::Jpeg,
            };
            image::save_buffer_with_format(
                path,
                &first.data,
                first.width,
                first.height,
                image::ColorType::Rgb8,
                img_format,
            )
            .map_err(|e| GifweaveError::encode(format!("failed to write '{}': {e}", path.display())))
        }
    }
}

fn encode_gif(
    frames: &[RawFrame],
    path: &Path,
    delay_ms: u32,
    loop_count: i32,
) -> GifweaveResult<()> {
    use image::codecs::gif::GifEncoder;

    let file = File::create(path)
        .with_context(|| format!("create output file '{}'", path.display()))?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));

    if let Some(repeat) = gif_repeat(loop_count) {
        encoder
            .set_repeat(repeat)
            .map_err(|e| GifweaveError::encode(format!("failed to set gif loop: {e}")))?;
    }

    for frame in frames {
        let rgba = image::DynamicImage::ImageRgb8(frame.to_image()).to_rgba8();
        let delay = image::Delay::from_numer_denom_ms(delay_ms, 1);
        let gif_frame = image::Frame::from_parts(rgba, 0, 0, delay);
        encoder
            .encode_frame(gif_frame)
            .map_err(|e| GifweaveError::encode(format!("failed to encode gif frame: {e}")))?;
    }
    Ok(())
}

fn gif_repeat(loop_count: i32) -> Option<image::codecs::gif::Repeat> {
    use image::codecs::gif::Repeat;
    match loop_count {
        n if n < 0 => None,
        0 => Some(Repeat::Infinite),
        n => Some(Repeat::Finite(n.min(i32::from(u16::MAX)) as u16)),
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Streams raw RGB frames into a spawned `ffmpeg` encoding H.264/yuv420p.
pub struct FfmpegEncoder {
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegEncoder {
    pub fn new(out_path: &Path, width: u32, height: u32, fps: f64) -> GifweaveResult<Self> {
        if width == 0 || height == 0 {
            return Err(GifweaveError::encode("encode width/height must be non-zero"));
        }
        if !fps.is_finite() || fps <= 0.0 {
            return Err(GifweaveError::encode("encode fps must be positive"));
        }
        if !is_ffmpeg_on_path() {
            return Err(GifweaveError::encode(
                "ffmpeg is required for MP4 output, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{width}x{height}"),
            "-r",
            &format!("{fps:.6}"),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            // yuv420p needs even dimensions; pad rather than reject.
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-movflags",
            "+faststart",
        ])
        .arg(out_path);

        let mut child = cmd.spawn().map_err(|e| {
            GifweaveError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GifweaveError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            width,
            height,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, frame: &RawFrame) -> GifweaveResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(GifweaveError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(GifweaveError::encode("ffmpeg encoder is already finalized"));
        };

        stdin.write_all(&frame.data).map_err(|e| {
            GifweaveError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    pub fn finish(mut self) -> GifweaveResult<()> {
        drop(self.stdin.take());

        let output = self.child.wait_with_output().map_err(|e| {
            GifweaveError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GifweaveError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}
