use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::Context as _;
use rand::Rng;

use crate::{
    error::{GifweaveError, GifweaveResult},
    frame::RawFrame,
};

/// Retry budget multiplier: a sampling run may attempt up to
/// `RETRY_FACTOR * required` single-frame reads before giving up.
pub const RETRY_FACTOR: usize = 25;

/// The decode boundary. Sources are opaque; the sampler only needs a frame
/// count and random access to single frames.
pub trait FrameSource {
    fn frame_count(&self) -> u32;
    fn read_frame(&mut self, index: u32) -> GifweaveResult<RawFrame>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionOrder {
    Sequential,
    Random,
}

/// A resolved sampling plan: which indices are eligible, in what order, and
/// how many frames must come out.
#[derive(Clone, Debug)]
pub struct SamplePlan {
    pub indices: Vec<u32>,
    pub order: SelectionOrder,
    pub required: usize,
}

impl SamplePlan {
    /// Derive the plan from the configuration. Remake mode re-samples every
    /// available frame; remake mode and an explicit index list both force
    /// sequential order.
    pub fn new(
        total: u32,
        target: usize,
        explicit: Option<&[u32]>,
        order: SelectionOrder,
        remake: bool,
    ) -> GifweaveResult<Self> {
        let indices = match explicit {
            Some(list) if !list.is_empty() => {
                if let Some(&bad) = list.iter().find(|&&i| i >= total) {
                    return Err(GifweaveError::config(format!(
                        "frame index {bad} is out of range (source has {total} frames)"
                    )));
                }
                list.to_vec()
            }
            _ => (0..total).collect(),
        };

        let forced_sequential = remake || explicit.is_some_and(|l| !l.is_empty());
        let order = if forced_sequential {
            SelectionOrder::Sequential
        } else {
            order
        };

        let required = if remake { total as usize } else { target };

        Ok(Self {
            indices,
            order,
            required,
        })
    }
}

/// Collect `plan.required` frames from the source, tolerating transient
/// decode failures with a bounded retry budget. Sequential order cycles the
/// index list and does not advance past a failed read; exhausting the budget
/// short of the requirement is fatal.
pub fn sample_frames<R: Rng>(
    source: &mut dyn FrameSource,
    plan: &SamplePlan,
    rng: &mut R,
) -> GifweaveResult<Vec<RawFrame>> {
    let mut frames = Vec::with_capacity(plan.required);
    if plan.required == 0 {
        return Ok(frames);
    }
    if plan.indices.is_empty() {
        return Err(GifweaveError::config("no frame indices to sample from"));
    }

    let budget = plan.required * RETRY_FACTOR;
    let mut cursor = 0usize;

    for _ in 0..budget {
        let index = match plan.order {
            SelectionOrder::Sequential => plan.indices[cursor],
            SelectionOrder::Random => plan.indices[rng.gen_range(0..plan.indices.len())],
        };

        match source.read_frame(index) {
            Ok(frame) => {
                frames.push(frame);
                if frames.len() == plan.required {
                    return Ok(frames);
                }
                if plan.order == SelectionOrder::Sequential {
                    cursor = (cursor + 1) % plan.indices.len();
                }
            }
            Err(err) => {
                tracing::debug!(index, %err, "frame decode failed, retrying");
            }
        }
    }

    Err(GifweaveError::DecodeExhaustion {
        got: frames.len(),
        required: plan.required,
    })
}

/// A still image: every read returns the same decoded frame.
pub struct StillSource {
    frame: RawFrame,
}

impl StillSource {
    pub fn open(path: &Path) -> GifweaveResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode image '{}'", path.display()))?
            .to_rgb8();
        Ok(Self {
            frame: RawFrame::from_image(img),
        })
    }

    pub fn from_frame(frame: RawFrame) -> Self {
        Self { frame }
    }
}

impl FrameSource for StillSource {
    fn frame_count(&self) -> u32 {
        1
    }

    fn read_frame(&mut self, _index: u32) -> GifweaveResult<RawFrame> {
        Ok(self.frame.clone())
    }
}

#[derive(Clone, Debug)]
pub struct VideoProbe {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub frame_count: u32,
}

impl VideoProbe {
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }
}

/// A video file, decoded one frame at a time through the system `ffmpeg`.
pub struct VideoSource {
    probe: VideoProbe,
}

impl VideoSource {
    pub fn open(path: &Path) -> GifweaveResult<Self> {
        Ok(Self {
            probe: probe_video(path)?,
        })
    }

    pub fn probe(&self) -> &VideoProbe {
        &self.probe
    }
}

impl FrameSource for VideoSource {
    fn frame_count(&self) -> u32 {
        self.probe.frame_count
    }

    fn read_frame(&mut self, index: u32) -> GifweaveResult<RawFrame> {
        let fps = self.probe.fps();
        if fps <= 0.0 {
            return Err(GifweaveError::decode("video has an invalid frame rate"));
        }
        let time_sec = f64::from(index) / fps;

        let out = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{time_sec:.9}")])
            .arg("-i")
            .arg(&self.probe.path)
            .args([
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "pipe:1",
            ])
            .output()
            .map_err(|e| GifweaveError::decode(format!("failed to run ffmpeg: {e}")))?;

        if !out.status.success() {
            return Err(GifweaveError::decode(format!(
                "ffmpeg failed to decode frame {index} of '{}': {}",
                self.probe.path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let expected = self.probe.width as usize * self.probe.height as usize * 3;
        if out.stdout.len() < expected {
            return Err(GifweaveError::decode(format!(
                "short decode for frame {index}: got {} bytes, expected {expected}",
                out.stdout.len()
            )));
        }

        RawFrame::from_rgb8(
            self.probe.width,
            self.probe.height,
            out.stdout[..expected].to_vec(),
        )
    }
}

pub fn probe_video(path: &Path) -> GifweaveResult<VideoProbe> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
        nb_frames: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| GifweaveError::decode(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(GifweaveError::decode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| GifweaveError::decode(format!("ffprobe json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| GifweaveError::decode("no video stream found"))?;

    let width = video
        .width
        .ok_or_else(|| GifweaveError::decode("missing video width from ffprobe"))?;
    let height = video
        .height
        .ok_or_else(|| GifweaveError::decode("missing video height from ffprobe"))?;
    let (fps_num, fps_den) = parse_ratio(video.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| GifweaveError::decode("invalid video r_frame_rate"))?;

    let frame_count = match video.nb_frames.as_deref().and_then(|s| s.parse::<u32>().ok()) {
        Some(n) if n > 0 => n,
        _ => {
            // Some containers omit nb_frames; estimate from duration.
            let duration = parsed
                .format
                .as_ref()
                .and_then(|f| f.duration.as_ref())
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(0.0);
            let fps = if fps_den == 0 {
                0.0
            } else {
                f64::from(fps_num) / f64::from(fps_den)
            };
            (duration * fps).floor() as u32
        }
    };

    if frame_count == 0 {
        return Err(GifweaveError::decode(format!(
            "'{}' has no decodable frames",
            path.display()
        )));
    }

    Ok(VideoProbe {
        path: path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        frame_count,
    })
}

fn parse_ratio(s: &str) -> Option<(u32, u32)> {
    let (a, b) = s.split_once('/')?;
    let a = a.parse::<u32>().ok()?;
    let b = b.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

/// Route a source path to the right decoder by extension.
pub fn open_source(path: &Path) -> GifweaveResult<Box<dyn FrameSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" | "png" => Ok(Box::new(StillSource::open(path)?)),
        _ => Ok(Box::new(VideoSource::open(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    /// Records which indices were read; fails the first `fail_first`
    /// attempts, then succeeds.
    struct ScriptedSource {
        total: u32,
        fail_first: usize,
        attempts: usize,
        reads: Vec<u32>,
    }

    impl ScriptedSource {
        fn new(total: u32, fail_first: usize) -> Self {
            Self {
                total,
                fail_first,
                attempts: 0,
                reads: Vec::new(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn frame_count(&self) -> u32 {
            self.total
        }

        fn read_frame(&mut self, index: u32) -> GifweaveResult<RawFrame> {
            self.attempts += 1;
            if self.attempts <= self.fail_first {
                return Err(GifweaveError::decode("flaky"));
            }
            self.reads.push(index);
            Ok(RawFrame::new(2, 2))
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(5)
    }

    #[test]
    fn sequential_cycles_the_index_list() {
        let plan = SamplePlan::new(3, 5, None, SelectionOrder::Sequential, false).unwrap();
        let mut source = ScriptedSource::new(3, 0);
        let frames = sample_frames(&mut source, &plan, &mut rng()).unwrap();
        assert_eq!(frames.len(), 5);
        assert_eq!(source.reads, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn sequential_retries_without_advancing() {
        let plan = SamplePlan::new(3, 2, None, SelectionOrder::Sequential, false).unwrap();
        let mut source = ScriptedSource::new(3, 3);
        sample_frames(&mut source, &plan, &mut rng()).unwrap();
        // Three failed attempts all target index 0 before it succeeds.
        assert_eq!(source.reads, vec![0, 1]);
        assert_eq!(source.attempts, 5);
    }

    #[test]
    fn exhaustion_after_exact_budget_with_zero_frames() {
        let plan = SamplePlan::new(3, 4, None, SelectionOrder::Sequential, false).unwrap();
        let mut source = ScriptedSource::new(3, usize::MAX);
        let err = sample_frames(&mut source, &plan, &mut rng()).unwrap_err();
        assert_eq!(source.attempts, RETRY_FACTOR * 4);
        match err {
            GifweaveError::DecodeExhaustion { got, required } => {
                assert_eq!(got, 0);
                assert_eq!(required, 4);
            }
            other => panic!("expected DecodeExhaustion, got {other}"),
        }
    }

    #[test]
    fn random_order_stays_inside_the_index_list() {
        let plan = SamplePlan::new(10, 8, Some(&[2, 4, 6]), SelectionOrder::Random, false).unwrap();
        // Explicit list forces sequential; build a random plan manually.
        assert_eq!(plan.order, SelectionOrder::Sequential);

        let plan = SamplePlan {
            indices: vec![2, 4, 6],
            order: SelectionOrder::Random,
            required: 8,
        };
        let mut source = ScriptedSource::new(10, 0);
        sample_frames(&mut source, &plan, &mut rng()).unwrap();
        assert!(source.reads.iter().all(|i| [2, 4, 6].contains(i)));
    }

    #[test]
    fn remake_samples_every_frame_sequentially() {
        let plan = SamplePlan::new(4, 1, None, SelectionOrder::Random, true).unwrap();
        assert_eq!(plan.order, SelectionOrder::Sequential);
        assert_eq!(plan.required, 4);
        assert_eq!(plan.indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn plan_rejects_out_of_range_explicit_index() {
        let err = SamplePlan::new(3, 2, Some(&[5]), SelectionOrder::Sequential, false).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn still_source_reads_are_identical() {
        let mut frame = RawFrame::new(2, 2);
        frame.set_pixel(1, 1, [1, 2, 3]);
        let mut source = StillSource::from_frame(frame.clone());
        for i in 0..4 {
            assert_eq!(source.read_frame(i).unwrap(), frame);
        }
    }

    #[test]
    fn zero_required_yields_no_frames() {
        let plan = SamplePlan::new(3, 0, None, SelectionOrder::Sequential, false).unwrap();
        let mut source = ScriptedSource::new(3, 0);
        let frames = sample_frames(&mut source, &plan, &mut rng()).unwrap();
        assert!(frames.is_empty());
        assert_eq!(source.attempts, 0);
    }
}
