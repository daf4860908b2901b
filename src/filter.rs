use std::collections::VecDeque;

use rand::Rng;

use crate::{
    error::{GifweaveError, GifweaveResult},
    frame::RawFrame,
    rng::RandomPool,
};

pub const HUE_MIN: u8 = 1;
pub const HUE_MAX: u8 = 8;
/// Hue rotation per bucket, in OpenCV's halved-degree hue space (0..180).
pub const HUE_STEP: f32 = 20.0;

// Matches a 45x45 Gaussian kernel with automatic sigma.
const BLUR_RADIUS: u32 = 22;
const BLUR_SIGMA: f32 = 7.1;

/// A concrete, directly applicable filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterName {
    Hue(u8),
    Gray,
    Blur,
    Invert,
    Saturate,
    None,
}

/// The configured filter policy. `AnyHue*` draws a uniform hue bucket;
/// `Random*` draws from the allowed-filter pool; `Once` variants resolve a
/// single filter for the whole run, the others resolve per frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterSpec {
    Fixed(FilterName),
    AnyHueOnce,
    AnyHuePerFrame,
    RandomOnce,
    RandomPerFrame,
}

pub fn parse_filter(s: &str) -> GifweaveResult<FilterSpec> {
    match s {
        "anyhue" => Ok(FilterSpec::AnyHueOnce),
        "anyhue2" => Ok(FilterSpec::AnyHuePerFrame),
        "random" => Ok(FilterSpec::RandomOnce),
        "random2" => Ok(FilterSpec::RandomPerFrame),
        other => Ok(FilterSpec::Fixed(parse_filter_name(other)?)),
    }
}

pub fn parse_filter_name(s: &str) -> GifweaveResult<FilterName> {
    if let Some(n) = s.strip_prefix("hue") {
        let n = n
            .parse::<u8>()
            .ok()
            .filter(|&n| (HUE_MIN..=HUE_MAX).contains(&n))
            .ok_or_else(|| {
                GifweaveError::config(format!(
                    "hue filter must be hue{HUE_MIN}..hue{HUE_MAX}, got '{s}'"
                ))
            })?;
        return Ok(FilterName::Hue(n));
    }
    match s {
        "gray" => Ok(FilterName::Gray),
        "blur" => Ok(FilterName::Blur),
        "invert" => Ok(FilterName::Invert),
        "saturate" => Ok(FilterName::Saturate),
        "none" => Ok(FilterName::None),
        other => Err(GifweaveError::config(format!("unknown filter '{other}'"))),
    }
}

/// The full canonical filter set: 8 hue buckets plus the named transforms
/// and identity.
pub fn default_allowed() -> Vec<FilterName> {
    let mut all: Vec<FilterName> = (HUE_MIN..=HUE_MAX).map(FilterName::Hue).collect();
    all.extend([
        FilterName::Gray,
        FilterName::Blur,
        FilterName::Invert,
        FilterName::Saturate,
        FilterName::None,
    ]);
    all
}

/// Per-frame filter chooser. An explicit per-frame list is authoritative
/// and consumed front-to-back; otherwise the policy resolves once or per
/// frame, with random draws cycling the allowed-filter pool.
pub struct FilterEngine {
    policy: FilterSpec,
    explicit: VecDeque<FilterName>,
    pool: RandomPool<FilterName>,
    resolved: FilterName,
}

impl FilterEngine {
    pub fn new<R: Rng>(
        policy: FilterSpec,
        explicit: Vec<FilterName>,
        allowed: Option<Vec<FilterName>>,
        repeat_filter: bool,
        rng: &mut R,
    ) -> Self {
        let mut pool = RandomPool::new(allowed.unwrap_or_else(default_allowed), repeat_filter);

        let resolved = if explicit.is_empty() {
            match policy {
                FilterSpec::Fixed(f) => f,
                FilterSpec::AnyHueOnce => random_hue(rng),
                FilterSpec::RandomOnce => pool.draw(rng).unwrap_or(FilterName::None),
                FilterSpec::AnyHuePerFrame | FilterSpec::RandomPerFrame => FilterName::None,
            }
        } else {
            match policy {
                FilterSpec::Fixed(f) => f,
                _ => FilterName::None,
            }
        };

        Self {
            policy,
            explicit: explicit.into(),
            pool,
            resolved,
        }
    }

    /// False when the whole stage is a no-op (fixed identity, no list).
    pub fn is_active(&self) -> bool {
        !(self.explicit.is_empty() && self.policy == FilterSpec::Fixed(FilterName::None))
    }

    pub fn next<R: Rng>(&mut self, rng: &mut R) -> FilterName {
        if let Some(f) = self.explicit.pop_front() {
            return f;
        }
        match self.policy {
            FilterSpec::AnyHuePerFrame => random_hue(rng),
            FilterSpec::RandomPerFrame => self.pool.draw(rng).unwrap_or(FilterName::None),
            _ => self.resolved,
        }
    }
}

fn random_hue<R: Rng>(rng: &mut R) -> FilterName {
    FilterName::Hue(rng.gen_range(HUE_MIN..=HUE_MAX))
}

pub fn apply_filter(frame: &RawFrame, filter: FilterName) -> RawFrame {
    match filter {
        FilterName::Hue(n) => map_hsv(frame, |h, s, v| {
            ((h + HUE_STEP * f32::from(n)) % 180.0, s, v)
        }),
        FilterName::Gray => {
            let mut out = frame.clone();
            for px in out.data.chunks_exact_mut(3) {
                let luma = (0.299 * f32::from(px[0])
                    + 0.587 * f32::from(px[1])
                    + 0.114 * f32::from(px[2]))
                .round() as u8;
                px.fill(luma);
            }
            out
        }
        FilterName::Blur => blur_rgb(frame, BLUR_RADIUS, BLUR_SIGMA),
        FilterName::Invert => {
            let mut out = frame.clone();
            for b in &mut out.data {
                *b = !*b;
            }
            out
        }
        FilterName::Saturate => map_hsv(frame, |_, s, _| (0.0, s, 1.0)),
        FilterName::None => frame.clone(),
    }
}

fn map_hsv(frame: &RawFrame, f: impl Fn(f32, f32, f32) -> (f32, f32, f32)) -> RawFrame {
    let mut out = frame.clone();
    for px in out.data.chunks_exact_mut(3) {
        let (h, s, v) = rgb_to_hsv([px[0], px[1], px[2]]);
        let (h, s, v) = f(h, s, v);
        px.copy_from_slice(&hsv_to_rgb(h, s, v));
    }
    out
}

/// RGB to HSV with hue in OpenCV's 0..180 halved-degree range; s and v are
/// 0..1.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> (f32, f32, f32) {
    let r = f32::from(rgb[0]) / 255.0;
    let g = f32::from(rgb[1]) / 255.0;
    let b = f32::from(rgb[2]) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max == 0.0 { 0.0 } else { delta / max };
    (hue_deg / 2.0, s, max)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let h_deg = (h * 2.0).rem_euclid(360.0);
    let c = v * s;
    let x = c * (1.0 - ((h_deg / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match (h_deg / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [
        ((r + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((g + m) * 255.0).round().clamp(0.0, 255.0) as u8,
        ((b + m) * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

fn blur_rgb(frame: &RawFrame, radius: u32, sigma: f32) -> RawFrame {
    let kernel = gaussian_kernel_q16(radius, sigma);
    let mut tmp = vec![0u8; frame.data.len()];
    let mut out = frame.clone();

    horizontal_pass(&frame.data, &mut tmp, frame.width, frame.height, &kernel);
    vertical_pass(&tmp, &mut out.data, frame.width, frame.height, &kernel);
    out
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> Vec<u32> {
    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;

    let mut weights_f = Vec::<f64>::with_capacity((2 * r + 1) as usize);
    let mut sum = 0.0f64;
    for i in -r..=r {
        let x = f64::from(i);
        let w = (-x * x / denom).exp();
        weights_f.push(w);
        sum += w;
    }

    let mut weights = Vec::<u32>::with_capacity(weights_f.len());
    let mut acc: i64 = 0;
    for &wf in &weights_f {
        let q = ((wf / sum) * 65536.0).round() as i64;
        let q = q.clamp(0, 65536);
        weights.push(q as u32);
        acc += q;
    }
    // Push rounding error into the center tap so the kernel sums to one.
    let delta = 65536 - acc;
    if delta != 0 {
        let mid = weights.len() / 2;
        let fixed = (i64::from(weights[mid]) + delta).clamp(0, 65536);
        weights[mid] = fixed as u32;
    }
    weights
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 3];
            for (ki, &kw) in k.iter().enumerate() {
                let dx = ki as i32 - radius;
                let sx = (x + dx).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 3;
                for c in 0..3 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 3;
            for c in 0..3 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 3];
            for (ki, &kw) in k.iter().enumerate() {
                let dy = ki as i32 - radius;
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 3;
                for c in 0..3 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 3;
            for c in 0..3 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    let v = (acc + 32768) >> 16;
    v.min(255) as u8
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn solid(rgb: [u8; 3]) -> RawFrame {
        let mut f = RawFrame::new(4, 4);
        for px in f.data.chunks_exact_mut(3) {
            px.copy_from_slice(&rgb);
        }
        f
    }

    fn close(a: &RawFrame, b: &RawFrame, tol: i32) -> bool {
        a.data
            .iter()
            .zip(&b.data)
            .all(|(&x, &y)| (i32::from(x) - i32::from(y)).abs() <= tol)
    }

    #[test]
    fn parse_covers_all_names() {
        assert_eq!(parse_filter("hue3").unwrap(), FilterSpec::Fixed(FilterName::Hue(3)));
        assert_eq!(parse_filter("anyhue").unwrap(), FilterSpec::AnyHueOnce);
        assert_eq!(parse_filter("anyhue2").unwrap(), FilterSpec::AnyHuePerFrame);
        assert_eq!(parse_filter("random").unwrap(), FilterSpec::RandomOnce);
        assert_eq!(parse_filter("random2").unwrap(), FilterSpec::RandomPerFrame);
        assert_eq!(parse_filter("none").unwrap(), FilterSpec::Fixed(FilterName::None));
        assert!(parse_filter("hue9").is_err());
        assert!(parse_filter("sepia").is_err());
    }

    #[test]
    fn complementary_hue_buckets_cancel() {
        // 20*3 + 20*6 = 180, a full cycle in the halved-degree hue space.
        let src = solid([200, 60, 30]);
        let rotated = apply_filter(&apply_filter(&src, FilterName::Hue(3)), FilterName::Hue(6));
        assert!(close(&src, &rotated, 8));
    }

    #[test]
    fn invert_is_an_involution() {
        let src = solid([12, 200, 99]);
        let twice = apply_filter(&apply_filter(&src, FilterName::Invert), FilterName::Invert);
        assert_eq!(src, twice);
    }

    #[test]
    fn gray_equalizes_channels() {
        let out = apply_filter(&solid([10, 200, 90]), FilterName::Gray);
        for px in out.data.chunks_exact(3) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }

    #[test]
    fn saturate_maxes_value() {
        let out = apply_filter(&solid([80, 40, 20]), FilterName::Saturate);
        for px in out.data.chunks_exact(3) {
            assert_eq!(*px.iter().max().unwrap(), 255);
        }
    }

    #[test]
    fn identity_is_a_copy() {
        let src = solid([1, 2, 3]);
        assert_eq!(apply_filter(&src, FilterName::None), src);
    }

    #[test]
    fn blur_keeps_constant_image() {
        let src = solid([17, 34, 51]);
        let out = apply_filter(&src, FilterName::Blur);
        assert!(close(&src, &out, 1));
    }

    #[test]
    fn explicit_list_outranks_policy() {
        let mut engine = FilterEngine::new(
            FilterSpec::RandomPerFrame,
            vec![FilterName::Gray, FilterName::Blur],
            None,
            false,
            &mut rng(),
        );
        let mut r = rng();
        assert_eq!(engine.next(&mut r), FilterName::Gray);
        assert_eq!(engine.next(&mut r), FilterName::Blur);
    }

    #[test]
    fn random_once_is_stable_across_frames() {
        let mut r = rng();
        let mut engine = FilterEngine::new(FilterSpec::RandomOnce, vec![], None, false, &mut r);
        let first = engine.next(&mut r);
        for _ in 0..5 {
            assert_eq!(engine.next(&mut r), first);
        }
    }

    #[test]
    fn random_per_frame_does_not_repeat_within_a_cycle() {
        let mut r = rng();
        let allowed = vec![FilterName::Gray, FilterName::Invert, FilterName::Blur];
        let mut engine =
            FilterEngine::new(FilterSpec::RandomPerFrame, vec![], Some(allowed.clone()), false, &mut r);
        let mut cycle = vec![engine.next(&mut r), engine.next(&mut r), engine.next(&mut r)];
        cycle.sort_by_key(|f| format!("{f:?}"));
        let mut expected = allowed;
        expected.sort_by_key(|f| format!("{f:?}"));
        assert_eq!(cycle, expected);
    }

    #[test]
    fn any_hue_draws_stay_in_range() {
        let mut r = rng();
        let mut engine = FilterEngine::new(FilterSpec::AnyHuePerFrame, vec![], None, false, &mut r);
        for _ in 0..30 {
            match engine.next(&mut r) {
                FilterName::Hue(n) => assert!((HUE_MIN..=HUE_MAX).contains(&n)),
                other => panic!("expected a hue bucket, got {other:?}"),
            }
        }
    }

    #[test]
    fn fixed_identity_without_list_is_inactive() {
        let mut r = rng();
        let engine =
            FilterEngine::new(FilterSpec::Fixed(FilterName::None), vec![], None, false, &mut r);
        assert!(!engine.is_active());

        let engine = FilterEngine::new(
            FilterSpec::Fixed(FilterName::None),
            vec![FilterName::Gray],
            None,
            false,
            &mut r,
        );
        assert!(engine.is_active());
    }
}
