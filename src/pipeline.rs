use std::path::PathBuf;

use crate::{
    color::ColorState,
    config::Config,
    encode::{self, EncodeConfig},
    error::{GifweaveError, GifweaveResult},
    filter::{FilterEngine, apply_filter},
    frame::{RawFrame, resize_frames},
    rng::RunRngs,
    sampler::{SamplePlan, open_source, sample_frames},
    text::{CaptionStyle, FontRaster, FontdueRaster, draw_caption, find_system_font},
    words::{WordPool, apply_fill, expand_lines, wrap_lines},
};

/// Run the whole render: expand captions, sample frames, filter, draw,
/// resize and encode. Returns the path of the written file.
pub fn run(cfg: &Config) -> GifweaveResult<PathBuf> {
    let mut rngs = cfg.seeds.build();

    let (mut captions, mut word_pool) = expand_captions(cfg, &mut rngs)?;
    let frame_count = cfg.resolve_frame_count(caption_count(cfg, &captions));

    apply_fill(
        &mut captions,
        cfg.words.first().map(String::as_str),
        frame_count,
        cfg.fillwords,
        cfg.fillgen,
        &mut word_pool,
        &mut rngs.words,
    );

    let mut frames = collect_frames(cfg, frame_count, &mut rngs)?;

    // Remake mode only re-times or resizes an existing render.
    if !cfg.remake {
        frames = apply_filters(cfg, frames, &mut rngs);
        draw_captions(cfg, &mut frames, &captions, &mut rngs)?;
    }

    let frames = resize_frames(frames, cfg.width, cfg.nogrow);
    encode_output(cfg, &frames)
}

#[tracing::instrument(skip_all)]
fn expand_captions(cfg: &Config, rngs: &mut RunRngs) -> GifweaveResult<(Vec<String>, WordPool)> {
    let lines = if cfg.nowrap {
        cfg.words.clone()
    } else {
        wrap_lines(&cfg.words, cfg.wrap)
    };

    let mut pool = WordPool::new(cfg.random_words.clone(), cfg.repeat_random);
    let expanded = expand_lines(&lines, &mut pool, &mut rngs.words)?;
    tracing::debug!(lines = expanded.len(), "captions expanded");
    Ok((expanded, pool))
}

fn caption_count(cfg: &Config, captions: &[String]) -> usize {
    if cfg.words.is_empty() { 0 } else { captions.len() }
}

#[tracing::instrument(skip_all)]
fn collect_frames(
    cfg: &Config,
    frame_count: usize,
    rngs: &mut RunRngs,
) -> GifweaveResult<Vec<RawFrame>> {
    let mut source = open_source(&cfg.input)?;
    let total = source.frame_count();
    tracing::debug!(total, "source opened");

    let explicit = (!cfg.framelist.is_empty()).then_some(cfg.framelist.as_slice());
    let plan = SamplePlan::new(total, frame_count, explicit, cfg.order, cfg.remake)?;
    let frames = sample_frames(source.as_mut(), &plan, &mut rngs.frames)?;
    tracing::debug!(count = frames.len(), "frames sampled");
    Ok(frames)
}

#[tracing::instrument(skip_all)]
fn apply_filters(cfg: &Config, frames: Vec<RawFrame>, rngs: &mut RunRngs) -> Vec<RawFrame> {
    let mut engine = FilterEngine::new(
        cfg.filter,
        cfg.filterlist.clone(),
        cfg.filteropts.clone(),
        cfg.repeat_filter,
        &mut rngs.filters,
    );
    if !engine.is_active() {
        return frames;
    }

    frames
        .into_iter()
        .map(|frame| {
            let filter = engine.next(&mut rngs.filters);
            tracing::debug!(?filter, "applying filter");
            apply_filter(&frame, filter)
        })
        .collect()
}

#[tracing::instrument(skip_all)]
fn draw_captions(
    cfg: &Config,
    frames: &mut [RawFrame],
    captions: &[String],
    rngs: &mut RunRngs,
) -> GifweaveResult<()> {
    if !captions.iter().any(|c| !c.trim().is_empty()) {
        return Ok(());
    }

    let font = load_font(cfg)?;
    let style = CaptionStyle {
        font: &*font,
        fontsize: cfg.fontsize,
        placement: cfg.placement(),
        opacity: cfg.opacity,
        outline_width: cfg.outline_width,
        outline_sides: cfg.outline_sides,
    };

    let mut colors = ColorState::new(
        Some(cfg.fontcolor.clone()),
        cfg.bgcolor.clone(),
        cfg.outline.clone(),
    );

    for (i, frame) in frames.iter_mut().enumerate() {
        let Some(caption) = captions.get(i) else {
            break;
        };
        if caption.trim().is_empty() {
            continue;
        }
        let lines: Vec<String> = caption.split('\n').map(str::to_string).collect();
        draw_caption(frame, &lines, &style, &mut colors, &mut rngs.colors);
    }
    Ok(())
}

fn load_font(cfg: &Config) -> GifweaveResult<Box<dyn FontRaster>> {
    let path = match &cfg.font {
        Some(path) => path.clone(),
        None => find_system_font().ok_or_else(|| {
            GifweaveError::config("no usable font found; pass a .ttf path with the font option")
        })?,
    };
    Ok(Box::new(FontdueRaster::from_path(&path)?))
}

#[tracing::instrument(skip_all)]
fn encode_output(cfg: &Config, frames: &[RawFrame]) -> GifweaveResult<PathBuf> {
    let encode_cfg = EncodeConfig {
        output: cfg.output.clone(),
        format: cfg.format,
        delay_ms: cfg.delay,
        loop_count: cfg.loop_count,
    };
    let (path, format) = encode::resolve_output_path(&encode_cfg, &mut rand::thread_rng())?;
    encode::encode(frames, &path, format, cfg.delay, cfg.loop_count)?;
    tracing::info!(path = %path.display(), frames = frames.len(), "output written");
    Ok(path)
}
