use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    color::ColorSpec,
    encode::Format,
    error::{GifweaveError, GifweaveResult},
    filter::{FilterName, FilterSpec, parse_filter, parse_filter_name},
    layout::Placement,
    rng::Seeds,
    sampler::SelectionOrder,
    text::OutlineSides,
};

pub const DEFAULT_DELAY_MS: u32 = 700;
pub const DEFAULT_PADDING: i32 = 20;
pub const DEFAULT_OPACITY: f32 = 0.66;
pub const DEFAULT_FONTSIZE: f32 = 60.0;
pub const DEFAULT_WRAP: usize = 35;
pub const DEFAULT_OUTLINE_WIDTH: i32 = 2;
pub const DEFAULT_SEPARATOR: &str = ";";
/// Frames rendered when neither a frame count, a frame list nor caption
/// lines pin one down.
pub const DEFAULT_FRAME_COUNT: usize = 3;

/// Unresolved configuration in its user-facing string form. Both the CLI
/// and a TOML script deserialize into this; later layers win on merge.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub words: Option<String>,
    pub wordfile: Option<PathBuf>,
    pub randomlist: Option<String>,
    pub randomfile: Option<PathBuf>,
    pub delay: Option<u32>,
    pub left: Option<i32>,
    pub right: Option<i32>,
    pub top: Option<i32>,
    pub bottom: Option<i32>,
    pub width: Option<u32>,
    pub frames: Option<usize>,
    pub format: Option<String>,
    pub separator: Option<String>,
    pub order: Option<String>,
    pub font: Option<PathBuf>,
    pub fontsize: Option<f32>,
    pub fontcolor: Option<String>,
    pub bgcolor: Option<String>,
    pub outline: Option<String>,
    pub outlinewidth: Option<i32>,
    pub opacity: Option<f32>,
    pub padding: Option<i32>,
    pub linespace: Option<i32>,
    #[serde(rename = "loop")]
    pub loop_count: Option<i32>,
    pub remake: Option<bool>,
    pub filter: Option<String>,
    pub filterlist: Option<String>,
    pub filteropts: Option<String>,
    pub framelist: Option<String>,
    pub repeatrandom: Option<bool>,
    pub repeatfilter: Option<bool>,
    pub fillwords: Option<bool>,
    pub fillgen: Option<bool>,
    pub nogrow: Option<bool>,
    pub wrap: Option<usize>,
    pub nowrap: Option<bool>,
    pub noleftoutline: Option<bool>,
    pub norightoutline: Option<bool>,
    pub notopoutline: Option<bool>,
    pub nobottomoutline: Option<bool>,
    pub descender: Option<bool>,
    pub seed: Option<u64>,
    pub frameseed: Option<u64>,
    pub wordseed: Option<u64>,
    pub filterseed: Option<u64>,
}

macro_rules! merge_fields {
    ($base:ident, $over:ident; $($field:ident),+ $(,)?) => {
        $( if $over.$field.is_some() { $base.$field = $over.$field; } )+
    };
}

impl RawConfig {
    /// Overlay `over` on top of `self`; set fields in `over` win.
    pub fn merge(mut self, over: RawConfig) -> RawConfig {
        merge_fields!(self, over;
            input, output, words, wordfile, randomlist, randomfile, delay,
            left, right, top, bottom, width, frames, format, separator,
            order, font, fontsize, fontcolor, bgcolor, outline, outlinewidth,
            opacity, padding, linespace, loop_count, remake, filter,
            filterlist, filteropts, framelist, repeatrandom, repeatfilter,
            fillwords, fillgen, nogrow, wrap, nowrap, noleftoutline,
            norightoutline, notopoutline, nobottomoutline, descender, seed,
            frameseed, wordseed, filterseed,
        );
        self
    }

    /// Load a TOML script. Dashed keys are accepted as aliases for the
    /// underscored field names.
    pub fn from_script(path: &Path) -> GifweaveResult<RawConfig> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GifweaveError::config(format!("failed to read script '{}': {e}", path.display()))
        })?;
        let table: toml::Table = toml::from_str(&text).map_err(|e| {
            GifweaveError::config(format!("failed to parse script '{}': {e}", path.display()))
        })?;

        let mut normalized = toml::Table::new();
        for (key, value) in table {
            normalized.insert(key.replace('-', "_"), value);
        }

        toml::Value::Table(normalized).try_into().map_err(|e| {
            GifweaveError::config(format!("invalid value in script '{}': {e}", path.display()))
        })
    }
}

/// The fully resolved run configuration the pipeline consumes read-only.
#[derive(Clone, Debug)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Raw caption lines, one per frame, before template expansion.
    pub words: Vec<String>,
    /// Token pool backing `[random]` draws. Empty means draws yield `""`.
    pub random_words: Vec<String>,
    pub delay: u32,
    pub frames: Option<usize>,
    pub left: Option<i32>,
    pub right: Option<i32>,
    pub top: Option<i32>,
    pub bottom: Option<i32>,
    pub width: Option<u32>,
    pub format: Format,
    pub order: SelectionOrder,
    pub font: Option<PathBuf>,
    pub fontsize: f32,
    pub fontcolor: ColorSpec,
    pub bgcolor: Option<ColorSpec>,
    pub outline: Option<ColorSpec>,
    pub outline_width: i32,
    pub outline_sides: OutlineSides,
    pub opacity: f32,
    pub padding: i32,
    pub linespace: i32,
    pub loop_count: i32,
    pub remake: bool,
    pub filter: FilterSpec,
    pub filterlist: Vec<FilterName>,
    pub filteropts: Option<Vec<FilterName>>,
    pub framelist: Vec<u32>,
    pub repeat_random: bool,
    pub repeat_filter: bool,
    pub fillwords: bool,
    pub fillgen: bool,
    pub nogrow: bool,
    pub wrap: usize,
    pub nowrap: bool,
    pub descender: bool,
    pub seeds: Seeds,
}

impl Config {
    pub fn from_raw(raw: RawConfig) -> GifweaveResult<Self> {
        let input = raw
            .input
            .ok_or_else(|| GifweaveError::config("an input video or image is required"))?;
        let output = raw
            .output
            .ok_or_else(|| GifweaveError::config("an output path or directory is required"))?;

        let separator = raw.separator.unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());

        let words = match raw.wordfile {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    GifweaveError::config(format!(
                        "failed to read word file '{}': {e}",
                        path.display()
                    ))
                })?;
                text.lines().map(str::to_string).collect()
            }
            None => raw
                .words
                .map(|w| split_caption_lines(&w, &separator))
                .unwrap_or_default(),
        };

        let random_words = match raw.randomfile {
            Some(path) => crate::words::load_word_list(&path)?,
            None => raw
                .randomlist
                .map(|l| split_caption_lines(&l, &separator))
                .unwrap_or_default(),
        };

        let format = match raw.format {
            Some(s) => Format::parse(&s)?,
            None => Format::Gif,
        };

        let order = match raw.order.as_deref() {
            None | Some("random") => SelectionOrder::Random,
            Some("normal") => SelectionOrder::Sequential,
            Some(other) => {
                return Err(GifweaveError::config(format!(
                    "unknown frame order '{other}' (expected random or normal)"
                )));
            }
        };

        let filter = match raw.filter {
            Some(s) => parse_filter(&s)?,
            None => FilterSpec::Fixed(FilterName::None),
        };
        let filterlist = parse_filter_csv(raw.filterlist.as_deref())?;
        let filteropts = match raw.filteropts.as_deref() {
            Some(s) => Some(parse_filter_csv(Some(s))?),
            None => None,
        };
        let framelist = parse_index_csv(raw.framelist.as_deref())?;

        let config = Self {
            input,
            output,
            words,
            random_words,
            delay: raw.delay.unwrap_or(DEFAULT_DELAY_MS),
            frames: raw.frames,
            left: raw.left,
            right: raw.right,
            top: raw.top,
            bottom: raw.bottom,
            width: raw.width,
            format,
            order,
            font: raw.font,
            fontsize: raw.fontsize.unwrap_or(DEFAULT_FONTSIZE),
            fontcolor: ColorSpec::parse(raw.fontcolor.as_deref().unwrap_or("255,255,255")),
            bgcolor: raw.bgcolor.as_deref().map(ColorSpec::parse),
            outline: raw.outline.as_deref().map(ColorSpec::parse),
            outline_width: raw.outlinewidth.unwrap_or(DEFAULT_OUTLINE_WIDTH),
            outline_sides: OutlineSides {
                left: !raw.noleftoutline.unwrap_or(false),
                right: !raw.norightoutline.unwrap_or(false),
                top: !raw.notopoutline.unwrap_or(false),
                bottom: !raw.nobottomoutline.unwrap_or(false),
            },
            opacity: raw.opacity.unwrap_or(DEFAULT_OPACITY),
            padding: raw.padding.unwrap_or(DEFAULT_PADDING),
            linespace: raw.linespace.unwrap_or(0),
            loop_count: raw.loop_count.unwrap_or(0),
            remake: raw.remake.unwrap_or(false),
            filter,
            filterlist,
            filteropts,
            framelist,
            repeat_random: raw.repeatrandom.unwrap_or(false),
            repeat_filter: raw.repeatfilter.unwrap_or(false),
            fillwords: raw.fillwords.unwrap_or(false),
            fillgen: raw.fillgen.unwrap_or(false),
            nogrow: raw.nogrow.unwrap_or(false),
            wrap: raw.wrap.unwrap_or(DEFAULT_WRAP),
            nowrap: raw.nowrap.unwrap_or(false),
            descender: raw.descender.unwrap_or(false),
            seeds: Seeds {
                seed: raw.seed,
                frame_seed: raw.frameseed,
                word_seed: raw.wordseed,
                filter_seed: raw.filterseed,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GifweaveResult<()> {
        if self.delay == 0 {
            return Err(GifweaveError::config("delay must be at least 1 ms"));
        }
        if !(self.fontsize > 0.0) {
            return Err(GifweaveError::config("fontsize must be positive"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(GifweaveError::config("opacity must be between 0 and 1"));
        }
        if self.wrap == 0 {
            return Err(GifweaveError::config("wrap must be at least 1"));
        }
        if self.outline_width < 1 {
            return Err(GifweaveError::config("outlinewidth must be at least 1"));
        }
        if self.padding < 0 {
            return Err(GifweaveError::config("padding must not be negative"));
        }
        if self.frames == Some(0) {
            return Err(GifweaveError::config("frames must be at least 1"));
        }
        Ok(())
    }

    /// How many frames the run produces: explicit count, then the explicit
    /// frame list, then one per expanded caption line, then the fallback.
    pub fn resolve_frame_count(&self, caption_lines: usize) -> usize {
        if let Some(n) = self.frames {
            return n;
        }
        if !self.framelist.is_empty() {
            return self.framelist.len();
        }
        if caption_lines > 0 {
            return caption_lines;
        }
        DEFAULT_FRAME_COUNT
    }

    pub fn placement(&self) -> Placement {
        Placement {
            left: self.left,
            right: self.right,
            top: self.top,
            bottom: self.bottom,
            padding: self.padding,
            linespace: self.linespace,
            descender: self.descender,
        }
    }
}

/// Split a separator-joined caption string into lines, unescaping `\n` and
/// `\t` so scripts can embed line breaks.
pub fn split_caption_lines(raw: &str, separator: &str) -> Vec<String> {
    raw.split(separator)
        .map(|part| part.trim().replace("\\n", "\n").replace("\\t", "\t"))
        .collect()
}

fn parse_filter_csv(raw: Option<&str>) -> GifweaveResult<Vec<FilterName>> {
    match raw {
        None => Ok(Vec::new()),
        Some(s) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(parse_filter_name)
            .collect(),
    }
}

fn parse_index_csv(raw: Option<&str>) -> GifweaveResult<Vec<u32>> {
    match raw {
        None => Ok(Vec::new()),
        Some(s) => s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                p.parse::<u32>().map_err(|_| {
                    GifweaveError::config(format!("invalid frame index '{p}' in framelist"))
                })
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawConfig {
        RawConfig {
            input: Some(PathBuf::from("in.mp4")),
            output: Some(PathBuf::from("out.gif")),
            ..RawConfig::default()
        }
    }

    #[test]
    fn defaults_match_the_documented_values() {
        let cfg = Config::from_raw(minimal_raw()).unwrap();
        assert_eq!(cfg.delay, 700);
        assert_eq!(cfg.padding, 20);
        assert_eq!(cfg.opacity, 0.66);
        assert_eq!(cfg.fontsize, 60.0);
        assert_eq!(cfg.wrap, 35);
        assert_eq!(cfg.outline_width, 2);
        assert_eq!(cfg.format, Format::Gif);
        assert_eq!(cfg.order, SelectionOrder::Random);
        assert_eq!(cfg.loop_count, 0);
        assert_eq!(cfg.fontcolor, ColorSpec::Rgb([255, 255, 255]));
    }

    #[test]
    fn input_and_output_are_required() {
        assert!(Config::from_raw(RawConfig::default()).is_err());
        let raw = RawConfig {
            input: Some(PathBuf::from("in.mp4")),
            ..RawConfig::default()
        };
        assert!(Config::from_raw(raw).is_err());
    }

    #[test]
    fn frame_count_fallback_chain() {
        let mut cfg = Config::from_raw(minimal_raw()).unwrap();
        assert_eq!(cfg.resolve_frame_count(0), DEFAULT_FRAME_COUNT);
        assert_eq!(cfg.resolve_frame_count(2), 2);

        cfg.framelist = vec![0, 1, 2, 3];
        assert_eq!(cfg.resolve_frame_count(2), 4);

        cfg.frames = Some(7);
        assert_eq!(cfg.resolve_frame_count(2), 7);
    }

    #[test]
    fn words_split_on_separator_with_escapes() {
        let raw = RawConfig {
            words: Some("hello world;two\\nlines".to_string()),
            ..minimal_raw()
        };
        let cfg = Config::from_raw(raw).unwrap();
        assert_eq!(cfg.words, vec!["hello world", "two\nlines"]);
    }

    #[test]
    fn custom_separator() {
        let lines = split_caption_lines("a | b | c", "|");
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn merge_prefers_the_overlay() {
        let base = RawConfig {
            delay: Some(100),
            padding: Some(5),
            ..minimal_raw()
        };
        let over = RawConfig {
            delay: Some(250),
            ..RawConfig::default()
        };
        let merged = base.merge(over);
        assert_eq!(merged.delay, Some(250));
        assert_eq!(merged.padding, Some(5));
        assert_eq!(merged.input, Some(PathBuf::from("in.mp4")));
    }

    #[test]
    fn script_accepts_dashed_keys() {
        let dir = std::env::temp_dir().join(format!("gifweave-script-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("script.toml");
        std::fs::write(&path, "loop = 2\nrepeat-filter = true\nfontsize = 48\n").unwrap();

        let raw = RawConfig::from_script(&path).unwrap();
        assert_eq!(raw.loop_count, Some(2));
        assert_eq!(raw.repeatfilter, Some(true));
        assert_eq!(raw.fontsize, Some(48.0));
    }

    #[test]
    fn bad_values_are_rejected() {
        for raw in [
            RawConfig {
                delay: Some(0),
                ..minimal_raw()
            },
            RawConfig {
                opacity: Some(1.5),
                ..minimal_raw()
            },
            RawConfig {
                order: Some("sideways".to_string()),
                ..minimal_raw()
            },
            RawConfig {
                framelist: Some("1,x,3".to_string()),
                ..minimal_raw()
            },
        ] {
            assert!(Config::from_raw(raw).is_err());
        }
    }

    #[test]
    fn outline_sides_follow_the_flags() {
        let raw = RawConfig {
            notopoutline: Some(true),
            ..minimal_raw()
        };
        let cfg = Config::from_raw(raw).unwrap();
        assert!(!cfg.outline_sides.top);
        assert!(cfg.outline_sides.left && cfg.outline_sides.right && cfg.outline_sides.bottom);
    }
}
