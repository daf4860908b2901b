use rand::Rng;

use crate::filter::hsv_to_rgb;

/// Fallback for unresolvable symbolic or named colors.
pub const NEUTRAL_GRAY: [u8; 3] = [100, 100, 100];

const RANDOM_SATURATION: f32 = 0.8;
const LIGHT_VALUE: f32 = 0.8;
const DARK_VALUE: f32 = 0.2;

/// A configured color: explicit RGB, or a symbolic/named value resolved at
/// draw time (`light`, `dark2`, `font`, `darkfont`, `yellow`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorSpec {
    Rgb([u8; 3]),
    Named(String),
}

impl ColorSpec {
    /// Parse "R,G,B" or a color name.
    pub fn parse(s: &str) -> Self {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() == 3 {
            let nums: Vec<Option<u8>> = parts.iter().map(|p| p.parse::<u8>().ok()).collect();
            if let [Some(r), Some(g), Some(b)] = nums[..] {
                return Self::Rgb([r, g, b]);
            }
        }
        Self::Named(s.trim().to_ascii_lowercase())
    }
}

/// Which slots get a freshly resolved color persisted back. `font` also
/// records the result as the last font color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSlot {
    Font,
    Background,
    Outline,
}

/// Cross-frame color state: the effective (possibly resolved-in-place)
/// specs plus the last resolved font color. Threaded through the compositor
/// as an accumulator so the pipeline stays reentrant.
#[derive(Clone, Debug, Default)]
pub struct ColorState {
    pub fontcolor: Option<ColorSpec>,
    pub bgcolor: Option<ColorSpec>,
    pub outline: Option<ColorSpec>,
    pub last_fontcolor: Option<[u8; 3]>,
}

impl ColorState {
    pub fn new(
        fontcolor: Option<ColorSpec>,
        bgcolor: Option<ColorSpec>,
        outline: Option<ColorSpec>,
    ) -> Self {
        Self {
            fontcolor,
            bgcolor,
            outline,
            last_fontcolor: None,
        }
    }

    /// Resolve one slot to RGB. Symbolic non-"2" variants persist their
    /// resolved value into the slot so later captions reuse it; "2"
    /// variants re-roll every time.
    pub fn resolve<R: Rng>(&mut self, slot: ColorSlot, rng: &mut R) -> Option<[u8; 3]> {
        let spec = match slot {
            ColorSlot::Font => self.fontcolor.clone(),
            ColorSlot::Background => self.bgcolor.clone(),
            ColorSlot::Outline => self.outline.clone(),
        }?;

        let mut persist = None;
        let rgb = match &spec {
            ColorSpec::Rgb(rgb) => *rgb,
            ColorSpec::Named(name) => match name.as_str() {
                "light" => {
                    let rgb = random_light(rng);
                    persist = Some(rgb);
                    rgb
                }
                "light2" => random_light(rng),
                "dark" => {
                    let rgb = random_dark(rng);
                    persist = Some(rgb);
                    rgb
                }
                "dark2" => random_dark(rng),
                "font" => self.last_fontcolor.unwrap_or(NEUTRAL_GRAY),
                "lightfont" | "lightfont2" | "darkfont" | "darkfont2" => {
                    match self.last_fontcolor {
                        Some(last) => {
                            let rgb = if name.starts_with("light") {
                                light_contrast(last)
                            } else {
                                dark_contrast(last)
                            };
                            if !name.ends_with('2') {
                                persist = Some(rgb);
                            }
                            rgb
                        }
                        None => NEUTRAL_GRAY,
                    }
                }
                other => named_color(other).unwrap_or(NEUTRAL_GRAY),
            },
        };

        if let Some(rgb) = persist {
            let slot_spec = match slot {
                ColorSlot::Font => &mut self.fontcolor,
                ColorSlot::Background => &mut self.bgcolor,
                ColorSlot::Outline => &mut self.outline,
            };
            *slot_spec = Some(ColorSpec::Rgb(rgb));
        }

        if slot == ColorSlot::Font {
            self.last_fontcolor = Some(rgb);
        }

        Some(rgb)
    }
}

fn random_color<R: Rng>(rng: &mut R, value: f32) -> [u8; 3] {
    let hue: f32 = rng.gen_range(0.0..180.0);
    hsv_to_rgb(hue, RANDOM_SATURATION, value)
}

pub fn random_light<R: Rng>(rng: &mut R) -> [u8; 3] {
    random_color(rng, LIGHT_VALUE)
}

pub fn random_dark<R: Rng>(rng: &mut R) -> [u8; 3] {
    random_color(rng, DARK_VALUE)
}

/// Contrast derivation: complement the hue of the reference color, pinned
/// light or dark.
fn contrast(rgb: [u8; 3], value: f32) -> [u8; 3] {
    let (h, _, _) = crate::filter::rgb_to_hsv(rgb);
    hsv_to_rgb((h + 90.0) % 180.0, RANDOM_SATURATION, value)
}

pub fn light_contrast(rgb: [u8; 3]) -> [u8; 3] {
    contrast(rgb, LIGHT_VALUE)
}

pub fn dark_contrast(rgb: [u8; 3]) -> [u8; 3] {
    contrast(rgb, DARK_VALUE)
}

fn named_color(name: &str) -> Option<[u8; 3]> {
    let rgb = match name {
        "white" => [255, 255, 255],
        "black" => [0, 0, 0],
        "red" => [255, 0, 0],
        "green" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "cyan" => [0, 255, 255],
        "magenta" => [255, 0, 255],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "pink" => [255, 192, 203],
        "brown" => [165, 42, 42],
        "gray" | "grey" => [128, 128, 128],
        _ => return None,
    };
    Some(rgb)
}
