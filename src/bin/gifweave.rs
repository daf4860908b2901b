use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gifweave::{Config, RawConfig, pipeline};

/// Turn a video or image into a captioned, filtered gif, video or still.
#[derive(Parser, Debug)]
#[command(name = "gifweave", version)]
struct Cli {
    /// Path to a video or image file.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file, or a directory that gets a random file name.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Caption lines, joined by the separator character.
    words: Option<String>,

    /// Path of a file with one caption line per row.
    #[arg(long)]
    wordfile: Option<PathBuf>,

    /// Delay between frames in milliseconds.
    #[arg(long)]
    delay: Option<u32>,

    /// Left text offset. Negative values nudge from center.
    #[arg(long)]
    left: Option<i32>,

    /// Right text offset. Negative values nudge from center.
    #[arg(long)]
    right: Option<i32>,

    /// Top text offset. Negative values nudge from center.
    #[arg(long)]
    top: Option<i32>,

    /// Bottom text offset. Negative values nudge from center.
    #[arg(long)]
    bottom: Option<i32>,

    /// Width to resize the frames to, keeping the aspect ratio.
    #[arg(long)]
    width: Option<u32>,

    /// Number of frames to render.
    #[arg(long)]
    frames: Option<usize>,

    /// Output format: gif, mp4, png or jpg.
    #[arg(long)]
    format: Option<String>,

    /// Character that separates caption lines in WORDS.
    #[arg(long)]
    separator: Option<String>,

    /// Frame pick order: random or normal.
    #[arg(long)]
    order: Option<String>,

    /// Path to a .ttf font for the captions.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Caption font size.
    #[arg(long)]
    fontsize: Option<f32>,

    /// Text color: "R,G,B", a name like yellow, or light/dark/light2/dark2.
    #[arg(long)]
    fontcolor: Option<String>,

    /// Draw a background rectangle behind the text with this color.
    #[arg(long)]
    bgcolor: Option<String>,

    /// Draw an outline around the text with this color.
    #[arg(long)]
    outline: Option<String>,

    /// Width of the text outline.
    #[arg(long)]
    outlinewidth: Option<i32>,

    /// Opacity of the background rectangle, 0 to 1.
    #[arg(long)]
    opacity: Option<f32>,

    /// Padding of the background rectangle.
    #[arg(long)]
    padding: Option<i32>,

    /// Extra vertical space between caption lines.
    #[arg(long)]
    linespace: Option<i32>,

    /// Gif loop count: 0 loops forever, negative plays once.
    #[arg(long = "loop")]
    loop_count: Option<i32>,

    /// Re-render an existing file to change its width or delay.
    #[arg(long)]
    remake: bool,

    /// Color filter: hue1..hue8, anyhue, anyhue2, gray, blur, invert,
    /// saturate, random, random2 or none.
    #[arg(long)]
    filter: Option<String>,

    /// Comma-separated filters to apply per frame, in order.
    #[arg(long)]
    filterlist: Option<String>,

    /// Comma-separated filters allowed when picking randomly.
    #[arg(long)]
    filteropts: Option<String>,

    /// Comma-separated frame indices to use, in order.
    #[arg(long)]
    framelist: Option<String>,

    /// Comma-separated words to draw from for [random] tags.
    #[arg(long)]
    randomlist: Option<String>,

    /// Path to a word list file for [random] tags.
    #[arg(long)]
    randomfile: Option<PathBuf>,

    /// Path to a TOML file whose keys override these arguments.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Allow repeated random words.
    #[arg(long)]
    repeatrandom: bool,

    /// Allow repeated random filters.
    #[arg(long)]
    repeatfilter: bool,

    /// Fill the remaining frames with the last caption line.
    #[arg(long)]
    fillwords: bool,

    /// Re-generate the first caption line for the remaining frames.
    #[arg(long)]
    fillgen: bool,

    /// Don't resize when the frames would get bigger.
    #[arg(long)]
    nogrow: bool,

    /// Wrap caption lines longer than this many characters.
    #[arg(long)]
    wrap: Option<usize>,

    /// Don't wrap caption lines.
    #[arg(long)]
    nowrap: bool,

    /// Don't draw the left outline.
    #[arg(long)]
    noleftoutline: bool,

    /// Don't draw the right outline.
    #[arg(long)]
    norightoutline: bool,

    /// Don't draw the top outline.
    #[arg(long)]
    notopoutline: bool,

    /// Don't draw the bottom outline.
    #[arg(long)]
    nobottomoutline: bool,

    /// Extend bottom placement and the background by the font descender.
    #[arg(long)]
    descender: bool,

    /// Seed for every random draw without a more specific seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Seed for frame picks.
    #[arg(long)]
    frameseed: Option<u64>,

    /// Seed for word picks.
    #[arg(long)]
    wordseed: Option<u64>,

    /// Seed for filter picks.
    #[arg(long)]
    filterseed: Option<u64>,

    /// Log stage details.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_raw(&self) -> RawConfig {
        RawConfig {
            input: self.input.clone(),
            output: self.output.clone(),
            words: self.words.clone(),
            wordfile: self.wordfile.clone(),
            randomlist: self.randomlist.clone(),
            randomfile: self.randomfile.clone(),
            delay: self.delay,
            left: self.left,
            right: self.right,
            top: self.top,
            bottom: self.bottom,
            width: self.width,
            frames: self.frames,
            format: self.format.clone(),
            separator: self.separator.clone(),
            order: self.order.clone(),
            font: self.font.clone(),
            fontsize: self.fontsize,
            fontcolor: self.fontcolor.clone(),
            bgcolor: self.bgcolor.clone(),
            outline: self.outline.clone(),
            outlinewidth: self.outlinewidth,
            opacity: self.opacity,
            padding: self.padding,
            linespace: self.linespace,
            loop_count: self.loop_count,
            remake: self.remake.then_some(true),
            filter: self.filter.clone(),
            filterlist: self.filterlist.clone(),
            filteropts: self.filteropts.clone(),
            framelist: self.framelist.clone(),
            repeatrandom: self.repeatrandom.then_some(true),
            repeatfilter: self.repeatfilter.then_some(true),
            fillwords: self.fillwords.then_some(true),
            fillgen: self.fillgen.then_some(true),
            nogrow: self.nogrow.then_some(true),
            wrap: self.wrap,
            nowrap: self.nowrap.then_some(true),
            noleftoutline: self.noleftoutline.then_some(true),
            norightoutline: self.norightoutline.then_some(true),
            notopoutline: self.notopoutline.then_some(true),
            nobottomoutline: self.nobottomoutline.then_some(true),
            descender: self.descender.then_some(true),
            seed: self.seed,
            frameseed: self.frameseed,
            wordseed: self.wordseed,
            filterseed: self.filterseed,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> gifweave::GifweaveResult<PathBuf> {
    let mut raw = cli.to_raw();
    if let Some(script) = &cli.script {
        raw = raw.merge(RawConfig::from_script(script)?);
    }
    let config = Config::from_raw(raw)?;
    pipeline::run(&config)
}
