use std::path::{Path, PathBuf};

use image::AnimationDecoder as _;

use gifweave::{Config, RawConfig, pipeline};

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("gifweave-e2e-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_still(dir: &Path) -> PathBuf {
    let path = dir.join("input.png");
    image::RgbImage::from_pixel(20, 14, image::Rgb([10, 20, 30]))
        .save(&path)
        .unwrap();
    path
}

#[test]
fn still_to_gif_into_a_directory() {
    let dir = temp_dir("dir-output");
    let raw = RawConfig {
        input: Some(write_still(&dir)),
        output: Some(dir.join("renders")),
        words: Some("[empty 2]".to_string()),
        filter: Some("invert".to_string()),
        delay: Some(100),
        seed: Some(42),
        ..RawConfig::default()
    };
    let cfg = Config::from_raw(raw).unwrap();

    let path = pipeline::run(&cfg).unwrap();

    // Directory output gets a generated basename in the default format.
    assert_eq!(path.parent(), Some(dir.join("renders").as_path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("gif"));

    let decoder = image::codecs::gif::GifDecoder::new(std::io::BufReader::new(
        std::fs::File::open(&path).unwrap(),
    ))
    .unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    // [empty 2] expands to two blank captions, one frame each.
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].buffer().dimensions(), (20, 14));
}

#[test]
fn frame_count_follows_the_caption_lines() {
    let dir = temp_dir("captions");
    let raw = RawConfig {
        input: Some(write_still(&dir)),
        output: Some(dir.join("out.gif")),
        words: Some("[empty];[empty];[empty];[empty]".to_string()),
        delay: Some(100),
        ..RawConfig::default()
    };
    let cfg = Config::from_raw(raw).unwrap();

    let path = pipeline::run(&cfg).unwrap();
    let decoder = image::codecs::gif::GifDecoder::new(std::io::BufReader::new(
        std::fs::File::open(&path).unwrap(),
    ))
    .unwrap();
    assert_eq!(decoder.into_frames().collect_frames().unwrap().len(), 4);
}

#[test]
fn remake_resizes_without_touching_content() {
    let dir = temp_dir("remake");
    let raw = RawConfig {
        input: Some(write_still(&dir)),
        output: Some(dir.join("resized.png")),
        remake: Some(true),
        width: Some(10),
        ..RawConfig::default()
    };
    let cfg = Config::from_raw(raw).unwrap();

    let path = pipeline::run(&cfg).unwrap();
    let img = image::open(&path).unwrap().to_rgb8();
    assert_eq!(img.dimensions(), (10, 7));
    assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30]);
}
