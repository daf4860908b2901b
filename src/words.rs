use std::path::Path;

use anyhow::Context as _;
use rand::Rng;

use crate::{
    error::{GifweaveError, GifweaveResult},
    rng::RandomPool,
};

/// Random-word source backing `[random]` tags. Draws yield the empty string
/// when no word list is configured, never an error.
#[derive(Clone, Debug)]
pub struct WordPool {
    pool: RandomPool<String>,
}

impl WordPool {
    pub fn new(tokens: Vec<String>, allow_repeat: bool) -> Self {
        Self {
            pool: RandomPool::new(tokens, allow_repeat),
        }
    }

    pub fn from_text(text: &str, allow_repeat: bool) -> Self {
        let tokens = text
            .split_whitespace()
            .map(|t| t.to_string())
            .collect::<Vec<_>>();
        Self::new(tokens, allow_repeat)
    }

    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> String {
        self.pool.draw(rng).unwrap_or_default()
    }
}

/// Load the flat word list once: file contents, whitespace-split.
pub fn load_word_list(path: &Path) -> GifweaveResult<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read word list '{}'", path.display()))?;
    Ok(text.split_whitespace().map(|t| t.to_string()).collect())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Casing {
    Lower,
    Upper,
    Title,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TagKind {
    Word(Casing),
    Number,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CountSpec {
    Default,
    Literal(u32),
    Range(u32, u32),
}

#[derive(Clone, Copy, Debug)]
struct InlineTag {
    start: usize,
    end: usize,
    kind: TagKind,
    count: CountSpec,
}

/// Expand raw caption lines through the three template passes, in order:
/// `[empty]`, `[random]`/`[number]` (with `[xN]` multipliers), `[repeat]`.
pub fn expand_lines<R: Rng>(
    lines: &[String],
    pool: &mut WordPool,
    rng: &mut R,
) -> GifweaveResult<Vec<String>> {
    let lines = pass_empty(lines);
    let lines = pass_random(&lines, pool, rng);
    pass_repeat(&lines)
}

fn pass_empty(lines: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        match parse_line_tag(line, "empty") {
            Some(n) => out.extend(std::iter::repeat_n(String::new(), n as usize)),
            None => out.push(line.clone()),
        }
    }
    out
}

fn pass_random<R: Rng>(lines: &[String], pool: &mut WordPool, rng: &mut R) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        let (line, times) = strip_multiplier(line);
        for _ in 0..times {
            out.push(expand_inline(line, pool, rng));
        }
    }
    out
}

fn pass_repeat(lines: &[String]) -> GifweaveResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        match parse_line_tag(line, "repeat") {
            Some(n) => {
                let prev = out.last().cloned().ok_or_else(|| {
                    GifweaveError::template("[repeat] has no preceding line to repeat")
                })?;
                out.extend(std::iter::repeat_n(prev, n as usize));
            }
            None => out.push(line.clone()),
        }
    }
    Ok(out)
}

/// Expand the first `[random]`/`[RANDOM]`/`[Random]`/`[number]` tag in a
/// line, leaving the surrounding text intact. Lines without a recognized tag
/// pass through verbatim.
pub fn expand_inline<R: Rng>(line: &str, pool: &mut WordPool, rng: &mut R) -> String {
    let Some(tag) = find_inline_tag(line) else {
        return line.to_string();
    };

    let count = resolve_count(tag.count, rng);
    let replacement = match tag.kind {
        TagKind::Word(casing) => {
            let words: Vec<String> = (0..count)
                .map(|_| apply_casing(&pool.draw(rng), casing))
                .collect();
            words.join(" ")
        }
        TagKind::Number => {
            let mut digits = String::with_capacity(count as usize);
            for i in 0..count {
                // Multi-digit draws never start with zero.
                let low = if i == 0 && count > 1 { 1 } else { 0 };
                let d: u32 = rng.gen_range(low..=9);
                digits.push(char::from_digit(d, 10).unwrap_or('0'));
            }
            digits
        }
    };

    let mut expanded = String::with_capacity(line.len() + replacement.len());
    expanded.push_str(&line[..tag.start]);
    expanded.push_str(&replacement);
    expanded.push_str(&line[tag.end..]);
    expanded
}

fn resolve_count<R: Rng>(spec: CountSpec, rng: &mut R) -> u32 {
    match spec {
        CountSpec::Default => 1,
        CountSpec::Literal(n) if n > 0 => n,
        CountSpec::Literal(_) => 1,
        CountSpec::Range(a, b) if a < b => rng.gen_range(a..=b),
        CountSpec::Range(a, _) => a,
    }
}

fn apply_casing(word: &str, casing: Casing) -> String {
    match casing {
        Casing::Lower => word.to_lowercase(),
        Casing::Upper => word.to_uppercase(),
        Casing::Title => {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        }
    }
}

/// Whole-line tags: `[name]` or `[name N]`, case-insensitive name, on an
/// otherwise-bare line. Returns the count (default 1), or `None` when the
/// line is anything else.
fn parse_line_tag(line: &str, name: &str) -> Option<u32> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    let mut parts = inner.split_whitespace();
    let word = parts.next()?;
    if !word.eq_ignore_ascii_case(name) {
        return None;
    }
    match parts.next() {
        None => Some(1),
        Some(num) => {
            // A second token after the count keeps the line literal.
            if parts.next().is_some() {
                return None;
            }
            num.parse::<u32>().ok().map(|n| n.max(1))
        }
    }
}

/// Scan for the first recognizable inline tag. Bracket text that does not
/// match the tag grammar is deliberately left as literal text.
fn find_inline_tag(line: &str) -> Option<InlineTag> {
    for (start, _) in line.match_indices('[') {
        let rest = &line[start + 1..];
        let Some(close) = rest.find(']') else {
            break;
        };
        if let Some((kind, count)) = parse_tag_body(&rest[..close]) {
            return Some(InlineTag {
                start,
                end: start + 1 + close + 1,
                kind,
                count,
            });
        }
    }
    None
}

fn parse_tag_body(body: &str) -> Option<(TagKind, CountSpec)> {
    let mut parts = body.split_whitespace();
    let word = parts.next()?;

    let kind = match word {
        "random" => TagKind::Word(Casing::Lower),
        "RANDOM" => TagKind::Word(Casing::Upper),
        "Random" => TagKind::Word(Casing::Title),
        w if w.eq_ignore_ascii_case("number") => TagKind::Number,
        _ => return None,
    };

    // Anything beyond "name count" is not a tag.
    let count = match parts.next() {
        None => CountSpec::Default,
        Some(arg) => {
            if parts.next().is_some() {
                return None;
            }
            parse_count(arg)?
        }
    };

    Some((kind, count))
}

fn parse_count(arg: &str) -> Option<CountSpec> {
    match arg.split_once('-') {
        Some((a, b)) => {
            let a = a.parse::<u32>().ok()?;
            let b = b.parse::<u32>().ok()?;
            Some(CountSpec::Range(a, b))
        }
        None => arg.parse::<u32>().ok().map(CountSpec::Literal),
    }
}

/// Strip a trailing `[xN]` multiplier. `N` must be all digits; zero clamps
/// to one; anything else is literal text and multiplies by one.
fn strip_multiplier(line: &str) -> (&str, u32) {
    let trimmed = line.trim_end();
    let Some(rest) = trimmed.strip_suffix(']') else {
        return (line, 1);
    };
    let Some(open) = rest.rfind('[') else {
        return (line, 1);
    };
    let body = &rest[open + 1..];
    let Some(digits) = body.strip_prefix('x') else {
        return (line, 1);
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return (line, 1);
    }
    let times = digits.parse::<u32>().unwrap_or(1).max(1);
    (trimmed[..open].trim_end(), times)
}

/// Greedy word wrap at a character width, preserving embedded line breaks.
pub fn wrap_lines(lines: &[String], width: usize) -> Vec<String> {
    if width == 0 {
        return lines.to_vec();
    }
    lines
        .iter()
        .map(|line| {
            line.split('\n')
                .map(|seg| wrap_segment(seg, width))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

fn wrap_segment(text: &str, width: usize) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line_len = 0usize;
    for word in text.split_whitespace() {
        let wlen = word.chars().count();
        if line_len == 0 {
            out.push_str(word);
            line_len = wlen;
        } else if line_len + 1 + wlen <= width {
            out.push(' ');
            out.push_str(word);
            line_len += 1 + wlen;
        } else {
            out.push('\n');
            out.push_str(word);
            line_len = wlen;
        }
    }
    out
}

/// Pad the expanded lines out to the frame count. `fillgen` re-expands the
/// first raw line per missing frame (independent draws); `fillwords` repeats
/// the last expanded line.
pub fn apply_fill<R: Rng>(
    expanded: &mut Vec<String>,
    first_raw: Option<&str>,
    frames: usize,
    fillwords: bool,
    fillgen: bool,
    pool: &mut WordPool,
    rng: &mut R,
) {
    if expanded.len() >= frames {
        return;
    }
    if fillgen {
        if let Some(first) = first_raw {
            while expanded.len() < frames {
                expanded.push(expand_inline(first, pool, rng));
            }
            return;
        }
    }
    if fillwords {
        if let Some(last) = expanded.last().cloned() {
            while expanded.len() < frames {
                expanded.push(last.clone());
            }
        }
    }
}
