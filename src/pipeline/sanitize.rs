//! Markup sanitizer for slide and dialogue text before PDF layout.
//!
//! The cell renderer understands a tiny inline markup: `<b>`, `<i>`, `<u>`
//! and `<br/>`. Model output may also carry Markdown links and images or
//! arbitrary HTML. Rules, in order:
//!
//! 1. Normalise line endings (CRLF / CR → LF)
//! 2. `![alt](src)` becomes the `[Image]` placeholder
//! 3. `[text](url)` collapses to `text`
//! 4. Allowed tags are normalised (lowercase, no attributes); other tags
//!    are dropped, their inner text kept
//! 5. Trim, then newlines become `<br/>`
//!
//! Rules 2–4 repeat until nothing changes, so removing one construct can't
//! leave another behind. Images and links are matched innermost first, and
//! the placeholder is held as a single marker char until the loop ends, so a
//! later link pass never eats it. The result is a fixed point: sanitizing it
//! again returns it unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub const IMAGE_PLACEHOLDER: &str = "[Image]";

/// Stands in for [`IMAGE_PLACEHOLDER`] while the rules run.
const IMAGE_MARKER: &str = "\u{fffc}";

/// Sanitize `input` for the cell renderer.
pub fn sanitize(input: &str) -> String {
    let mut s = normalise_line_endings(input)
        .replace(IMAGE_MARKER, "")
        .replace(IMAGE_PLACEHOLDER, IMAGE_MARKER);
    loop {
        let next = strip_tags(&collapse_links(&replace_images(&s)));
        if next == s {
            break;
        }
        s = next;
    }
    s.trim()
        .replace(IMAGE_MARKER, IMAGE_PLACEHOLDER)
        .replace('\n', "<br/>")
}

// ── Rule 1: Line endings ─────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Images ───────────────────────────────────────────────────────

static RE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\[\]]*\]\([^)]*\)").unwrap());

fn replace_images(input: &str) -> String {
    RE_IMAGE.replace_all(input, IMAGE_MARKER).into_owned()
}

// ── Rule 3: Links ────────────────────────────────────────────────────────

// A leading `!` makes it an image whose alt text was itself an image.
static RE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(!?)\[([^\[\]]*)\]\([^)]*\)").unwrap());

fn collapse_links(input: &str) -> String {
    RE_LINK
        .replace_all(input, |caps: &Captures| {
            if caps[1].is_empty() {
                caps[2].to_string()
            } else {
                IMAGE_MARKER.to_string()
            }
        })
        .into_owned()
}

// ── Rule 4: Tags ─────────────────────────────────────────────────────────

static RE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b[^<>]*>").unwrap());

fn strip_tags(input: &str) -> String {
    RE_TAG
        .replace_all(input, |caps: &Captures| {
            let closing = !caps[1].is_empty();
            let name = caps[2].to_ascii_lowercase();
            match name.as_str() {
                "br" => "<br/>".to_string(),
                "b" | "strong" => tag("b", closing),
                "i" | "em" => tag("i", closing),
                "u" => tag("u", closing),
                _ => String::new(),
            }
        })
        .into_owned()
}

fn tag(name: &str, closing: bool) -> String {
    if closing {
        format!("</{name}>")
    } else {
        format!("<{name}>")
    }
}
