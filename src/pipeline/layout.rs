//! Text layout for table cells: inline markup, font metrics, line wrapping.
//!
//! Works on sanitized text (see [`super::sanitize`]), where the only markup
//! is `<b>`, `<i>`, `<u>` and `<br/>`. Text is set in the PDF base-14
//! Helvetica family with WinAnsi encoding, so widths come from the standard
//! AFM tables and no font file is embedded.

/// Inline style of a run of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl Style {
    pub fn font(self) -> Font {
        match (self.bold, self.italic) {
            (false, false) => Font::Regular,
            (true, false) => Font::Bold,
            (false, true) => Font::Oblique,
            (true, true) => Font::BoldOblique,
        }
    }
}

/// The four Helvetica faces used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Oblique,
    BoldOblique,
}

impl Font {
    pub const ALL: [Font; 4] = [Font::Regular, Font::Bold, Font::Oblique, Font::BoldOblique];

    /// Resource name in the page's `/Font` dictionary.
    pub fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Oblique => "F3",
            Font::BoldOblique => "F4",
        }
    }

    pub fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Oblique => "Helvetica-Oblique",
            Font::BoldOblique => "Helvetica-BoldOblique",
        }
    }

    fn is_bold(self) -> bool {
        matches!(self, Font::Bold | Font::BoldOblique)
    }
}

// ── Metrics ──────────────────────────────────────────────────────────────

/// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold advance widths for 0x20..=0x7E.
#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Map a char to its WinAnsi code, or `None` if it has no glyph there.
pub fn win_ansi_code(c: char) -> Option<u8> {
    match c {
        ' '..='~' => Some(c as u8),
        '\u{a0}'..='\u{ff}' => Some(c as u32 as u8),
        '\u{20ac}' => Some(0x80),
        '\u{2026}' => Some(0x85),
        '\u{2018}' => Some(0x91),
        '\u{2019}' => Some(0x92),
        '\u{201c}' => Some(0x93),
        '\u{201d}' => Some(0x94),
        '\u{2022}' => Some(0x95),
        '\u{2013}' => Some(0x96),
        '\u{2014}' => Some(0x97),
        '\t' => Some(b' '),
        _ => None,
    }
}

/// ASCII spelling for common symbols that WinAnsi lacks.
pub fn transliterate(c: char) -> Option<&'static str> {
    Some(match c {
        '\u{2192}' => "->",
        '\u{2190}' => "<-",
        '\u{2194}' => "<->",
        '\u{21d2}' => "=>",
        '\u{21d0}' => "<=",
        '\u{21d4}' => "<=>",
        '\u{2265}' => ">=",
        '\u{2264}' => "<=",
        '\u{2260}' => "!=",
        '\u{2248}' => "~",
        '\u{2212}' => "-",
        '\u{221e}' => "inf",
        '\u{3b1}' => "alpha",
        '\u{3b2}' => "beta",
        '\u{3b3}' => "gamma",
        '\u{3b4}' => "delta",
        '\u{3b5}' => "epsilon",
        '\u{3b8}' => "theta",
        '\u{3bb}' => "lambda",
        '\u{3bc}' => "mu",
        '\u{3c0}' => "pi",
        '\u{3c3}' => "sigma",
        '\u{3c9}' => "omega",
        '\u{394}' => "Delta",
        '\u{3a3}' => "Sigma",
        '\u{3a9}' => "Omega",
        _ => return None,
    })
}

/// Encode `s` for a WinAnsi font.
///
/// Symbols with a [`transliterate`] spelling are written out in ASCII; any
/// other unmappable char becomes `?`.
pub fn encode_win_ansi(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for c in s.chars() {
        if let Some(code) = win_ansi_code(c) {
            out.push(code);
        } else if let Some(ascii) = transliterate(c) {
            out.extend_from_slice(ascii.as_bytes());
        } else {
            out.push(b'?');
        }
    }
    out
}

/// Number of chars in `s` that [`encode_win_ansi`] replaces with `?`.
pub fn unencodable_chars(s: &str) -> usize {
    s.chars()
        .filter(|&c| win_ansi_code(c).is_none() && transliterate(c).is_none())
        .count()
}

fn glyph_width(code: u8, font: Font) -> u16 {
    let bold = font.is_bold();
    match code {
        0x20..=0x7e => {
            let table = if bold { &HELVETICA_BOLD } else { &HELVETICA };
            table[(code - 0x20) as usize]
        }
        0x80 | 0x96 => 556,
        0x85 | 0x97 => 1000,
        0x91 | 0x92 => {
            if bold {
                278
            } else {
                222
            }
        }
        0x93 | 0x94 => {
            if bold {
                500
            } else {
                333
            }
        }
        0x95 => 350,
        0xa0 => 278,
        // Latin-1 letters: close enough to the lowercase average.
        _ => 556,
    }
}

/// Width of `s` in points at `size`.
pub fn text_width(s: &str, font: Font, size: f32) -> f32 {
    let units: u32 = encode_win_ansi(s)
        .into_iter()
        .map(|b| glyph_width(b, font) as u32)
        .sum();
    units as f32 * size / 1000.0
}

// ── Markup ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String, Style),
    Break,
}

const TAGS: [&str; 7] = ["<br/>", "<b>", "</b>", "<i>", "</i>", "<u>", "</u>"];

/// Split sanitized markup into styled text and line breaks.
///
/// Unbalanced closing tags are ignored. Anything that is not one of the
/// known tags is literal text.
pub fn parse_markup(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let (mut bold, mut italic, mut underline) = (0u32, 0u32, 0u32);
    let mut text = String::new();
    let mut rest = input;

    let style = |b: u32, i: u32, u: u32| Style {
        bold: b > 0,
        italic: i > 0,
        underline: u > 0,
    };

    while let Some(pos) = rest.find('<') {
        text.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let Some(tag) = TAGS.iter().find(|t| tail.starts_with(**t)) else {
            text.push('<');
            rest = &tail[1..];
            continue;
        };

        if !text.is_empty() {
            let run = decode_entities(&std::mem::take(&mut text));
            tokens.push(Token::Text(run, style(bold, italic, underline)));
        }
        match *tag {
            "<br/>" => tokens.push(Token::Break),
            "<b>" => bold += 1,
            "</b>" => bold = bold.saturating_sub(1),
            "<i>" => italic += 1,
            "</i>" => italic = italic.saturating_sub(1),
            "<u>" => underline += 1,
            _ => underline = underline.saturating_sub(1),
        }
        rest = &tail[tag.len()..];
    }
    text.push_str(rest);
    if !text.is_empty() {
        tokens.push(Token::Text(decode_entities(&text), style(bold, italic, underline)));
    }
    tokens
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

// ── Wrapping ─────────────────────────────────────────────────────────────

/// A run of same-style text on one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

/// One wrapped line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub spans: Vec<Span>,
    pub width: f32,
}

impl Line {
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Concatenated text, without styling.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    fn push(&mut self, text: &str, style: Style, width: f32) {
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(Span {
                text: text.to_string(),
                style,
            }),
        }
        self.width += width;
    }
}

/// Lay out sanitized `markup` into lines no wider than `max_width` points.
pub fn wrap(markup: &str, size: f32, max_width: f32) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut line = Line::default();
    let mut pending_space = false;

    for token in parse_markup(markup) {
        let (text, style) = match token {
            Token::Break => {
                lines.push(std::mem::take(&mut line));
                pending_space = false;
                continue;
            }
            Token::Text(text, style) => (text, style),
        };
        let font = style.font();

        let mut chars = text.as_str();
        while !chars.is_empty() {
            let trimmed = chars.trim_start();
            if trimmed.len() != chars.len() {
                pending_space = true;
            }
            if trimmed.is_empty() {
                break;
            }
            let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
            let word = &trimmed[..end];
            chars = &trimmed[end..];

            place_word(&mut lines, &mut line, word, style, font, size, max_width, pending_space);
            pending_space = false;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[allow(clippy::too_many_arguments)]
fn place_word(
    lines: &mut Vec<Line>,
    line: &mut Line,
    word: &str,
    style: Style,
    font: Font,
    size: f32,
    max_width: f32,
    space_before: bool,
) {
    let word_w = text_width(word, font, size);
    if !line.is_empty() {
        let space_w = if space_before {
            text_width(" ", font, size)
        } else {
            0.0
        };
        if line.width + space_w + word_w <= max_width {
            if space_before {
                line.push(" ", style, space_w);
            }
            line.push(word, style, word_w);
            return;
        }
        lines.push(std::mem::take(line));
    }

    if word_w <= max_width {
        line.push(word, style, word_w);
        return;
    }

    // Longer than a whole line: break between characters.
    let mut piece = String::new();
    let mut piece_w = 0.0;
    for c in word.chars() {
        let mut buf = [0u8; 4];
        let cw = text_width(c.encode_utf8(&mut buf), font, size);
        if piece_w + cw > max_width && !piece.is_empty() {
            line.push(&piece, style, piece_w);
            lines.push(std::mem::take(line));
            piece.clear();
            piece_w = 0.0;
        }
        piece.push(c);
        piece_w += cw;
    }
    if !piece.is_empty() {
        line.push(&piece, style, piece_w);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helvetica_widths() {
        // "Hello" = 722 + 556 + 222 + 222 + 556 = 2278
        assert!((text_width("Hello", Font::Regular, 10.0) - 22.78).abs() < 1e-4);
        assert!(text_width("Hello", Font::Bold, 10.0) > text_width("Hello", Font::Regular, 10.0));
    }

    #[test]
    fn win_ansi_mapping() {
        assert_eq!(encode_win_ansi("café"), vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(encode_win_ansi("\u{2018}x\u{2019}"), vec![0x91, b'x', 0x92]);
        assert_eq!(encode_win_ansi("漢"), vec![b'?']);
    }

    #[test]
    fn common_symbols_are_spelled_out() {
        assert_eq!(encode_win_ansi("a \u{2192} b"), b"a -> b".to_vec());
        assert_eq!(encode_win_ansi("x \u{2265} 2\u{3c0}"), b"x >= 2pi".to_vec());
        assert_eq!(unencodable_chars("x \u{2265} 2\u{3c0}"), 0);
        assert_eq!(unencodable_chars("caf\u{e9} \u{6f22}\u{5b57}"), 2);
        // Widths follow the spelled-out text.
        assert_eq!(
            text_width("\u{2192}", Font::Regular, 10.0),
            text_width("->", Font::Regular, 10.0)
        );
    }

    #[test]
    fn markup_tokens() {
        let tokens = parse_markup("a <b>bold <i>both</i></b><br/>x &amp; y");
        let bold = Style {
            bold: true,
            ..Default::default()
        };
        let both = Style {
            bold: true,
            italic: true,
            ..Default::default()
        };
        assert_eq!(
            tokens,
            vec![
                Token::Text("a ".into(), Style::default()),
                Token::Text("bold ".into(), bold),
                Token::Text("both".into(), both),
                Token::Break,
                Token::Text("x & y".into(), Style::default()),
            ]
        );
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        assert_eq!(
            parse_markup("a < b"),
            vec![Token::Text("a < b".into(), Style::default())]
        );
    }

    #[test]
    fn wrap_respects_width() {
        let text = "The quick brown fox jumps over the lazy dog again and again";
        let lines = wrap(text, 10.0, 100.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.width <= 100.0 + 1e-3, "{:?}", line);
        }
        let joined: Vec<String> = lines.iter().map(Line::text).collect();
        assert_eq!(joined.join(" "), text);
    }

    #[test]
    fn wrap_breaks_and_blank_lines() {
        let lines = wrap("one<br/><br/>two", 10.0, 200.0);
        let texts: Vec<String> = lines.iter().map(Line::text).collect();
        assert_eq!(texts, vec!["one", "", "two"]);
    }

    #[test]
    fn wrap_splits_long_words() {
        let word = "x".repeat(200);
        let lines = wrap(&word, 10.0, 50.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.iter().map(Line::text).collect::<String>(), word);
    }

    #[test]
    fn styled_spans_are_merged() {
        let lines = wrap("<b>a b</b> c", 10.0, 200.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[0].text, "a b");
        assert_eq!(lines[0].spans[1].text, " c");
    }
}
