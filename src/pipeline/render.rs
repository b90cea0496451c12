//! PDF output: a paginated two-column table, written with lopdf.
//!
//! Page geometry is US Letter with one-inch margins. The header row (grey
//! fill, light bold text) repeats at the top of every page, body rows
//! alternate white and light grey, and every cell has a 1pt black border.
//! A row taller than the space left on a page moves to the next page; a row
//! taller than a whole page is split between lines.
//!
//! Only the base-14 Helvetica faces are referenced, so nothing is embedded
//! and the output stays small.

use crate::error::StoryboardError;
use crate::pipeline::layout::{encode_win_ansi, text_width, unencodable_chars, wrap, Font, Line};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

pub const PAGE_WIDTH: f32 = 612.0;
pub const PAGE_HEIGHT: f32 = 792.0;
pub const MARGIN: f32 = 72.0;
pub const COLUMN_WIDTH: f32 = 234.0;

const PADDING: f32 = 10.0;
const HEADER_BOTTOM_PADDING: f32 = 12.0;
const HEADER_SIZE: f32 = 12.0;
const HEADER_LEADING: f32 = 14.4;
const BODY_SIZE: f32 = 10.0;
const BODY_LEADING: f32 = 14.0;
const GRID_WIDTH: f32 = 1.0;
const UNDERLINE_WIDTH: f32 = 0.5;

const HEADER_FILL: f32 = 0.5;
const HEADER_TEXT: f32 = 0.96;
const ROW_FILLS: [f32; 2] = [1.0, 0.827];
const BODY_TEXT: f32 = 0.0;

const INNER_WIDTH: f32 = COLUMN_WIDTH - 2.0 * PADDING;

/// Render `rows` (sanitized markup, one pair per row) under `headers`.
///
/// Returns the PDF file bytes.
pub fn render_table(headers: [&str; 2], rows: &[[String; 2]]) -> Result<Vec<u8>, StoryboardError> {
    let header: [Vec<Line>; 2] = headers.map(|h| wrap(&format!("<b>{h}</b>"), HEADER_SIZE, INNER_WIDTH));
    let header_height = PADDING
        + header[0].len().max(header[1].len()).max(1) as f32 * HEADER_LEADING
        + HEADER_BOTTOM_PADDING;
    let body_top = PAGE_HEIGHT - MARGIN - header_height;
    let fresh_space = body_top - MARGIN;

    let mut pages: Vec<Vec<Operation>> = Vec::new();
    let mut page = PageOps::new(&header, header_height);
    let mut y = body_top;
    let mut rows_on_page = 0usize;
    let mut replaced = 0usize;

    for (index, row) in rows.iter().enumerate() {
        let fill = ROW_FILLS[index % 2];
        let lines: [Vec<Line>; 2] = [
            wrap(&row[0], BODY_SIZE, INNER_WIDTH),
            wrap(&row[1], BODY_SIZE, INNER_WIDTH),
        ];
        replaced += lines
            .iter()
            .flatten()
            .flat_map(|line| &line.spans)
            .map(|span| unencodable_chars(&span.text))
            .sum::<usize>();
        let mut remaining: [&[Line]; 2] = [&lines[0], &lines[1]];

        loop {
            let count = remaining[0].len().max(remaining[1].len()).max(1);
            let needed = 2.0 * PADDING + count as f32 * BODY_LEADING;
            let available = y - MARGIN;

            if needed <= available {
                page.row(y, needed, fill, remaining);
                y -= needed;
                rows_on_page += 1;
                break;
            }
            if needed <= fresh_space && rows_on_page > 0 {
                pages.push(std::mem::replace(&mut page, PageOps::new(&header, header_height)).ops);
                y = body_top;
                rows_on_page = 0;
                continue;
            }

            let fit = ((available - 2.0 * PADDING) / BODY_LEADING).floor();
            if fit < 1.0 {
                if rows_on_page == 0 {
                    return Err(StoryboardError::RenderFailed {
                        detail: "page too small for a single line of text".into(),
                    });
                }
                pages.push(std::mem::replace(&mut page, PageOps::new(&header, header_height)).ops);
                y = body_top;
                rows_on_page = 0;
                continue;
            }

            let fit = fit as usize;
            let head = remaining.map(|cell| &cell[..fit.min(cell.len())]);
            let height = 2.0 * PADDING + fit as f32 * BODY_LEADING;
            page.row(y, height, fill, head);
            remaining = remaining.map(|cell| &cell[fit.min(cell.len())..]);
            debug!("Row {} split across pages after {} lines", index + 1, fit);

            pages.push(std::mem::replace(&mut page, PageOps::new(&header, header_height)).ops);
            y = body_top;
            rows_on_page = 0;
        }
    }
    pages.push(page.ops);

    if replaced > 0 {
        warn!(
            "{} characters have no glyph in the PDF fonts and were rendered as '?'",
            replaced
        );
    }
    assemble(pages)
}

// ── Content stream ───────────────────────────────────────────────────────

struct PageOps {
    ops: Vec<Operation>,
}

impl PageOps {
    /// Start a page with the header row already drawn.
    fn new(header: &[Vec<Line>; 2], height: f32) -> Self {
        let mut page = Self { ops: Vec::new() };
        let top = PAGE_HEIGHT - MARGIN;
        page.fill(HEADER_FILL, top, height);
        for (col, lines) in header.iter().enumerate() {
            page.text(col, top - PADDING, lines, HEADER_SIZE, HEADER_LEADING, HEADER_TEXT);
        }
        page.grid(top, height);
        page
    }

    fn row(&mut self, top: f32, height: f32, fill: f32, cells: [&[Line]; 2]) {
        self.fill(fill, top, height);
        for (col, lines) in cells.iter().enumerate() {
            self.text(col, top - PADDING, lines, BODY_SIZE, BODY_LEADING, BODY_TEXT);
        }
        self.grid(top, height);
    }

    fn fill(&mut self, gray: f32, top: f32, height: f32) {
        self.ops.push(Operation::new("g", vec![gray.into()]));
        self.ops.push(Operation::new(
            "re",
            vec![MARGIN.into(), (top - height).into(), (2.0 * COLUMN_WIDTH).into(), height.into()],
        ));
        self.ops.push(Operation::new("f", vec![]));
    }

    fn grid(&mut self, top: f32, height: f32) {
        self.ops.push(Operation::new("G", vec![0.into()]));
        self.ops.push(Operation::new("w", vec![GRID_WIDTH.into()]));
        for col in 0..2 {
            let x = MARGIN + col as f32 * COLUMN_WIDTH;
            self.ops.push(Operation::new(
                "re",
                vec![x.into(), (top - height).into(), COLUMN_WIDTH.into(), height.into()],
            ));
        }
        self.ops.push(Operation::new("S", vec![]));
    }

    fn text(
        &mut self,
        col: usize,
        top: f32,
        lines: &[Line],
        size: f32,
        leading: f32,
        gray: f32,
    ) {
        let x = MARGIN + col as f32 * COLUMN_WIDTH + PADDING;
        let mut underlines = Vec::new();

        self.ops.push(Operation::new("BT", vec![]));
        self.ops.push(Operation::new("g", vec![gray.into()]));
        for (i, line) in lines.iter().enumerate() {
            let baseline = top - size - i as f32 * leading;
            self.ops.push(Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), x.into(), baseline.into()],
            ));
            let mut cursor = x;
            for span in &line.spans {
                let style = span.style;
                let font = style.font();
                let width = text_width(&span.text, font, size);
                self.ops.push(Operation::new(
                    "Tf",
                    vec![font.resource_name().into(), size.into()],
                ));
                self.ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(encode_win_ansi(&span.text))],
                ));
                if style.underline {
                    underlines.push((cursor, baseline - 1.5, width));
                }
                cursor += width;
            }
        }
        self.ops.push(Operation::new("ET", vec![]));

        if underlines.is_empty() {
            return;
        }
        self.ops.push(Operation::new("G", vec![gray.into()]));
        self.ops.push(Operation::new("w", vec![UNDERLINE_WIDTH.into()]));
        for (ux, uy, uw) in underlines {
            self.ops.push(Operation::new("m", vec![ux.into(), uy.into()]));
            self.ops.push(Operation::new("l", vec![(ux + uw).into(), uy.into()]));
        }
        self.ops.push(Operation::new("S", vec![]));
    }
}

// ── Document assembly ────────────────────────────────────────────────────

fn assemble(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, StoryboardError> {
    let render_err = |e: lopdf::Error| StoryboardError::RenderFailed {
        detail: e.to_string(),
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for font in Font::ALL {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name(), id);
    }
    let resources_id = doc.add_object(dictionary! {
        "Font" => fonts,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let bytes = Content { operations }.encode().map_err(render_err)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    let count = kids.len() as i64;

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("MOOC Storyboard"),
        "Producer" => Object::string_literal(concat!("edgequake-storyboard ", env!("CARGO_PKG_VERSION"))),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| StoryboardError::RenderFailed {
        detail: e.to_string(),
    })?;
    debug!("Rendered {} page(s), {} bytes", count, buf.len());
    Ok(buf)
}
