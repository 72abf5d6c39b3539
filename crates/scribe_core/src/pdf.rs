//! PDF document rendering
//!
//! Lays out [`Block`]s on A4 pages with the standard Helvetica font:
//! greedy word wrap to the text column, a new page whenever the column is
//! full. Text is Latin-1 encoded; anything outside it renders as `?`.

use crate::config::ExportSettings;
use crate::error::{Result, ScribeError};
use crate::export::Block;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// A4 in points
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 72.0;
const SPACER_HEIGHT: f32 = 6.0;
const TITLE_SPACE_AFTER: f32 = 12.0;
const LEADING: f32 = 1.2;
// average Helvetica glyph width as a fraction of the font size
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// Renders laid-out blocks to a file
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, blocks: &[Block], destination: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PdfRenderer {
    font_size: f32,
    title_font_size: f32,
}

impl PdfRenderer {
    pub fn new(settings: &ExportSettings) -> Self {
        Self {
            font_size: settings.font_size.max(1.0),
            title_font_size: settings.title_font_size.max(1.0),
        }
    }

    /// Lay out `blocks` into pages of positioned text lines
    pub fn paginate(&self, blocks: &[Block]) -> Vec<Vec<PlacedLine>> {
        let mut pages = vec![Vec::new()];
        let top = PAGE_HEIGHT - MARGIN;
        let mut y = top;

        for block in blocks {
            let (lines, size, space_after) = match block {
                Block::Spacer => {
                    y -= SPACER_HEIGHT;
                    continue;
                }
                Block::Title(text) => (
                    wrap(text, self.columns(self.title_font_size)),
                    self.title_font_size,
                    TITLE_SPACE_AFTER,
                ),
                Block::Paragraph(text) => (wrap(text, self.columns(self.font_size)), self.font_size, 0.0),
            };

            let line_height = size * LEADING;
            for line in lines {
                if y - line_height < MARGIN {
                    pages.push(Vec::new());
                    y = top;
                }
                y -= line_height;
                if let Some(page) = pages.last_mut() {
                    page.push(PlacedLine {
                        text: line,
                        size,
                        x: MARGIN,
                        y,
                    });
                }
            }
            y -= space_after;
        }
        pages
    }

    fn columns(&self, size: f32) -> usize {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        ((usable / (size * AVG_GLYPH_WIDTH)) as usize).max(1)
    }
}

/// A line of text at a fixed position on a page
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub size: f32,
    pub x: f32,
    pub y: f32,
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, blocks: &[Block], destination: &Path) -> Result<()> {
        let pages = self.paginate(blocks);

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for lines in &pages {
            let mut operations = Vec::with_capacity(lines.len() * 5);
            for line in lines {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), line.size.into()]));
                operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(latin1(&line.text))],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|e| ScribeError::Render(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let file = File::create(destination).map_err(|e| ScribeError::io(destination, e))?;
        let mut writer = BufWriter::new(file);
        doc.save_to(&mut writer)
            .and_then(|()| writer.flush())
            .map_err(|e| ScribeError::io(destination, e))?;
        debug!(path = %destination.display(), pages = page_count, "pdf written");
        Ok(())
    }
}

/// Greedy word wrap at `columns` characters; over-long words are split
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(columns);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > columns && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
