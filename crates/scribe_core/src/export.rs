//! Export sinks
//!
//! Plain text is written as-is. Documents are line oriented: every
//! non-blank line becomes its own paragraph and every blank line becomes
//! vertical space; layout beyond that belongs to the [`DocumentRenderer`].
//! Callers are responsible for refusing empty text before reaching a sink.

use crate::config::ExportSettings;
use crate::error::{Result, ScribeError};
use crate::pdf::DocumentRenderer;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    PlainText,
    Document,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::PlainText => f.write_str("text"),
            ExportFormat::Document => f.write_str("document"),
        }
    }
}

/// Destination for recognized text
pub trait ExportSink: Send + Sync {
    fn export_plain_text(&self, text: &str, destination: &Path) -> Result<()>;
    fn export_document(&self, text: &str, destination: &Path) -> Result<()>;
}

/// One unit of document layout
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Paragraph(String),
    Spacer,
}

/// Split text into paragraphs and spacers, one per line
pub fn layout_blocks(text: &str) -> Vec<Block> {
    text.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| {
            if line.trim().is_empty() {
                Block::Spacer
            } else {
                Block::Paragraph(line.to_string())
            }
        })
        .collect()
}

/// Writes text files directly and documents through a renderer
pub struct FileExporter {
    renderer: Arc<dyn DocumentRenderer>,
    title: String,
}

impl FileExporter {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, settings: &ExportSettings) -> Self {
        Self {
            renderer,
            title: settings.document_title.clone(),
        }
    }
}

impl ExportSink for FileExporter {
    fn export_plain_text(&self, text: &str, destination: &Path) -> Result<()> {
        std::fs::write(destination, text).map_err(|e| ScribeError::io(destination, e))?;
        info!(path = %destination.display(), bytes = text.len(), "text exported");
        Ok(())
    }

    fn export_document(&self, text: &str, destination: &Path) -> Result<()> {
        let mut blocks = Vec::new();
        if !self.title.is_empty() {
            blocks.push(Block::Title(self.title.clone()));
            blocks.push(Block::Spacer);
        }
        blocks.extend(layout_blocks(text));
        self.renderer.render(&blocks, destination)?;
        info!(path = %destination.display(), blocks = blocks.len(), "document exported");
        Ok(())
    }
}
