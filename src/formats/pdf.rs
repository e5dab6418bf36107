//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Exa.
//! The Exa project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Exa Document Serializer
//!
//! Paginated document output driven by the transformer's block list. The
//! full codec lays out pages with cover, running header/footer (with
//! "Página X de Y" numbering resolved in a second pass), and type-aware
//! table cells. When the page-layout codec cannot be acquired, a textual
//! simulated document is produced instead of failing, marked as degraded
//! and surfaced as a warning.

use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::codec::ExaCodecKey;
use crate::config::ExaPdfOptions;
use crate::dataset::ExaBlock;
use crate::errors::Result;
use crate::process::ExaResolvedMeta;
use crate::transform::ExaTransformer;

use super::{ExaArtifact, ExaSerializeInput, ExaSerializer};

/// Maximum characters kept in one table cell before truncation.
const CELL_TEXT_MAX: usize = 40;

pub struct ExaPdfSerializer;

#[async_trait]
impl ExaSerializer for ExaPdfSerializer {
    async fn serialize(&self, input: &ExaSerializeInput<'_>) -> Result<ExaArtifact> {
        let blocks =
            ExaTransformer::to_document_blocks(input.dataset, input.processed, input.config);
        let meta = input.processed.metadata();
        let timeout = Duration::from_millis(input.config.common.codec_timeout_ms);

        let codec_error = match input.codecs.load(ExaCodecKey::Document, timeout).await {
            Ok(_handle) => None,
            Err(err) => Some(err),
        };

        #[cfg(feature = "pdf")]
        if codec_error.is_none() {
            let bytes = full::write_document(&blocks, meta, &input.config.pdf)?;
            return Ok(ExaArtifact::binary(bytes));
        }

        let reason = codec_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "page-layout codec unavailable".to_string());
        warn!("document codec fallback: {}", reason);
        let text = simulated_document(&blocks, meta, &input.config.pdf);
        Ok(ExaArtifact::text(text).with_warning(format!(
            "document generated as a simulated text artifact ({})",
            reason
        )))
    }

    fn estimate_size(&self, input: &ExaSerializeInput<'_>) -> usize {
        let rows = input.processed.data().len();
        let columns = input.processed.visible_columns().len();
        let pages = rows / 40 + 1;
        // Font and page-tree overhead plus a rough per-cell cost.
        1_500 + pages * 600 + rows * columns * 8
    }

    async fn preview(&self, input: &ExaSerializeInput<'_>, limit: usize) -> Result<String> {
        let truncated = input.processed.data().len() > limit;
        let sample = input.processed.truncated(limit);
        let blocks = ExaTransformer::to_document_blocks(input.dataset, &sample, input.config);
        let mut text = simulated_document(&blocks, sample.metadata(), &input.config.pdf);
        if truncated {
            text.push_str("...\n");
        }
        Ok(text)
    }
}

/// Renders one table cell for document output: booleans become "Sí"/"No",
/// long strings are truncated with an ellipsis.
pub fn format_document_cell(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::Bool(true) => "Sí".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() > CELL_TEXT_MAX {
        let mut truncated: String = text.chars().take(CELL_TEXT_MAX - 3).collect();
        truncated.push_str("...");
        truncated
    } else {
        text
    }
}

/// Textual rendition of the block list, used by the degraded fallback and
/// by previews.
pub fn simulated_document(
    blocks: &[ExaBlock],
    meta: &ExaResolvedMeta,
    options: &ExaPdfOptions,
) -> String {
    let banner = "=".repeat(72);
    let mut out = String::new();
    out.push_str(&banner);
    out.push('\n');
    out.push_str("DOCUMENTO SIMULADO (sin códec de maquetación)\n");
    out.push_str(&banner);
    out.push('\n');

    for block in blocks {
        match block {
            ExaBlock::Cover {
                title,
                subtitle,
                logo,
            } => {
                out.push_str(&format!("\n[PORTADA] {}\n", title));
                if let Some(subtitle) = subtitle {
                    out.push_str(&format!("          {}\n", subtitle));
                }
                if let Some(logo) = logo {
                    out.push_str(&format!("          [logo: {}]\n", logo));
                }
            }
            ExaBlock::Title { text } => {
                out.push_str(&format!("\n{}\n{}\n", text, "-".repeat(text.chars().count())));
            }
            ExaBlock::Paragraph { text } => {
                out.push_str(text);
                out.push('\n');
            }
            ExaBlock::Table { headers, rows } => {
                out.push_str(&headers.join(" | "));
                out.push('\n');
                for row in rows {
                    let cells: Vec<String> = row.iter().map(format_document_cell).collect();
                    out.push_str(&cells.join(" | "));
                    out.push('\n');
                }
            }
            ExaBlock::PageBreak => {
                out.push_str("\n----- salto de página -----\n");
            }
            ExaBlock::Image { source, .. } => {
                out.push_str(&format!("[imagen: {}]\n", source));
            }
        }
    }

    if options.footer.enabled && options.footer.page_numbers {
        out.push('\n');
        out.push_str("Página 1 de 1\n");
    }
    out.push_str(&format!("Generado: {}\n", meta.created_at));
    out
}

#[cfg(feature = "pdf")]
mod full {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream, StringFormat};

    use crate::config::ExaOrientation;
    use crate::errors::ExaError;

    use super::*;

    const BODY_SIZE: f32 = 10.0;
    const TITLE_SIZE: f32 = 16.0;
    const COVER_SIZE: f32 = 24.0;
    const LINE_HEIGHT: f32 = 14.0;
    /// Approximate advance width per character, as a fraction of font size.
    const CHAR_WIDTH: f32 = 0.5;
    /// Fixed column width used when a table has many columns.
    const WIDE_TABLE_COLUMN: f32 = 90.0;

    struct PageBuilder {
        width: f32,
        height: f32,
        margins: [f32; 4],
        pages: Vec<Vec<Operation>>,
        cursor: f32,
    }

    impl PageBuilder {
        fn new(options: &ExaPdfOptions) -> Self {
            let (w, h) = options.page_size.dimensions();
            let (width, height) = match options.page_orientation {
                ExaOrientation::Portrait => (w as f32, h as f32),
                ExaOrientation::Landscape => (h as f32, w as f32),
            };
            let margins = [
                options.page_margins[0] as f32,
                options.page_margins[1] as f32,
                options.page_margins[2] as f32,
                options.page_margins[3] as f32,
            ];
            let mut builder = Self {
                width,
                height,
                margins,
                pages: Vec::new(),
                cursor: 0.0,
            };
            builder.new_page();
            builder
        }

        fn content_width(&self) -> f32 {
            self.width - self.margins[1] - self.margins[3]
        }

        fn new_page(&mut self) {
            self.pages.push(Vec::new());
            // Leave room under the running header.
            self.cursor = self.height - self.margins[0] - LINE_HEIGHT;
        }

        fn ensure_space(&mut self, needed: f32) {
            if self.cursor - needed < self.margins[2] + LINE_HEIGHT {
                self.new_page();
            }
        }

        fn advance(&mut self, amount: f32) {
            self.cursor -= amount;
        }

        fn current(&mut self) -> &mut Vec<Operation> {
            if self.pages.is_empty() {
                self.pages.push(Vec::new());
            }
            let index = self.pages.len() - 1;
            &mut self.pages[index]
        }

        fn text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) {
            let operations = text_operations(font, size, x, y, text);
            self.current().extend(operations);
        }

        fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
            let page = self.current();
            page.push(Operation::new("w", vec![0.5f32.into()]));
            page.push(Operation::new("m", vec![x1.into(), y1.into()]));
            page.push(Operation::new("l", vec![x2.into(), y2.into()]));
            page.push(Operation::new("S", vec![]));
        }
    }

    /// Lays out the block list and assembles the final document bytes.
    pub fn write_document(
        blocks: &[ExaBlock],
        meta: &ExaResolvedMeta,
        options: &ExaPdfOptions,
    ) -> Result<Vec<u8>> {
        let mut builder = PageBuilder::new(options);

        for block in blocks {
            render_block(&mut builder, block, options);
        }

        // Second pass: running headers and footers need the final page
        // count for "Página X de Y".
        let total = builder.pages.len();
        for (index, page) in builder.pages.iter_mut().enumerate() {
            let mut chrome = Vec::new();
            if options.header.enabled {
                let text = options
                    .header
                    .text
                    .clone()
                    .unwrap_or_else(|| options.branding.org_name.clone());
                chrome.extend(text_operations(
                    "F1",
                    8.0,
                    builder.margins[3],
                    builder.height - builder.margins[0] + 4.0,
                    &text,
                ));
            }
            if options.footer.enabled {
                if let Some(text) = &options.footer.text {
                    chrome.extend(text_operations(
                        "F1",
                        8.0,
                        builder.margins[3],
                        builder.margins[2] - 12.0,
                        text,
                    ));
                }
                if options.footer.page_numbers {
                    let numbering = format!("Página {} de {}", index + 1, total);
                    let width = numbering.chars().count() as f32 * 8.0 * CHAR_WIDTH;
                    chrome.extend(text_operations(
                        "F1",
                        8.0,
                        builder.width - builder.margins[1] - width,
                        builder.margins[2] - 12.0,
                        &numbering,
                    ));
                }
            }
            chrome.append(page);
            *page = chrome;
        }

        assemble(builder, meta)
    }

    fn render_block(builder: &mut PageBuilder, block: &ExaBlock, options: &ExaPdfOptions) {
        match block {
            ExaBlock::Cover {
                title,
                subtitle,
                logo,
            } => {
                if !builder.pages.last().map_or(true, Vec::is_empty) {
                    builder.new_page();
                }
                let y = builder.height * 0.6;
                let x = centered_x(builder, title, COVER_SIZE);
                builder.text("F2", COVER_SIZE, x, y, title);
                if let Some(subtitle) = subtitle {
                    let x = centered_x(builder, subtitle, TITLE_SIZE);
                    builder.text("F1", TITLE_SIZE, x, y - COVER_SIZE * 1.5, subtitle);
                }
                if let Some(logo) = logo {
                    let marker = format!("[{}]", logo);
                    let x = centered_x(builder, &marker, 8.0);
                    builder.text("F1", 8.0, x, builder.margins[2] + 40.0, &marker);
                }
                if options.branding.org_name != "Exa" || subtitle.is_none() {
                    let x = centered_x(builder, &options.branding.org_name, BODY_SIZE);
                    builder.text(
                        "F1",
                        BODY_SIZE,
                        x,
                        y - COVER_SIZE * 3.0,
                        &options.branding.org_name,
                    );
                }
                builder.new_page();
            }
            ExaBlock::Title { text } => {
                builder.ensure_space(TITLE_SIZE * 2.0);
                let y = builder.cursor;
                builder.text("F2", TITLE_SIZE, builder.margins[3], y, text);
                builder.line(
                    builder.margins[3],
                    y - 4.0,
                    builder.width - builder.margins[1],
                    y - 4.0,
                );
                builder.advance(TITLE_SIZE * 2.0);
            }
            ExaBlock::Paragraph { text } => {
                let max_chars =
                    (builder.content_width() / (BODY_SIZE * CHAR_WIDTH)).max(1.0) as usize;
                for line in wrap_text(text, max_chars) {
                    builder.ensure_space(LINE_HEIGHT);
                    let y = builder.cursor;
                    builder.text("F1", BODY_SIZE, builder.margins[3], y, &line);
                    builder.advance(LINE_HEIGHT);
                }
                builder.advance(LINE_HEIGHT / 2.0);
            }
            ExaBlock::Table { headers, rows } => {
                render_table(builder, headers, rows);
            }
            ExaBlock::PageBreak => builder.new_page(),
            ExaBlock::Image { source, .. } => {
                builder.ensure_space(LINE_HEIGHT);
                let marker = format!("[imagen: {}]", source);
                let y = builder.cursor;
                builder.text("F1", BODY_SIZE, builder.margins[3], y, &marker);
                builder.advance(LINE_HEIGHT);
            }
        }
    }

    fn render_table(builder: &mut PageBuilder, headers: &[String], rows: &[Vec<Value>]) {
        if headers.is_empty() && rows.is_empty() {
            return;
        }
        let columns = headers.len().max(rows.first().map_or(0, Vec::len)).max(1);
        let column_width = if columns <= 6 {
            builder.content_width() / columns as f32
        } else {
            WIDE_TABLE_COLUMN
        };
        let cell_chars = ((column_width / (BODY_SIZE * CHAR_WIDTH)) as usize).max(1);

        let draw_header = |builder: &mut PageBuilder| {
            builder.ensure_space(LINE_HEIGHT * 2.0);
            let y = builder.cursor;
            for (index, header) in headers.iter().enumerate() {
                let x = builder.margins[3] + index as f32 * column_width;
                builder.text("F2", BODY_SIZE, x, y, &clip(header, cell_chars));
            }
            builder.line(
                builder.margins[3],
                y - 3.0,
                builder.margins[3] + column_width * columns.min(headers.len().max(1)) as f32,
                y - 3.0,
            );
            builder.advance(LINE_HEIGHT);
        };

        draw_header(builder);
        for row in rows {
            if builder.cursor - LINE_HEIGHT < builder.margins[2] + LINE_HEIGHT {
                builder.new_page();
                draw_header(builder);
            }
            let y = builder.cursor;
            for (index, cell) in row.iter().enumerate() {
                let x = builder.margins[3] + index as f32 * column_width;
                let text = clip(&format_document_cell(cell), cell_chars);
                builder.text("F1", BODY_SIZE, x, y, &text);
            }
            builder.advance(LINE_HEIGHT);
        }
        builder.advance(LINE_HEIGHT / 2.0);
    }

    fn assemble(builder: PageBuilder, meta: &ExaResolvedMeta) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let font_regular = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let font_bold = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_regular, "F2" => font_bold },
        });

        let mut kids = Vec::new();
        let page_count = builder.pages.len();
        for operations in builder.pages {
            let content = Content { operations };
            let encoded = content
                .encode()
                .map_err(|err| ExaError::format("pdf", err.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    builder.width.into(),
                    builder.height.into(),
                ],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        };
        doc.objects.insert(pages_id, pages_dict.into());

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let info_id = doc.add_object(dictionary! {
            "Title" => Object::String(encode_winansi(&meta.title), StringFormat::Literal),
            "Author" => Object::String(encode_winansi(&meta.author), StringFormat::Literal),
            "Producer" => Object::String(encode_winansi("Exa"), StringFormat::Literal),
        });
        doc.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|err| ExaError::format("pdf", err.to_string()))?;
        Ok(bytes)
    }

    fn text_operations(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![font.into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_winansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]
    }

    /// Base fonts use WinAnsi; characters outside Latin-1 degrade to '?'.
    fn encode_winansi(text: &str) -> Vec<u8> {
        text.chars()
            .map(|c| {
                let code = c as u32;
                if code < 256 {
                    code as u8
                } else {
                    b'?'
                }
            })
            .collect()
    }

    fn centered_x(builder: &PageBuilder, text: &str, size: f32) -> f32 {
        let width = text.chars().count() as f32 * size * CHAR_WIDTH;
        ((builder.width - width) / 2.0).max(builder.margins[3])
    }

    fn clip(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let mut clipped: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        clipped.push_str("...");
        clipped
    }

    fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for source_line in text.lines() {
            let mut current = String::new();
            for word in source_line.split_whitespace() {
                let candidate_len = current.chars().count()
                    + if current.is_empty() { 0 } else { 1 }
                    + word.chars().count();
                if !current.is_empty() && candidate_len > max_chars {
                    lines.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(word);
            }
            lines.push(current);
        }
        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }
}
