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

//! # Exa Workbook Serializer
//!
//! One worksheet per transformer-provided sheet group. Two interchangeable
//! codec strategies: the fully-styled writer (header styling, borders,
//! freeze panes, autofilter, zoom, document properties) and a lightweight
//! SpreadsheetML-in-zip writer used as a fallback when the full codec
//! cannot be acquired. The fallback produces a structurally valid workbook
//! that opens in common readers, with a warning attached to the artifact.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::codec::ExaCodecKey;
use crate::config::ExaXlsxOptions;
use crate::errors::{ExaError, Result};
use crate::transform::{ExaSheet, ExaTransformer};

use super::csv::render_cell;
use super::{ExaArtifact, ExaSerializeInput, ExaSerializer};

/// Hard ceiling imposed by the workbook format.
const SHEET_NAME_MAX: usize = 31;

pub struct ExaXlsxSerializer;

#[async_trait]
impl ExaSerializer for ExaXlsxSerializer {
    async fn serialize(&self, input: &ExaSerializeInput<'_>) -> Result<ExaArtifact> {
        let sheets =
            ExaTransformer::to_workbook_sheets(input.dataset, input.processed, input.config)?;
        let timeout = Duration::from_millis(input.config.common.codec_timeout_ms);

        let codec_error = match input.codecs.load(ExaCodecKey::Workbook, timeout).await {
            Ok(_handle) => None,
            Err(err) => Some(err),
        };

        #[cfg(feature = "xlsx")]
        if codec_error.is_none() {
            let bytes = full::write_workbook(&sheets, input.config)?;
            return Ok(ExaArtifact::binary(bytes));
        }

        let reason = codec_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "full workbook codec unavailable".to_string());
        warn!("workbook codec fallback: {}", reason);
        let bytes = lite::write_workbook(&sheets, &input.config.xlsx)?;
        Ok(ExaArtifact::binary(bytes).with_warning(format!(
            "workbook generated with the lightweight codec ({})",
            reason
        )))
    }

    fn estimate_size(&self, input: &ExaSerializeInput<'_>) -> usize {
        let rows = input.processed.data().len();
        let columns = input.processed.visible_columns().len();
        // Zip container overhead plus a rough per-cell cost.
        2_000 + rows * columns * 12
    }

    async fn preview(&self, input: &ExaSerializeInput<'_>, limit: usize) -> Result<String> {
        let table = ExaTransformer::to_table(input.processed);
        let mut out = format!("[{}]\n", input.config.xlsx.sheet_name);
        out.push_str(&table.headers.join(" | "));
        out.push('\n');
        for row in table.rows.iter().take(limit) {
            let cells: Vec<String> = row.iter().map(render_cell).collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }
        if table.rows.len() > limit {
            out.push_str("...\n");
        }
        Ok(out)
    }
}

/// Replaces characters the workbook format forbids in sheet names and caps
/// the length.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(SHEET_NAME_MAX)
        .collect();
    if cleaned.trim().is_empty() {
        "Datos".to_string()
    } else {
        cleaned
    }
}

/// Column width from header and sampled cell lengths, clamped.
pub fn estimate_column_width(
    header: &str,
    cells: impl Iterator<Item = usize>,
    options: &ExaXlsxOptions,
) -> f64 {
    let width = cells.fold(header.chars().count(), usize::max);
    width.clamp(options.min_column_width, options.max_column_width) as f64
}

#[cfg(feature = "xlsx")]
mod full {
    use rust_xlsxwriter::{DocProperties, Format, FormatAlign, FormatBorder, Workbook};

    use crate::config::ExaResolvedConfig;

    use super::*;

    /// Rows sampled for column width estimation.
    const WIDTH_SAMPLE_ROWS: usize = 100;

    /// Writes all sheets with the fully-styled codec.
    pub fn write_workbook(sheets: &[ExaSheet], config: &ExaResolvedConfig) -> Result<Vec<u8>> {
        let options = &config.xlsx;
        let mut workbook = Workbook::new();

        let meta = sheets
            .first()
            .map(|s| s.data.metadata().clone())
            .unwrap_or_else(|| {
                crate::process::ExaResolvedMeta {
                    title: "Datos".to_string(),
                    author: "Exa".to_string(),
                    created_at: String::new(),
                    description: None,
                    row_count: 0,
                    column_count: 0,
                }
            });
        let properties = DocProperties::new()
            .set_author(&meta.author)
            .set_title(&meta.title)
            .set_company(&config.pdf.branding.org_name);
        workbook.set_properties(&properties);

        let mut header_format = Format::new()
            .set_background_color(options.header_style.background_color.as_str())
            .set_font_color(options.header_style.text_color.as_str())
            .set_font_size(options.header_style.font_size)
            .set_align(FormatAlign::Center);
        if options.header_style.bold {
            header_format = header_format.set_bold();
        }

        let mut data_format = Format::new();
        if options.show_borders {
            data_format = data_format.set_border(FormatBorder::Thin);
            header_format = header_format.set_border(FormatBorder::Thin);
        }

        for sheet in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(sanitize_sheet_name(&sheet.name))
                .map_err(|err| ExaError::format("xlsx", err.to_string()))?;

            let table = ExaTransformer::to_table(&sheet.data);

            for (col, header) in table.headers.iter().enumerate() {
                worksheet
                    .write_string_with_format(0, cast_col(col)?, header, &header_format)
                    .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
            }
            worksheet
                .set_row_height(0, options.header_style.height)
                .map_err(|err| ExaError::format("xlsx", err.to_string()))?;

            for (row_index, row) in table.rows.iter().enumerate() {
                let target = cast_row(row_index + 1)?;
                for (col_index, cell) in row.iter().enumerate() {
                    let col = cast_col(col_index)?;
                    match cell {
                        Value::Number(n) => {
                            worksheet
                                .write_number_with_format(
                                    target,
                                    col,
                                    n.as_f64().unwrap_or(0.0),
                                    &data_format,
                                )
                                .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
                        }
                        Value::Bool(b) => {
                            worksheet
                                .write_boolean_with_format(target, col, *b, &data_format)
                                .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
                        }
                        other => {
                            worksheet
                                .write_string_with_format(
                                    target,
                                    col,
                                    &render_cell(other),
                                    &data_format,
                                )
                                .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
                        }
                    }
                }
            }

            if options.auto_fit_columns {
                for (col_index, header) in table.headers.iter().enumerate() {
                    let width = estimate_column_width(
                        header,
                        table
                            .rows
                            .iter()
                            .take(WIDTH_SAMPLE_ROWS)
                            .filter_map(|row| row.get(col_index))
                            .map(|cell| render_cell(cell).chars().count()),
                        options,
                    );
                    worksheet
                        .set_column_width(cast_col(col_index)?, width)
                        .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
                }
            }

            if options.freeze_header {
                worksheet
                    .set_freeze_panes(1, 0)
                    .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
            }
            if options.auto_filter && !table.rows.is_empty() && !table.headers.is_empty() {
                worksheet
                    .autofilter(
                        0,
                        0,
                        cast_row(table.rows.len())?,
                        cast_col(table.headers.len() - 1)?,
                    )
                    .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
            }
            if options.zoom != 100 {
                worksheet.set_zoom(options.zoom);
            }
        }

        workbook
            .save_to_buffer()
            .map_err(|err| ExaError::format("xlsx", err.to_string()))
    }

    fn cast_row(value: usize) -> Result<u32> {
        u32::try_from(value)
            .map_err(|_| ExaError::format("xlsx", format!("row index overflow: {}", value)))
    }

    fn cast_col(value: usize) -> Result<u16> {
        u16::try_from(value)
            .map_err(|_| ExaError::format("xlsx", format!("column index overflow: {}", value)))
    }
}

/// Lightweight SpreadsheetML writer.
///
/// Emits the minimal zip members a workbook needs, with inline-string
/// cells and no styling. Structurally valid, opens in common readers.
mod lite {
    use std::io::Cursor;

    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    use super::*;

    pub fn write_workbook(sheets: &[ExaSheet], options: &ExaXlsxOptions) -> Result<Vec<u8>> {
        let cursor = Cursor::new(Vec::new());
        let mut zip = ZipWriter::new(cursor);
        let file_options =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("[Content_Types].xml", file_options)?;
        zip.write_all(content_types(sheets.len()).as_bytes())?;

        zip.start_file("_rels/.rels", file_options)?;
        zip.write_all(ROOT_RELS.as_bytes())?;

        zip.start_file("xl/workbook.xml", file_options)?;
        zip.write_all(workbook_xml(sheets).as_bytes())?;

        zip.start_file("xl/_rels/workbook.xml.rels", file_options)?;
        zip.write_all(workbook_rels(sheets.len()).as_bytes())?;

        zip.start_file("xl/styles.xml", file_options)?;
        zip.write_all(STYLES_XML.as_bytes())?;

        for (index, sheet) in sheets.iter().enumerate() {
            zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), file_options)?;
            zip.write_all(sheet_xml(sheet, options).as_bytes())?;
        }

        let cursor = zip
            .finish()
            .map_err(|err| ExaError::format("xlsx", err.to_string()))?;
        Ok(cursor.into_inner())
    }

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf/></cellStyleXfs><cellXfs count="1"><xf/></cellXfs></styleSheet>"#;

    fn content_types(sheet_count: usize) -> String {
        let mut overrides = String::new();
        for index in 1..=sheet_count {
            overrides.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
                index
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>{}</Types>"#,
            overrides
        )
    }

    fn workbook_xml(sheets: &[ExaSheet]) -> String {
        let mut entries = String::new();
        for (index, sheet) in sheets.iter().enumerate() {
            entries.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(&sanitize_sheet_name(&sheet.name)),
                index + 1,
                index + 1
            ));
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{}</sheets></workbook>"#,
            entries
        )
    }

    fn workbook_rels(sheet_count: usize) -> String {
        let mut entries = String::new();
        for index in 1..=sheet_count {
            entries.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
                index, index
            ));
        }
        entries.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
            sheet_count + 1
        ));
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{}</Relationships>"#,
            entries
        )
    }

    fn sheet_xml(sheet: &ExaSheet, options: &ExaXlsxOptions) -> String {
        let table = ExaTransformer::to_table(&sheet.data);
        let mut rows = String::new();

        let mut header_cells = String::new();
        for header in &table.headers {
            header_cells.push_str(&inline_string_cell(header));
        }
        rows.push_str(&format!("<row r=\"1\">{}</row>", header_cells));

        for (row_index, row) in table.rows.iter().enumerate() {
            let mut cells = String::new();
            for cell in row {
                match cell {
                    Value::Number(n) => {
                        cells.push_str(&format!("<c><v>{}</v></c>", n));
                    }
                    Value::Bool(b) => {
                        cells.push_str(&format!(
                            "<c t=\"b\"><v>{}</v></c>",
                            if *b { 1 } else { 0 }
                        ));
                    }
                    other => cells.push_str(&inline_string_cell(&render_cell(other))),
                }
            }
            rows.push_str(&format!("<row r=\"{}\">{}</row>", row_index + 2, cells));
        }

        let pane = if options.freeze_header {
            r#"<sheetViews><sheetView workbookViewId="0"><pane ySplit="1" topLeftCell="A2" state="frozen"/></sheetView></sheetViews>"#
        } else {
            ""
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{}<sheetData>{}</sheetData></worksheet>"#,
            pane, rows
        )
    }

    fn inline_string_cell(text: &str) -> String {
        format!(
            "<c t=\"inlineStr\"><is><t xml:space=\"preserve\">{}</t></is></c>",
            escape_xml(text)
        )
    }

    fn escape_xml(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&apos;"),
                other => out.push(other),
            }
        }
        out
    }
}
