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

//! # Exa CSV Format Tests
//!
//! Tests for delimited-text generation: quoting, escaping, delimiter
//! conflicts, custom line breaks and the round-trip parser.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test csv
//! ```

use exa::formats::csv::{detect_delimiter, parse_csv, write_table};
use exa::formats::csv::ExaCsvSerializer;
use exa::{
    ExaDataset, ExaFormat, ExaPresets, ExaProcessor, ExaResolvedConfig, ExaSerializeInput,
    ExaSerializer, ExaTable,
};
use exa::ExaCodecCache;
use proptest::prelude::*;
use serde_json::{json, Value};

fn config(overrides: Value) -> ExaResolvedConfig {
    ExaResolvedConfig::resolve(&overrides, &ExaPresets::new()).unwrap()
}

fn sample_table() -> ExaTable {
    ExaTable {
        headers: vec!["a".to_string(), "b".to_string()],
        keys: vec!["a".to_string(), "b".to_string()],
        rows: vec![
            vec![json!(1), json!("x")],
            vec![json!(2), json!("y,z")],
        ],
    }
}

/// Tests minimal quoting: only cells containing the delimiter are quoted.
#[test]
fn test_minimal_quoting() {
    let text = write_table(&sample_table(), &config(json!({})).csv).unwrap();
    assert_eq!(text, "a,b\n1,x\n2,\"y,z\"\n");
}

/// Tests that `quoteStrings` quotes every non-numeric field.
#[test]
fn test_quote_strings() {
    let text = write_table(
        &sample_table(),
        &config(json!({"quoteStrings": true})).csv,
    )
    .unwrap();
    assert_eq!(text, "\"a\",\"b\"\n1,\"x\"\n2,\"y,z\"\n");
}

/// Tests embedded quote handling: doubled by default, backslash-escaped
/// when `escapeQuotes` is off.
#[test]
fn test_quote_escaping() {
    let table = ExaTable {
        headers: vec!["q".to_string()],
        keys: vec!["q".to_string()],
        rows: vec![vec![json!("di\"me")]],
    };

    let doubled = write_table(&table, &config(json!({})).csv).unwrap();
    assert_eq!(doubled, "q\n\"di\"\"me\"\n");

    let escaped = write_table(&table, &config(json!({"escapeQuotes": false})).csv).unwrap();
    assert_eq!(escaped, "q\n\"di\\\"me\"\n");
}

/// Tests a custom delimiter and header suppression.
#[test]
fn test_custom_delimiter_without_header() {
    let text = write_table(
        &sample_table(),
        &config(json!({"delimiter": ";", "includeHeader": false})).csv,
    )
    .unwrap();
    // The comma no longer needs quoting once the delimiter is ';'.
    assert_eq!(text, "1;x\n2;y,z\n");
}

/// Tests custom line break substitution.
#[test]
fn test_custom_line_break() {
    let text = write_table(
        &sample_table(),
        &config(json!({"lineBreak": "\r\n"})).csv,
    )
    .unwrap();
    assert_eq!(text, "a,b\r\n1,x\r\n2,\"y,z\"\r\n");
}

/// Tests the delimiter-conflict warning raised by the serializer.
#[tokio::test]
async fn test_delimiter_conflict_warning() {
    let dataset = ExaDataset::from_rows(vec![
        json!({"a": 1, "b": "x"}),
        json!({"a": 2, "b": "y,z"}),
    ]);
    let config = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &config).unwrap();
    let codecs = ExaCodecCache::with_builtin();

    let artifact = ExaCsvSerializer
        .serialize(&ExaSerializeInput {
            dataset: &dataset,
            processed: &processed,
            config: &config,
            codecs: &codecs,
        })
        .await
        .unwrap();

    assert_eq!(artifact.warnings.len(), 1);
    assert!(artifact.warnings[0].contains("delimiter ','"));
}

/// Tests parsing CSV back into a string-typed dataset.
#[test]
fn test_parse_csv() {
    let options = config(json!({})).csv;
    let parsed = parse_csv("a,b\n1,x\n2,\"y,z\"\n", &options).unwrap();

    assert_eq!(parsed.rows.len(), 2);
    assert_eq!(parsed.rows[0].get("a").unwrap(), &json!("1"));
    assert_eq!(parsed.rows[1].get("b").unwrap(), &json!("y,z"));
}

/// Tests parsing without headers: columns get positional names.
#[test]
fn test_parse_csv_without_header() {
    let options = config(json!({"includeHeader": false})).csv;
    let parsed = parse_csv("1,x\n2,y\n", &options).unwrap();

    assert_eq!(parsed.rows.len(), 2);
    assert_eq!(parsed.rows[0].get("column1").unwrap(), &json!("1"));
    assert_eq!(parsed.rows[0].get("column2").unwrap(), &json!("x"));
}

/// Tests delimiter detection over the candidate set.
#[test]
fn test_detect_delimiter() {
    assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    assert_eq!(detect_delimiter("a;b;c"), ';');
    assert_eq!(detect_delimiter("a\tb\tc"), '\t');
    assert_eq!(detect_delimiter("a|b|c"), '|');
    // No candidate present falls back to the comma.
    assert_eq!(detect_delimiter("abc"), ',');
}

/// Tests the engine-level size estimate against the real artifact for a
/// small table.
#[tokio::test]
async fn test_estimate_matches_small_output() {
    let dataset = ExaDataset::from_rows(vec![
        json!({"a": 1, "b": "x"}),
        json!({"a": 2, "b": "y,z"}),
    ]);
    let config = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &config).unwrap();
    let codecs = ExaCodecCache::with_builtin();
    let input = ExaSerializeInput {
        dataset: &dataset,
        processed: &processed,
        config: &config,
        codecs: &codecs,
    };

    let artifact = ExaCsvSerializer.serialize(&input).await.unwrap();
    let estimate = ExaCsvSerializer.estimate_size(&input);
    assert_eq!(estimate, artifact.content.len());
}

/// Tests the preview truncation marker.
#[tokio::test]
async fn test_preview_truncates() {
    let dataset = ExaDataset::from_rows(vec![
        json!({"a": 1}),
        json!({"a": 2}),
        json!({"a": 3}),
    ]);
    let config = config(json!({}));
    let processed = ExaProcessor::process(&dataset, &config).unwrap();
    let codecs = ExaCodecCache::with_builtin();

    let preview = ExaCsvSerializer
        .preview(
            &ExaSerializeInput {
                dataset: &dataset,
                processed: &processed,
                config: &config,
                codecs: &codecs,
            },
            2,
        )
        .await
        .unwrap();

    assert!(preview.contains("1\n2\n"));
    assert!(!preview.contains("\n3\n"));
    assert!(preview.ends_with("...\n"));
}

/// Tests that the format's media type and extension line up for delivery.
#[test]
fn test_format_descriptors() {
    assert_eq!(ExaFormat::Csv.media_type(), "text/csv;charset=utf-8");
    assert_eq!(ExaFormat::Csv.extension(), "csv");
    assert!(!ExaFormat::Csv.is_binary());
}

/// Tests format parsing, including the `excel` and `text` aliases.
#[test]
fn test_format_from_str() {
    assert_eq!("csv".parse::<ExaFormat>().unwrap(), ExaFormat::Csv);
    assert_eq!(" Excel ".parse::<ExaFormat>().unwrap(), ExaFormat::Xlsx);
    assert_eq!("text".parse::<ExaFormat>().unwrap(), ExaFormat::Txt);
    assert!("yaml".parse::<ExaFormat>().is_err());
}

proptest! {
    /// Tests that any table of printable string cells survives a
    /// write-then-parse round trip.
    #[test]
    fn test_round_trip(rows in proptest::collection::vec(
        ("[a-zA-Z0-9 ,;|'-]{0,12}", "[a-zA-Z0-9 ,;|'-]{0,12}"),
        1..8,
    )) {
        let table = ExaTable {
            headers: vec!["c1".to_string(), "c2".to_string()],
            keys: vec!["c1".to_string(), "c2".to_string()],
            rows: rows
                .iter()
                .map(|(a, b)| vec![json!(a), json!(b)])
                .collect(),
        };

        let options = config(json!({"quoteStrings": true})).csv;
        let text = write_table(&table, &options).unwrap();
        let parsed = parse_csv(&text, &options).unwrap();

        prop_assert_eq!(parsed.rows.len(), rows.len());
        for (row, (a, b)) in parsed.rows.iter().zip(&rows) {
            prop_assert_eq!(row.get("c1").unwrap(), &json!(a));
            prop_assert_eq!(row.get("c2").unwrap(), &json!(b));
        }
    }
}
