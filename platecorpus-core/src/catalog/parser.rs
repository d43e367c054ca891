//! ISO 2709 catalog record parser
//!
//! A catalog file is a sequence of records, each laid out as:
//!
//! ```text
//! leader (24 bytes, starts with 5-digit record length, base address at 12..17)
//! directory: N × [tag(3) length(4) offset(5)] then FIELD_TERMINATOR
//! field data: fields addressed by (base + offset, length), each ending in FIELD_TERMINATOR
//! RECORD_TERMINATOR
//! ```
//!
//! Data fields start with two indicator bytes followed by subfields, each
//! introduced by SUBFIELD_DELIMITER and a one-character code.

use super::references::{extract_document_filename, extract_year};
use super::tags::{self, CONTROL_NUMBER_TAG, ELECTRONIC_LOCATION_TAG, PUBLICATION_TAG};
use super::unknown::UnknownTagTracker;
use crate::error::{PipelineError, Result};
use crate::types::*;
use std::path::Path;
use tracing::{debug, warn};

pub const RECORD_TERMINATOR: u8 = 0x1D;
pub const FIELD_TERMINATOR: u8 = 0x1E;
pub const SUBFIELD_DELIMITER: u8 = 0x1F;

const LEADER_LEN: usize = 24;
const DIRECTORY_ENTRY_LEN: usize = 12;
const INDICATOR_LEN: usize = 2;

/// Decodes catalog files into [`CatalogRecord`]s, reporting unknown tags to
/// a batch-wide tracker.
pub struct CatalogParser<'a> {
    tracker: &'a UnknownTagTracker,
    verbose: bool,
}

impl<'a> CatalogParser<'a> {
    pub fn new(tracker: &'a UnknownTagTracker) -> Self {
        Self {
            tracker,
            verbose: false,
        }
    }

    /// Surface skipped-field diagnostics at warn level instead of debug
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Parse one catalog file from disk
    pub fn parse_file(&self, path: &Path) -> Result<Vec<CatalogRecord>> {
        let bytes = std::fs::read(path)?;
        let source_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        self.parse(&bytes, &source_file)
    }

    /// Parse every record in `bytes`.
    ///
    /// Stream-level corruption (bad leader, truncated record, missing record
    /// terminator) fails the whole file.
    pub fn parse(&self, bytes: &[u8], source_file: &str) -> Result<Vec<CatalogRecord>> {
        let mut records = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            // Some exports separate records with newlines
            if bytes[pos].is_ascii_whitespace() {
                pos += 1;
                continue;
            }

            let remaining = bytes.len() - pos;
            if remaining < LEADER_LEN {
                return Err(PipelineError::format(
                    source_file,
                    pos,
                    format!("truncated leader ({remaining} bytes left)"),
                ));
            }

            let record_len = parse_digits(&bytes[pos..pos + 5]).ok_or_else(|| {
                PipelineError::format(source_file, pos, "record length is not numeric")
            })?;
            if record_len <= LEADER_LEN {
                return Err(PipelineError::format(
                    source_file,
                    pos,
                    format!("record length {record_len} shorter than leader"),
                ));
            }
            if record_len > remaining {
                return Err(PipelineError::format(
                    source_file,
                    pos,
                    format!("record length {record_len} exceeds remaining {remaining} bytes"),
                ));
            }

            let raw = &bytes[pos..pos + record_len];
            if raw[record_len - 1] != RECORD_TERMINATOR {
                return Err(PipelineError::format(source_file, pos, "missing record terminator"));
            }

            records.push(self.parse_record(raw, pos, source_file)?);
            pos += record_len;
        }

        debug!(source_file, records = records.len(), "parsed catalog file");
        Ok(records)
    }

    fn parse_record(&self, raw: &[u8], offset: usize, source_file: &str) -> Result<CatalogRecord> {
        let base = parse_digits(&raw[12..17])
            .ok_or_else(|| PipelineError::format(source_file, offset, "base address is not numeric"))?;
        if base <= LEADER_LEN || base > raw.len() - 1 {
            return Err(PipelineError::format(
                source_file,
                offset,
                format!("base address {base} outside record"),
            ));
        }
        if raw[base - 1] != FIELD_TERMINATOR {
            return Err(PipelineError::format(
                source_file,
                offset,
                "directory is not terminated",
            ));
        }

        let directory = &raw[LEADER_LEN..base - 1];
        let data = &raw[base..raw.len() - 1];

        let mut fields = Vec::with_capacity(directory.len() / DIRECTORY_ENTRY_LEN);
        for entry in directory.chunks(DIRECTORY_ENTRY_LEN) {
            match self.decode_entry(entry, data) {
                Ok(Some(field)) => fields.push(field),
                Ok(None) => {}
                Err(e) => self.report_skipped_field(&e, source_file, offset),
            }
        }

        Ok(self.assemble_record(fields, source_file))
    }

    fn decode_entry(&self, entry: &[u8], data: &[u8]) -> Result<Option<CatalogField>> {
        if entry.len() < DIRECTORY_ENTRY_LEN {
            return Err(PipelineError::field(
                &String::from_utf8_lossy(entry),
                "truncated directory entry",
            ));
        }

        let tag = std::str::from_utf8(&entry[0..3])
            .map_err(|_| PipelineError::field(&String::from_utf8_lossy(&entry[0..3]), "tag is not text"))?;
        let length = parse_digits(&entry[3..7])
            .ok_or_else(|| PipelineError::field(tag, "field length is not numeric"))?;
        let start = parse_digits(&entry[7..12])
            .ok_or_else(|| PipelineError::field(tag, "field offset is not numeric"))?;

        let end = start + length;
        if end > data.len() {
            return Err(PipelineError::field(
                tag,
                format!("field spans {start}..{end} past data of {} bytes", data.len()),
            ));
        }

        let payload = strip_terminator(&data[start..end]);
        if payload.is_empty() {
            return Ok(None);
        }

        // Unknown tags are counted even when the payload fails to decode
        let decoded = decode_field(tag, payload);
        if !tags::is_known(tag) {
            match &decoded {
                Ok(field) => self.tracker.record(tag, &field.value),
                Err(_) => self.tracker.record(tag, &String::from_utf8_lossy(payload)),
            }
        }
        decoded.map(Some)
    }

    fn report_skipped_field(&self, error: &PipelineError, source_file: &str, offset: usize) {
        if self.verbose {
            warn!(source_file, record_offset = offset, "skipping field: {error}");
        } else {
            debug!(source_file, record_offset = offset, "skipping field: {error}");
        }
    }

    fn assemble_record(&self, fields: Vec<CatalogField>, source_file: &str) -> CatalogRecord {
        let control_number = fields
            .iter()
            .find(|f| f.tag == CONTROL_NUMBER_TAG)
            .map(|f| f.value.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN_CONTROL_NUMBER)
            .to_string();

        let mut urls = Vec::new();
        let mut year = None;
        for field in &fields {
            match field.tag.as_str() {
                ELECTRONIC_LOCATION_TAG => urls.push(field.value.clone()),
                // A later publication field replaces an earlier one's year
                PUBLICATION_TAG => year = extract_year(&field.value),
                _ => {}
            }
        }

        let document_filename = extract_document_filename(&urls);
        if document_filename.is_none() {
            warn!(
                control_number = %control_number,
                source_file,
                urls = ?urls,
                "could not extract document filename from urls"
            );
        }

        CatalogRecord {
            control_number,
            fields,
            source_file: source_file.to_string(),
            urls,
            document_filename,
            year,
        }
    }
}

/// Decode one field payload (terminator already stripped)
fn decode_field(tag: &str, payload: &[u8]) -> Result<CatalogField> {
    let name = tags::name_for(tag).to_string();

    if is_control_tag(tag) {
        let value = decode_text(tag, payload)?;
        return Ok(CatalogField {
            tag: tag.to_string(),
            name,
            value,
            subfields: None,
        });
    }

    if payload.len() < INDICATOR_LEN {
        return Err(PipelineError::field(tag, "data field shorter than its indicators"));
    }
    let body = &payload[INDICATOR_LEN..];

    if !body.contains(&SUBFIELD_DELIMITER) {
        return Ok(CatalogField {
            tag: tag.to_string(),
            name,
            value: decode_text(tag, body)?,
            subfields: None,
        });
    }

    let mut subfields = Vec::new();
    // Anything before the first delimiter is not addressable by a code
    for chunk in body.split(|b| *b == SUBFIELD_DELIMITER).skip(1) {
        let text = decode_text(tag, chunk)?;
        let mut chars = text.chars();
        let Some(code) = chars.next() else {
            continue;
        };
        subfields.push(Subfield {
            code: code.to_string(),
            value: chars.as_str().to_string(),
        });
    }

    let value = subfields
        .iter()
        .map(|s| s.value.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(CatalogField {
        tag: tag.to_string(),
        name,
        value,
        subfields: Some(subfields),
    })
}

fn decode_text(tag: &str, bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| PipelineError::field(tag, format!("invalid UTF-8: {e}")))
}

fn strip_terminator(bytes: &[u8]) -> &[u8] {
    match bytes.last() {
        Some(&FIELD_TERMINATOR) => &bytes[..bytes.len() - 1],
        _ => bytes,
    }
}

fn parse_digits(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    // At most five digits, cannot overflow
    Some(bytes.iter().fold(0usize, |acc, b| acc * 10 + usize::from(b - b'0')))
}


#[cfg(test)]
mod tests {
    use super::testing::RecordBuilder;
    use super::*;

    fn sample_record() -> Vec<u8> {
        RecordBuilder::new()
            .control("001", "RU\\NLR\\000123")
            .control("005", "20200101120000.0")
            .data("200", &[('a', "Atlas of Plates"), ('f', "engraved by I. Sokolov")])
            .data("210", &[('a', "St. Petersburg"), ('d', "1785")])
            .data("856", &[('u', "http://host/item/ab12345/view#page=3")])
            .build()
    }

    #[test]
    fn test_parse_single_record() {
        let tracker = UnknownTagTracker::default();
        let records = CatalogParser::new(&tracker)
            .parse(&sample_record(), "NLR000123.mrc")
            .unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.control_number, "RU\\NLR\\000123");
        assert_eq!(record.source_file, "NLR000123.mrc");
        assert_eq!(record.fields.len(), 5);
        assert_eq!(record.urls, vec!["http://host/item/ab12345/view#page=3"]);
        assert_eq!(record.document_filename.as_deref(), Some("ab12345.pdf"));
        assert_eq!(record.year.as_deref(), Some("1785"));
        assert_eq!(tracker.unique_tags(), 0);
    }

    #[test]
    fn test_control_fields_have_no_subfields() {
        let tracker = UnknownTagTracker::default();
        let records = CatalogParser::new(&tracker).parse(&sample_record(), "a.mrc").unwrap();

        let control = &records[0].fields[1];
        assert!(control.is_control());
        assert_eq!(control.name, "Date and Time of Latest Transaction");
        assert_eq!(control.value, "20200101120000.0");
        assert!(control.subfields.is_none());
    }

    #[test]
    fn test_data_field_subfields_in_order() {
        let tracker = UnknownTagTracker::default();
        let records = CatalogParser::new(&tracker).parse(&sample_record(), "a.mrc").unwrap();

        let title = records[0].fields_with_tag("200").next().unwrap();
        let subfields = title.subfields.as_ref().unwrap();
        assert_eq!(subfields.len(), 2);
        assert_eq!(subfields[0].code, "a");
        assert_eq!(subfields[0].value, "Atlas of Plates");
        assert_eq!(subfields[1].code, "f");
        assert_eq!(title.value, "Atlas of Plates engraved by I. Sokolov");
    }

    #[test]
    fn test_data_field_without_delimiter() {
        let tracker = UnknownTagTracker::default();
        let bytes = RecordBuilder::new()
            .control("001", "x1")
            .raw("300", b"  plain note")
            .build();
        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();

        let note = &records[0].fields[1];
        assert_eq!(note.value, "plain note");
        assert!(note.subfields.is_none());
    }

    #[test]
    fn test_missing_control_number_uses_sentinel() {
        let tracker = UnknownTagTracker::default();
        let bytes = RecordBuilder::new()
            .data("200", &[('a', "Untitled")])
            .build();
        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();

        assert_eq!(records[0].control_number, UNKNOWN_CONTROL_NUMBER);
        assert!(records[0].document_filename.is_none());
        assert!(records[0].year.is_none());
    }

    #[test]
    fn test_unknown_tags_tracked_across_records() {
        let tracker = UnknownTagTracker::default();
        let mut bytes = RecordBuilder::new()
            .control("001", "r1")
            .data("999", &[('a', "first example")])
            .build();
        bytes.extend(
            RecordBuilder::new()
                .control("001", "r2")
                .data("999", &[('a', "second example")])
                .build(),
        );

        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields[1].name, UNKNOWN_FIELD_NAME);

        let observation = tracker.observation("999").unwrap();
        assert_eq!(observation.occurrence_count, 2);
        assert_eq!(observation.first_example_value, "first example");
        assert_eq!(tracker.unique_tags(), 1);
    }

    #[test]
    fn test_invalid_utf8_field_is_skipped() {
        let tracker = UnknownTagTracker::default();
        let bytes = RecordBuilder::new()
            .control("001", "r1")
            .raw("200", &[b' ', b' ', SUBFIELD_DELIMITER, b'a', 0xFF, 0xFE])
            .data("210", &[('d', "1790")])
            .build();

        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();
        let tags: Vec<&str> = records[0].fields.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["001", "210"]);
        assert_eq!(records[0].year.as_deref(), Some("1790"));
    }

    #[test]
    fn test_undecodable_unknown_tag_is_still_counted() {
        let tracker = UnknownTagTracker::default();
        let bytes = RecordBuilder::new()
            .control("001", "r1")
            .raw("999", &[b' ', b' ', SUBFIELD_DELIMITER, b'a', 0xFF, b'x'])
            .build();

        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();
        let tags: Vec<&str> = records[0].fields.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["001"]);

        let observation = tracker.observation("999").unwrap();
        assert_eq!(observation.occurrence_count, 1);
        assert!(observation.first_example_value.ends_with("a\u{FFFD}x"));
    }

    #[test]
    fn test_out_of_bounds_directory_entry_is_skipped() {
        let tracker = UnknownTagTracker::default();
        let mut bytes = RecordBuilder::new()
            .control("001", "r1")
            .data("200", &[('a', "Title")])
            .build();
        // Second directory entry starts at 24 + 12; bump its length to 9999
        let entry = LEADER_LEN + DIRECTORY_ENTRY_LEN;
        bytes[entry + 3..entry + 7].copy_from_slice(b"9999");

        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();
        assert_eq!(records[0].fields.len(), 1);
        assert_eq!(records[0].control_number, "r1");
    }

    #[test]
    fn test_truncated_stream_is_format_error() {
        let tracker = UnknownTagTracker::default();
        let bytes = sample_record();
        let truncated = &bytes[..bytes.len() - 10];

        let err = CatalogParser::new(&tracker).parse(truncated, "a.mrc").unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
    }

    #[test]
    fn test_missing_record_terminator_is_format_error() {
        let tracker = UnknownTagTracker::default();
        let mut bytes = sample_record();
        let last = bytes.len() - 1;
        bytes[last] = b'x';

        let err = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap_err();
        assert!(matches!(err, PipelineError::Format { .. }));
    }

    #[test]
    fn test_records_separated_by_newlines() {
        let tracker = UnknownTagTracker::default();
        let mut bytes = sample_record();
        bytes.push(b'\n');
        bytes.extend(sample_record());
        bytes.push(b'\n');

        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_later_publication_field_replaces_year() {
        let tracker = UnknownTagTracker::default();
        let bytes = RecordBuilder::new()
            .control("001", "r1")
            .data("210", &[('d', "1785")])
            .data("210", &[('d', "1801")])
            .build();
        let records = CatalogParser::new(&tracker).parse(&bytes, "a.mrc").unwrap();
        assert_eq!(records[0].year.as_deref(), Some("1801"));
    }
}
