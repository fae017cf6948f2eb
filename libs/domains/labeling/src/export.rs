//! Deduplication, CSV I/O and run reporting for labeled records

use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use serde::Serialize;

use domain_vector::MessagePayload;

use crate::error::ExportError;
use crate::models::{LabeledRecord, MessageIdentity};

/// Output columns, in order, before any score column is placed.
pub const CSV_HEADER: [&str; 6] = ["time", "location", "account", "message", "label", "main_category"];

/// Where a labeled CSV carries the winning score, if it carries one at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreColumn {
    #[default]
    Omitted,
    /// `score` after `main_category`
    Trailing,
    /// `best_score` between `label` and `main_category`
    BestScore,
}

impl ScoreColumn {
    /// Detect the layout from a header row. `best_score` wins if both appear.
    pub fn detect(headers: &csv::StringRecord) -> Self {
        if headers.iter().any(|h| h == "best_score") {
            ScoreColumn::BestScore
        } else if headers.iter().any(|h| h == "score") {
            ScoreColumn::Trailing
        } else {
            ScoreColumn::Omitted
        }
    }

    fn header(self) -> Vec<&'static str> {
        let mut header = CSV_HEADER.to_vec();
        match self {
            ScoreColumn::Omitted => {}
            ScoreColumn::Trailing => header.push("score"),
            ScoreColumn::BestScore => header.insert(5, "best_score"),
        }
        header
    }

    fn row(self, record: &LabeledRecord) -> Vec<String> {
        let mut row = vec![
            record.time.clone(),
            record.location.clone(),
            record.account.clone(),
            record.message.clone(),
            record.label.clone(),
            record.main_category.clone(),
        ];
        let score = || record.score.map(|s| s.to_string()).unwrap_or_default();
        match self {
            ScoreColumn::Omitted => {}
            ScoreColumn::Trailing => row.push(score()),
            ScoreColumn::BestScore => row.insert(5, score()),
        }
        row
    }
}

/// Keep the first record per identity, preserving input order.
///
/// No score arbitration happens here; callers that want the best label must
/// reduce before deduplicating.
pub fn dedup_by_identity<I>(records: I) -> Vec<LabeledRecord>
where
    I: IntoIterator<Item = LabeledRecord>,
{
    let mut seen: HashSet<MessageIdentity> = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.identity()))
        .collect()
}

/// Write records with a header row, appending a `score` column when
/// `include_score` is set. Returns the number of data rows written.
pub fn write_csv<W: Write>(
    writer: W,
    records: &[LabeledRecord],
    include_score: bool,
) -> Result<usize, ExportError> {
    let layout = if include_score {
        ScoreColumn::Trailing
    } else {
        ScoreColumn::Omitted
    };
    write_csv_as(writer, records, layout)
}

/// Write records with the score placed per `layout`.
pub fn write_csv_as<W: Write>(
    writer: W,
    records: &[LabeledRecord],
    layout: ScoreColumn,
) -> Result<usize, ExportError> {
    let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    csv.write_record(layout.header())?;
    for record in records {
        csv.write_record(layout.row(record))?;
    }

    csv.flush()?;
    Ok(records.len())
}

/// Read a labeled dataset. A `score` or `best_score` column is optional.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<LabeledRecord>, ExportError> {
    Ok(read_csv_with_layout(reader)?.0)
}

/// Read a labeled dataset along with where its score column sat, so it can
/// be written back in the same shape.
pub fn read_csv_with_layout<R: Read>(
    reader: R,
) -> Result<(Vec<LabeledRecord>, ScoreColumn), ExportError> {
    let mut csv = csv::Reader::from_reader(reader);
    let layout = ScoreColumn::detect(csv.headers()?);
    let mut records = Vec::new();
    for row in csv.deserialize() {
        records.push(row?);
    }
    Ok((records, layout))
}

/// Read a source corpus with `time,location,account,message` columns.
/// Extra columns are ignored; missing ones read as empty.
pub fn read_corpus<R: Read>(reader: R) -> Result<Vec<MessagePayload>, ExportError> {
    let mut csv = csv::Reader::from_reader(reader);
    let mut payloads = Vec::new();
    for row in csv.deserialize() {
        payloads.push(row?);
    }
    Ok(payloads)
}

/// Diagnostics for a labeling run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelingReport {
    pub terms_total: usize,
    pub terms_failed: usize,
    pub failed_terms: Vec<String>,
    pub total_matches: usize,
    pub labeled: usize,
    pub unlabeled: usize,
    pub payload_conflicts: usize,
    /// `(label, count)`, most frequent first
    pub label_counts: Vec<(String, usize)>,
    /// `(main_category, count)`, most frequent first
    pub main_category_counts: Vec<(String, usize)>,
}

impl LabelingReport {
    /// Fill in the value counts from the exported records.
    pub fn with_counts(mut self, records: &[LabeledRecord]) -> Self {
        self.label_counts = value_counts(records.iter().map(|r| r.label.as_str()));
        self.main_category_counts = value_counts(records.iter().map(|r| r.main_category.as_str()));
        self
    }
}

fn value_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: &str, account: &str, label: &str, main: &str) -> LabeledRecord {
        LabeledRecord {
            time: time.to_string(),
            location: "Easton".to_string(),
            account: account.to_string(),
            message: format!("from {account}"),
            label: label.to_string(),
            main_category: main.to_string(),
            score: Some(0.5),
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let records = vec![
            record("t1", "A", "flood", "Hazards"),
            record("t1", "B", "fire", "Hazards"),
            record("t1", "A", "rescue", "Needs"),
            record("t2", "A", "water", "Needs"),
        ];

        let deduped = dedup_by_identity(records);
        let labels: Vec<_> = deduped.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["flood", "fire", "water"]);
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let mut out = Vec::new();
        let records = vec![LabeledRecord {
            message: "roof gone, \"help\"".to_string(),
            ..record("t1", "A", "flood", "Hazards")
        }];

        let written = write_csv(&mut out, &records, false).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time,location,account,message,label,main_category"));
        assert_eq!(
            lines.next(),
            Some(r#"t1,Easton,A,"roof gone, ""help""",flood,Hazards"#)
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_csv_with_score_column() {
        let mut out = Vec::new();
        write_csv(&mut out, &[record("t1", "A", "flood", "Hazards")], true).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("time,location,account,message,label,main_category,score")
        );
        assert_eq!(lines.next(), Some("t1,Easton,A,from A,flood,Hazards,0.5"));
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let mut out = Vec::new();
        assert_eq!(write_csv(&mut out, &[], false).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "time,location,account,message,label,main_category\n"
        );
    }

    #[test]
    fn test_read_csv_without_score() {
        let input = "time,location,account,message,label,main_category\n\
                     t1,Easton,A,hello,flood,Hazards\n";
        let records = read_csv(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "flood");
        assert_eq!(records[0].score, None);
    }

    #[test]
    fn test_best_score_layout_survives_a_rewrite() {
        let input = "time,location,account,message,label,best_score,main_category\n\
                     t1,Easton,A,bridge down,collapse,0.83,Infrastructure\n\
                     t2,Weston,B,need water,water,0.91,Needs\n";
        let (records, layout) = read_csv_with_layout(input.as_bytes()).unwrap();
        assert_eq!(layout, ScoreColumn::BestScore);
        assert_eq!(records[0].score, Some(0.83));
        assert_eq!(records[1].score, Some(0.91));

        let mut out = Vec::new();
        write_csv_as(&mut out, &records, layout).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), input);
    }

    #[test]
    fn test_layout_detection() {
        fn detect(headers: &[&str]) -> ScoreColumn {
            ScoreColumn::detect(&csv::StringRecord::from(headers.to_vec()))
        }
        assert_eq!(detect(&CSV_HEADER), ScoreColumn::Omitted);
        assert_eq!(detect(&["time", "label", "main_category", "score"]), ScoreColumn::Trailing);
        assert_eq!(detect(&["time", "label", "best_score"]), ScoreColumn::BestScore);
    }

    #[test]
    fn test_read_csv_reports_missing_columns() {
        let input = "time,account\nt1,A\n";
        assert!(matches!(read_csv(input.as_bytes()), Err(ExportError::Csv(_))));
    }

    #[test]
    fn test_read_corpus_ignores_extra_columns() {
        let input = "time,location,account,message,sentiment\n\
                     2020-04-06 00:00:00,Old Town,u1,smell gas,neg\n";
        let corpus = read_corpus(input.as_bytes()).unwrap();
        assert_eq!(corpus, vec![MessagePayload::new("2020-04-06 00:00:00", "Old Town", "u1", "smell gas")]);
    }

    #[test]
    fn test_value_counts_sorted_by_count_then_name() {
        let records = vec![
            record("t1", "A", "fire", "Hazards"),
            record("t1", "B", "flood", "Hazards"),
            record("t1", "C", "flood", "Hazards"),
            record("t1", "D", "water", "Needs"),
            record("t1", "E", "bridge", "Infrastructure"),
        ];

        let report = LabelingReport::default().with_counts(&records);
        assert_eq!(
            report.label_counts,
            vec![
                ("flood".to_string(), 2),
                ("bridge".to_string(), 1),
                ("fire".to_string(), 1),
                ("water".to_string(), 1),
            ]
        );
        assert_eq!(report.main_category_counts[0], ("Hazards".to_string(), 3));
    }
}
