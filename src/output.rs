use std::io::Write;

use anyhow::{Context, Result};

use crate::records::{Record, RecordSet};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub const CSV_HEADER: [&str; 9] = [
    "Kategorie",
    "Einheit",
    "Datum",
    "EinsatzNummer",
    "Status",
    "Einsatzart",
    "PLZ",
    "Ort",
    "Strasse",
];

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    Json,
    Csv,
    Debug,
}

impl From<&str> for OutputFormat {
    /// Unknown names fall back to the debug dump
    fn from(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            "csv" => Self::Csv,
            _ => Self::Debug,
        }
    }
}

pub fn render<W: Write>(
    record_set: &RecordSet,
    format: OutputFormat,
    delimiter: u8,
    out: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, record_set).context("write JSON")?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(record_set, delimiter, out)?,
        OutputFormat::Debug => writeln!(out, "{:#?}", record_set)?,
    }

    out.flush()?;
    Ok(())
}

/// Writes the spreadsheet-friendly table: a BOM so that Excel picks UTF-8,
/// the fixed header, then one row per record
fn write_csv<W: Write>(record_set: &RecordSet, delimiter: u8, out: &mut W) -> Result<()> {
    out.write_all(UTF8_BOM)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(&mut *out);

    writer.write_record(CSV_HEADER).context("write CSV header")?;

    for record in &record_set.records {
        writer.write_record(csv_row(record)).context("write CSV row")?;
    }

    writer.flush()?;
    Ok(())
}

fn csv_row(record: &Record) -> [String; 9] {
    [
        record.category.clone(),
        record.unit.clone(),
        record.date_time.to_string(),
        record.record_number.clone(),
        record.processing_status.clone(),
        record.kind.clone(),
        record.postal_code.clone(),
        record.location_long.clone(),
        record.street.clone(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{decode, fixtures, Timestamp};
    use chrono::NaiveDate;

    fn record() -> Record {
        Record {
            row_id: "row_1".to_string(),
            category: "RD".to_string(),
            unit: "RTW 1".to_string(),
            date_time: Timestamp(
                NaiveDate::from_ymd_opt(2024, 1, 2)
                    .unwrap()
                    .and_hms_opt(13, 0, 0)
                    .unwrap(),
            ),
            record_number: "E-1".to_string(),
            form_flag: "true".to_string(),
            next_handler: "jdoe".to_string(),
            rights_code: "RK".to_string(),
            processing_status: "offen".to_string(),
            billing_status: "offen".to_string(),
            kind: "Notfall".to_string(),
            postal_code: "6900".to_string(),
            location_short: "Bregenz".to_string(),
            location_long: "Bregenz Zentrum".to_string(),
            street: "Hauptstrasse 1".to_string(),
            misc: String::new(),
        }
    }

    fn record_set(records: Vec<Record>) -> RecordSet {
        RecordSet {
            total_records: records.len() as i64,
            total_display_records: records.len() as i64,
            echo: 1,
            records,
        }
    }

    fn render_to_string(record_set: &RecordSet, format: OutputFormat, delimiter: u8) -> String {
        let mut out = Vec::new();
        render(record_set, format, delimiter, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn format_names() {
        assert_eq!(OutputFormat::from("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::from("csv"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from("xml"), OutputFormat::Debug);
        assert_eq!(OutputFormat::from(""), OutputFormat::Debug);
    }

    #[test]
    fn csv_single_record() {
        let output = render_to_string(&record_set(vec![record()]), OutputFormat::Csv, b';');

        assert_eq!(
            output,
            "\u{feff}Kategorie;Einheit;Datum;EinsatzNummer;Status;Einsatzart;PLZ;Ort;Strasse\n\
             RD;RTW 1;2024-01-02 13:00:00;E-1;offen;Notfall;6900;Bregenz Zentrum;Hauptstrasse 1\n"
        );
    }

    #[test]
    fn csv_starts_with_bom() {
        let mut out = Vec::new();
        render(&record_set(vec![]), OutputFormat::Csv, b';', &mut out).unwrap();

        assert_eq!(&out[..3], UTF8_BOM);
        assert_eq!(&out[3..], b"Kategorie;Einheit;Datum;EinsatzNummer;Status;Einsatzart;PLZ;Ort;Strasse\n");
    }

    #[test]
    fn csv_quotes_fields_containing_delimiter() {
        let mut record = record();
        record.street = "Hauptstrasse 1, Hof".to_string();

        let output = render_to_string(&record_set(vec![record]), OutputFormat::Csv, b',');
        assert!(output.ends_with(",\"Hauptstrasse 1, Hof\"\n"));
    }

    #[test]
    fn json_round_trips() {
        let expected = decode(fixtures::RECORD_SET_JSON).unwrap();
        let output = render_to_string(&expected, OutputFormat::Json, b';');

        assert!(output.starts_with("{\n  \"aaData\": ["));
        assert_eq!(decode(&output).unwrap(), expected);
    }

    #[test]
    fn debug_dump() {
        let output = render_to_string(&record_set(vec![record()]), OutputFormat::Debug, b';');

        assert!(output.starts_with("RecordSet {"));
        assert!(output.contains("street: \"Hauptstrasse 1\""));
    }
}
