//! Delimited-text export of profiles, pairs and results.

use std::io::Write;
use std::path::Path;

use crate::profiles::Profile;

use super::types::{PairRecord, ResponseRecord};

pub const RESULTS_HEADER: [&str; 5] = ["Product1_ID", "Product2_ID", "Prompt", "Response", "Error"];
pub const PAIRS_HEADER: [&str; 3] = ["Product1_ID", "Product2_ID", "Prompt"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write the results table. `Response` holds the code, `NA` or `ERROR`.
pub fn write_results_csv<W: Write>(records: &[ResponseRecord], out: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(RESULTS_HEADER)?;
    for record in records {
        writer.write_record([
            record.pair.product1_id.as_str(),
            record.pair.product2_id.as_str(),
            record.pair.prompt.as_str(),
            record.outcome.response_cell(),
            record.outcome.error_code().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_results_csv_path(
    records: &[ResponseRecord],
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_results_csv(records, file)
}

/// Write sampled pairs with their prompts (no responses).
pub fn write_pairs_csv<W: Write>(pairs: &[PairRecord], out: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(PAIRS_HEADER)?;
    for pair in pairs {
        writer.write_record([
            pair.product1_id.as_str(),
            pair.product2_id.as_str(),
            pair.prompt.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the profile table: `ID` then one column per attribute.
pub fn write_profiles_csv<W: Write>(profiles: &[Profile], out: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    if let Some(first) = profiles.first() {
        let header = std::iter::once("ID").chain(first.values.iter().map(|(name, _)| name.as_str()));
        writer.write_record(header)?;
    }
    for profile in profiles {
        let row = std::iter::once(profile.id.as_str())
            .chain(profile.values.iter().map(|(_, level)| level.as_str()));
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::choice::Choice;
    use crate::gateway::ProviderError;
    use crate::profiles::{generate_profiles, AttributeCatalog};
    use crate::study::types::ResponseOutcome;

    fn record(outcome: ResponseOutcome) -> ResponseRecord {
        ResponseRecord {
            pair: PairRecord {
                product1_id: "P1".into(),
                product2_id: "P9".into(),
                prompt: "line one\n\nsays \"hi\", twice".into(),
            },
            outcome,
            raw_reply: None,
        }
    }

    fn read_rows(bytes: &[u8]) -> Vec<Vec<String>> {
        csv::Reader::from_reader(bytes)
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn results_have_header_and_sentinels() {
        let records = vec![
            record(ResponseOutcome::from_parsed(Some(Choice::Option2))),
            record(ResponseOutcome::Unparsed),
            record(ResponseOutcome::failed(&ProviderError::transport("refused"))),
        ];
        let mut buf = Vec::new();
        write_results_csv(&records, &mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("Product1_ID,Product2_ID,Prompt,Response,Error\n"));

        let rows = read_rows(&buf);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][2], "line one\n\nsays \"hi\", twice");
        assert_eq!(rows[0][3], "2");
        assert_eq!(rows[1][3], "NA");
        assert_eq!(rows[2][3], "ERROR");
        assert_eq!(rows[2][4], "transport_error");
    }

    #[test]
    fn profile_table_columns() {
        let profiles = generate_profiles(&AttributeCatalog::laptops());
        let mut buf = Vec::new();
        write_profiles_csv(&profiles, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("ID,Brand,Price,Size,RAM,Storage"));
        assert_eq!(lines.next(), Some("P1,Dell,$800,13-inch,8GB,256GB"));
        assert_eq!(text.lines().count(), 109);
    }
}
