use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use quadrant_index::config::SourceConfig;
use quadrant_index::models::RawSchoolRow;

/// Rows read from the schools CSV plus the number rejected for a bad URN.
pub struct SourceRows {
    pub rows: Vec<RawSchoolRow>,
    pub rejected: usize,
}

pub fn load_schools(path: &Path, columns: &SourceConfig) -> Result<SourceRows> {
    info!("Loading schools from {}", path.display());
    let file = File::open(path).context("Failed to open schools file")?;
    read_schools(file, columns)
}

/// Read school rows. The national export is not always UTF-8, so fields are
/// decoded lossily.
pub fn read_schools<R: Read>(reader: R, columns: &SourceConfig) -> Result<SourceRows> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.byte_headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| String::from_utf8_lossy(h).trim() == name)
            .with_context(|| format!("Column '{}' not found", name))
    };

    let id_idx = position(&columns.id_column)?;
    let name_idx = position(&columns.name_column)?;
    let easting_idx = position(&columns.easting_column)?;
    let northing_idx = position(&columns.northing_column)?;

    let mut rows = Vec::new();
    let mut rejected = 0;

    for result in csv_reader.byte_records() {
        let record = result?;

        let urn = match field(&record, id_idx).parse::<u64>() {
            Ok(urn) => urn,
            Err(_) => {
                debug!("Rejecting row with URN {:?}", field(&record, id_idx));
                rejected += 1;
                continue;
            }
        };

        rows.push(RawSchoolRow {
            urn,
            name: field(&record, name_idx),
            easting: field(&record, easting_idx).parse().ok(),
            northing: field(&record, northing_idx).parse().ok(),
        });
    }

    info!("Read {} school rows ({} rejected)", rows.len(), rejected);
    Ok(SourceRows { rows, rejected })
}

fn field(record: &ByteRecord, idx: usize) -> String {
    record
        .get(idx)
        .map(|raw| String::from_utf8_lossy(raw).trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
URN,EstablishmentName,TypeOfEstablishment,Easting,Northing
100000,The Aldgate School,Voluntary aided school,533498,181201
100003,Stepney All Saints School,Voluntary aided school,535194,181110
,Unnamed School,Other,530000,180000
ABC,Bad Urn School,Other,530000,180000
100005,Closed Nursery,Local authority nursery school,,
";

    #[test]
    fn test_read_schools() {
        let parsed = read_schools(SAMPLE.as_bytes(), &SourceConfig::default()).unwrap();
        assert_eq!(parsed.rows.len(), 3);
        assert_eq!(parsed.rejected, 2);

        let first = &parsed.rows[0];
        assert_eq!(first.urn, 100000);
        assert_eq!(first.name, "The Aldgate School");
        assert_eq!(first.easting, Some(533498.0));
        assert_eq!(first.northing, Some(181201.0));

        let closed = &parsed.rows[2];
        assert_eq!(closed.easting, None);
        assert_eq!(closed.northing, None);
    }

    #[test]
    fn test_missing_column() {
        let columns = SourceConfig {
            easting_column: "X".to_string(),
            ..SourceConfig::default()
        };
        assert!(read_schools(SAMPLE.as_bytes(), &columns).is_err());
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let parsed = load_schools(file.path(), &SourceConfig::default()).unwrap();
        assert_eq!(parsed.rows.len(), 3);
    }
}
