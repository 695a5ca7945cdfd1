// ============================================================
// Layer 4 — Project Tables
// ============================================================
// CSV tables shared with the annotation tool:
//
//   coordinate table  file name | <landmark> | <landmark> ...
//                     cells hold "[x, y]", empty when missing
//   file table        file name | full path | (other columns)
//   vocabulary table  name | target
//
// Columns are located by header name, so extra bookkeeping
// columns owned by the annotation tool are ignored.

use std::path::Path;

use csv::{Reader, StringRecord, Writer};

use crate::domain::error::{PipelineError, Result};
use crate::domain::landmark::{Point, Vocabulary};
use crate::domain::sample::{FileEntry, Sample};

pub const FILE_NAME_COLUMN: &str = "file name";
pub const FULL_PATH_COLUMN: &str = "full path";
pub const NAME_COLUMN:      &str = "name";
pub const TARGET_COLUMN:    &str = "target";

/// Name of the coordinate table written next to dataset images.
pub const LANDMARK_TABLE: &str = "df_landmarks.csv";

fn column_index(headers: &StringRecord, column: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| PipelineError::MissingColumn {
            path:   path.display().to_string(),
            column: column.to_string(),
        })
}

/// Parse one coordinate cell.
///
/// Accepts `[x, y]` (and `(x, y)`), with integer or decimal
/// components rounded to the nearest pixel. Empty and `nan`
/// cells are unannotated landmarks.
pub fn parse_point(column: &str, cell: &str) -> Result<Option<Point>> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    let invalid = || PipelineError::InvalidCoordinate {
        column: column.to_string(),
        value:  cell.to_string(),
    };

    let inner = cell
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')']);
    let mut parts = inner.split(',').map(|s| s.trim().parse::<f64>());

    match (parts.next(), parts.next(), parts.next()) {
        (Some(Ok(x)), Some(Ok(y)), None) if x.is_finite() && y.is_finite() => {
            Ok(Some(Point::rounded(x, y)))
        }
        _ => Err(invalid()),
    }
}

// ─── Coordinate Table ─────────────────────────────────────────────────────────

/// Read a coordinate table, keeping row order. Landmarks whose
/// column is absent from the table are unannotated.
pub fn read_coordinate_table(path: &Path, vocabulary: &Vocabulary) -> Result<Vec<Sample>> {
    let mut reader = Reader::from_path(path)?;
    let headers    = reader.headers()?.clone();
    let key        = column_index(&headers, FILE_NAME_COLUMN, path)?;
    let columns: Vec<Option<usize>> = vocabulary
        .names()
        .iter()
        .map(|name| headers.iter().position(|h| h.trim() == name))
        .collect();

    let mut samples = Vec::new();
    for record in reader.records() {
        let record    = record?;
        let file_name = record.get(key).unwrap_or_default().to_string();

        let landmarks = vocabulary
            .names()
            .iter()
            .zip(&columns)
            .map(|(name, col)| match col.and_then(|c| record.get(c)) {
                Some(cell) => parse_point(name, cell),
                None       => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;

        samples.push(Sample::new(file_name, landmarks));
    }

    tracing::debug!("Read {} rows from '{}'", samples.len(), path.display());
    Ok(samples)
}

/// Write samples as a coordinate table in vocabulary order.
pub fn write_coordinate_table(path: &Path, vocabulary: &Vocabulary, samples: &[Sample]) -> Result<()> {
    let mut writer = Writer::from_path(path)?;

    let mut header = vec![FILE_NAME_COLUMN.to_string()];
    header.extend(vocabulary.names().iter().cloned());
    writer.write_record(&header)?;

    for sample in samples {
        let mut row = vec![sample.file_name.clone()];
        row.extend(
            sample
                .landmarks
                .iter()
                .map(|p| p.map(|p| p.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }

    writer.flush()?;
    tracing::debug!("Wrote {} rows to '{}'", samples.len(), path.display());
    Ok(())
}

// ─── File & Vocabulary Tables ─────────────────────────────────────────────────

/// Read the project file table.
pub fn read_file_table(path: &Path) -> Result<Vec<FileEntry>> {
    let mut reader = Reader::from_path(path)?;
    let headers    = reader.headers()?.clone();
    let name_col   = column_index(&headers, FILE_NAME_COLUMN, path)?;
    let path_col   = column_index(&headers, FULL_PATH_COLUMN, path)?;

    let mut entries = Vec::new();
    for record in reader.records() {
        let record = record?;
        entries.push(FileEntry::new(
            record.get(name_col).unwrap_or_default(),
            record.get(path_col).unwrap_or_default(),
        ));
    }
    Ok(entries)
}

/// Read the landmark vocabulary. The `target` column is optional.
pub fn read_vocabulary(path: &Path) -> Result<Vocabulary> {
    let mut reader = Reader::from_path(path)?;
    let headers    = reader.headers()?.clone();
    let name_col   = column_index(&headers, NAME_COLUMN, path)?;
    let target_col = headers.iter().position(|h| h.trim() == TARGET_COLUMN);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let name   = record.get(name_col).unwrap_or_default().trim().to_string();
        if name.is_empty() {
            continue;
        }
        let target = target_col
            .and_then(|c| record.get(c))
            .unwrap_or_default()
            .to_string();
        rows.push((name, target));
    }

    let vocabulary = Vocabulary::new(rows);
    if vocabulary.is_empty() {
        return Err(PipelineError::EmptyVocabulary(path.display().to_string()));
    }
    Ok(vocabulary)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_point_variants() {
        assert_eq!(parse_point("eye", "[123, 45]").unwrap(), Some(Point::new(123, 45)));
        assert_eq!(parse_point("eye", "(3,4)").unwrap(), Some(Point::new(3, 4)));
        assert_eq!(parse_point("eye", "[10.6, -2.4]").unwrap(), Some(Point::new(11, -2)));
        assert_eq!(parse_point("eye", "").unwrap(), None);
        assert_eq!(parse_point("eye", "NaN").unwrap(), None);
    }

    #[test]
    fn test_parse_point_rejects_garbage() {
        assert!(matches!(
            parse_point("eye", "[1, 2, 3]"),
            Err(PipelineError::InvalidCoordinate { .. })
        ));
        assert!(parse_point("eye", "left").is_err());
    }

    #[test]
    fn test_coordinate_table_round_trip() {
        let dir   = TempDir::new().unwrap();
        let path  = dir.path().join(LANDMARK_TABLE);
        let vocab = Vocabulary::from_names(["eye", "tail"]);
        let rows  = vec![
            Sample::new("a.tif", vec![Some(Point::new(1, 2)), Some(Point::new(30, 40))]),
            Sample::new("b.tif", vec![None, Some(Point::new(5, 6))]),
        ];

        write_coordinate_table(&path, &vocab, &rows).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("file name,eye,tail"));
        assert!(text.contains("\"[1, 2]\""));

        assert_eq!(read_coordinate_table(&path, &vocab).unwrap(), rows);
    }

    #[test]
    fn test_extra_and_missing_columns() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("df_landmarks.csv");
        fs::write(&path, "file name,quality,eye\nx.tif,good,\"[7, 8]\"\n").unwrap();

        let vocab = Vocabulary::from_names(["eye", "fin"]);
        let rows  = read_coordinate_table(&path, &vocab).unwrap();
        assert_eq!(rows[0].landmarks, vec![Some(Point::new(7, 8)), None]);
    }

    #[test]
    fn test_file_table_requires_key_columns() {
        let dir  = TempDir::new().unwrap();
        let good = dir.path().join("df_files.csv");
        let bad  = dir.path().join("bad.csv");
        fs::write(&good, "file name,full path,annotated\na.tif,/data/a.tif,yes\n").unwrap();
        fs::write(&bad, "file name,annotated\na.tif,yes\n").unwrap();

        assert_eq!(read_file_table(&good).unwrap(), vec![FileEntry::new("a.tif", "/data/a.tif")]);
        assert!(matches!(read_file_table(&bad), Err(PipelineError::MissingColumn { .. })));
    }

    #[test]
    fn test_vocabulary_table() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("df_model.csv");
        fs::write(&path, "name,target\neye,\"[1, 1]\"\ntail,\"[9, 9]\"\n").unwrap();

        let vocab = read_vocabulary(&path).unwrap();
        assert_eq!(vocab.names(), &["eye", "tail"]);
        assert_eq!(vocab.targets()[1], "[9, 9]");
    }

    #[test]
    fn test_vocabulary_without_landmarks_is_rejected() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("df_model.csv");
        fs::write(&path, "name,target\n,\"[1, 1]\"\n").unwrap();

        assert!(matches!(read_vocabulary(&path), Err(PipelineError::EmptyVocabulary(_))));
    }
}
