use crate::error::{IoError, IoResult};
use fraudlab_core::Tensor;
use fraudlab_data::{expected_header, TransactionDataset, FEATURE_COLUMNS, N_COLUMNS};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

fn open(path: &Path) -> IoResult<File> {
    File::open(path).map_err(|source| IoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Failures of the underlying file stay I/O errors; everything else the
/// csv crate reports is a parse problem.
fn csv_error(path: &Path) -> impl Fn(csv::Error) -> IoError + '_ {
    move |err: csv::Error| {
        if !err.is_io_error() {
            return IoError::Csv(err);
        }
        match err.into_kind() {
            csv::ErrorKind::Io(source) => IoError::Io {
                path: path.to_path_buf(),
                source,
            },
            kind => IoError::Format(format!("{:?}", kind)),
        }
    }
}

fn check_header(found: &csv::StringRecord) -> IoResult<()> {
    if found.len() != N_COLUMNS {
        return Err(IoError::Format(format!(
            "expected {} columns, found {}",
            N_COLUMNS,
            found.len()
        )));
    }
    for (i, (want, got)) in expected_header().iter().zip(found.iter()).enumerate() {
        if want != got {
            return Err(IoError::Format(format!(
                "column {}: expected \"{}\", found \"{}\"",
                i + 1,
                want,
                got
            )));
        }
    }
    Ok(())
}

/// Read a credit-card transaction table into memory.
///
/// The file must carry the 31-column header `Time, V1..V28, Amount, Class`
/// (quoted or not). Every field must parse as a finite number and `Class`
/// must be 0 or 1.
pub fn load_transactions<P: AsRef<Path>>(path: P) -> IoResult<TransactionDataset> {
    let path = path.as_ref();
    let dataset = read_transactions(open(path)?, path)?;
    info!(path = %path.display(), rows = dataset.len(), "loaded transactions");
    debug!(counts = %dataset.class_counts(), "class balance on load");
    Ok(dataset)
}

fn read_transactions<R: Read>(reader: R, path: &Path) -> IoResult<TransactionDataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    check_header(rdr.headers().map_err(csv_error(path))?)?;

    let n_features = FEATURE_COLUMNS.len();
    let mut features = Vec::new();
    let mut labels = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(csv_error(path))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() != N_COLUMNS {
            return Err(IoError::Format(format!(
                "line {}: expected {} fields, found {}",
                line,
                N_COLUMNS,
                record.len()
            )));
        }
        for (j, field) in record.iter().enumerate() {
            let value: f64 = field.parse().map_err(|_| {
                IoError::Format(format!(
                    "line {}, column {}: cannot parse \"{}\" as a number",
                    line,
                    j + 1,
                    field
                ))
            })?;
            if !value.is_finite() {
                return Err(IoError::Format(format!(
                    "line {}, column {}: non-finite value",
                    line,
                    j + 1
                )));
            }
            if j < n_features {
                features.push(value);
            } else if value == 0.0 || value == 1.0 {
                labels.push(value);
            } else {
                return Err(IoError::Format(format!(
                    "line {}: Class must be 0 or 1, found {}",
                    line, value
                )));
            }
        }
    }

    if labels.is_empty() {
        return Err(IoError::Format("file has a header but no records".to_string()));
    }

    let n_rows = labels.len();
    Ok(TransactionDataset::new(
        Tensor::new(features, vec![n_rows, n_features])?,
        Tensor::from_slice(&labels),
        fraudlab_data::feature_columns(),
    )?)
}

/// Write a dataset back out with the standard header. Labels are written
/// as integers.
pub fn write_csv<P: AsRef<Path>>(path: P, dataset: &TransactionDataset) -> IoResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| IoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut wtr = csv::Writer::from_writer(file);

    let mut header: Vec<String> = dataset.columns().to_vec();
    header.push(fraudlab_data::LABEL_COLUMN.to_string());
    wtr.write_record(&header).map_err(csv_error(path))?;

    for (i, row) in dataset.features().rows()?.enumerate() {
        let mut fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        fields.push(format!("{}", dataset.labels().data()[i] as u8));
        wtr.write_record(&fields).map_err(csv_error(path))?;
    }

    wtr.flush().map_err(|source| IoError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use tempfile::NamedTempFile;

    fn header_line(quoted: bool) -> String {
        expected_header()
            .iter()
            .map(|h| if quoted { format!("\"{}\"", h) } else { h.clone() })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn record_line(seed: f64, label: u8) -> String {
        let mut fields: Vec<String> = (0..30).map(|j| format!("{}", seed + j as f64 * 0.5)).collect();
        fields.push(format!("\"{}\"", label));
        fields.join(",")
    }

    fn write_file(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_file() {
        let file = write_file(&[
            header_line(true),
            record_line(0.0, 0),
            record_line(1.0, 1),
            record_line(2.0, 0),
        ]);
        let ds = load_transactions(file.path()).unwrap();
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.n_features(), 30);
        assert_eq!(ds.class_counts().fraud, 1);
        assert_eq!(ds.row(1).unwrap()[1], 1.5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_transactions("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, IoError::Io { .. }));
    }

    #[test]
    fn test_wrong_header_is_format_error() {
        let mut header = expected_header();
        header[5] = "Velocity".to_string();
        let file = write_file(&[header.join(","), record_line(0.0, 0)]);
        let err = load_transactions(file.path()).unwrap_err();
        assert!(matches!(err, IoError::Format(msg) if msg.contains("Velocity")));
    }

    #[test]
    fn test_short_header_is_format_error() {
        let file = write_file(&["Time,Amount,Class".to_string(), "0,1,0".to_string()]);
        assert!(matches!(
            load_transactions(file.path()),
            Err(IoError::Format(_))
        ));
    }

    #[test]
    fn test_bad_record_is_format_error() {
        let file = write_file(&[header_line(false), record_line(0.0, 0), "1,2,3".to_string()]);
        assert!(matches!(
            load_transactions(file.path()),
            Err(IoError::Format(msg)) if msg.contains("line 3")
        ));

        let file = write_file(&[header_line(false), record_line(0.0, 2)]);
        assert!(matches!(
            load_transactions(file.path()),
            Err(IoError::Format(msg)) if msg.contains("Class")
        ));
    }

    /// Serves `head`, then fails like a disk that went away.
    struct BrokenAfter {
        head: std::io::Cursor<Vec<u8>>,
    }

    impl Read for BrokenAfter {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.head.read(buf)? {
                0 => Err(std::io::Error::new(std::io::ErrorKind::Other, "device lost")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_read_failure_mid_file_is_io_error() {
        let text = format!("{}\n{}\n", header_line(false), record_line(1.0, 0));
        let reader = BrokenAfter {
            head: std::io::Cursor::new(text.into_bytes()),
        };
        match read_transactions(reader, Path::new("creditcard.csv")) {
            Err(IoError::Io { path, source }) => {
                assert_eq!(path, Path::new("creditcard.csv"));
                assert_eq!(source.kind(), std::io::ErrorKind::Other);
            }
            other => panic!("expected an I/O error, got {:?}", other.map(|d| d.len())),
        }
    }

    #[test]
    fn test_header_only_is_format_error() {
        let file = write_file(&[header_line(false)]);
        assert!(matches!(
            load_transactions(file.path()),
            Err(IoError::Format(_))
        ));
    }

    #[test]
    fn test_write_then_load() {
        let file = write_file(&[header_line(false), record_line(3.0, 1), record_line(4.0, 0)]);
        let ds = load_transactions(file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        write_csv(out.path(), &ds).unwrap();
        assert_eq!(load_transactions(out.path()).unwrap(), ds);
    }
}
