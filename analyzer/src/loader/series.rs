use anyhow::Context;
use dosecore::scan_interface::{RawSample, RawSeries};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Metadata lines written by the acquisition software ahead of the header row.
pub const DEFAULT_SKIP_ROWS: usize = 4;

pub fn load_series<P: AsRef<Path>>(path: P, skip_rows: usize) -> anyhow::Result<RawSeries> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("opening recording {}", path_ref.display()))?;
    let mut reader = BufReader::new(file);

    let mut line = String::new();
    for row in 0..skip_rows {
        line.clear();
        let read = reader.read_line(&mut line).with_context(|| {
            format!(
                "skipping metadata line {} of {}",
                row + 1,
                path_ref.display()
            )
        })?;
        if read == 0 {
            anyhow::bail!("{} ends inside its metadata block", path_ref.display());
        }
    }

    read_series(reader).with_context(|| format!("reading recording {}", path_ref.display()))
}

/// Parses a headed CSV table; only `index`/`number`, `time`, `ch0` and `ch1` are used.
pub fn read_series<R: Read>(reader: R) -> anyhow::Result<RawSeries> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .has_headers(true)
        .from_reader(reader);

    let mut samples = Vec::new();
    for (row, record) in csv_reader.deserialize::<RawSample>().enumerate() {
        let sample = record.with_context(|| format!("parsing data row {}", row + 1))?;
        samples.push(sample);
    }

    log::info!("loaded {} samples", samples.len());
    RawSeries::new(samples).context("validating recording")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_number_column_and_ignores_extras() {
        let table = "number,time,ch0,ch1,temp\n0,0.00,1.5,0.5,21.0\n1,0.01,1.6,0.4,21.0\n";
        let series = read_series(table.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.samples()[1].index, 1);
        assert_eq!(series.samples()[1].ch0, 1.6);
    }

    #[test]
    fn skips_metadata_block() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"Device: scanner\nOperator: qa\nDate: 2024-05-02\nMode: PDD\nindex,time,ch0,ch1\n7,0.5,2.0,1.0\n8,0.6,2.1,1.1\n",
        )
        .unwrap();
        let series = load_series(temp.path(), DEFAULT_SKIP_ROWS).unwrap();
        assert_eq!(series.samples()[0].index, 7);
        assert_eq!(series.samples()[1].time, 0.6);
    }

    #[test]
    fn malformed_row_reports_context() {
        let table = "index,time,ch0,ch1\n0,0.0,1.0,1.0\n1,abc,1.0,1.0\n";
        let err = read_series(table.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("data row 2"));
    }

    #[test]
    fn truncated_metadata_is_an_error() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"only one line\n").unwrap();
        assert!(load_series(temp.path(), DEFAULT_SKIP_ROWS).is_err());
    }
}
