use crate::file::csv::{
    error::ArtifactError,
    header::{Header, HeaderPolicy},
};
use model::records::document::Document;
use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendSummary {
    pub header: Header,
    pub rows_written: usize,
    /// Whether this call created the artifact and wrote its header.
    pub created: bool,
}

/// Appends document batches to a CSV artifact with a fixed header.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvAppender {
    policy: HeaderPolicy,
    hide_identity: bool,
}

impl CsvAppender {
    pub fn new(policy: HeaderPolicy) -> Self {
        CsvAppender {
            policy,
            hide_identity: true,
        }
    }

    pub fn hide_identity(mut self, hide: bool) -> Self {
        self.hide_identity = hide;
        self
    }

    /// Writes `documents` to the artifact at `path`.
    ///
    /// With `is_new` the file is (re)created and the header derived from the
    /// batch is written first. Otherwise the header already on disk is reused
    /// and rows are appended after the existing bytes. A failure part-way
    /// leaves the rows written so far in place.
    pub fn append(
        &self,
        path: &Path,
        documents: &[Document],
        is_new: bool,
    ) -> Result<AppendSummary, ArtifactError> {
        let (header, file) = if is_new {
            let header = Header::derive(documents, self.policy, self.hide_identity)
                .ok_or(ArtifactError::EmptyBatch)?;
            // An empty header row would read back as a missing header.
            if header.is_empty() {
                return Err(ArtifactError::EmptyHeader(path.display().to_string()));
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            (header, File::create(path)?)
        } else {
            let header = read_header(path)?;
            (header, open_for_append(path)?)
        };

        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(::csv::Terminator::Any(b'\n'))
            .from_writer(file);

        if is_new {
            writer.write_record(header.columns())?;
        }

        let mut rows_written = 0;
        for doc in documents {
            let dropped = doc.keys().filter(|key| !header.contains(key)).count();
            if dropped > 0 {
                debug!("Dropping {dropped} field(s) not present in the artifact header");
            }
            writer.write_record(header.cells(doc))?;
            rows_written += 1;
        }

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        info!(
            "Wrote {} rows to {} ({})",
            rows_written,
            path.display(),
            if is_new { "created" } else { "appended" }
        );

        Ok(AppendSummary {
            header,
            rows_written,
            created: is_new,
        })
    }
}

/// Opens an existing artifact for appending, terminating a dangling last line
/// so the first appended row starts on its own line.
fn open_for_append(path: &Path) -> Result<File, ArtifactError> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;

    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }

    Ok(file)
}

/// Reads the header recorded in the first row of an artifact.
pub fn read_header(path: &Path) -> Result<Header, ArtifactError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut record = ::csv::StringRecord::new();
    if !reader.read_record(&mut record)? || record.iter().all(str::is_empty) {
        return Err(ArtifactError::MissingHeader(path.display().to_string()));
    }

    Ok(Header::new(record.iter().map(str::to_string).collect()))
}

/// Number of data rows in an artifact, excluding the header.
pub fn count_rows(path: &Path) -> Result<usize, ArtifactError> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut count = 0;
    for record in reader.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;
    use tempfile::tempdir;

    fn doc(fields: &[(&str, &str)]) -> Document {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect()
    }

    #[test]
    fn new_artifact_writes_header_then_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("a-b.csv");

        let summary = CsvAppender::new(HeaderPolicy::FirstDocument)
            .append(
                &path,
                &[doc(&[("name", "Alice &amp; Bob"), ("city", "Oslo")])],
                true,
            )
            .unwrap();

        assert!(summary.created);
        assert_eq!(summary.rows_written, 1);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "city,name\nOslo,Alice & Bob\n");
    }

    #[test]
    fn append_keeps_existing_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a-b.csv");
        let appender = CsvAppender::new(HeaderPolicy::FirstDocument);

        appender
            .append(&path, &[doc(&[("a", "1"), ("b", "2")])], true)
            .unwrap();
        let summary = appender
            .append(&path, &[doc(&[("c", "9"), ("b", "3")])], false)
            .unwrap();

        assert!(!summary.created);
        assert_eq!(summary.header.columns(), ["a", "b"]);
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "a,b\n1,2\n,3\n");
        assert_eq!(count_rows(&path).unwrap(), 2);
    }

    #[test]
    fn append_terminates_dangling_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a-b.csv");
        fs::write(&path, "a\n1").unwrap();

        CsvAppender::default()
            .append(&path, &[doc(&[("a", "2")])], false)
            .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a\n1\n2\n");
    }

    #[test]
    fn append_to_missing_artifact_fails() {
        let dir = tempdir().unwrap();
        let result = CsvAppender::default().append(
            &dir.path().join("missing.csv"),
            &[doc(&[("a", "1")])],
            false,
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_artifact_has_no_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            read_header(&path),
            Err(ArtifactError::MissingHeader(_))
        ));
    }

    #[test]
    fn new_artifact_from_empty_batch_is_rejected() {
        let dir = tempdir().unwrap();
        let result = CsvAppender::default().append(&dir.path().join("x.csv"), &[], true);
        assert!(matches!(result, Err(ArtifactError::EmptyBatch)));
    }

    #[test]
    fn identity_only_batch_is_rejected_without_creating_the_artifact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a-b.csv");
        let id_only: Document = [(
            "_id".to_string(),
            Value::Identifier("000000000000000000000001".into()),
        )]
        .into_iter()
        .collect();

        let result = CsvAppender::new(HeaderPolicy::FirstDocument)
            .hide_identity(true)
            .append(&path, &[id_only.clone()], true);

        assert!(matches!(result, Err(ArtifactError::EmptyHeader(_))));
        assert!(!path.exists());

        let summary = CsvAppender::new(HeaderPolicy::FirstDocument)
            .hide_identity(false)
            .append(&path, &[id_only], true)
            .unwrap();
        assert_eq!(summary.header.columns(), ["_id"]);
    }
}
