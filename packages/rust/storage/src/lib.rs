//! Flat-file snapshot storage for pipeline layers.
//!
//! Every layer is a comma-delimited text file with a header row, encoded as
//! Latin-1 so legacy exports never fail to decode. Reads are permissive:
//! short rows are padded, over-long or unsplittable rows are skipped and
//! counted. Writes go to a sibling temp file that is renamed into place, so
//! a failed write never leaves a partial file under the artifact name.
//!
//! All columns come back as text, with empty fields as nulls; typing is the
//! caller's concern.

mod latin1;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use cinelayer_shared::{ArtifactMeta, CinelayerError, Frame, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// A snapshot read back from disk.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// All-text frame in file order.
    pub frame: Frame,
    /// Records dropped because they could not be aligned with the header.
    pub skipped_rows: usize,
}

/// Read a delimited Latin-1 file into an all-text frame.
///
/// Fails with [`CinelayerError::MissingInput`] if `path` does not exist.
/// A file with a header but no records yields an empty frame; deciding
/// whether that is an error is left to the stage.
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Err(CinelayerError::missing_input(path));
    }

    let bytes = std::fs::read(path).map_err(|e| CinelayerError::io(path, e))?;
    let text = latin1::decode(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = match records.next() {
        Some(Ok(record)) => normalize_header(record.iter()),
        Some(Err(e)) => {
            return Err(CinelayerError::parse(format!(
                "{}: unreadable header: {e}",
                path.display()
            )));
        }
        None => return Ok(Snapshot {
            frame: Frame::default(),
            skipped_rows: 0,
        }),
    };

    let width = header.len();
    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    let mut skipped_rows = 0usize;

    for (idx, record) in records.enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), line = idx + 2, error = %e, "skipping unreadable record");
                skipped_rows += 1;
                continue;
            }
        };

        if record.len() > width {
            warn!(
                path = %path.display(),
                line = idx + 2,
                fields = record.len(),
                expected = width,
                "skipping record with too many fields"
            );
            skipped_rows += 1;
            continue;
        }

        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|f| (!f.is_empty()).then(|| f.to_string()))
            .collect();
        row.resize(width, None);
        rows.push(row);
    }

    let frame = Frame::from_text_rows(header, rows)?;
    debug!(
        path = %path.display(),
        rows = frame.row_count(),
        columns = frame.column_count(),
        skipped_rows,
        "read snapshot"
    );

    Ok(Snapshot {
        frame,
        skipped_rows,
    })
}

/// Encode a frame and write it atomically to `path`, creating parent directories.
///
/// Nulls are written as empty fields. Returns the artifact's size and checksum.
pub fn write_snapshot(path: &Path, frame: &Frame) -> Result<ArtifactMeta> {
    let bytes = encode_frame(frame)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CinelayerError::io(parent, e))?;
    }

    let temp = temp_path(path);
    std::fs::write(&temp, &bytes).map_err(|e| CinelayerError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(CinelayerError::io(path, e));
    }

    let meta = ArtifactMeta {
        path: path.to_path_buf(),
        sha256: sha256_hex(&bytes),
        size_bytes: bytes.len(),
        rows: frame.row_count(),
        columns: frame.column_count(),
    };

    debug!(
        path = %path.display(),
        rows = meta.rows,
        size = meta.size_bytes,
        "wrote snapshot"
    );

    Ok(meta)
}

/// Write arbitrary bytes atomically (temp file + rename).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| CinelayerError::io(parent, e))?;
    }
    let temp = temp_path(path);
    std::fs::write(&temp, bytes).map_err(|e| CinelayerError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| CinelayerError::io(path, e))
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serialize header and rows to Latin-1 CSV bytes.
fn encode_frame(frame: &Frame) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    if frame.column_count() > 0 {
        let header: Vec<Vec<u8>> = frame
            .column_names()
            .into_iter()
            .map(latin1::encode)
            .collect();
        writer
            .write_record(&header)
            .map_err(|e| CinelayerError::parse(format!("encoding header: {e}")))?;
    }

    let columns = frame.rendered_columns()?;
    for row in 0..frame.row_count() {
        let fields: Vec<Vec<u8>> = columns
            .iter()
            .map(|c| latin1::encode(c[row].as_deref().unwrap_or_default()))
            .collect();
        writer
            .write_record(&fields)
            .map_err(|e| CinelayerError::parse(format!("encoding row {row}: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| CinelayerError::parse(format!("flushing snapshot: {e}")))
}

/// Blank header cells get a positional name; repeated names get a `.N` suffix.
fn normalize_header<'a>(fields: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut header = Vec::new();

    for (idx, raw) in fields.enumerate() {
        let base = match raw.trim() {
            "" => format!("Unnamed: {idx}"),
            name => name.to_string(),
        };
        let mut name = base.clone();
        let mut n = 1;
        while !seen.insert(name.clone()) {
            name = format!("{base}.{n}");
            n += 1;
        }
        header.push(name);
    }

    header
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "snapshot".into());
    path.with_file_name(format!(".{file_name}.tmp"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
