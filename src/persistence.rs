use crate::{FullTrackRecord, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Destination for collected records.
///
/// A sink receives the complete current snapshot on every flush and must
/// store it durably. Writing the same snapshot twice must not produce
/// duplicate records.
pub trait RecordSink: Send + Sync {
    fn write_records(&self, records: &[FullTrackRecord]) -> Result<()>;
}

/// Column names of the delimited output, in order.
pub const COLUMNS: &[&str] = &[
    "id",
    "name",
    "artists",
    "artist_ids",
    "album_id",
    "album_name",
    "album_type",
    "release_date",
    "disc_number",
    "track_number",
    "duration_ms",
    "popularity",
    "explicit",
    "isrc",
    "ean",
    "upc",
    "available_markets",
    "is_playable",
    "is_local",
    "preview_url",
    "external_url",
    "uri",
];

/// Separator for multi-valued fields (artists, markets) inside one column.
pub const LIST_SEPARATOR: &str = ";";

/// Writes records as a delimited table with a header row.
///
/// Every flush rewrites the whole file through a temporary file and a rename,
/// so the file always holds one complete snapshot and repeated flushes of the
/// same snapshot are byte-identical.
#[derive(Debug, Clone)]
pub struct DelimitedFileSink {
    path: PathBuf,
    delimiter: char,
}

impl DelimitedFileSink {
    /// Comma-separated output at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: ',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the full table (header plus one line per record).
    pub fn render(&self, records: &[FullTrackRecord]) -> String {
        let mut out = String::new();
        self.push_row(&mut out, COLUMNS.iter().map(|c| c.to_string()));
        for record in records {
            self.push_row(&mut out, record_fields(record).into_iter());
        }
        out
    }

    fn push_row(&self, out: &mut String, fields: impl Iterator<Item = String>) {
        let mut first = true;
        for field in fields {
            if !first {
                out.push(self.delimiter);
            }
            first = false;
            out.push_str(&self.escape(&field));
        }
        out.push('\n');
    }

    /// Quote a field when it contains the delimiter, a quote, or a line break.
    fn escape(&self, field: &str) -> String {
        let needs_quotes = field.contains(self.delimiter)
            || field.contains('"')
            || field.contains('\n')
            || field.contains('\r');
        if needs_quotes {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field.to_string()
        }
    }
}

impl RecordSink for DelimitedFileSink {
    fn write_records(&self, records: &[FullTrackRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = self.render(records);
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".partial");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, contents)?;
        fs::rename(&tmp_path, &self.path)?;

        log::debug!(
            "Wrote {} records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn record_fields(record: &FullTrackRecord) -> Vec<String> {
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();
    vec![
        record.id.clone(),
        record.name.clone(),
        record.artist_names().join(LIST_SEPARATOR),
        record
            .artists
            .iter()
            .map(|a| a.id.as_str())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        record.album.id.clone(),
        record.album.name.clone(),
        record.album.album_type.clone(),
        record.album.release_date.clone(),
        record.disc_number.to_string(),
        record.track_number.to_string(),
        record.duration_ms.to_string(),
        record.popularity.to_string(),
        record.explicit.to_string(),
        optional(&record.external_ids.isrc),
        optional(&record.external_ids.ean),
        optional(&record.external_ids.upc),
        record.available_markets.join(LIST_SEPARATOR),
        record
            .is_playable
            .map(|playable| playable.to_string())
            .unwrap_or_default(),
        record.is_local.to_string(),
        optional(&record.preview_url),
        record.external_urls.spotify.clone(),
        record.uri.clone(),
    ]
}

/// Keeps every flushed snapshot in memory. Handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemorySink {
    flushes: Mutex<Vec<Vec<FullTrackRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flush_count(&self) -> usize {
        self.lock().len()
    }

    /// The most recently flushed snapshot.
    pub fn last_snapshot(&self) -> Option<Vec<FullTrackRecord>> {
        self.lock().last().cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<FullTrackRecord>>> {
        self.flushes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RecordSink for MemorySink {
    fn write_records(&self, records: &[FullTrackRecord]) -> Result<()> {
        self.lock().push(records.to_vec());
        Ok(())
    }
}
