use super::{EventEnvelope, EventLog, StreamIndex};
use crate::error::{CanvasError, Result};
use parking_lot::{Mutex, RwLock};
use pixelplace_types::CanvasEvent;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// JSON-lines event log.
///
/// The whole file is replayed into an in-memory index on open; every append
/// writes one line and syncs it to disk before the event becomes visible to
/// readers.
pub struct FileEventLog {
    path: PathBuf,
    file: Mutex<LogFile>,
    index: RwLock<StreamIndex>,
}

/// The open file and the length of its last complete record.
struct LogFile {
    file: File,
    len: u64,
    poisoned: bool,
}

impl LogFile {
    /// Append one record. A failed write is cut back to the previous length;
    /// if that fails too the file is poisoned.
    fn write_record(&mut self, record: &[u8]) -> std::io::Result<()> {
        if self.file.metadata()?.len() != self.len {
            warn!(len = self.len, "Discarding bytes after the last complete record");
            self.file.set_len(self.len)?;
        }

        let written = self
            .file
            .write_all(record)
            .and_then(|()| self.file.sync_data());
        match written {
            Ok(()) => {
                self.len += record.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.file.set_len(self.len) {
                    error!(error = %rollback, "Failed to roll back partial event record");
                    self.poisoned = true;
                }
                Err(e)
            }
        }
    }
}

impl FileEventLog {
    /// Open (or create) the log at `path`.
    ///
    /// A torn final line left by a crash mid-append is discarded and the
    /// file truncated to the last complete record. Any other malformed
    /// record is a persistence error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let mut index = StreamIndex::default();
        let mut offset = 0usize;
        let mut torn_at = None;
        for (line_no, line) in contents.split_inclusive('\n').enumerate() {
            let complete = line.ends_with('\n');
            let record = line.trim();
            if !record.is_empty() {
                match serde_json::from_str::<EventEnvelope>(record) {
                    Ok(envelope) => index.insert(envelope),
                    Err(e) if !complete => {
                        warn!(path = %path.display(), line = line_no + 1, error = %e, "discarding torn event record");
                        torn_at = Some(offset);
                        break;
                    }
                    Err(e) => {
                        return Err(CanvasError::Persistence(format!(
                            "{}:{}: malformed event record: {e}",
                            path.display(),
                            line_no + 1
                        )))
                    }
                }
            }
            offset += line.len();
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if let Some(len) = torn_at {
            file.set_len(len as u64)?;
        } else if !contents.is_empty() && !contents.ends_with('\n') {
            // Last record is intact but unterminated.
            file.write_all(b"\n")?;
        }
        let len = file.metadata()?.len();

        info!(path = %path.display(), events = index.position(), "Opened event log");

        Ok(Self {
            path,
            file: Mutex::new(LogFile {
                file,
                len,
                poisoned: false,
            }),
            index: RwLock::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLog for FileEventLog {
    fn append(
        &self,
        stream_id: &str,
        expected_sequence: u64,
        event: CanvasEvent,
    ) -> Result<EventEnvelope> {
        let mut file = self.file.lock();
        if file.poisoned {
            return Err(CanvasError::Persistence(format!(
                "{}: event log rejected appends after a failed write",
                self.path.display()
            )));
        }
        let envelope = self
            .index
            .read()
            .prepare(stream_id, expected_sequence, event)?;

        let mut line = serde_json::to_string(&envelope)?;
        line.push('\n');
        file.write_record(line.as_bytes())?;

        debug!(stream = stream_id, position = envelope.position, "Appended event");
        self.index.write().insert(envelope.clone());
        Ok(envelope)
    }

    fn read(&self, stream_id: &str) -> Result<Vec<EventEnvelope>> {
        Ok(self.index.read().read(stream_id))
    }

    fn list_stream_ids(&self, prefix: &str) -> Result<BTreeSet<String>> {
        Ok(self.index.read().list(prefix))
    }

    fn last_position(&self) -> u64 {
        self.index.read().position()
    }
}

impl std::fmt::Debug for FileEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileEventLog")
            .field("path", &self.path)
            .field("events", &self.index.read().position())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelplace_types::{CanvasCreated, CanvasId, HexColor};
    use tempfile::TempDir;

    fn created(id: &str) -> CanvasEvent {
        CanvasEvent::CanvasCreated(CanvasCreated {
            canvas_id: CanvasId::new(id),
            name: "n".to_string(),
            width: 10,
            height: 10,
            background_color: HexColor::parse("#FFF").unwrap(),
            created_by: "u".to_string(),
        })
    }

    #[test]
    fn test_reopen_replays_events() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/events.jsonl");

        {
            let log = FileEventLog::open(&path).unwrap();
            log.append("a", 0, created("a")).unwrap();
            log.append("a_1_1", 0, created("a")).unwrap();
        }

        let log = FileEventLog::open(&path).unwrap();
        assert_eq!(log.last_position(), 2);
        assert_eq!(log.read("a").unwrap().len(), 1);
        assert_eq!(log.list_stream_ids("a_").unwrap().len(), 1);

        let next = log.append("a", 1, created("a")).unwrap();
        assert_eq!((next.sequence, next.position), (2, 3));
    }

    #[test]
    fn test_torn_tail_is_discarded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        {
            let log = FileEventLog::open(&path).unwrap();
            log.append("a", 0, created("a")).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"streamId\":\"a\",\"seq").unwrap();
        drop(file);

        let log = FileEventLog::open(&path).unwrap();
        assert_eq!(log.last_position(), 1);
        log.append("b", 0, created("b")).unwrap();
        drop(log);

        let log = FileEventLog::open(&path).unwrap();
        assert_eq!(log.last_position(), 2);
    }

    #[test]
    fn test_stray_bytes_are_cut_before_next_append() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let log = FileEventLog::open(&path).unwrap();
        log.append("a", 0, created("a")).unwrap();

        // Leftover of an interrupted write.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"streamId\":\"b\",\"seq").unwrap();
        drop(file);

        log.append("c", 0, created("c")).unwrap();
        drop(log);

        let log = FileEventLog::open(&path).unwrap();
        assert_eq!(log.last_position(), 2);
        assert_eq!(log.read("c").unwrap().len(), 1);
        assert!(log.read("b").unwrap().is_empty());
    }

    #[test]
    fn test_failed_write_without_rollback_poisons_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let log = FileEventLog::open(&path).unwrap();
        log.append("a", 0, created("a")).unwrap();

        // A read-only handle fails both the write and the truncation.
        log.file.lock().file = File::open(&path).unwrap();
        assert!(log.append("b", 0, created("b")).is_err());
        assert_eq!(log.last_position(), 1);

        log.file.lock().file = OpenOptions::new().append(true).open(&path).unwrap();
        let err = log.append("b", 0, created("b")).unwrap_err();
        assert!(matches!(err, CanvasError::Persistence(_)));
        drop(log);

        let log = FileEventLog::open(&path).unwrap();
        assert_eq!(log.last_position(), 1);
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        let err = FileEventLog::open(&path).unwrap_err();
        assert!(matches!(err, CanvasError::Persistence(_)));
    }
}
