// ============================================
// Behavior Event Log
// ============================================
//
// Append-only JSONL durability for behavior events, one serialized event
// per line. All writes go through a single Mutex-guarded handle, so
// concurrent recorders cannot interleave partial lines or clobber each
// other the way a whole-file rewrite per event would.
//
// Compaction (after cleanup) rewrites the surviving events to a temp
// file and renames it into place.

use super::BehaviorEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

pub struct EventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl EventLog {
    /// Open (creating if absent) the log at `path` for appending.
    pub fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(EventLog {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Append one event and flush it to the OS.
    pub fn append(&self, event: &BehaviorEvent) -> std::io::Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut writer = self.writer.lock().expect("event log writer poisoned");
        writeln!(writer, "{line}")?;
        writer.flush()
    }

    /// Replay every decodable event in log order.
    ///
    /// A torn final line (crash mid-append) is skipped with a warning
    /// rather than failing the whole replay.
    pub fn replay(&self) -> std::io::Result<Vec<BehaviorEvent>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        let mut skipped = 0usize;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BehaviorEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => {
                    skipped += 1;
                    warn!(error = %e, "Skipping undecodable event log line");
                }
            }
        }

        info!(
            replayed = events.len(),
            skipped,
            path = %self.path.display(),
            "Behavior event log replayed"
        );
        Ok(events)
    }

    /// Rewrite the log to exactly `events`, atomically replacing the old file.
    pub fn compact(&self, events: &[BehaviorEvent]) -> std::io::Result<()> {
        let tmp_path = self.path.with_extension("log.tmp");
        {
            let tmp = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(tmp);
            for event in events {
                let line = serde_json::to_string(event)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                writeln!(writer, "{line}")?;
            }
            writer.flush()?;
        }

        // Swap the writer before the rename so no append lands on the
        // file being replaced
        let mut writer = self.writer.lock().expect("event log writer poisoned");
        std::fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        *writer = BufWriter::new(file);

        info!(retained = events.len(), "Behavior event log compacted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::BehaviorKind;
    use chrono::Utc;

    fn event(user_id: usize, item_id: usize, kind: BehaviorKind) -> BehaviorEvent {
        BehaviorEvent {
            user_id,
            item_id,
            kind,
            timestamp: Utc::now(),
            detail: None,
        }
    }

    #[test]
    fn test_append_replay_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");

        let log = EventLog::open(&path).unwrap();
        log.append(&event(1, 2, BehaviorKind::Click)).unwrap();
        log.append(&event(1, 3, BehaviorKind::Like)).unwrap();
        drop(log);

        let log = EventLog::open(&path).unwrap();
        let events = log.replay().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].item_id, 2);
        assert_eq!(events[1].kind, BehaviorKind::Like);
    }

    #[test]
    fn test_replay_skips_torn_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");

        let log = EventLog::open(&path).unwrap();
        log.append(&event(1, 2, BehaviorKind::View)).unwrap();
        drop(log);

        // Simulate a crash mid-append
        use std::io::Write as _;
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{{\"user_id\":1,\"item").unwrap();
        drop(file);

        let log = EventLog::open(&path).unwrap();
        let events = log.replay().unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_compact_then_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.log");

        let log = EventLog::open(&path).unwrap();
        log.append(&event(1, 2, BehaviorKind::Click)).unwrap();
        log.append(&event(1, 3, BehaviorKind::Click)).unwrap();

        let survivor = event(1, 3, BehaviorKind::Click);
        log.compact(std::slice::from_ref(&survivor)).unwrap();
        log.append(&event(2, 4, BehaviorKind::Share)).unwrap();

        let events = log.replay().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].item_id, 3);
        assert_eq!(events[1].user_id, 2);
    }
}
