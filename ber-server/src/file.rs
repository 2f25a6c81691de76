//! Per-worker rotating record file.
//!
//! Each worker owns exactly one output file at a time. Records are
//! appended as they are framed off the wire; once the file reaches
//! `max_file_size`, or goes unwritten for `max_file_age`, it is closed
//! and atomically renamed from the temp directory into the final one.

use crate::config::ServerConfig;
use ber_codec::ber::time::gmtime;
use ber_core::{BerError, BerResult};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// `YYYYMMDD-HHMMSS-WWW-NNNNNN.asn1`, WWW the worker index and NNNNNN the
/// intra-second sequence number.
fn filename(worker_index: usize, epoch_seconds: i64, sequence: u64) -> String {
    let (year, month, day, hour, minute, second) = gmtime(epoch_seconds);
    format!(
        "{:04}{:02}{:02}-{:02}{:02}{:02}-{:03}-{:06}.asn1",
        year, month, day, hour, minute, second, worker_index, sequence
    )
}

/// Tracks the currently open file, if any, for one worker.
pub struct RecordFile {
    worker_index: usize,
    config: ServerConfig,
    open: Option<OpenFile>,
    /// Count of files opened within the current second, reset whenever
    /// the containing second changes.
    sequence: u64,
    last_second: i64,
}

struct OpenFile {
    file: File,
    name: String,
    size: u64,
    last_write: Instant,
}

impl RecordFile {
    pub fn new(worker_index: usize, config: ServerConfig) -> Self {
        Self {
            worker_index,
            config,
            open: None,
            sequence: 0,
            last_second: i64::MIN,
        }
    }

    fn open_new(&mut self, now_epoch: i64) -> BerResult<()> {
        self.sequence = if now_epoch == self.last_second {
            self.sequence + 1
        } else {
            0
        };
        self.last_second = now_epoch;

        let name = filename(self.worker_index, now_epoch, self.sequence);
        let path = self.config.temp_dir.join(&name);
        let file = File::create(&path).map_err(BerError::Io)?;

        self.open = Some(OpenFile {
            file,
            name,
            size: 0,
            last_write: Instant::now(),
        });
        Ok(())
    }

    /// Append one complete BER record (`record_bytes` is exactly one
    /// value's `total_length`), rotating the file first if needed.
    pub fn write_record(&mut self, record_bytes: &[u8], now_epoch: i64) -> BerResult<()> {
        if self.open.is_none() {
            self.open_new(now_epoch)?;
        }

        {
            let open = self.open.as_mut().expect("just opened above");
            open.file.write_all(record_bytes).map_err(BerError::Io)?;
            open.size += record_bytes.len() as u64;
            open.last_write = Instant::now();
        }

        if self.open.as_ref().expect("just written above").size >= self.config.max_file_size {
            self.rotate()?;
        }
        Ok(())
    }

    /// Close and rename the current file into the final directory, if
    /// one has been written to longer ago than `max_file_age`.
    pub fn close_if_stale(&mut self) -> BerResult<()> {
        let is_stale = self
            .open
            .as_ref()
            .is_some_and(|open| open.last_write.elapsed() > self.config.max_file_age);
        if is_stale {
            self.rotate()?;
        }
        Ok(())
    }

    /// Close and rename whatever file is open, regardless of age or
    /// size (used on worker shutdown).
    pub fn close(&mut self) -> BerResult<()> {
        if self.open.is_some() {
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> BerResult<()> {
        let open = self.open.take().expect("rotate called with no open file");
        drop(open.file);

        let old_path: PathBuf = self.config.temp_dir.join(&open.name);
        let new_path: PathBuf = self.config.final_dir.join(&open.name);
        std::fs::rename(&old_path, &new_path).map_err(BerError::Io)
    }
}

impl Drop for RecordFile {
    fn drop(&mut self) {
        if self.open.is_some() {
            if let Err(e) = self.rotate() {
                log::error!("failed to move final record file on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config(temp: &std::path::Path, final_dir: &std::path::Path) -> ServerConfig {
        ServerConfig::new(
            vec!["127.0.0.1:0".parse().unwrap()],
            1,
            temp.to_path_buf(),
            final_dir.to_path_buf(),
            1024,
            Duration::from_secs(60),
        )
        .unwrap()
    }

    #[test]
    fn filename_matches_template() {
        let name = filename(3, 1704112496, 7);
        assert_eq!(name, "20240101-123456-003-000007.asn1");
    }

    #[test]
    fn write_and_close_moves_file_to_final_dir() {
        let temp = tempdir();
        let final_dir = tempdir();
        let config = test_config(temp.path(), final_dir.path());
        let mut record_file = RecordFile::new(0, config);

        record_file.write_record(&[0x01, 0x01, 0xFF], 1704112496).unwrap();
        record_file.close().unwrap();

        let entries: Vec<_> = std::fs::read_dir(final_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &std::path::Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn tempdir() -> TempDir {
        let dir = std::env::temp_dir().join(format!(
            "ber-server-test-{}-{}",
            std::process::id(),
            ADDR_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }

    static ADDR_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
}
