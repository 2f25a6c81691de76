//! Supervises the server's worker threads: starts `number_workers` of
//! them, each with its own bound listener set and output file, and joins
//! them cleanly on `stop`.

use crate::config::ServerConfig;
use crate::worker;
use ber_core::{BerError, BerResult};
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct Receiver {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<BerResult<()>>>,
}

impl Receiver {
    /// Start `config.number_workers` worker threads, each an independent
    /// current-thread tokio runtime bound to `config.binds`.
    pub fn start(config: ServerConfig) -> Self {
        let cancel = CancellationToken::new();
        let handles = (0..config.number_workers)
            .map(|worker_index| {
                let config = config.clone();
                let cancel = cancel.clone();
                std::thread::Builder::new()
                    .name(format!("ber-worker-{}", worker_index))
                    .spawn(move || worker::run(worker_index, config, cancel))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Receiver { cancel, handles }
    }

    /// Signal every worker to shut down and wait for them all to exit,
    /// returning the first error encountered, if any.
    pub fn stop(self) -> BerResult<()> {
        self.cancel.cancel();
        let mut first_error = None;
        for handle in self.handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("worker exited with error: {}", e);
                    first_error.get_or_insert(e);
                }
                Err(_) => {
                    log::error!("worker thread panicked");
                    first_error.get_or_insert(BerError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "worker thread panicked",
                    )));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_and_stops_cleanly() {
        let temp = std::env::temp_dir();
        let config = ServerConfig::new(
            vec!["127.0.0.1:0".parse().unwrap()],
            2,
            temp.clone(),
            temp,
            1024,
            Duration::from_secs(60),
        )
        .unwrap();

        let receiver = Receiver::start(config);
        assert_eq!(receiver.worker_count(), 2);
        std::thread::sleep(Duration::from_millis(50));
        receiver.stop().unwrap();
    }
}
