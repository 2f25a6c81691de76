//! BER ingest server: wires the worker supervisor to a validated
//! configuration, exposing the `start`/`stop` surface the CLI drives.

use crate::config::ServerConfig;
use crate::receiver::Receiver;
use ber_core::BerResult;

/// A running (or not-yet-started) BER ingest server.
pub struct BerServer {
    config: ServerConfig,
    receiver: Option<Receiver>,
}

impl BerServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            receiver: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start all worker threads. Idempotent only in the sense that a
    /// second call while already running replaces the supervisor handle
    /// without stopping the prior one -- callers should `stop` first.
    pub fn start(&mut self) {
        log::info!(
            "starting ber-server: {} worker(s) on {} bind address(es)",
            self.config.number_workers,
            self.config.binds.len()
        );
        self.receiver = Some(Receiver::start(self.config.clone()));
    }

    /// Signal every worker to shut down and wait for them to exit.
    pub fn stop(&mut self) -> BerResult<()> {
        match self.receiver.take() {
            Some(receiver) => receiver.stop(),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.receiver.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_and_stops() {
        let temp = std::env::temp_dir();
        let config = ServerConfig::new(
            vec!["127.0.0.1:0".parse().unwrap()],
            1,
            temp.clone(),
            temp,
            1024,
            Duration::from_secs(60),
        )
        .unwrap();

        let mut server = BerServer::new(config);
        assert!(!server.is_running());
        server.start();
        assert!(server.is_running());
        std::thread::sleep(Duration::from_millis(50));
        server.stop().unwrap();
        assert!(!server.is_running());
    }
}
