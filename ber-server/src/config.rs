//! Server configuration and its validated bounds.

use ber_core::{BerError, BerResult};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default worker count when `--number-workers` is not given.
pub const DEFAULT_WORKERS: usize = 4;
/// Maximum worker count (`net::tcp::receiver::max_workers` in the original).
pub const MAX_WORKERS: usize = 32;

pub const MIN_FILE_SIZE: u64 = 1;
pub const MAX_FILE_SIZE: u64 = 4 * 1024 * 1024;

pub const MIN_FILE_AGE: Duration = Duration::from_secs(1);
pub const MAX_FILE_AGE: Duration = Duration::from_secs(3600);

/// Maximum number of concurrent connections a single worker will accept.
pub const MAX_CONNECTIONS_PER_WORKER: usize = 256;

/// One `--bind` argument: either a fixed address, or an address with a
/// port range each worker probes independently.
#[derive(Debug, Clone)]
pub enum BindSpec {
    Fixed(SocketAddr),
    Range { ip: IpAddr, min_port: u16, max_port: u16 },
}

impl FromStr for BindSpec {
    type Err = String;

    /// Accepts `ip:port` (e.g. `127.0.0.1:8080`, `[::1]:8080`) or
    /// `ip:min-max` (e.g. `127.0.0.1:8000-8100`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((host, ports)) = s.rsplit_once(':') {
            if let Some((min, max)) = ports.split_once('-') {
                let ip: IpAddr = host
                    .trim_matches(|c| c == '[' || c == ']')
                    .parse()
                    .map_err(|e| format!("invalid bind address {:?}: {}", s, e))?;
                let min_port: u16 = min
                    .parse()
                    .map_err(|e| format!("invalid port range {:?}: {}", ports, e))?;
                let max_port: u16 = max
                    .parse()
                    .map_err(|e| format!("invalid port range {:?}: {}", ports, e))?;
                if min_port > max_port {
                    return Err(format!("port range {}-{} is empty", min_port, max_port));
                }
                return Ok(BindSpec::Range { ip, min_port, max_port });
            }
        }
        s.parse::<SocketAddr>()
            .map(BindSpec::Fixed)
            .map_err(|e| format!("invalid bind address {:?}: {}", s, e))
    }
}

/// Validated configuration for the BER ingest server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub binds: Vec<BindSpec>,
    pub number_workers: usize,
    pub temp_dir: PathBuf,
    pub final_dir: PathBuf,
    pub max_file_size: u64,
    pub max_file_age: Duration,
}

impl ServerConfig {
    /// Build a config, validating every bound spec.md §6 names.
    pub fn new(
        binds: Vec<BindSpec>,
        number_workers: usize,
        temp_dir: PathBuf,
        final_dir: PathBuf,
        max_file_size: u64,
        max_file_age: Duration,
    ) -> BerResult<Self> {
        if binds.is_empty() {
            return Err(BerError::InvalidConfig(
                "at least one bind address must be specified".to_string(),
            ));
        }
        if !(1..=MAX_WORKERS).contains(&number_workers) {
            return Err(BerError::InvalidConfig(format!(
                "number of workers must be in 1..={}, got {}",
                MAX_WORKERS, number_workers
            )));
        }
        if !(MIN_FILE_SIZE..=MAX_FILE_SIZE).contains(&max_file_size) {
            return Err(BerError::InvalidConfig(format!(
                "max file size must be in {}..={}, got {}",
                MIN_FILE_SIZE, MAX_FILE_SIZE, max_file_size
            )));
        }
        if !(MIN_FILE_AGE..=MAX_FILE_AGE).contains(&max_file_age) {
            return Err(BerError::InvalidConfig(format!(
                "max file age must be in {}..={} seconds, got {}",
                MIN_FILE_AGE.as_secs(),
                MAX_FILE_AGE.as_secs(),
                max_file_age.as_secs()
            )));
        }
        require_directory(&temp_dir)?;
        require_directory(&final_dir)?;

        Ok(Self {
            binds,
            number_workers,
            temp_dir,
            final_dir,
            max_file_size,
            max_file_age,
        })
    }
}

fn require_directory(path: &Path) -> BerResult<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        BerError::InvalidConfig(format!("{}: {}", path.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(BerError::InvalidConfig(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_bind_addresses() {
        let result = ServerConfig::new(
            Vec::new(),
            1,
            std::env::temp_dir(),
            std::env::temp_dir(),
            1024,
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(BerError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_worker_count_out_of_range() {
        let binds = vec!["127.0.0.1:0".parse().unwrap()];
        let result = ServerConfig::new(
            binds,
            0,
            std::env::temp_dir(),
            std::env::temp_dir(),
            1024,
            Duration::from_secs(60),
        );
        assert!(matches!(result, Err(BerError::InvalidConfig(_))));
    }

    #[test]
    fn accepts_valid_configuration() {
        let binds = vec!["127.0.0.1:0".parse().unwrap()];
        let result = ServerConfig::new(
            binds,
            4,
            std::env::temp_dir(),
            std::env::temp_dir(),
            1024,
            Duration::from_secs(60),
        );
        assert!(result.is_ok());
    }
}
