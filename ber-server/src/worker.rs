//! A single TCP worker: owns a current-thread tokio runtime, its own
//! listener set, connection pool and output file. Workers share nothing;
//! every observable effect is local to the worker's own thread.

use crate::config::{ServerConfig, MAX_CONNECTIONS_PER_WORKER};
use crate::connection::RecvBuffer;
use crate::file::RecordFile;
use crate::listener::bind_all;
use crate::pool::ConnectionPool;
use ber_codec::BerDecoder;
use ber_core::{BerError, BerResult};
use ber_transport::{StreamAccessor, TcpTransport};
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;

/// Read chunk size for the per-connection growable buffer (matching the
/// original's 32 KB read-loop stride).
const READ_CHUNK: usize = 32 * 1024;

const IDLE_TICK: Duration = Duration::from_millis(250);

/// Run one worker to completion on a dedicated OS thread. Blocks until
/// `cancel` fires.
pub fn run(worker_index: usize, config: ServerConfig, cancel: CancellationToken) -> BerResult<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(BerError::Io)?;
    let local = LocalSet::new();
    local.block_on(&runtime, worker_main(worker_index, config, cancel))
}

async fn worker_main(
    worker_index: usize,
    config: ServerConfig,
    cancel: CancellationToken,
) -> BerResult<()> {
    let listeners = bind_all(&config.binds)?;
    log::info!(
        "worker {} listening on {} address(es)",
        worker_index,
        listeners.len()
    );

    let pool = ConnectionPool::new(MAX_CONNECTIONS_PER_WORKER);
    let record_file = Rc::new(RefCell::new(RecordFile::new(worker_index, config)));
    let (accepted_tx, mut accepted_rx) = tokio::sync::mpsc::unbounded_channel();
    spawn_acceptors(listeners, accepted_tx);

    let mut ticker = tokio::time::interval(IDLE_TICK);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = record_file.borrow_mut().close_if_stale() {
                    log::error!("worker {}: failed to rotate stale file: {}", worker_index, e);
                }
            }
            accepted = accepted_rx.recv() => {
                let Some((stream, peer)) = accepted else { break };
                accept_connection(worker_index, stream, peer, &pool, &record_file, &cancel);
            }
        }
    }

    record_file.borrow_mut().close()
}

fn spawn_acceptors(
    listeners: Vec<TcpListener>,
    accepted_tx: tokio::sync::mpsc::UnboundedSender<(TcpStream, SocketAddr)>,
) {
    for listener in listeners {
        let accepted_tx = accepted_tx.clone();
        tokio::task::spawn_local(async move {
            loop {
                match listener.accept().await {
                    Ok(pair) => {
                        if accepted_tx.send(pair).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::error!("accept error: {}", e),
                }
            }
        });
    }
}

fn accept_connection(
    worker_index: usize,
    stream: TcpStream,
    peer: SocketAddr,
    pool: &ConnectionPool,
    record_file: &Rc<RefCell<RecordFile>>,
    cancel: &CancellationToken,
) {
    let Some(slot) = pool.try_acquire() else {
        log::warn!(
            "worker {}: connection pool exhausted, closing {}",
            worker_index,
            peer
        );
        drop(stream);
        return;
    };

    let record_file = record_file.clone();
    let cancel = cancel.clone();
    tokio::task::spawn_local(async move {
        let _slot = slot;
        if let Err(e) = handle_connection(stream, record_file, cancel).await {
            log::warn!("connection from {} closed: {}", peer, e);
        }
    });
}

async fn handle_connection(
    stream: TcpStream,
    record_file: Rc<RefCell<RecordFile>>,
    cancel: CancellationToken,
) -> BerResult<()> {
    let mut transport = TcpTransport::from_connected_stream(stream, None);
    let mut buffer = RecvBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = transport.read(&mut chunk) => result?,
        };
        if n == 0 {
            return Ok(());
        }
        buffer.extend(&chunk[..n]);
        if !drain_records(&mut buffer, &record_file)? {
            return Ok(());
        }
    }
}

/// Frame as many complete records as are available; returns `false` if a
/// non-recoverable decode error means the connection should be closed.
fn drain_records(buffer: &mut RecvBuffer, record_file: &Rc<RefCell<RecordFile>>) -> BerResult<bool> {
    let now = now_epoch_seconds();
    loop {
        if buffer.is_empty() {
            return Ok(true);
        }

        let mut decoder = BerDecoder::new(buffer.as_slice());
        match decoder.next() {
            Ok(value) => {
                let total = value.total_length();
                record_file.borrow_mut().write_record(&buffer.as_slice()[..total], now)?;
                buffer.erase_front(total);
            }
            Err(BerError::Eof) | Err(BerError::UnexpectedEof { .. }) => return Ok(true),
            Err(_) => return Ok(false),
        }
    }
}

fn now_epoch_seconds() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_records_stops_on_truncated_tail() {
        let record_file = Rc::new(RefCell::new(RecordFile::new(
            0,
            crate::config::ServerConfig::new(
                vec!["127.0.0.1:0".parse().unwrap()],
                1,
                std::env::temp_dir(),
                std::env::temp_dir(),
                1024,
                Duration::from_secs(60),
            )
            .unwrap(),
        )));

        let mut buffer = RecvBuffer::new();
        buffer.extend(&[0x01, 0x01, 0xFF, 0x02, 0x02]); // one complete, one truncated
        assert!(drain_records(&mut buffer, &record_file).unwrap());
        assert_eq!(buffer.as_slice(), &[0x02, 0x02]);

        record_file.borrow_mut().close().unwrap();
    }
}
