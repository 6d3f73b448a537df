//! Splicing two TCP connections into a relay

use std::fmt;
use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::spawner::TaskSpawner;

/// Size of the buffer each copy task reads into
const COPY_BUFFER_SIZE: usize = 16 * 1024;

/// Direction of one half of a relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes read from the manager, written to the target
    ManagerToTarget,
    /// Bytes read from the target, written to the manager
    TargetToManager,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ManagerToTarget => write!(f, "manager -> target"),
            Direction::TargetToManager => write!(f, "target -> manager"),
        }
    }
}

/// Outcome of one copy direction
#[derive(Debug)]
pub struct Transfer {
    /// Bytes written to the destination
    pub bytes: u64,
    /// Read or write error that ended the copy, if it did not end on EOF
    pub error: Option<io::Error>,
    /// The copy was cut short because the other direction ended first
    pub stopped: bool,
}

/// Outcome of a whole relay
#[derive(Debug)]
pub struct RelayStats {
    pub manager_to_target: Transfer,
    pub target_to_manager: Transfer,
}

/// Handle to a running relay
///
/// Dropping it detaches the relay, which keeps running until either peer
/// closes or fails.
#[derive(Debug)]
pub struct RelayHandle {
    manager_to_target: JoinHandle<Transfer>,
    target_to_manager: JoinHandle<Transfer>,
}

impl RelayHandle {
    /// Wait for both directions to finish
    pub async fn join(self) -> RelayStats {
        let (manager_to_target, target_to_manager) =
            tokio::join!(self.manager_to_target, self.target_to_manager);
        RelayStats {
            manager_to_target: joined(manager_to_target),
            target_to_manager: joined(target_to_manager),
        }
    }
}

fn joined(result: Result<Transfer, tokio::task::JoinError>) -> Transfer {
    result.unwrap_or_else(|e| Transfer {
        bytes: 0,
        error: Some(io::Error::other(e)),
        stopped: false,
    })
}

/// Two connected peers waiting to be spliced
pub(crate) struct Relay {
    target: TcpStream,
    manager: TcpStream,
}

impl Relay {
    pub(crate) fn new(target: TcpStream, manager: TcpStream) -> Self {
        Self { target, manager }
    }

    /// Start both copy tasks.
    ///
    /// Each task owns the read half of its source and the write half of its
    /// destination. Whichever task ends first stops the other one, so both
    /// sockets are closed as soon as either peer reaches EOF or fails.
    pub(crate) fn splice(self, spawner: &TaskSpawner) -> RelayHandle {
        let (target_read, target_write) = self.target.into_split();
        let (manager_read, manager_write) = self.manager.into_split();
        let cancel = CancellationToken::new();

        let manager_to_target = spawner.spawn(
            tracing::debug_span!("copy", direction = %Direction::ManagerToTarget),
            pipe(Direction::ManagerToTarget, manager_read, target_write, cancel.clone()),
        );
        let target_to_manager = spawner.spawn(
            tracing::debug_span!("copy", direction = %Direction::TargetToManager),
            pipe(Direction::TargetToManager, target_read, manager_write, cancel),
        );

        RelayHandle {
            manager_to_target,
            target_to_manager,
        }
    }
}

/// Copy until the source reaches EOF or fails, or until the other direction
/// ends, then close the destination and stop the other direction.
async fn pipe(
    direction: Direction,
    mut from: OwnedReadHalf,
    mut to: OwnedWriteHalf,
    cancel: CancellationToken,
) -> Transfer {
    tracing::debug!("Start copy traffic {}", direction);

    let mut bytes = 0u64;
    let (error, stopped) = tokio::select! {
        result = copy(&mut from, &mut to, &mut bytes) => (result.err(), false),
        _ = cancel.cancelled() => (None, true),
    };

    if let Err(e) = to.shutdown().await {
        tracing::trace!("Shutdown after {} failed: {}", direction, e);
    }
    drop(to);
    drop(from);
    cancel.cancel();

    match &error {
        None if stopped => tracing::debug!(
            "End copy traffic {} ({} bytes), other direction closed",
            direction,
            bytes
        ),
        None => tracing::debug!("End copy traffic {} ({} bytes)", direction, bytes),
        Some(e) => tracing::debug!(
            "End copy traffic {} ({} bytes) with error: {}",
            direction,
            bytes,
            e
        ),
    }

    Transfer {
        bytes,
        error,
        stopped,
    }
}

async fn copy(
    from: &mut OwnedReadHalf,
    to: &mut OwnedWriteHalf,
    bytes: &mut u64,
) -> io::Result<()> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = from.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        to.write_all(&buf[..n]).await?;
        *bytes += n as u64;
    }
}
