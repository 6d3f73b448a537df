//! Scoped release of bus resources

use avaxo_core::{BusChannel, BusConnection};

/// Close a channel at the end of the operation that opened it.
///
/// A failed close is only logged; the operation's own result is what the
/// caller needs to see.
pub(crate) async fn close_channel<C: BusChannel>(channel: &C) {
    if let Err(e) = channel.close().await {
        tracing::debug!("Failed to close channel: {}", e);
    }
}

/// Close a connection at the end of the operation that opened it
pub(crate) async fn close_connection<C: BusConnection>(connection: &C) {
    if let Err(e) = connection.close().await {
        tracing::debug!("Failed to close connection: {}", e);
    }
}
