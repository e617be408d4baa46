//! Notification Flow Control
//!
//! Console output leaves the device as notifications on the `tx`
//! characteristic, one chunk of at most the negotiated payload size per call.

use heapless::Vec;

use crate::ble::stack::{Stack, StackError};
use crate::config::MAX_ATT_PAYLOAD;
use crate::core::transport::Transport;

impl<S: Stack> Transport<S> {
    /// Send one chunk of buffered output.
    ///
    /// With no peer connected the chunk is discarded. A full stack queue is
    /// retried until it drains; a link that went away (or has notifications
    /// disabled) counts as sent. Any other stack error is returned.
    pub fn flush(&self) -> Result<(), StackError> {
        if self.tx.is_empty() {
            return Ok(());
        }

        // Handle before size: `connect` stores the size first
        let conn = self.connection.handle();
        let limit = self.connection.payload_len().min(MAX_ATT_PAYLOAD);
        let mut chunk: Vec<u8, MAX_ATT_PAYLOAD> = Vec::new();
        while chunk.len() < limit {
            let Some(byte) = self.tx.pop() else {
                break;
            };
            // Cannot fail, `limit` is within capacity
            let _ = chunk.push(byte);
        }

        let Some(conn) = conn else {
            self.stats.record_discard(chunk.len());
            trace!("No connection, discarded {} bytes", chunk.len());
            return Ok(());
        };

        loop {
            match self.stack.notify(conn, self.handles.tx.value_handle, &chunk) {
                Ok(()) => {
                    self.stats.record_notification(chunk.len());
                    trace!("Notified {} bytes", chunk.len());
                    return Ok(());
                }
                Err(StackError::Resources) => continue,
                Err(StackError::InvalidState | StackError::InvalidConnHandle) => {
                    self.stats.record_discard(chunk.len());
                    debug!("Link not ready for notifications, discarded {} bytes", chunk.len());
                    return Ok(());
                }
                Err(err) => {
                    error!("Notification failed: {:?}", err);
                    return Err(err);
                }
            }
        }
    }
}
