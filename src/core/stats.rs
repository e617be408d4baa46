//! Transport counters
//!
//! Relaxed atomics: each counter is independent and only read for reporting.

use core::sync::atomic::{AtomicU32, Ordering};

/// Point-in-time copy of the transport counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatsSnapshot {
    /// Inbound bytes queued for the console
    pub rx_bytes: u32,
    /// Inbound bytes lost to a full console buffer
    pub rx_dropped: u32,
    /// Outbound bytes handed to the stack as notifications
    pub tx_bytes: u32,
    /// Outbound bytes thrown away because no peer was connected
    pub tx_discarded: u32,
    pub notifications: u32,
    pub connections: u32,
    pub advertising_starts: u32,
}

#[derive(Default)]
pub struct Stats {
    rx_bytes: AtomicU32,
    rx_dropped: AtomicU32,
    tx_bytes: AtomicU32,
    tx_discarded: AtomicU32,
    notifications: AtomicU32,
    connections: AtomicU32,
    advertising_starts: AtomicU32,
}

impl Stats {
    pub const fn new() -> Self {
        Self {
            rx_bytes: AtomicU32::new(0),
            rx_dropped: AtomicU32::new(0),
            tx_bytes: AtomicU32::new(0),
            tx_discarded: AtomicU32::new(0),
            notifications: AtomicU32::new(0),
            connections: AtomicU32::new(0),
            advertising_starts: AtomicU32::new(0),
        }
    }

    pub(crate) fn record_rx(&self, accepted: usize, dropped: usize) {
        self.rx_bytes.fetch_add(accepted as u32, Ordering::Relaxed);
        if dropped > 0 {
            self.rx_dropped.fetch_add(dropped as u32, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_notification(&self, len: usize) {
        self.tx_bytes.fetch_add(len as u32, Ordering::Relaxed);
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discard(&self, len: usize) {
        self.tx_discarded.fetch_add(len as u32, Ordering::Relaxed);
    }

    pub(crate) fn record_connection(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_advertising_start(&self) {
        self.advertising_starts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_discarded: self.tx_discarded.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            advertising_starts: self.advertising_starts.load(Ordering::Relaxed),
        }
    }
}
