//! # Loopback Link
//!
//! In-process [`NetworkApi`] pair over crossbeam channels. Packets sent on
//! one end arrive, in order, on the other.

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::{debug, warn};

use crate::api::NetworkApi;

/// Link statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Packets sent.
    pub packets_sent: u64,
    /// Packets received.
    pub packets_received: u64,
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_received: u64,
}

/// One end of an in-process link.
#[derive(Debug)]
pub struct LoopbackLink {
    sender: Sender<Vec<u8>>,
    receiver: Receiver<Vec<u8>>,
    game_master: bool,
    connected: bool,
    stats: LinkStats,
}

impl LoopbackLink {
    /// Creates two connected ends. The first one is the game master.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (to_second, from_first) = unbounded();
        let (to_first, from_second) = unbounded();
        (
            Self::new(to_second, from_second, true),
            Self::new(to_first, from_first, false),
        )
    }

    fn new(sender: Sender<Vec<u8>>, receiver: Receiver<Vec<u8>>, game_master: bool) -> Self {
        Self {
            sender,
            receiver,
            game_master,
            connected: true,
            stats: LinkStats::default(),
        }
    }

    /// Traffic counters.
    #[must_use]
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    fn mark_disconnected(&mut self) {
        if self.connected {
            debug!(game_master = self.game_master, "loopback peer went away");
            self.connected = false;
        }
    }
}

impl NetworkApi for LoopbackLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn is_game_master(&self) -> bool {
        self.game_master
    }

    fn send_packet(&mut self, packet: &[u8]) {
        if self.sender.send(packet.to_vec()).is_err() {
            warn!(bytes = packet.len(), "dropped packet, peer is gone");
            self.mark_disconnected();
            return;
        }
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += packet.len() as u64;
    }

    fn pull_packet(&mut self) -> Option<Vec<u8>> {
        match self.receiver.try_recv() {
            Ok(packet) => {
                self.stats.packets_received += 1;
                self.stats.bytes_received += packet.len() as u64;
                Some(packet)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.mark_disconnected();
                None
            }
        }
    }
}
