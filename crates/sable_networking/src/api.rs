//! Platform network capability used by the network system.

/// A packet link to one remote peer.
///
/// Implementations must not block: `pull_packet` returns `None` when
/// nothing has arrived.
pub trait NetworkApi: Send {
    /// Returns true while a peer is connected.
    fn is_connected(&self) -> bool;

    /// Returns true on the peer that arbitrates the session.
    fn is_game_master(&self) -> bool;

    /// Sends one packet to the peer.
    fn send_packet(&mut self, packet: &[u8]);

    /// Next received packet, if any.
    fn pull_packet(&mut self) -> Option<Vec<u8>>;
}
