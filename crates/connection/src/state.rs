/// Lifecycle of the single outbound notification socket. Owned by the
/// [`ConnectionManager`](crate::ConnectionManager); consumers observe it
/// through a `watch` channel and never mutate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}
