use std::sync::Arc;

use retiscan_connection::ConnectionManager;
use retiscan_model::EventKind;
use tracing::debug;

use crate::store::NotificationStore;

/// Wires the socket feed into the store: every notification event kind
/// gets a handler that decodes the payload (degrading to fallbacks on
/// malformed fields, never dropping) and ingests the result.
pub fn attach(conn: &ConnectionManager, store: Arc<NotificationStore>) {
    for kind in EventKind::ALL {
        let store = store.clone();
        conn.on(kind.as_str(), move |data| {
            let event = kind.decode(data);
            let record = store.ingest(event);
            debug!(event = kind.as_str(), id = %record.id, "Notification ingested");
        });
    }
}

/// Unregisters the handlers installed by [`attach`].
pub fn detach(conn: &ConnectionManager) {
    for kind in EventKind::ALL {
        conn.off(kind.as_str());
    }
}
