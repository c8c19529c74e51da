use retiscan_model::record::ToastSeverity;

/// Stable identifier per notice category. The presentation layer keys its
/// duplicate suppression on this, and the manager itself never emits the
/// same id twice in a row while the underlying condition persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeId {
    ConnectionLost,
    ReconnectSucceeded,
    ReconnectFailed,
}

/// User-facing connectivity notice. Emitted on state *changes*, never per
/// retry attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub message: &'static str,
}

impl Notice {
    pub fn connection_lost() -> Self {
        Self {
            id: NoticeId::ConnectionLost,
            message: "Koneksi real-time terputus, mencoba menyambung ulang",
        }
    }

    pub fn reconnect_succeeded() -> Self {
        Self {
            id: NoticeId::ReconnectSucceeded,
            message: "Koneksi real-time tersambung kembali",
        }
    }

    pub fn reconnect_failed() -> Self {
        Self {
            id: NoticeId::ReconnectFailed,
            message: "Gagal menyambung ke server notifikasi",
        }
    }

    pub fn severity(&self) -> ToastSeverity {
        match self.id {
            NoticeId::ConnectionLost => ToastSeverity::Warning,
            NoticeId::ReconnectSucceeded => ToastSeverity::Success,
            NoticeId::ReconnectFailed => ToastSeverity::Error,
        }
    }
}
