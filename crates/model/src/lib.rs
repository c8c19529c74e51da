pub mod events;
pub mod record;

pub use events::{AnalysisPayload, EventKind, GeneralPayload, PatientPayload, ServerEvent};
pub use record::{NavigationTarget, NotificationKind, NotificationRecord, ToastSeverity};
