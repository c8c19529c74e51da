use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{AnalysisPayload, GeneralPayload, PatientPayload, ServerEvent};

/// Fallback literals for events arriving with missing payload fields.
pub const FALLBACK_PATIENT_NAME: &str = "Tanpa nama";
pub const FALLBACK_SEVERITY: &str = "Tidak diketahui";
pub const FALLBACK_GENERAL_TITLE: &str = "Notifikasi";
pub const FALLBACK_GENERAL_MESSAGE: &str = "Anda memiliki notifikasi baru";

/// A single entry in the session's notification list.
///
/// Immutable after creation except for the `read` flag. `title` and
/// `message` are derived from the originating event once, at receipt
/// time, and stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum NotificationKind {
    PatientAdded(PatientPayload),
    PatientUpdated(PatientPayload),
    PatientDeleted(PatientPayload),
    NewAnalysis(AnalysisPayload),
    General(GeneralPayload),
}

/// Visual weight of a toast shown by the presentation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Where the UI should navigate when the user activates a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum NavigationTarget {
    PatientDetail { patient_id: String },
    PatientList,
    AnalysisDetail { analysis_id: String },
    None,
}

impl NotificationRecord {
    /// Builds a record from a delivered server event, deriving the
    /// display strings per the dashboard's notification taxonomy.
    pub fn from_event(event: ServerEvent) -> Self {
        let (kind, title, message) = match event {
            ServerEvent::PatientAdded(p) => {
                let message = format!(
                    "Pasien baru telah ditambahkan: {}",
                    patient_name(&p)
                );
                (NotificationKind::PatientAdded(p), "Pasien Baru".to_string(), message)
            }
            ServerEvent::PatientUpdated(p) => {
                let message = format!(
                    "Data pasien telah diperbarui: {}",
                    patient_name(&p)
                );
                (
                    NotificationKind::PatientUpdated(p),
                    "Data Pasien Diperbarui".to_string(),
                    message,
                )
            }
            ServerEvent::PatientDeleted(p) => {
                let message = format!(
                    "Data pasien telah dihapus: {}",
                    patient_name(&p)
                );
                (
                    NotificationKind::PatientDeleted(p),
                    "Pasien Dihapus".to_string(),
                    message,
                )
            }
            ServerEvent::NewAnalysis(a) => {
                let message = format!(
                    "Hasil scan retina untuk pasien {} telah tersedia. Tingkat keparahan: {}",
                    a.patient_name.as_deref().unwrap_or(FALLBACK_PATIENT_NAME),
                    a.severity.as_deref().unwrap_or(FALLBACK_SEVERITY),
                );
                (
                    NotificationKind::NewAnalysis(a),
                    "Hasil Scan Retina Baru".to_string(),
                    message,
                )
            }
            ServerEvent::General(g) => {
                let title = g
                    .title
                    .clone()
                    .unwrap_or_else(|| FALLBACK_GENERAL_TITLE.to_string());
                let message = g
                    .message
                    .clone()
                    .unwrap_or_else(|| FALLBACK_GENERAL_MESSAGE.to_string());
                (NotificationKind::General(g), title, message)
            }
        };

        Self {
            id: Uuid::new_v4(),
            kind,
            title,
            message,
            created_at: Utc::now(),
            read: false,
        }
    }

    pub fn navigation_target(&self) -> NavigationTarget {
        match &self.kind {
            NotificationKind::PatientAdded(p) | NotificationKind::PatientUpdated(p) => {
                match &p.patient_id {
                    Some(id) => NavigationTarget::PatientDetail {
                        patient_id: id.clone(),
                    },
                    None => NavigationTarget::PatientList,
                }
            }
            NotificationKind::PatientDeleted(_) => NavigationTarget::PatientList,
            NotificationKind::NewAnalysis(a) => match &a.analysis_id {
                Some(id) => NavigationTarget::AnalysisDetail {
                    analysis_id: id.clone(),
                },
                None => NavigationTarget::None,
            },
            NotificationKind::General(_) => NavigationTarget::None,
        }
    }
}

fn patient_name(p: &PatientPayload) -> &str {
    p.patient_name.as_deref().unwrap_or(FALLBACK_PATIENT_NAME)
}
