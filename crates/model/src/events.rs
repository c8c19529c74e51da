use serde::{Deserialize, Serialize};

/// Server-pushed notification events, as they appear inside the
/// `{ "type": ..., "data": ... }` envelope on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    PatientAdded(PatientPayload),
    PatientUpdated(PatientPayload),
    PatientDeleted(PatientPayload),
    NewAnalysis(AnalysisPayload),
    #[serde(rename = "notification")]
    General(GeneralPayload),
}

/// Wire names of the notification event kinds. The connection layer keys
/// its handler registry by these strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PatientAdded,
    PatientUpdated,
    PatientDeleted,
    NewAnalysis,
    General,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::PatientAdded,
        EventKind::PatientUpdated,
        EventKind::PatientDeleted,
        EventKind::NewAnalysis,
        EventKind::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PatientAdded => "patient_added",
            EventKind::PatientUpdated => "patient_updated",
            EventKind::PatientDeleted => "patient_deleted",
            EventKind::NewAnalysis => "new_analysis",
            EventKind::General => "notification",
        }
    }

    /// Decodes an event payload (the `data` field) into a [`ServerEvent`].
    /// Missing or malformed fields degrade to the payload defaults; this
    /// never fails outright so a notification is never dropped.
    pub fn decode(&self, data: &serde_json::Value) -> ServerEvent {
        match self {
            EventKind::PatientAdded => {
                ServerEvent::PatientAdded(parse_or_default(data))
            }
            EventKind::PatientUpdated => {
                ServerEvent::PatientUpdated(parse_or_default(data))
            }
            EventKind::PatientDeleted => {
                ServerEvent::PatientDeleted(parse_or_default(data))
            }
            EventKind::NewAnalysis => ServerEvent::NewAnalysis(parse_or_default(data)),
            EventKind::General => ServerEvent::General(parse_or_default(data)),
        }
    }
}

fn parse_or_default<T: Default + for<'de> Deserialize<'de>>(data: &serde_json::Value) -> T {
    serde_json::from_value(data.clone()).unwrap_or_default()
}

// The dashboard server emits camelCase payload fields; accept both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientPayload {
    #[serde(default, alias = "patientId")]
    pub patient_id: Option<String>,
    #[serde(default, alias = "patientName")]
    pub patient_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(default, alias = "analysisId")]
    pub analysis_id: Option<String>,
    #[serde(default, alias = "patientId")]
    pub patient_id: Option<String>,
    #[serde(default, alias = "patientName")]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default, alias = "severityLevel")]
    pub severity_level: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
