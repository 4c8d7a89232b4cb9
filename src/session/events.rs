use serde::Serialize;

use crate::insights::Insights;

/// Events emitted to the live channel. Each chunk produces at most one
/// `partial_transcript`; ending a session produces exactly one `final`,
/// carrying either the combined result or an opaque error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    PartialTranscript {
        text: String,
    },
    Final {
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        insights: Option<Insights>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl SessionEvent {
    pub fn final_result(transcript: String, insights: Insights) -> Self {
        SessionEvent::Final {
            transcript: Some(transcript),
            insights: Some(insights),
            error: None,
        }
    }

    pub fn final_error(error: impl Into<String>) -> Self {
        SessionEvent::Final {
            transcript: None,
            insights: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = SessionEvent::PartialTranscript {
            text: "hi".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "partial_transcript");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn final_error_omits_result_fields() {
        let json = serde_json::to_value(SessionEvent::final_error("finalize_failed")).unwrap();
        assert_eq!(json["type"], "final");
        assert_eq!(json["error"], "finalize_failed");
        assert!(json.get("transcript").is_none());
        assert!(json.get("insights").is_none());
    }
}
