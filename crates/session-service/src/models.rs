//! Session record and participant credential types.
//!
//! `SessionRecord` is owned by the external registry; this crate only reads it.
//! `ParticipantCredentials` are short-lived, issued per join attempt and
//! validated at the registry boundary so that a missing field never reaches
//! the transport.

use chrono::{DateTime, Utc};
use common::secret::SecretString;
use common::types::{SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::JoinError;

/// Lifecycle status of a scheduled session, as reported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
    RescheduleRequested,
}

impl SessionStatus {
    /// Returns the status as a bounded string for labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::RescheduleRequested => "reschedule_requested",
        }
    }

    /// Whether a channel may be entered in this status.
    #[must_use]
    pub const fn is_joinable(&self) -> bool {
        matches!(self, SessionStatus::Scheduled | SessionStatus::Ongoing)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::RescheduleRequested => f.write_str("reschedule requested"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Payment state of a session booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// A scheduled mentoring session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: SessionId,
    pub mentor_id: UserId,
    pub counterparty_id: UserId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    /// Opaque identifier used to request join credentials.
    pub channel_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SessionRecord {
    /// Check the `start_time < end_time` invariant.
    #[must_use]
    pub fn has_valid_window(&self) -> bool {
        self.start_time < self.end_time
    }
}

/// Participant role within the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// Publishes local media, may record, completes the session on leave.
    Host,
    /// View-only.
    Guest,
}

impl ParticipantRole {
    /// Returns the role as a bounded string for labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Host => "host",
            ParticipantRole::Guest => "guest",
        }
    }
}

/// Transport-level numeric participant identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransportUid(pub u32);

impl fmt::Display for TransportUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TransportUid {
    /// Map an opaque registry participant id to a transport uid.
    ///
    /// Decimal ids that fit in a `u32` pass through unchanged; anything else
    /// is hashed with 32-bit FNV-1a so the mapping is stable across joins.
    #[must_use]
    pub fn from_participant_id(participant_id: &str) -> Self {
        if let Ok(uid) = participant_id.parse::<u32>() {
            return Self(uid);
        }
        let mut hash: u32 = 0x811c_9dc5;
        for byte in participant_id.bytes() {
            hash ^= u32::from(byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        Self(hash)
    }
}

/// Short-lived credentials for one join attempt. Never persisted.
#[derive(Debug, Clone)]
pub struct ParticipantCredentials {
    pub session_id: SessionId,
    pub channel_name: String,
    /// Channel access token (redacted in Debug).
    pub access_token: SecretString,
    /// Opaque registry participant id.
    pub participant_id: String,
    pub role: ParticipantRole,
    pub recording_enabled: bool,
    pub transport_app_id: String,
}

impl ParticipantCredentials {
    /// Transport-level identity derived from `participant_id`.
    #[must_use]
    pub fn transport_uid(&self) -> TransportUid {
        TransportUid::from_participant_id(&self.participant_id)
    }

    /// Whether the recording toggle is available with these credentials.
    #[must_use]
    pub fn can_record(&self) -> bool {
        self.role == ParticipantRole::Host && self.recording_enabled
    }
}

/// Credentials as they arrive on the wire, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsPayload {
    pub session_id: Option<String>,
    pub channel_name: Option<String>,
    pub access_token: Option<SecretString>,
    pub participant_id: Option<serde_json::Value>,
    pub role: Option<ParticipantRole>,
    pub recording_enabled: Option<bool>,
    pub transport_app_id: Option<String>,
}

fn required(value: Option<String>, field: &str) -> Result<String, JoinError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(JoinError::CredentialFetchFailed {
            message: format!("credentials missing required field `{field}`"),
        }),
    }
}

impl TryFrom<CredentialsPayload> for ParticipantCredentials {
    type Error = JoinError;

    fn try_from(payload: CredentialsPayload) -> Result<Self, Self::Error> {
        use common::secret::ExposeSecret;

        let session_id = required(payload.session_id, "sessionId")?;
        let channel_name = required(payload.channel_name, "channelName")?;
        let access_token = match payload.access_token {
            Some(token) if !token.expose_secret().is_empty() => token,
            _ => {
                return Err(JoinError::CredentialFetchFailed {
                    message: "credentials missing required field `accessToken`".to_string(),
                })
            }
        };
        // Registries send the participant id as either a string or a number
        let participant_id = match payload.participant_id {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let participant_id = required(participant_id, "participantId")?;
        let role = payload.role.ok_or_else(|| JoinError::CredentialFetchFailed {
            message: "credentials missing required field `role`".to_string(),
        })?;
        let transport_app_id = required(payload.transport_app_id, "transportAppId")?;

        Ok(Self {
            session_id: SessionId::new(session_id),
            channel_name,
            access_token,
            participant_id,
            role,
            recording_enabled: payload.recording_enabled.unwrap_or(false),
            transport_app_id,
        })
    }
}

/// Successful verify-join answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinVerification {
    /// Pre-resolved meeting reference, when the registry already has one.
    #[serde(default)]
    pub meeting_ref: Option<String>,
}
