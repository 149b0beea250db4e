use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state of a gateway instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    #[default]
    Close,
    Open,
    Connecting,
    Qrcode,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Close => "close",
            InstanceStatus::Open => "open",
            InstanceStatus::Connecting => "connecting",
            InstanceStatus::Qrcode => "qrcode",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "close" => Some(InstanceStatus::Close),
            "open" => Some(InstanceStatus::Open),
            "connecting" => Some(InstanceStatus::Connecting),
            "qrcode" => Some(InstanceStatus::Qrcode),
            _ => None,
        }
    }
}

/// Canonical instance as reported by the gateway, after normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayInstance {
    pub instance_name: String,
    pub instance_id: Option<String>,
    pub status: InstanceStatus,
    pub owner: Option<String>,
    pub profile_name: Option<String>,
    pub profile_picture_url: Option<String>,
}

impl GatewayInstance {
    pub fn named(name: &str, status: InstanceStatus) -> Self {
        Self {
            instance_name: name.to_string(),
            instance_id: None,
            status,
            owner: None,
            profile_name: None,
            profile_picture_url: None,
        }
    }
}

/// Persisted instance row, keyed by `(user_id, instance_name)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    pub user_id: String,
    pub instance_name: String,
    pub instance_id: Option<String>,
    pub status: InstanceStatus,
    pub owner: Option<String>,
    pub profile_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub integration: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
    pub disconnected_at: Option<DateTime<Utc>>,
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncResult {
    pub success: bool,
    pub synced: usize,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncResult {
    pub fn failed(reason: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: false,
            synced: 0,
            errors: vec![reason],
            timestamp,
        }
    }
}

/// A group as fetched live from the gateway. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub subject: Option<String>,
    pub subject_owner: Option<String>,
    pub subject_time: Option<i64>,
    pub creation: Option<i64>,
    pub owner: Option<String>,
    pub desc: Option<String>,
    pub desc_owner: Option<String>,
    pub desc_time: Option<i64>,
    pub size: Option<i64>,
    /// `None` when the gateway was asked not to expand participants.
    pub participants: Option<Vec<GroupParticipant>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupParticipant {
    pub id: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Owner,
    Admin,
    #[serde(rename = "superadmin")]
    SuperAdmin,
    Member,
    NotParticipant,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Owner => "owner",
            GroupRole::Admin => "admin",
            GroupRole::SuperAdmin => "superadmin",
            GroupRole::Member => "member",
            GroupRole::NotParticipant => "not_participant",
        }
    }
}
