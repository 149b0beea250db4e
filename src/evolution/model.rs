//! Raw Evolution API payloads and the adapter that turns them into the
//! canonical types in `crate::model`. Field-name variance stays in here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{GatewayInstance, Group, GroupParticipant, InstanceStatus};

/// Response of `GET /instance/connect/{instance}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub pairing_code: Option<String>,
    pub code: Option<String>,
    pub base64: Option<String>,
    pub count: Option<i64>,
}

/// Membership change sent to `POST /group/{action}Participant/{instance}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

impl ParticipantAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantAction::Add => "add",
            ParticipantAction::Remove => "remove",
            ParticipantAction::Promote => "promote",
            ParticipantAction::Demote => "demote",
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            ParticipantAction::Add => "addParticipant",
            ParticipantAction::Remove => "removeParticipant",
            ParticipantAction::Promote => "promoteParticipant",
            ParticipantAction::Demote => "demoteParticipant",
        }
    }
}

impl std::str::FromStr for ParticipantAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ParticipantAction::Add),
            "remove" => Ok(ParticipantAction::Remove),
            "promote" => Ok(ParticipantAction::Promote),
            "demote" => Ok(ParticipantAction::Demote),
            other => Err(format!(
                "unknown participant action {other}; expected add, remove, promote or demote"
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroup {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    subject_owner: Option<String>,
    #[serde(default)]
    subject_time: Option<i64>,
    #[serde(default)]
    creation: Option<i64>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    desc_owner: Option<String>,
    #[serde(default)]
    desc_time: Option<i64>,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    participants: Option<Vec<RawParticipant>>,
}

#[derive(Debug, Deserialize)]
struct RawParticipant {
    id: String,
    #[serde(default)]
    admin: Option<String>,
}

impl From<RawParticipant> for GroupParticipant {
    fn from(raw: RawParticipant) -> Self {
        let admin = raw.admin.as_deref();
        GroupParticipant {
            id: raw.id,
            is_admin: matches!(admin, Some("admin") | Some("superadmin")),
            is_super_admin: matches!(admin, Some("superadmin")),
        }
    }
}

impl From<RawGroup> for Group {
    fn from(raw: RawGroup) -> Self {
        Group {
            id: raw.id,
            subject: raw.subject,
            subject_owner: raw.subject_owner,
            subject_time: raw.subject_time,
            creation: raw.creation,
            owner: raw.owner,
            desc: raw.desc,
            desc_owner: raw.desc_owner,
            desc_time: raw.desc_time,
            size: raw.size,
            participants: raw
                .participants
                .map(|ps| ps.into_iter().map(GroupParticipant::from).collect()),
        }
    }
}

/// First non-blank string among `keys`, mirroring the gateway's habit of
/// renaming fields between versions. The value is returned as sent; names
/// are exact keys.
fn str_field(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

/// Normalize one `fetchInstances` entry. Entries may be wrapped as
/// `{ "instance": { ... } }`. Returns `None` when no usable name is present.
pub fn normalize_instance(item: &Value) -> Option<GatewayInstance> {
    let inst = match item.get("instance") {
        Some(inner) if inner.is_object() => inner,
        _ => item,
    };
    let instance_name = str_field(inst, &["instanceName", "name"])?;
    let status = match str_field(inst, &["status", "connectionStatus"]) {
        Some(raw) => InstanceStatus::parse_status(raw.trim()).unwrap_or_else(|| {
            debug!(instance = %instance_name, status = %raw, "unrecognised status; treating as close");
            InstanceStatus::Close
        }),
        None => InstanceStatus::Close,
    };
    Some(GatewayInstance {
        instance_id: str_field(inst, &["instanceId", "id"]),
        status,
        owner: str_field(inst, &["owner", "ownerJid"]),
        profile_name: str_field(inst, &["profileName"]),
        profile_picture_url: str_field(inst, &["profilePictureUrl", "profilePicUrl"]),
        instance_name,
    })
}

/// Normalize a `fetchInstances` body. `None` means the body was not an array.
pub fn normalize_instances(body: &Value) -> Option<Vec<GatewayInstance>> {
    let items = body.as_array()?;
    Some(items.iter().filter_map(normalize_instance).collect())
}

/// Normalize a `fetchAllGroups` body. `None` means the body was not an array.
/// Entries that fail to decode are skipped with a warning.
pub fn normalize_groups(body: &Value) -> Option<Vec<Group>> {
    let items = body.as_array()?;
    let groups = items
        .iter()
        .filter_map(|item| match serde_json::from_value::<RawGroup>(item.clone()) {
            Ok(raw) => Some(Group::from(raw)),
            Err(err) => {
                warn!(?err, "skipping undecodable group entry");
                None
            }
        })
        .collect();
    Some(groups)
}

/// Read the connection state from either `{instance: {state}}` or `{state}`.
pub fn connection_state(body: &Value) -> Option<String> {
    body.get("instance")
        .and_then(|i| i.get("state"))
        .and_then(Value::as_str)
        .or_else(|| body.get("state").and_then(Value::as_str))
        .map(str::to_string)
}
