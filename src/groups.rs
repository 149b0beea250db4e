//! Resolve a user's role in a group when the `owner` field and the
//! participant admin flags disagree.
//!
//! Participant flags are refreshed on every fetch while `owner` can be stale,
//! so flags win whenever a participant record exists. Precedence:
//! superadmin > admin > owner (no flags) > member > not_participant.

use crate::model::{Group, GroupParticipant, GroupRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleResolution<'a> {
    pub role: GroupRole,
    pub participant: Option<&'a GroupParticipant>,
}

fn flagged_role(p: &GroupParticipant) -> Option<GroupRole> {
    if p.is_super_admin {
        Some(GroupRole::SuperAdmin)
    } else if p.is_admin {
        Some(GroupRole::Admin)
    } else {
        None
    }
}

pub fn resolve_role<'a>(user_id: &str, group: &'a Group) -> RoleResolution<'a> {
    let participant = group
        .participants
        .as_deref()
        .and_then(|ps| ps.iter().find(|p| p.id == user_id));
    let is_owner = group.owner.as_deref() == Some(user_id);

    let role = match (participant, is_owner) {
        (Some(p), true) => flagged_role(p).unwrap_or(GroupRole::Owner),
        (Some(p), false) => flagged_role(p).unwrap_or(GroupRole::Member),
        (None, true) => GroupRole::Owner,
        (None, false) => GroupRole::NotParticipant,
    };

    RoleResolution { role, participant }
}

/// Flags a caller with `role` should carry. An owner carries no admin flags,
/// which keeps `resolve_role` stable on a corrected group.
fn flags_for(role: GroupRole) -> (bool, bool) {
    match role {
        GroupRole::SuperAdmin => (true, true),
        GroupRole::Admin => (true, false),
        GroupRole::Owner | GroupRole::Member | GroupRole::NotParticipant => (false, false),
    }
}

/// Rewrite only `user_id`'s own participant flags in `group` to match its
/// resolved role. Other participants are left untouched.
pub fn correct_group_for_user(user_id: &str, mut group: Group) -> Group {
    let role = resolve_role(user_id, &group).role;
    let (is_admin, is_super_admin) = flags_for(role);
    if let Some(participants) = group.participants.as_mut() {
        for p in participants.iter_mut().filter(|p| p.id == user_id) {
            p.is_admin = is_admin;
            p.is_super_admin = is_super_admin;
        }
    }
    group
}

pub fn correct_groups_for_user(user_id: &str, groups: Vec<Group>) -> Vec<Group> {
    groups
        .into_iter()
        .map(|g| correct_group_for_user(user_id, g))
        .collect()
}
