use crate::core::identifiers::{BatchId, MirrorName, PeerName, PublicationName, SlotName};
use crate::lsn::Lsn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a mirror (spec §3.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorStatus {
    Created,
    SettingUp,
    Snapshot,
    Running,
    Paused,
    Resyncing,
    Failed,
    Terminating,
    Terminated,
}

impl MirrorStatus {
    /// Legal direct transitions, used to reject a stray signal instead of
    /// silently corrupting catalog state.
    pub fn can_transition_to(self, next: MirrorStatus) -> bool {
        use MirrorStatus::*;
        matches!(
            (self, next),
            (Created, SettingUp)
                | (SettingUp, Snapshot)
                | (Snapshot, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Resyncing)
                | (Resyncing, Running)
                | (Running, Failed)
                | (Snapshot, Failed)
                | (Resyncing, Failed)
                | (SettingUp, Failed)
                | (Failed, Running)
                | (Failed, Snapshot)
                | (Failed, Resyncing)
                | (_, Terminating)
                | (Terminating, Terminated)
        )
    }
}

impl fmt::Display for MirrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Mirror {
    pub name: MirrorName,
    pub source_peer: PeerName,
    pub destination_peer: PeerName,
    pub status: MirrorStatus,
    pub slot_name: SlotName,
    pub publication_name: PublicationName,
    pub last_applied_lsn: Lsn,
    pub last_sync_batch_id: BatchId,
    pub last_error: Option<String>,
    pub error_count: u32,
    pub do_initial_snapshot: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mirror {
    pub fn slot_name_for(mirror: &MirrorName) -> SlotName {
        SlotName::new(format!("bunny_{}", sanitize(mirror.as_str())))
    }

    pub fn publication_name_for(mirror: &MirrorName) -> PublicationName {
        PublicationName::new(format!("bunny_pub_{}", sanitize(mirror.as_str())))
    }

    pub fn shadow_table_name(dest_table: &str) -> String {
        format!("{dest_table}__bunny_shadow")
    }

    pub fn old_table_name(dest_table: &str) -> String {
        format!("{dest_table}__bunny_old")
    }
}

/// PostgreSQL identifiers are case-sensitive and may contain characters the
/// slot/publication name grammar forbids; mirror names are hashed down to a
/// short identifier-safe suffix rather than embedded verbatim.
fn sanitize(name: &str) -> String {
    let digest = blake3::hash(name.as_bytes());
    digest.to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_illegal_transition() {
        assert!(!MirrorStatus::Created.can_transition_to(MirrorStatus::Running));
        assert!(MirrorStatus::Created.can_transition_to(MirrorStatus::SettingUp));
    }

    #[test]
    fn terminating_reachable_from_any_state() {
        assert!(MirrorStatus::Failed.can_transition_to(MirrorStatus::Terminating));
        assert!(MirrorStatus::Paused.can_transition_to(MirrorStatus::Terminating));
    }

    #[test]
    fn slot_name_is_deterministic_and_identifier_safe() {
        let name = MirrorName::new("orders-mirror");
        let a = Mirror::slot_name_for(&name);
        let b = Mirror::slot_name_for(&name);
        assert_eq!(a, b);
        assert!(a.as_str().chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}
