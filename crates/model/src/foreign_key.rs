use crate::core::identifiers::MirrorName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a source foreign-key constraint, tracked through the
/// drop-before-bulk-load / recreate-after-bulk-load cycle (spec §4.4, P4).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    pub mirror: MirrorName,
    pub constraint_name: String,
    pub source_table: String,
    pub target_table: String,
    pub definition: String,
    pub on_delete: String,
    pub on_update: String,
    pub dropped_at: Option<DateTime<Utc>>,
    pub recreated_at: Option<DateTime<Utc>>,
}

impl ForeignKeyDefinition {
    /// P4: the FK is currently absent on the destination.
    pub fn currently_absent(&self) -> bool {
        self.dropped_at.is_some() && self.recreated_at.is_none()
    }

    pub fn mark_dropped(&mut self, at: DateTime<Utc>) {
        self.dropped_at = Some(at);
        self.recreated_at = None;
    }

    pub fn mark_recreated(&mut self, at: DateTime<Utc>) {
        self.recreated_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifiers::MirrorName;

    fn fk() -> ForeignKeyDefinition {
        ForeignKeyDefinition {
            mirror: MirrorName::new("m"),
            constraint_name: "orders_customer_fk".into(),
            source_table: "orders".into(),
            target_table: "customers".into(),
            definition: "FOREIGN KEY (customer_id) REFERENCES customers(id)".into(),
            on_delete: "CASCADE".into(),
            on_update: "NO ACTION".into(),
            dropped_at: None,
            recreated_at: None,
        }
    }

    #[test]
    fn absence_window_tracks_drop_and_recreate() {
        let mut fk = fk();
        assert!(!fk.currently_absent());

        fk.mark_dropped(Utc::now());
        assert!(fk.currently_absent());

        fk.mark_recreated(Utc::now());
        assert!(!fk.currently_absent());
    }
}
