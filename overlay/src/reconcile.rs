use std::cmp::Reverse;
use std::collections::BTreeSet;

use nws::{AlertRecord, Snapshot};

/// Alert ids known to the overlay
pub type IdSet = BTreeSet<String>;

/// What has to change for the overlay to match a snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// New alerts, least severe first so the most severe is drawn on top
    pub to_add: Vec<AlertRecord>,
    /// Ids that are no longer active, ascending
    pub to_remove: Vec<String>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn add_ids(&self) -> impl Iterator<Item = &str> {
        self.to_add.iter().map(|record| record.id.as_str())
    }
}

/// Draw order key: larger rank numbers first, unranked kinds before all
fn draw_order(record: &AlertRecord) -> Reverse<u32> {
    Reverse(record.kind.priority().unwrap_or(u32::MAX))
}

/// Diff the ids on screen against a fresh snapshot.
///
/// Identity is the alert id alone; a record whose content changed under the
/// same id is left as is.
pub fn reconcile(previous_ids: &IdSet, current: &Snapshot) -> ReconcilePlan {
    let mut to_add: Vec<AlertRecord> = current
        .records()
        .iter()
        .filter(|record| !previous_ids.contains(&record.id))
        .cloned()
        .collect();
    to_add.sort_by_key(draw_order);

    let current_ids: BTreeSet<&str> = current.ids().collect();
    let to_remove = previous_ids
        .iter()
        .filter(|id| !current_ids.contains(id.as_str()))
        .cloned()
        .collect();

    ReconcilePlan { to_add, to_remove }
}

/// Number of ids present both on screen and in the snapshot
pub fn unchanged(previous_ids: &IdSet, current: &Snapshot) -> usize {
    current.ids().filter(|id| previous_ids.contains(*id)).count()
}
