//! Classifying a batch's rows as inserts or updates

use std::collections::{HashMap, HashSet};

use super::batch::{RowKey, TypedRow};

/// What a row does to the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Insert,
    Update,
}

/// Outcome of classifying one batch against the keys already stored
#[derive(Debug)]
pub struct ReconcilePlan<'r> {
    /// One record per distinct key, holding the last row seen for that key
    pub staged: Vec<&'r TypedRow>,
    /// Action for each input row, in input order
    pub actions: Vec<RowAction>,
    pub inserted: u64,
    pub updated: u64,
}

/// Classify `rows` in order against `existing`
///
/// A key that is stored already is an update. A key repeated within the
/// batch updates the record staged by its earlier occurrence, so the last
/// occurrence wins and each key is written once.
pub fn plan<'r>(rows: &'r [TypedRow], existing: &HashSet<RowKey>) -> ReconcilePlan<'r> {
    let mut staged: Vec<&'r TypedRow> = Vec::with_capacity(rows.len());
    let mut slot_by_key: HashMap<&'r RowKey, usize> = HashMap::with_capacity(rows.len());
    let mut actions = Vec::with_capacity(rows.len());
    let mut inserted = 0;
    let mut updated = 0;

    for row in rows {
        if let Some(&slot) = slot_by_key.get(&row.key) {
            staged[slot] = row;
            actions.push(RowAction::Update);
            updated += 1;
            continue;
        }

        if existing.contains(&row.key) {
            actions.push(RowAction::Update);
            updated += 1;
        } else {
            actions.push(RowAction::Insert);
            inserted += 1;
        }
        slot_by_key.insert(&row.key, staged.len());
        staged.push(row);
    }

    ReconcilePlan {
        staged,
        actions,
        inserted,
        updated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::normalize::{KeyPart, Value};

    fn row(position: usize, id: i64, name: &str) -> TypedRow {
        TypedRow {
            position,
            values: vec![
                Value::BigInt(id),
                Value::Text(name.to_string()),
            ],
            key: RowKey(vec![KeyPart::Int(id)]),
        }
    }

    fn keys(ids: &[i64]) -> HashSet<RowKey> {
        ids.iter().map(|id| RowKey(vec![KeyPart::Int(*id)])).collect()
    }

    #[test]
    fn test_one_new_one_existing() {
        let rows = vec![row(1, 1, "A"), row(2, 2, "B")];
        let plan = plan(&rows, &keys(&[1]));

        assert_eq!(plan.updated, 1);
        assert_eq!(plan.inserted, 1);
        assert_eq!(plan.actions, vec![RowAction::Update, RowAction::Insert]);
        assert_eq!(plan.staged.len(), 2);
    }

    #[test]
    fn test_all_new() {
        let rows = vec![row(1, 1, "A"), row(2, 2, "B"), row(3, 3, "C")];
        let plan = plan(&rows, &HashSet::new());
        assert_eq!(plan.inserted, 3);
        assert_eq!(plan.updated, 0);
    }

    #[test]
    fn test_repeated_key_last_occurrence_wins() {
        let rows = vec![row(1, 5, "first"), row(2, 6, "other"), row(3, 5, "second")];
        let plan = plan(&rows, &HashSet::new());

        assert_eq!(plan.inserted, 2);
        assert_eq!(plan.updated, 1);
        assert_eq!(
            plan.actions,
            vec![RowAction::Insert, RowAction::Insert, RowAction::Update]
        );
        assert_eq!(plan.staged.len(), 2);
        assert_eq!(plan.staged[0].position, 3);
        assert_eq!(plan.staged[1].position, 2);
    }

    #[test]
    fn test_repeated_existing_key_counts_each_occurrence() {
        let rows = vec![row(1, 9, "a"), row(2, 9, "b")];
        let plan = plan(&rows, &keys(&[9]));
        assert_eq!(plan.inserted, 0);
        assert_eq!(plan.updated, 2);
        assert_eq!(plan.staged.len(), 1);
    }

    #[test]
    fn test_empty_batch() {
        let plan = plan(&[], &keys(&[1, 2]));
        assert_eq!(plan.inserted + plan.updated, 0);
        assert!(plan.staged.is_empty());
    }
}
