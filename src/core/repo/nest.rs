use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Folds flat left-joined rows into parents with child lists.
///
/// Parents and children keep first-seen order. A repeated parent key or a
/// repeated child key under the same parent is ignored, so fan-out joins
/// collapse cleanly. Rows whose child columns are null should register the
/// parent only.
#[derive(Debug)]
pub struct Nest<K, P, CK, C> {
    entries: Vec<(P, Vec<C>)>,
    index: HashMap<K, usize>,
    seen: HashSet<(usize, CK)>,
}

impl<K, P, CK, C> Default for Nest<K, P, CK, C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            seen: HashSet::new(),
        }
    }
}

impl<K, P, CK, C> Nest<K, P, CK, C>
where
    K: Eq + Hash,
    CK: Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `key`, materializing the parent on first sighting.
    pub fn parent(&mut self, key: K, make: impl FnOnce() -> P) -> usize {
        if let Some(&slot) = self.index.get(&key) {
            return slot;
        }
        let slot = self.entries.len();
        self.entries.push((make(), Vec::new()));
        self.index.insert(key, slot);
        slot
    }

    /// Appends a child under `slot` unless `key` was already seen there.
    pub fn child(&mut self, slot: usize, key: CK, make: impl FnOnce() -> C) {
        if slot < self.entries.len() && self.seen.insert((slot, key)) {
            self.entries[slot].1.push(make());
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Vec<(P, Vec<C>)> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        recipe_id: i64,
        recipe: &'static str,
        ingredient_id: Option<i64>,
        ingredient: Option<&'static str>,
    }

    fn fold(rows: &[Row]) -> Vec<(&'static str, Vec<&'static str>)> {
        let mut nest = Nest::new();
        for row in rows {
            let slot = nest.parent(row.recipe_id, || row.recipe);
            if let (Some(id), Some(name)) = (row.ingredient_id, row.ingredient) {
                nest.child(slot, id, || name);
            }
        }
        nest.finish()
    }

    #[test]
    fn test_fan_out_rows_collapse() {
        let rows = [
            Row { recipe_id: 1, recipe: "Soup", ingredient_id: Some(10), ingredient: Some("Leek") },
            Row { recipe_id: 1, recipe: "Soup", ingredient_id: Some(11), ingredient: Some("Potato") },
            Row { recipe_id: 1, recipe: "Soup", ingredient_id: Some(10), ingredient: Some("Leek") },
            Row { recipe_id: 2, recipe: "Toast", ingredient_id: Some(20), ingredient: Some("Bread") },
        ];
        assert_eq!(
            fold(&rows),
            vec![("Soup", vec!["Leek", "Potato"]), ("Toast", vec!["Bread"])]
        );
    }

    #[test]
    fn test_null_child_gives_empty_container() {
        let rows = [Row { recipe_id: 3, recipe: "Water", ingredient_id: None, ingredient: None }];
        let folded = fold(&rows);
        assert_eq!(folded.len(), 1);
        assert!(folded[0].1.is_empty());
    }

    #[test]
    fn test_no_rows_gives_no_parents() {
        assert!(fold(&[]).is_empty());
    }

    #[test]
    fn test_same_child_key_under_different_parents() {
        let mut nest: Nest<i64, &str, &str, &str> = Nest::new();
        let a = nest.parent(1, || "a");
        let b = nest.parent(2, || "b");
        nest.child(a, "alice", || "alice");
        nest.child(b, "alice", || "alice");
        let out = nest.finish();
        assert_eq!(out[0].1, vec!["alice"]);
        assert_eq!(out[1].1, vec!["alice"]);
    }

    #[test]
    fn test_first_sighting_order_is_kept() {
        let mut nest: Nest<i64, i64, i64, i64> = Nest::new();
        for (p, c) in [(5, 1), (3, 2), (5, 3), (3, 4)] {
            let slot = nest.parent(p, || p);
            nest.child(slot, c, || c);
        }
        assert_eq!(nest.len(), 2);
        assert_eq!(nest.finish(), vec![(5, vec![1, 3]), (3, vec![2, 4])]);
    }
}
