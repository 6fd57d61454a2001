use indexmap::IndexMap;

use super::validation::ValidationFailure;

/// Field errors keyed by the flat path string, in first-recorded order.
///
/// A key mapped to `None` had an error that has since been cleared. It keeps
/// its slot so positional lookups stay stable until [`ErrorTree::clear`].
#[derive(Clone, Debug, Default)]
pub(super) struct ErrorTree {
    entries: IndexMap<String, Option<ValidationFailure>>,
}

impl ErrorTree {
    pub(super) fn get(&self, key: &str) -> Option<&ValidationFailure> {
        self.entries.get(key).and_then(Option::as_ref)
    }

    pub(super) fn get_index(&self, index: usize) -> Option<&ValidationFailure> {
        self.entries
            .get_index(index)
            .and_then(|(_, failure)| failure.as_ref())
    }

    /// `IndexMap::insert` keeps the original position of an existing key.
    pub(super) fn record(&mut self, key: String, failure: ValidationFailure) {
        self.entries.insert(key, Some(failure));
    }

    pub(super) fn clear_entry(&mut self, key: &str) -> bool {
        match self.entries.get_mut(key) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(super) fn present(&self) -> IndexMap<String, ValidationFailure> {
        self.entries
            .iter()
            .filter_map(|(key, failure)| failure.clone().map(|failure| (key.clone(), failure)))
            .collect()
    }

    pub(super) fn has_errors(&self) -> bool {
        self.entries.values().any(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rerecording_keeps_first_position() {
        let mut tree = ErrorTree::default();
        tree.record("a".into(), "first".into());
        tree.record("b".into(), "second".into());
        tree.record("a".into(), "again".into());

        assert_eq!(tree.get_index(0).map(ValidationFailure::message), Some("again"));
        assert_eq!(tree.get_index(1).map(ValidationFailure::message), Some("second"));
        assert_eq!(tree.get_index(2), None);
    }

    #[test]
    fn cleared_entries_hold_their_slot() {
        let mut tree = ErrorTree::default();
        tree.record("a".into(), "first".into());
        tree.record("b".into(), "second".into());

        assert!(tree.clear_entry("a"));
        assert!(!tree.clear_entry("a"));
        assert!(!tree.clear_entry("unknown"));

        assert_eq!(tree.get("a"), None);
        assert_eq!(tree.get_index(0), None);
        assert_eq!(tree.get_index(1).map(ValidationFailure::message), Some("second"));
        assert_eq!(tree.present().keys().collect::<Vec<_>>(), ["b"]);
        assert!(tree.has_errors());

        tree.clear();
        assert!(!tree.has_errors());
        assert_eq!(tree.get_index(0), None);
    }
}
