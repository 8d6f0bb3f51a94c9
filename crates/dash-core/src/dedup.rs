//! Order-id deduplication.
//!
//! Open orders can be collected by more than one strategy (bulk query, then a
//! per-symbol fallback) and those strategies may overlap. [`OrderIdDedup`]
//! keeps the first occurrence of each id.

use ahash::AHashSet;

/// First-seen filter over string ids.
///
/// Not thread-safe. Each merge owns its own instance.
#[derive(Debug, Default)]
pub struct OrderIdDedup {
    seen: AHashSet<String>,
}

impl OrderIdDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `id` is offered, `false` afterwards.
    #[inline]
    pub fn check_and_insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            false
        } else {
            self.seen.insert(id.to_string());
            true
        }
    }

    /// Keep only the first item per id, preserving order.
    pub fn retain_first<T>(&mut self, items: Vec<T>, id: impl Fn(&T) -> &str) -> Vec<T> {
        items.into_iter().filter(|item| self.check_and_insert(id(item))).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_occurrence_wins() {
        let mut d = OrderIdDedup::new();
        assert!(d.check_and_insert("1"));
        assert!(!d.check_and_insert("1"));
        assert!(d.check_and_insert("2"));
        assert_eq!(d.len(), 2);
    }

    #[test]
    fn retain_first_preserves_order() {
        let mut d = OrderIdDedup::new();
        let items = vec![("a", 1), ("b", 2), ("a", 3), ("c", 4), ("b", 5)];
        let kept = d.retain_first(items, |(id, _)| id);
        assert_eq!(kept, vec![("a", 1), ("b", 2), ("c", 4)]);
    }
}
