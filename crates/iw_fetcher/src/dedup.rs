//! In-batch duplicate removal.
//!
//! A record is dropped when its title or its description exactly matches one
//! already kept from the same batch. Matching is byte-exact with no case or
//! whitespace folding. Duplicates across batches are left to the storage
//! layer's unique URL.

use iw_core::{Article, RawArticle};
use std::collections::HashSet;

pub trait Deduplicate {
    fn title_key(&self) -> Option<&str>;
    fn description_key(&self) -> Option<&str>;
}

impl Deduplicate for RawArticle {
    fn title_key(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn description_key(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Deduplicate for Article {
    fn title_key(&self) -> Option<&str> {
        Some(&self.title)
    }

    fn description_key(&self) -> Option<&str> {
        Some(&self.description)
    }
}

/// Keep the first record for every title and every description, preserving order.
///
/// A missing field counts as its own key, so two records that both lack a
/// description collide.
pub fn deduplicate<T: Deduplicate>(records: Vec<T>) -> Vec<T> {
    let mut seen_titles: HashSet<Option<String>> = HashSet::new();
    let mut seen_descriptions: HashSet<Option<String>> = HashSet::new();
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        let title = record.title_key().map(str::to_owned);
        let description = record.description_key().map(str::to_owned);
        if seen_titles.contains(&title) || seen_descriptions.contains(&description) {
            continue;
        }
        seen_titles.insert(title);
        seen_descriptions.insert(description);
        kept.push(record);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: Option<&str>, description: Option<&str>, link: &str) -> RawArticle {
        RawArticle {
            title: title.map(String::from),
            description: description.map(String::from),
            link: Some(link.to_string()),
            ..Default::default()
        }
    }

    fn links(records: &[RawArticle]) -> Vec<&str> {
        records.iter().filter_map(|r| r.link.as_deref()).collect()
    }

    #[test]
    fn test_drops_on_either_axis() {
        let batch = vec![
            raw(Some("Robot arm injures worker"), Some("desc a"), "1"),
            raw(Some("Robot arm injures worker"), Some("desc b"), "2"),
            raw(Some("Different title"), Some("desc a"), "3"),
            raw(Some("Another story"), Some("desc c"), "4"),
        ];
        assert_eq!(links(&deduplicate(batch)), vec!["1", "4"]);
    }

    #[test]
    fn test_matching_is_byte_exact() {
        let batch = vec![
            raw(Some("Crash"), Some("one"), "1"),
            raw(Some("crash"), Some("two"), "2"),
            raw(Some("Crash "), Some("three"), "3"),
        ];
        assert_eq!(links(&deduplicate(batch)), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_missing_fields_collide() {
        let batch = vec![
            raw(Some("A"), None, "1"),
            raw(Some("B"), None, "2"),
            raw(None, Some("x"), "3"),
        ];
        assert_eq!(links(&deduplicate(batch)), vec!["1", "3"]);
    }

    #[test]
    fn test_rejected_records_do_not_block_later_ones() {
        // "2" collides on title, so its description "d2" was never kept
        let batch = vec![
            raw(Some("t1"), Some("d1"), "1"),
            raw(Some("t1"), Some("d2"), "2"),
            raw(Some("t3"), Some("d2"), "3"),
        ];
        assert_eq!(links(&deduplicate(batch)), vec!["1", "3"]);
    }

    #[test]
    fn test_idempotent_and_order_preserving() {
        let batch = vec![
            raw(Some("e"), Some("5"), "a"),
            raw(Some("c"), Some("3"), "b"),
            raw(Some("e"), Some("9"), "c"),
            raw(Some("a"), Some("1"), "d"),
            raw(Some("z"), Some("3"), "e"),
            raw(Some("b"), Some("2"), "f"),
        ];
        let once = deduplicate(batch.clone());
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);

        // kept items appear in the same relative order as in the input
        let positions: Vec<usize> = once
            .iter()
            .map(|r| batch.iter().position(|b| b == r).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(links(&once), vec!["a", "b", "d", "f"]);
    }

    #[test]
    fn test_empty_batch() {
        assert!(deduplicate(Vec::<RawArticle>::new()).is_empty());
    }
}
