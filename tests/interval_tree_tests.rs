use calsync::{IntervalHandle, IntervalTree};
use std::collections::BTreeSet;

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, bound: u64) -> i64 {
        (self.next() % bound) as i64
    }
}

fn expected(live: &[(IntervalHandle, i64, i64, u32)], pred: impl Fn(i64, i64) -> bool) -> BTreeSet<u32> {
    live.iter().filter(|(_, s, e, _)| pred(*s, *e)).map(|(_, _, _, id)| *id).collect()
}

fn ids<'a>(entries: impl Iterator<Item = calsync::interval_tree::Entry<'a, i64, u32>>) -> BTreeSet<u32> {
    entries.map(|e| *e.payload).collect()
}

#[test]
fn test_random_inserts_and_deletes_match_brute_force() {
    let mut rng = Lcg(0x5eed);
    let mut tree: IntervalTree<i64, u32> = IntervalTree::new();
    let mut live: Vec<(IntervalHandle, i64, i64, u32)> = Vec::new();

    for step in 0..2000u32 {
        if live.is_empty() || rng.below(3) != 0 {
            let start = rng.below(1000);
            let end = start + rng.below(80);
            let handle = tree.insert(start, end, step);
            live.push((handle, start, end, step));
        } else {
            let victim = live.swap_remove(rng.below(live.len() as u64) as usize);
            assert_eq!(tree.delete(victim.0), Some(victim.3));
        }

        tree.verify_integrity().unwrap_or_else(|e| panic!("step {}: {}", step, e));
        assert_eq!(tree.len(), live.len());

        if step % 25 == 0 {
            let a = rng.below(1000);
            let b = a + rng.below(120);
            assert_eq!(ids(tree.find_intersecting(a, b)), expected(&live, |s, e| s <= b && e >= a));
            assert_eq!(ids(tree.find_containing(a, b)), expected(&live, |s, e| s <= a && e >= b));
            assert_eq!(ids(tree.find_contained(a, b)), expected(&live, |s, e| s >= a && e <= b));
            assert_eq!(ids(tree.find_overlapping(a)), expected(&live, |s, e| s <= a && e >= a));
        }
    }
}

#[test]
fn test_results_are_ordered_by_start() {
    let tree: IntervalTree<i64, &str> = vec![(30, 40, "c"), (10, 50, "a"), (20, 25, "b"), (10, 12, "a2")]
        .into_iter()
        .collect();

    let starts: Vec<i64> = tree.find_intersecting(0, 100).map(|e| e.start).collect();
    let mut sorted = starts.clone();
    sorted.sort();
    assert_eq!(starts, sorted);
    assert_eq!(starts.len(), 4);
}

#[test]
fn test_duplicate_intervals_are_distinct_entries() {
    let mut tree = IntervalTree::new();
    let first = tree.insert(5, 10, "first");
    let second = tree.insert(5, 10, "second");

    assert_eq!(tree.delete(first), Some("first"));
    let remaining: Vec<&str> = tree.find_overlapping(7).map(|e| *e.payload).collect();
    assert_eq!(remaining, vec!["second"]);
    assert!(tree.get(second).is_some());
    assert_eq!(tree.delete(first), None);
}

#[test]
fn test_clear_invalidates_handles() {
    let mut tree = IntervalTree::new();
    let handle = tree.insert(1, 2, ());
    tree.clear();
    assert!(tree.is_empty());
    assert!(tree.get(handle).is_none());
    tree.verify_integrity().unwrap();
}
