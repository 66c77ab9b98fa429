//! Property-based tests for core domain types.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::BTreeMap;

use proptest::prelude::*;

use stepwise::core::conflict::{
    group_conflicts, ConflictIndex, IndexRecord, StageLevel, StageStore,
};
use stepwise::core::types::{BranchName, Fingerprint, Oid, RefName};

/// Strategy for generating valid branch names.
fn valid_branch_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,12}(/[a-z][a-z0-9_-]{0,12}){0,2}"
}

/// Strategy for generating valid hex OIDs.
fn valid_oid_string() -> impl Strategy<Value = String> {
    "[0-9a-f]{40}"
}

/// Paths mapped to a stage mask. Bit 0 is the ancestor, bit 1 ours,
/// bit 2 theirs. A zero mask is a fully merged path.
fn staged_paths() -> impl Strategy<Value = BTreeMap<String, u8>> {
    prop::collection::btree_map("[a-z]{1,6}(/[a-z]{1,6})?", 0u8..8, 0..12)
}

fn blob(path: &str, stage: StageLevel) -> Oid {
    let seed = path.bytes().fold(stage.as_raw() as u32, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(b as u32)
    });
    Oid::new(format!("{seed:040x}")).unwrap()
}

/// Records in index order: by path, then by stage.
fn records_for(paths: &BTreeMap<String, u8>) -> Vec<IndexRecord> {
    let mut records = Vec::new();
    for (path, mask) in paths {
        if *mask == 0 {
            records.push(IndexRecord::new(
                path.clone(),
                blob(path, StageLevel::Normal),
                0o100644,
                StageLevel::Normal,
            ));
            continue;
        }
        for (bit, stage) in [StageLevel::Ancestor, StageLevel::Ours, StageLevel::Theirs]
            .into_iter()
            .enumerate()
        {
            if mask & (1 << bit) != 0 {
                records.push(IndexRecord::new(
                    path.clone(),
                    blob(path, stage),
                    0o100644,
                    stage,
                ));
            }
        }
    }
    records
}

proptest! {
    /// Every conflicted path yields exactly one conflict, in path order,
    /// and fully merged paths yield none.
    #[test]
    fn one_conflict_per_conflicted_path(paths in staged_paths()) {
        let conflicts = group_conflicts(records_for(&paths)).unwrap();

        let expected: Vec<&String> = paths
            .iter()
            .filter(|(_, mask)| **mask != 0)
            .map(|(path, _)| path)
            .collect();
        let got: Vec<&str> = conflicts.iter().map(|c| c.path()).collect();
        prop_assert_eq!(got.len(), expected.len());
        for (g, e) in got.iter().zip(expected) {
            prop_assert_eq!(*g, e.as_str());
        }
    }

    /// Each side is present exactly when its stage was recorded, and
    /// carries that stage's blob.
    #[test]
    fn sides_match_recorded_stages(paths in staged_paths()) {
        let conflicts = group_conflicts(records_for(&paths)).unwrap();

        for conflict in &conflicts {
            let mask = paths[conflict.path()];
            let sides = [
                (conflict.ancestor(), StageLevel::Ancestor),
                (conflict.ours(), StageLevel::Ours),
                (conflict.theirs(), StageLevel::Theirs),
            ];
            for (bit, (side, stage)) in sides.into_iter().enumerate() {
                prop_assert_eq!(side.is_some(), mask & (1 << bit) != 0);
                if let Some(entry) = side {
                    prop_assert_eq!(entry.stage, stage);
                    prop_assert_eq!(&entry.id, &blob(conflict.path(), stage));
                    prop_assert_eq!(entry.path.as_str(), conflict.path());
                }
            }
        }
    }

    /// Direct lookup agrees with the full listing.
    #[test]
    fn lookup_agrees_with_listing(paths in staged_paths()) {
        let store = records_for(&paths);
        let index = ConflictIndex::new(&store);
        let all = index.all().unwrap();

        for (path, mask) in &paths {
            let found = index.get(path).unwrap();
            prop_assert_eq!(found.is_some(), *mask != 0);
            if let Some(conflict) = found {
                let listed = all.iter().find(|c| c.path() == path);
                prop_assert_eq!(Some(&conflict), listed);
            }
        }
        prop_assert!(index.get("not/staged/anywhere").unwrap().is_none());
    }

    /// The view is empty exactly when nothing is at a conflict stage.
    #[test]
    fn emptiness_matches_listing(paths in staged_paths()) {
        let store = records_for(&paths);
        let index = ConflictIndex::new(&store);
        prop_assert_eq!(index.is_empty().unwrap(), index.all().unwrap().is_empty());
        prop_assert_eq!(!index.is_empty().unwrap(), store.has_conflicts().unwrap());
    }

    /// Any stage outside 0..=3 is rejected rather than dropped.
    #[test]
    fn invalid_stage_rejected(paths in staged_paths(), bad in 4u16..) {
        let mut records = records_for(&paths);
        let mut corrupt = IndexRecord::new("zzz", blob("zzz", StageLevel::Ours), 0o100644, StageLevel::Ours);
        corrupt.stage = bad;
        records.push(corrupt);
        prop_assert!(ConflictIndex::new(&records).is_empty().is_err());
        prop_assert!(group_conflicts(records).is_err());
    }

    /// Any valid OID round-trips through serde.
    #[test]
    fn oid_serde_roundtrip(oid_str in valid_oid_string()) {
        let oid = Oid::new(&oid_str).unwrap();
        let json = serde_json::to_string(&oid).unwrap();
        let parsed: Oid = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(oid, parsed);
    }

    /// OIDs are normalized to lowercase.
    #[test]
    fn oid_normalized_to_lowercase(oid_str in valid_oid_string()) {
        let oid = Oid::new(oid_str.to_uppercase()).unwrap();
        prop_assert_eq!(oid.as_str(), oid_str.as_str());
    }

    /// Oid::short returns a prefix, clamped to the full id.
    #[test]
    fn oid_short_is_prefix(oid_str in valid_oid_string(), len in 0usize..60) {
        let oid = Oid::new(&oid_str).unwrap();
        let short = oid.short(len);
        prop_assert!(oid_str.starts_with(short));
        prop_assert_eq!(short.len(), len.min(40));
    }

    /// Strings of the wrong length never parse.
    #[test]
    fn oid_wrong_length_rejected(s in "[0-9a-f]{0,39}") {
        prop_assert!(Oid::new(s).is_err());
    }

    /// Fingerprint is deterministic for the same lines.
    #[test]
    fn fingerprint_deterministic(lines in prop::collection::vec("[ -~]{0,30}", 0..8)) {
        prop_assert_eq!(Fingerprint::of_lines(&lines), Fingerprint::of_lines(&lines));
        prop_assert_eq!(Fingerprint::of_lines(&lines).as_str().len(), 64);
    }

    /// Swapping two different lines changes the fingerprint.
    #[test]
    fn fingerprint_order_sensitive(a in "[a-z]{1,20}", b in "[a-z]{1,20}") {
        prop_assume!(a != b);
        prop_assert_ne!(
            Fingerprint::of_lines([&a, &b]),
            Fingerprint::of_lines([&b, &a])
        );
    }

    /// Line boundaries are part of the digest.
    #[test]
    fn fingerprint_respects_boundaries(a in "[a-z]{1,10}", b in "[a-z]{1,10}") {
        let joined = format!("{a}{b}");
        prop_assert_ne!(
            Fingerprint::of_lines([&a, &b]),
            Fingerprint::of_lines([&joined])
        );
    }

    /// Valid branch names round-trip through serde and map to local refs.
    #[test]
    fn branch_name_to_refname(name in valid_branch_name()) {
        let branch = BranchName::new(&name).unwrap();
        let json = serde_json::to_string(&branch).unwrap();
        let parsed: BranchName = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&branch, &parsed);

        let refname = RefName::for_branch(&branch);
        prop_assert!(refname.as_str().starts_with("refs/heads/"));
        prop_assert!(refname.is_branch_ref());
        prop_assert_eq!(refname.branch(), Some(branch));
    }
}
