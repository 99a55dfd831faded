//! Requirement deduplication.
//!
//! Candidates are merged into an accumulated list in order. The first
//! equivalent entry wins: it takes the candidate's name or description where
//! its own is empty, and the candidate is discarded.

use std::convert::Infallible;

use tracing::{debug, info};

use crate::ai::{AiError, SimilarityOracle};
use crate::error;
use crate::models::{Project, Requirement};
use crate::store::Store;

/// Decides equivalence with an oracle when one is set, otherwise by text.
#[derive(Clone, Copy, Default)]
pub struct Deduplicator<'a> {
    oracle: Option<&'a dyn SimilarityOracle>,
}

impl<'a> Deduplicator<'a> {
    /// Case-insensitive equality of description or name.
    pub fn heuristic() -> Self {
        Self { oracle: None }
    }

    pub fn with_oracle(oracle: &'a dyn SimilarityOracle) -> Self {
        Self {
            oracle: Some(oracle),
        }
    }

    pub fn uses_oracle(&self) -> bool {
        self.oracle.is_some()
    }

    pub fn equivalent(&self, a: &Requirement, b: &Requirement) -> Result<bool, AiError> {
        match self.oracle {
            Some(oracle) => oracle.same(comparison_text(a), comparison_text(b)),
            None => Ok(heuristic_match(a, b)),
        }
    }

    /// Collapses `requirements` into a duplicate-free list.
    ///
    /// Deleted entries are dropped. With `ignore_proposed`, proposed entries
    /// pass through untouched and are never compared against. Passes repeat
    /// until one merges nothing, since a backfilled entry can match a row it
    /// did not match before. Oracle errors abort.
    pub fn deduplicate(
        &self,
        requirements: Vec<Requirement>,
        ignore_proposed: bool,
    ) -> Result<Vec<Requirement>, AiError> {
        collapse(requirements, ignore_proposed, |a, b| self.equivalent(a, b))
    }

    /// Merges `candidates` into an existing list and returns the positions of
    /// the ones that were appended.
    ///
    /// Deleted entries already in `base` stay in place but are never matched.
    /// Appended entries get `id = count(existing) + 1`. On error `base` is left
    /// unchanged.
    pub fn absorb(
        &self,
        base: &mut Vec<Requirement>,
        candidates: Vec<Requirement>,
    ) -> Result<Vec<usize>, AiError> {
        let mut merged = base.clone();
        let mut appended = Vec::new();
        let mut eq = |a: &Requirement, b: &Requirement| self.equivalent(a, b);
        for mut candidate in candidates {
            candidate.id = merged.len() as u32 + 1;
            if merge(&mut merged, candidate, false, &mut eq)? {
                appended.push(merged.len() - 1);
            }
        }
        *base = merged;
        Ok(appended)
    }
}

impl Store {
    /// Replaces the project's list with its deduplicated form and persists.
    /// Deleted requirements are dropped for good. Returns how many entries
    /// were removed.
    pub fn dedupe(
        &self,
        project: &mut Project,
        dedup: &Deduplicator<'_>,
        ignore_proposed: bool,
    ) -> error::Result<usize> {
        let before = project.data.requirements.len();
        let kept = dedup.deduplicate(project.data.requirements.clone(), ignore_proposed)?;
        let removed = before - kept.len();
        project.data.requirements = kept;
        self.save_project(project)?;
        info!(project_id = project.id, removed, "deduplicated project");
        Ok(removed)
    }
}

/// Heuristic [`Deduplicator::deduplicate`]; cannot fail.
pub fn deduplicate(requirements: Vec<Requirement>, ignore_proposed: bool) -> Vec<Requirement> {
    let collapsed = collapse(requirements, ignore_proposed, |a, b| {
        Ok::<_, Infallible>(heuristic_match(a, b))
    });
    match collapsed {
        Ok(out) => out,
        Err(never) => match never {},
    }
}

/// First-match passes until the list stops shrinking.
fn collapse<E, F>(
    requirements: Vec<Requirement>,
    ignore_proposed: bool,
    mut eq: F,
) -> Result<Vec<Requirement>, E>
where
    F: FnMut(&Requirement, &Requirement) -> Result<bool, E>,
{
    let total = requirements.len();
    let mut current = requirements;
    loop {
        let before = current.len();
        let mut out = Vec::with_capacity(before);
        for candidate in current {
            merge(&mut out, candidate, ignore_proposed, &mut eq)?;
        }
        if out.len() == before {
            debug!(before = total, after = out.len(), "deduplicated requirements");
            return Ok(out);
        }
        current = out;
    }
}

/// Returns true when `candidate` was appended.
fn merge<E, F>(
    out: &mut Vec<Requirement>,
    candidate: Requirement,
    ignore_proposed: bool,
    eq: &mut F,
) -> Result<bool, E>
where
    F: FnMut(&Requirement, &Requirement) -> Result<bool, E>,
{
    if candidate.condition.deleted {
        return Ok(false);
    }
    if ignore_proposed && candidate.condition.proposed {
        out.push(candidate);
        return Ok(true);
    }

    for existing in out.iter_mut() {
        if existing.condition.deleted || (ignore_proposed && existing.condition.proposed) {
            continue;
        }
        if eq(existing, &candidate)? {
            if existing.name.is_empty() {
                existing.name = candidate.name;
            }
            if existing.description.is_empty() {
                existing.description = candidate.description;
            }
            return Ok(false);
        }
    }

    out.push(candidate);
    Ok(true)
}

fn heuristic_match(a: &Requirement, b: &Requirement) -> bool {
    same_text(&a.description, &b.description) || same_text(&a.name, &b.name)
}

fn same_text(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && a.to_lowercase() == b.to_lowercase()
}

fn comparison_text(req: &Requirement) -> &str {
    if req.description.is_empty() {
        &req.name
    } else {
        &req.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn req(name: &str, description: &str) -> Requirement {
        Requirement::new(name, description)
    }

    struct CountingOracle {
        calls: Cell<usize>,
        answer: Result<bool, &'static str>,
    }

    impl SimilarityOracle for CountingOracle {
        fn same(&self, _a: &str, _b: &str) -> Result<bool, AiError> {
            self.calls.set(self.calls.get() + 1);
            self.answer.map_err(|m| AiError::Stub(m.to_string()))
        }
    }

    #[test]
    fn test_case_insensitive_description_match() {
        let out = deduplicate(vec![req("A", "Users log in"), req("B", "USERS LOG IN")], false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "A");
    }

    #[test]
    fn test_name_match_backfills_description() {
        let out = deduplicate(vec![req("Login", ""), req("login", "Users log in")], false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Login");
        assert_eq!(out[0].description, "Users log in");
    }

    #[test]
    fn test_empty_strings_never_match() {
        let out = deduplicate(vec![req("", "a"), req("", "b"), req("x", ""), req("y", "")], false);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn test_first_match_wins() {
        let out = deduplicate(
            vec![req("Login", ""), req("", "auth"), req("login", "auth")],
            false,
        );
        // The third entry matches the first by name and backfills "auth",
        // which then absorbs the second entry on the next pass.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Login");
        assert_eq!(out[0].description, "auth");
    }

    #[test]
    fn test_backfill_enables_later_match_and_stays_idempotent() {
        let input = vec![req("", "auth"), req("Login", ""), req("login", "auth")];
        let once = deduplicate(input, false);
        assert_eq!(once.len(), 1);
        assert_eq!(once[0].name, "login");
        assert_eq!(once[0].description, "auth");
        assert_eq!(deduplicate(once.clone(), false), once);
    }

    #[test]
    fn test_deleted_entries_dropped() {
        let mut gone = req("A", "deleted one");
        gone.condition.deleted = true;
        let out = deduplicate(vec![gone, req("B", "kept")], false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "B");
    }

    #[test]
    fn test_idempotent() {
        let input = vec![
            req("A", "one"),
            req("a", "two"),
            req("B", "ONE"),
            req("C", "three"),
            Requirement::proposed("D", "three"),
        ];
        for ignore in [false, true] {
            let once = deduplicate(input.clone(), ignore);
            let twice = deduplicate(once.clone(), ignore);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_ignore_proposed_passes_through() {
        let input = vec![
            req("A", "shared"),
            Requirement::proposed("P1", "shared"),
            Requirement::proposed("P2", "other"),
            req("B", "other"),
        ];
        let out = deduplicate(input.clone(), true);
        // Proposed rows survive and are never match targets.
        assert_eq!(out.len(), 4);

        let merged = deduplicate(input, false);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_oracle_replaces_heuristic() {
        let oracle = CountingOracle {
            calls: Cell::new(0),
            answer: Ok(true),
        };
        let out = Deduplicator::with_oracle(&oracle)
            .deduplicate(vec![req("A", "x"), req("B", "y"), req("C", "z")], false)
            .unwrap();
        assert_eq!(out.len(), 1);
        // Second pass has a single entry and asks nothing.
        assert_eq!(oracle.calls.get(), 2);
    }

    #[test]
    fn test_oracle_error_fails_fast() {
        let oracle = CountingOracle {
            calls: Cell::new(0),
            answer: Err("offline"),
        };
        let err = Deduplicator::with_oracle(&oracle)
            .deduplicate(vec![req("A", "x"), req("B", "y"), req("C", "z")], false)
            .unwrap_err();
        assert!(matches!(err, AiError::Stub(_)));
        assert_eq!(oracle.calls.get(), 1);
    }

    #[test]
    fn test_absorb_keeps_deleted_base_entries_and_assigns_ids() {
        let mut gone = req("Old", "legacy export");
        gone.id = 1;
        gone.condition.deleted = true;
        let mut kept = req("Login", "users log in");
        kept.id = 2;
        let mut base = vec![gone, kept];

        let appended = Deduplicator::heuristic()
            .absorb(
                &mut base,
                vec![
                    Requirement::proposed("Export", "Legacy export"),
                    Requirement::proposed("Again", "Users log in"),
                ],
            )
            .unwrap();

        assert_eq!(appended, vec![2]);
        assert_eq!(base.len(), 3);
        assert!(base[0].condition.deleted);
        assert_eq!(base[2].id, 3);
        assert!(base[2].condition.proposed);
    }

    #[test]
    fn test_store_dedupe_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Store::new(dir.path());
        let mut db = store.load_database().unwrap();
        store.new_product(&mut db, "prod").unwrap();
        let product = crate::store::product_mut(&mut db, 1).unwrap();
        let mut gone = req("C", "c");
        gone.condition.deleted = true;
        let data = crate::models::ProjectData {
            requirements: vec![req("A", "a"), req("B", "A"), gone],
            ..Default::default()
        };
        store.new_project(product, "prj", data).unwrap();
        let project = &mut product.projects[0];

        let removed = store
            .dedupe(project, &Deduplicator::heuristic(), false)
            .unwrap();
        assert_eq!(removed, 2);

        let mut fresh = Project::handle(1, 1);
        store.load_project(&mut fresh).unwrap();
        assert_eq!(fresh.data.requirements.len(), 1);
    }

    #[test]
    fn test_absorb_error_leaves_base_untouched() {
        let oracle = CountingOracle {
            calls: Cell::new(0),
            answer: Err("offline"),
        };
        let mut base = vec![req("A", "x")];
        let before = base.clone();
        let result = Deduplicator::with_oracle(&oracle).absorb(&mut base, vec![req("B", "y")]);
        assert!(result.is_err());
        assert_eq!(base, before);
    }
}
