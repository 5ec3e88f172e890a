//! Timeline reconciliation.
//!
//! Each poll of the feed yields a full snapshot. [`Reconciler::merge`] folds
//! it into the authoritative [`Timeline`], which only ever grows by appending
//! a suffix and never loses history, even when the overlap with the previous
//! poll cannot be found.

use magnetcast_common::ContentId;

/// Authoritative consumer-side view of the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    pub init_magnet: Option<ContentId>,
    pub magnets: Vec<ContentId>,
    /// `magnets` before the most recent advancing merge.
    pub old_magnets: Option<Vec<ContentId>>,
    /// Suffix added by the most recent advancing merge.
    pub new_magnets: Option<Vec<ContentId>>,
}

impl Timeline {
    pub fn has_pending(&self) -> bool {
        self.new_magnets.as_ref().is_some_and(|n| !n.is_empty())
    }
}

/// What a merge did to the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Nothing changed; no signal.
    Unchanged,
    /// No net change, and the previously announced suffix was confirmed.
    Settled,
    /// The snapshot overlapped history and extended it.
    Advanced { new: Vec<ContentId> },
    /// No overlap with non-empty history; the whole tail was appended.
    Gap { new: Vec<ContentId> },
}

impl MergeOutcome {
    pub fn new_magnets(&self) -> &[ContentId] {
        match self {
            MergeOutcome::Advanced { new } | MergeOutcome::Gap { new } => new,
            MergeOutcome::Unchanged | MergeOutcome::Settled => &[],
        }
    }
}

/// Work handed to the scheduler after a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineDelta {
    pub init: Option<ContentId>,
    /// New identifiers with their index in `Timeline::magnets`.
    pub entries: Vec<(usize, ContentId)>,
}

impl TimelineDelta {
    pub fn is_empty(&self) -> bool {
        self.init.is_none() && self.entries.is_empty()
    }
}

/// Owns the [`Timeline`] for one consumer session.
#[derive(Debug, Default)]
pub struct Reconciler {
    timeline: Timeline,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing timeline.
    pub fn with_timeline(timeline: Timeline) -> Self {
        Self { timeline }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Merge one snapshot. The first element is the initialization segment
    /// and never takes part in the overlap comparison.
    pub fn merge(&mut self, incoming: &[ContentId]) -> MergeOutcome {
        let Some((init, tail)) = incoming.split_first() else {
            return MergeOutcome::Unchanged;
        };
        self.timeline.init_magnet = Some(init.clone());

        let last_known = self.timeline.magnets.last();

        if tail.last() == last_known {
            if self.timeline.has_pending() {
                self.timeline.old_magnets = None;
                self.timeline.new_magnets = None;
                return MergeOutcome::Settled;
            }
            return MergeOutcome::Unchanged;
        }

        let overlap = last_known.and_then(|known| tail.iter().rposition(|m| m == known));

        let outcome = match overlap {
            // The match is the last element of history, so the cut point in
            // the old list is its end.
            Some(i) => MergeOutcome::Advanced {
                new: tail[i + 1..].to_vec(),
            },
            None if self.timeline.magnets.is_empty() => MergeOutcome::Advanced {
                new: tail.to_vec(),
            },
            None => {
                tracing::warn!(
                    history = self.timeline.magnets.len(),
                    incoming = tail.len(),
                    "Previous tail not found in feed; segments may have been missed"
                );
                MergeOutcome::Gap { new: tail.to_vec() }
            }
        };

        let new = outcome.new_magnets().to_vec();
        self.timeline.old_magnets = Some(self.timeline.magnets.clone());
        self.timeline.magnets.extend(new.iter().cloned());
        self.timeline.new_magnets = Some(new);

        outcome
    }

    /// Scheduler work for `outcome`, which must be the result of the most
    /// recent merge.
    pub fn delta(&self, outcome: &MergeOutcome) -> TimelineDelta {
        let new = outcome.new_magnets();
        let start = self.timeline.magnets.len() - new.len();
        TimelineDelta {
            init: self.timeline.init_magnet.clone(),
            entries: new
                .iter()
                .enumerate()
                .map(|(offset, id)| (start + offset, id.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ContentId> {
        names.iter().map(|n| n.parse().unwrap()).collect()
    }

    #[test]
    fn first_merge_takes_whole_tail() {
        let mut r = Reconciler::new();
        let outcome = r.merge(&ids(&["init", "A", "B"]));
        assert_eq!(outcome, MergeOutcome::Advanced { new: ids(&["A", "B"]) });
        assert_eq!(r.timeline().init_magnet, Some("init".parse().unwrap()));
        assert_eq!(r.timeline().magnets, ids(&["A", "B"]));
        assert_eq!(r.timeline().old_magnets, Some(vec![]));
    }

    #[test]
    fn init_only_snapshot_is_unchanged() {
        let mut r = Reconciler::new();
        assert_eq!(r.merge(&ids(&["init"])), MergeOutcome::Unchanged);
        assert_eq!(r.timeline().init_magnet, Some("init".parse().unwrap()));
        assert!(r.timeline().magnets.is_empty());
    }

    #[test]
    fn empty_snapshot_is_ignored() {
        let mut r = Reconciler::new();
        r.merge(&ids(&["init", "A"]));
        let before = r.timeline().clone();
        assert_eq!(r.merge(&[]), MergeOutcome::Unchanged);
        assert_eq!(r.timeline(), &before);
    }

    #[test]
    fn ambiguous_match_uses_last_occurrence() {
        let mut r = Reconciler::with_timeline(Timeline {
            magnets: ids(&["A", "B"]),
            ..Timeline::default()
        });
        let outcome = r.merge(&ids(&["init", "B", "X", "B", "C"]));
        assert_eq!(outcome, MergeOutcome::Advanced { new: ids(&["C"]) });
        assert_eq!(r.timeline().magnets, ids(&["A", "B", "C"]));
    }

    #[test]
    fn settle_then_identity() {
        let mut r = Reconciler::new();
        r.merge(&ids(&["init", "A"]));
        assert_eq!(r.merge(&ids(&["init", "A"])), MergeOutcome::Settled);
        assert!(r.timeline().new_magnets.is_none());
        assert_eq!(r.merge(&ids(&["init", "A"])), MergeOutcome::Unchanged);
    }

    #[test]
    fn delta_carries_positions() {
        let mut r = Reconciler::new();
        r.merge(&ids(&["init", "A", "B"]));
        let outcome = r.merge(&ids(&["init", "B", "C", "D"]));
        let delta = r.delta(&outcome);
        assert_eq!(delta.init, Some("init".parse().unwrap()));
        assert_eq!(
            delta.entries,
            vec![(2, "C".parse().unwrap()), (3, "D".parse().unwrap())]
        );
    }

    #[test]
    fn magnets_never_shrink() {
        let mut r = Reconciler::new();
        let feeds = [
            vec!["i", "A", "B", "C"],
            vec!["i", "C", "D"],
            vec!["i", "Q"],
            vec!["i", "Q"],
            vec!["i"],
            vec!["i", "A"],
        ];
        let mut len = 0;
        for feed in feeds {
            r.merge(&ids(&feed));
            assert!(r.timeline().magnets.len() >= len);
            len = r.timeline().magnets.len();
        }
    }
}
