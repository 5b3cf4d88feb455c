//! Conflict resolution between candidates of different kinds

use crate::candidates::SectionCandidate;
use crate::rules::{Occurrence, RuleTable};
use shared_types::{SectionKind, SectionSpan};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::debug;

/// A section that survived resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSection {
    pub span: SectionSpan,
    pub confidence: f32,
    pub signals: Vec<String>,
}

fn preference(a: &SectionCandidate, b: &SectionCandidate, occurrence: Occurrence) -> Ordering {
    b.confidence.total_cmp(&a.confidence).then_with(|| match occurrence {
        Occurrence::First => a.anchor.cmp(&b.anchor),
        Occurrence::Last => b.anchor.cmp(&a.anchor),
    })
}

/// Greedily accept candidates from `pool` on top of `accepted`.
///
/// Candidates under `min_confidence` are discarded first. Each round the best
/// remaining candidate across all kinds is accepted: highest confidence, then
/// earliest anchor. A candidate whose anchor page is already taken by another
/// kind is dropped and its kind falls back to its next candidate. Kinds that
/// are already accepted are not reconsidered.
pub fn resolve(
    accepted: &mut Vec<SectionCandidate>,
    pool: Vec<SectionCandidate>,
    table: &RuleTable,
    min_confidence: f32,
) {
    let done: BTreeSet<SectionKind> = accepted.iter().map(|c| c.kind).collect();
    let mut taken: BTreeSet<usize> = accepted.iter().map(|c| c.anchor).collect();

    let mut queues: BTreeMap<SectionKind, Vec<SectionCandidate>> = BTreeMap::new();
    for candidate in pool {
        if candidate.confidence >= min_confidence && !done.contains(&candidate.kind) {
            queues.entry(candidate.kind).or_default().push(candidate);
        }
    }

    let mut queues: BTreeMap<SectionKind, VecDeque<SectionCandidate>> = queues
        .into_iter()
        .map(|(kind, mut list)| {
            let occurrence = table
                .rule(kind)
                .map_or(Occurrence::First, |rule| rule.occurrence);
            list.sort_by(|a, b| preference(a, b, occurrence));
            (kind, list.into())
        })
        .collect();

    loop {
        for (kind, queue) in queues.iter_mut() {
            while let Some(head) = queue.front() {
                if !taken.contains(&head.anchor) {
                    break;
                }
                debug!(section = %kind, page = head.anchor + 1, "candidate page already taken");
                queue.pop_front();
            }
        }
        queues.retain(|_, queue| !queue.is_empty());

        let best = queues
            .iter()
            .filter_map(|(kind, queue)| queue.front().map(|head| (*kind, head)))
            .min_by(|(_, a), (_, b)| {
                b.confidence
                    .total_cmp(&a.confidence)
                    .then_with(|| a.anchor.cmp(&b.anchor))
            })
            .map(|(kind, _)| kind);

        let Some(kind) = best else { break };
        let Some(winner) = queues.remove(&kind).and_then(|mut queue| queue.pop_front()) else {
            break;
        };

        debug!(
            section = %kind,
            page = winner.anchor + 1,
            confidence = winner.confidence,
            "accepted candidate"
        );
        taken.insert(winner.anchor);
        accepted.push(winner);
    }
}

/// Turn accepted candidates into sorted 1-indexed spans.
///
/// Each span runs from its anchor page up to the next section's anchor, and
/// the last one runs to the end of the document.
pub fn into_sections(mut accepted: Vec<SectionCandidate>, page_count: usize) -> Vec<ResolvedSection> {
    accepted.sort_by_key(|c| c.anchor);

    let starts: Vec<usize> = accepted.iter().map(|c| c.anchor).collect();
    accepted
        .into_iter()
        .enumerate()
        .map(|(idx, candidate)| {
            let end = starts.get(idx + 1).copied().unwrap_or(page_count);
            ResolvedSection {
                span: SectionSpan::new(candidate.kind, page_number(candidate.anchor), page_number(end)),
                confidence: candidate.confidence,
                signals: candidate.signals,
            }
        })
        .collect()
}

fn page_number(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_candidate(pages: usize) -> impl Strategy<Value = SectionCandidate> {
        (0..12usize, 0..pages, 0.0f32..1.0).prop_map(|(kind, anchor, confidence)| SectionCandidate {
            kind: SectionKind::ALL[kind],
            anchor,
            confidence,
            signals: vec![],
            claim: anchor..anchor + 1,
        })
    }

    proptest! {
        /// Resolved spans are sorted, disjoint, and one per kind at most
        #[test]
        fn spans_never_overlap(pool in prop::collection::vec(arb_candidate(30), 0..60)) {
            let table = RuleTable::default();
            let mut accepted = Vec::new();
            resolve(&mut accepted, pool, &table, 0.5);
            let sections = into_sections(accepted, 30);

            let mut kinds: Vec<_> = sections.iter().map(|s| s.span.kind).collect();
            kinds.sort();
            kinds.dedup();
            prop_assert_eq!(kinds.len(), sections.len());

            for pair in sections.windows(2) {
                prop_assert!(pair[0].span.start_page < pair[1].span.start_page);
                prop_assert!(!pair[0].span.overlaps(&pair[1].span));
            }
            for section in &sections {
                prop_assert!(section.confidence >= 0.5);
                prop_assert!(section.span.end_page <= 31);
            }
        }

        /// Resolution does not depend on the order candidates were produced in
        #[test]
        fn resolution_is_order_independent(pool in prop::collection::vec(arb_candidate(20), 0..40)) {
            let table = RuleTable::default();
            let mut forward = Vec::new();
            resolve(&mut forward, pool.clone(), &table, 0.5);
            let mut reversed_pool = pool;
            reversed_pool.reverse();
            let mut backward = Vec::new();
            resolve(&mut backward, reversed_pool, &table, 0.5);

            let key = |list: &Vec<SectionCandidate>| {
                let mut k: Vec<_> = list.iter().map(|c| (c.kind, c.anchor)).collect();
                k.sort();
                k
            };
            prop_assert_eq!(key(&forward), key(&backward));
        }
    }
}
