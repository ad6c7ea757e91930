//! Maximal Marginal Relevance selection with a per-document cap

use super::candidate::Candidate;
use crate::embedding::cosine_similarity;
use ahash::AHashMap;
use tracing::debug;

/// Greedily pick up to `k` candidates maximizing
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
///
/// Relevance is the rerank score, or the fused score when reranking was
/// skipped. A document that has contributed `per_document_cap` chunks is
/// skipped while other documents still have candidates; once only capped
/// documents remain, the cap is relaxed so the result is not needlessly short.
/// Ties go to the earlier candidate, so input order breaks them.
///
/// # Returns
/// Selected candidates in selection order, each carrying its MMR score
pub fn select_diverse(
    candidates: Vec<Candidate>,
    k: usize,
    lambda: f32,
    per_document_cap: usize,
) -> Vec<Candidate> {
    select_diverse_with_reserve(candidates, Vec::new(), k, lambda, per_document_cap)
}

/// [`select_diverse`] with a second, lower tier of candidates.
///
/// A `reserve` candidate is only considered once every `candidates` entry
/// has been taken, including those admitted by relaxing the cap. Redundancy
/// and per-document counts are shared across both tiers.
pub fn select_diverse_with_reserve(
    candidates: Vec<Candidate>,
    reserve: Vec<Candidate>,
    k: usize,
    lambda: f32,
    per_document_cap: usize,
) -> Vec<Candidate> {
    let primary = candidates.len();
    let k = k.min(primary + reserve.len());
    if k == 0 {
        return Vec::new();
    }

    let lambda = lambda.clamp(0.0, 1.0);
    let cap = per_document_cap.max(1);

    let mut remaining: Vec<Option<Candidate>> =
        candidates.into_iter().chain(reserve).map(Some).collect();
    // Max similarity of each remaining candidate to the selected set
    let mut redundancy = vec![0.0f32; remaining.len()];
    let mut per_document: AHashMap<String, usize> = AHashMap::new();
    let mut selected = Vec::with_capacity(k);
    let mut relaxed = false;

    while selected.len() < k {
        let under_cap = |c: &Candidate| {
            per_document.get(c.document_id()).copied().unwrap_or(0) < cap
        };

        let in_tier = |index: usize, reserve: bool| (index >= primary) == reserve;

        let mut best = None;
        for reserve in [false, true] {
            best = pick(&remaining, &redundancy, lambda, |i, c| {
                in_tier(i, reserve) && under_cap(c)
            });
            if best.is_none() {
                best = pick(&remaining, &redundancy, lambda, |i, _| in_tier(i, reserve));
                relaxed |= best.is_some();
            }
            if best.is_some() {
                break;
            }
        }

        let Some((index, score)) = best else {
            break;
        };
        let Some(chosen) = remaining[index].take() else {
            break;
        };

        for (slot, other) in remaining.iter().enumerate() {
            if let Some(other) = other {
                let similarity =
                    cosine_similarity(&chosen.chunk().embedding, &other.chunk().embedding);
                redundancy[slot] = redundancy[slot].max(similarity);
            }
        }

        *per_document
            .entry(chosen.document_id().to_string())
            .or_insert(0) += 1;
        selected.push(chosen.with_mmr(score));
    }

    if relaxed {
        debug!("Per-document cap {} relaxed to fill {} results", cap, k);
    }

    selected
}

fn pick(
    remaining: &[Option<Candidate>],
    redundancy: &[f32],
    lambda: f32,
    eligible: impl Fn(usize, &Candidate) -> bool,
) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;

    for (index, candidate) in remaining.iter().enumerate() {
        let Some(candidate) = candidate else {
            continue;
        };
        if !eligible(index, candidate) {
            continue;
        }

        let score = lambda * candidate.relevance() - (1.0 - lambda) * redundancy[index];
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }

    best
}
