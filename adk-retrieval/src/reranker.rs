//! Reciprocal Rank Fusion of dense and sparse rankings.
//!
//! RRF ignores raw scores: an item at 1-based position `rank` in a list
//! contributes `weight / (rank + k)`, contributions are summed per ID across
//! lists, and the union is sorted by the summed score.

use std::collections::{HashMap, HashSet};

use tracing::{Span, debug, warn};

use crate::document::SearchResult;

/// Default RRF smoothing constant.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// One input ranking together with its fusion weight.
#[derive(Debug, Clone, Copy)]
pub struct RankedList<'a> {
    pub results: &'a [SearchResult],
    pub weight: f64,
}

impl<'a> RankedList<'a> {
    pub fn new(results: &'a [SearchResult], weight: f64) -> Self {
        Self { results, weight }
    }
}

/// Merges several rankings of the same ID space into one.
///
/// Vector stores accept a reranker in
/// [`hybrid_search`](crate::VectorStore::hybrid_search) to fuse per-field rankings.
pub trait Reranker: Send + Sync {
    /// Fuse `lists` into one ranking ordered by descending fused score.
    fn fuse(&self, lists: &[RankedList<'_>]) -> Vec<SearchResult>;
}

/// Weighted Reciprocal Rank Fusion.
///
/// # Example
///
/// ```rust,ignore
/// use adk_retrieval::RrfReranker;
///
/// let reranker = RrfReranker::default();
/// let fused = reranker.rerank(&dense, &sparse, 0.5, 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct RrfReranker {
    k: f64,
    span: Span,
}

impl Default for RrfReranker {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K, span: tracing::debug_span!("rrf_reranker") }
    }
}

impl RrfReranker {
    /// Create a reranker with smoothing constant `k`.
    ///
    /// Non-positive or non-finite values are replaced with [`DEFAULT_RRF_K`].
    pub fn new(k: f64) -> Self {
        let mut reranker = Self::default();
        if k.is_finite() && k > 0.0 {
            reranker.k = k;
        } else {
            warn!(k, default = DEFAULT_RRF_K, "invalid rrf k, using default");
        }
        reranker
    }

    /// Emit this reranker's events under `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    /// Fuse a dense and a sparse ranking.
    ///
    /// The result holds every distinct ID of both inputs; callers truncate.
    /// On equal fused scores the item seen first wins, scanning the dense list
    /// before the sparse one.
    pub fn rerank(
        &self,
        dense: &[SearchResult],
        sparse: &[SearchResult],
        dense_weight: f64,
        sparse_weight: f64,
    ) -> Vec<SearchResult> {
        self.fuse(&[RankedList::new(dense, dense_weight), RankedList::new(sparse, sparse_weight)])
    }
}

/// Clamp negative weights to zero and scale them to sum to one.
/// Falls back to equal weights when nothing positive remains.
fn normalize_weights(lists: &[RankedList<'_>]) -> Vec<f64> {
    let clamped: Vec<f64> =
        lists.iter().map(|l| if l.weight.is_finite() { l.weight.max(0.0) } else { 0.0 }).collect();
    let total: f64 = clamped.iter().sum();
    if total <= 0.0 {
        let equal = 1.0 / lists.len() as f64;
        return vec![equal; lists.len()];
    }
    clamped.into_iter().map(|w| w / total).collect()
}

impl Reranker for RrfReranker {
    fn fuse(&self, lists: &[RankedList<'_>]) -> Vec<SearchResult> {
        let _guard = self.span.enter();
        if lists.is_empty() {
            return Vec::new();
        }
        let weights = normalize_weights(lists);

        let mut fused: Vec<SearchResult> = Vec::new();
        let mut positions: HashMap<i64, usize> = HashMap::new();

        for (list, weight) in lists.iter().zip(&weights) {
            let mut seen = HashSet::new();
            for (index, result) in list.results.iter().enumerate() {
                if !seen.insert(result.id) {
                    continue;
                }
                let contribution = weight / ((index + 1) as f64 + self.k);
                match positions.get(&result.id) {
                    Some(&position) => {
                        let entry = &mut fused[position];
                        entry.score += contribution;
                        for (name, value) in &result.fields {
                            entry.fields.entry(name.clone()).or_insert_with(|| value.clone());
                        }
                    }
                    None => {
                        positions.insert(result.id, fused.len());
                        fused.push(SearchResult {
                            id: result.id,
                            score: contribution,
                            fields: result.fields.clone(),
                        });
                    }
                }
            }
        }

        // Stable sort keeps first-appearance order among equal scores.
        fused.sort_by(|a, b| b.score.total_cmp(&a.score));
        debug!(lists = lists.len(), fused = fused.len(), "fused rankings");
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn ranking(ids: &[i64]) -> Vec<SearchResult> {
        ids.iter().enumerate().map(|(i, id)| SearchResult::new(*id, i as f64)).collect()
    }

    fn ids(results: &[SearchResult]) -> Vec<i64> {
        results.iter().map(|r| r.id).collect()
    }

    #[test]
    fn item_in_both_lists_ranks_first() {
        let reranker = RrfReranker::default();
        let fused = reranker.rerank(&ranking(&[1, 2, 3]), &ranking(&[3, 4, 5]), 0.5, 0.5);
        assert_eq!(fused[0].id, 3);
        assert_eq!(fused.len(), 5);
    }

    #[test]
    fn fused_score_formula() {
        let reranker = RrfReranker::default();
        let fused = reranker.rerank(&ranking(&[1]), &ranking(&[1]), 1.0, 3.0);
        let expected = 0.25 / 61.0 + 0.75 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-12);
    }

    #[test]
    fn disjoint_lists_keep_every_id() {
        let reranker = RrfReranker::default();
        let fused = reranker.rerank(&ranking(&[1, 2, 3]), &ranking(&[4, 5, 6]), 0.5, 0.5);
        assert_eq!(fused.len(), 6);
        // Equal weights: same-rank ties resolve dense first.
        assert_eq!(ids(&fused), vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn identical_lists_preserve_order() {
        let reranker = RrfReranker::default();
        let list = ranking(&[9, 4, 7, 1]);
        assert_eq!(ids(&reranker.rerank(&list, &list, 0.5, 0.5)), vec![9, 4, 7, 1]);
    }

    #[test]
    fn weights_favor_heavier_list() {
        let reranker = RrfReranker::default();
        let fused = reranker.rerank(&ranking(&[1, 2]), &ranking(&[2, 1]), 0.9, 0.1);
        assert_eq!(ids(&fused), vec![1, 2]);
        let fused = reranker.rerank(&ranking(&[1, 2]), &ranking(&[2, 1]), 0.1, 0.9);
        assert_eq!(ids(&fused), vec![2, 1]);
    }

    #[test]
    fn non_positive_weights_fall_back_to_equal() {
        let reranker = RrfReranker::default();
        let fused = reranker.rerank(&ranking(&[1]), &ranking(&[2]), 0.0, -1.0);
        assert_eq!(fused[0].score, fused[1].score);
        assert!((fused[0].score - 0.5 / 61.0).abs() < 1e-12);

        // A single negative weight is clamped to zero.
        let fused = reranker.rerank(&ranking(&[1]), &ranking(&[2]), 1.0, -1.0);
        assert_eq!(fused[1].score, 0.0);
    }

    #[test]
    fn non_positive_k_resets_to_default() {
        assert_eq!(RrfReranker::new(0.0).k(), DEFAULT_RRF_K);
        assert_eq!(RrfReranker::new(-5.0).k(), DEFAULT_RRF_K);
        assert_eq!(RrfReranker::new(10.0).k(), 10.0);
    }

    #[test]
    fn duplicate_ids_count_once_per_list() {
        let reranker = RrfReranker::default();
        let fused = reranker.rerank(&ranking(&[1, 1, 2]), &[], 1.0, 0.0);
        assert_eq!(fused.len(), 2);
        assert!((fused[0].score - 1.0 / 61.0).abs() < 1e-12);
        assert!((fused[1].score - 1.0 / 63.0).abs() < 1e-12);
    }

    #[test]
    fn fields_are_unioned_with_dense_precedence() {
        let mut dense = SearchResult::new(1, 0.1);
        dense.fields.insert("text".into(), Value::Str("dense".into()));
        let mut sparse = SearchResult::new(1, 7.0);
        sparse.fields.insert("text".into(), Value::Str("sparse".into()));
        sparse.fields.insert("content".into(), Value::Str("body".into()));

        let fused = RrfReranker::default().rerank(&[dense], &[sparse], 0.5, 0.5);
        assert_eq!(fused[0].fields["text"].as_str(), Some("dense"));
        assert_eq!(fused[0].fields["content"].as_str(), Some("body"));
    }

    #[test]
    fn fuse_accepts_many_lists() {
        let reranker = RrfReranker::default();
        let a = ranking(&[1, 2]);
        let b = ranking(&[2, 3]);
        let c = ranking(&[2]);
        let lists = [RankedList::new(&a, 1.0), RankedList::new(&b, 1.0), RankedList::new(&c, 1.0)];
        let fused = reranker.fuse(&lists);
        assert_eq!(fused[0].id, 2);
        assert_eq!(fused.len(), 3);
        assert!(reranker.fuse(&[]).is_empty());
    }
}
