use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::SearchHit;
use crate::search::bm25::Bm25Hit;
use crate::search::vector::VectorHit;

/// RRF constant.
const RRF_K: f32 = 60.0;
/// Added once to any chunk ranked first in either list.
const TOP_RANK_BONUS: f32 = 0.05;

type Key = (Uuid, usize);

/// Reciprocal rank fusion of a BM25 ranking and a vector ranking.
///
/// Each list contributes `1 / (k + rank + 1)` per chunk. Chunks at rank 1 of
/// either list get a bonus of +0.05. Raw BM25 and cosine scores are kept on
/// the fused hit for display.
pub fn rrf_fusion(
    bm25_hits: &[Bm25Hit],
    vector_hits: &[VectorHit],
    limit: usize,
) -> Vec<SearchHit> {
    let mut score_map: HashMap<Key, SearchHit> = HashMap::new();
    let mut top_ranked: HashSet<Key> = HashSet::new();

    for (rank, hit) in bm25_hits.iter().enumerate() {
        let key = (hit.document_id, hit.chunk_index);
        if rank == 0 {
            top_ranked.insert(key);
        }
        let entry = score_map.entry(key).or_insert_with(|| {
            empty_hit(
                hit.document_id,
                &hit.filename,
                hit.chunk_index,
                &hit.content,
                hit.start_line,
                hit.end_line,
            )
        });
        entry.bm25_score = entry.bm25_score.max(hit.score);
        entry.combined_score += rrf(rank);
    }

    for (rank, hit) in vector_hits.iter().enumerate() {
        let key = (hit.document_id, hit.chunk_index);
        if rank == 0 {
            top_ranked.insert(key);
        }
        let entry = score_map.entry(key).or_insert_with(|| {
            empty_hit(
                hit.document_id,
                &hit.filename,
                hit.chunk_index,
                &hit.content,
                hit.start_line,
                hit.end_line,
            )
        });
        entry.vector_score = entry.vector_score.max(hit.score);
        entry.combined_score += rrf(rank);
    }

    for key in &top_ranked {
        if let Some(hit) = score_map.get_mut(key) {
            hit.combined_score += TOP_RANK_BONUS;
        }
    }

    let mut results: Vec<SearchHit> = score_map.into_values().collect();
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_index.cmp(&b.chunk_index))
    });
    results.truncate(limit);
    results
}

fn rrf(rank: usize) -> f32 {
    1.0 / (RRF_K + rank as f32 + 1.0)
}

fn empty_hit(
    document_id: Uuid,
    filename: &str,
    chunk_index: usize,
    content: &str,
    start_line: usize,
    end_line: usize,
) -> SearchHit {
    SearchHit {
        document_id,
        filename: filename.to_string(),
        chunk_index,
        content: content.to_string(),
        start_line,
        end_line,
        bm25_score: 0.0,
        vector_score: 0.0,
        combined_score: 0.0,
    }
}
