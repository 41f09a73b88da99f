//! Word-to-line reconstruction.
//!
//! Tokens are bucketed by their top edge rounded to one decimal place, which
//! absorbs the sub-pixel jitter extractors introduce between words printed on
//! the same baseline. Buckets come out top to bottom; tokens inside a bucket
//! are ordered by x0.

use std::collections::BTreeMap;

use crate::types::{Line, Token};

/// y0 rounded to one decimal, as an integer key so it can be ordered.
fn y_key(y0: f64) -> i64 {
    (y0 * 10.0).round() as i64
}

/// Group one page's tokens into lines ordered by increasing y.
pub fn reconstruct_lines(tokens: &[Token]) -> Vec<Line> {
    let mut buckets: BTreeMap<i64, Vec<Token>> = BTreeMap::new();
    for tok in tokens {
        buckets.entry(y_key(tok.y0)).or_default().push(tok.clone());
    }

    buckets
        .into_iter()
        .map(|(key, mut tokens)| {
            // Stable: equal x keeps extractor order.
            tokens.sort_by(|a, b| a.x0.total_cmp(&b.x0));
            Line {
                y: key as f64 / 10.0,
                tokens,
            }
        })
        .collect()
}

/// Reconstruct every page and concatenate the lines in page order.
pub fn reconstruct_document(pages: &[Vec<Token>]) -> Vec<Line> {
    pages.iter().flat_map(|p| reconstruct_lines(p)).collect()
}
