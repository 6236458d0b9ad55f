// model-linker/src/matcher/similarity.rs

use std::collections::HashMap;

/// Ratcliff/Obershelp similarity of the lower-cased inputs: twice the number
/// of characters in matching blocks divided by the combined length.
/// Identical strings score 1.0, strings with nothing in common 0.0.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Similarity scaled to a 0-100 percentage.
pub fn confidence_from(similarity: f64) -> u8 {
    (similarity.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`; ties go to the
/// block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run length of the match ending at (i - 1, j), keyed by j
    let mut run_lengths: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next_lengths = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| run_lengths.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next_lengths.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        run_lengths = next_lengths;
    }
    (best_i, best_j, best_size)
}
