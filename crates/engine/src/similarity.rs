//! Name similarity scores in `[0, 1]`.
//!
//! Two signals are combined by taking the maximum:
//! - a normalized Levenshtein ratio, for spelling variance ("Chenai")
//! - whole-word containment, for partial names ("Ammu" in "Minnal Ammu")

/// Similarity of two display names, case-insensitive.
pub fn name_similarity(a: &str, b: &str) -> f32 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    levenshtein_ratio(&a, &b).max(word_containment(&a, &b))
}

/// `1 - distance / longer_length`, over chars.
pub fn levenshtein_ratio(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f32 / longest as f32
}

/// Edit distance with unit costs.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// 1.0 when every word of the shorter name is a word of the longer one.
///
/// Single-word names only count if that word is not trivially short, so
/// "A" does not match "A Lion".
pub fn word_containment(a: &str, b: &str) -> f32 {
    let wa: Vec<&str> = a.split_whitespace().collect();
    let wb: Vec<&str> = b.split_whitespace().collect();
    let (short, long) = if wa.len() <= wb.len() { (wa, wb) } else { (wb, wa) };
    if short.is_empty() || short.len() == long.len() {
        return 0.0;
    }
    if short.len() == 1 && short[0].chars().count() < 3 {
        return 0.0;
    }
    if short.iter().all(|w| long.contains(w)) {
        1.0
    } else {
        0.0
    }
}

fn normalize(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
