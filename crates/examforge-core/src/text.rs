//! Text normalization and similarity for duplicate detection and grading.
//!
//! Both the composer (prompt dedup) and the fuzzy grading tier compare
//! normalized text: casefolded, diacritics stripped, runs of
//! non-alphanumerics collapsed to single spaces, trimmed.

/// Normalize text for comparison.
pub fn normalize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    let mut push = |f: char, out: &mut String, pending_space: &mut bool| {
        if f.is_alphanumeric() {
            if *pending_space && !out.is_empty() {
                out.push(' ');
            }
            *pending_space = false;
            out.extend(f.to_lowercase());
        } else {
            *pending_space = true;
        }
    };
    for c in input.chars() {
        match strip_diacritic(c) {
            Some(folded) => {
                for f in folded.chars() {
                    push(f, &mut out, &mut pending_space);
                }
            }
            None => push(c, &mut out, &mut pending_space),
        }
    }
    out
}

/// Map common accented Latin characters to their base letter. Characters
/// outside the table are returned as `None` and pass through unchanged.
fn strip_diacritic(c: char) -> Option<&'static str> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ñ' | 'Ñ' => "n",
        'ç' | 'Ç' => "c",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        _ => return None,
    };
    Some(base)
}

/// Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity in [0, 1] between two already-normalized strings:
/// `1 - levenshtein / max(len)`, with substring containment treated as a
/// high-confidence signal (floor of 0.85).
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    let edit = 1.0 - levenshtein(a, b) as f64 / max_len as f64;

    if a.contains(b) || b.contains(a) {
        edit.max(0.85)
    } else {
        edit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_casefolds_and_collapses() {
        assert_eq!(normalize_text("  The   Mitochondria! "), "the mitochondria");
        assert_eq!(normalize_text("A-B_C"), "a b c");
    }

    #[test]
    fn normalize_strips_diacritics() {
        assert_eq!(normalize_text("Émile Zolà"), "emile zola");
        assert_eq!(normalize_text("Straße"), "strasse");
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("atp", "atp"), 0);
    }

    #[test]
    fn similarity_identical_is_one() {
        assert_eq!(similarity("mitochondria", "mitochondria"), 1.0);
    }

    #[test]
    fn similarity_unrelated_is_low() {
        assert!(similarity("xylem", "krebs cycle") < 0.45);
    }

    #[test]
    fn similarity_containment_floors_at_085() {
        // Superstring student answer against a short correct answer.
        let student = normalize_text("the powerhouse mitochondria of the cell");
        let correct = normalize_text("mitochondria");
        assert!(similarity(&student, &correct) >= 0.85);
    }
}
