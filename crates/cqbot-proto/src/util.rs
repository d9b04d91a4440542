//! Text helpers shared by the grammar and the runtime.

use unicode_normalization::UnicodeNormalization;
use zhconv::{Variant, zhconv};

/// Converts a dash- or underscore-separated name to camelCase.
///
/// Only separators followed by a character are folded; case of other
/// characters is preserved, so single-letter flags like `C` stay as-is.
///
/// ```
/// use cqbot_proto::util::camel_case;
///
/// assert_eq!(camel_case("unknown-gamma"), "unknownGamma");
/// assert_eq!(camel_case("max_usage"), "maxUsage");
/// assert_eq!(camel_case("C"), "C");
/// ```
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for (i, c) in name.chars().enumerate() {
        if (c == '-' || c == '_') && i > 0 {
            upper = true;
            continue;
        }
        if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Edit distance between two strings, counted in characters.
///
/// Insertions, deletions, substitutions and transpositions of two
/// adjacent characters each cost one edit (optimal string alignment).
///
/// ```
/// use cqbot_proto::util::edit_distance;
///
/// assert_eq!(edit_distance("help", "hepl"), 1);
/// assert_eq!(edit_distance("kitten", "sitting"), 3);
/// assert_eq!(edit_distance("", "abc"), 3);
/// ```
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // three rows: two back, previous, current
    let mut prev2: Vec<usize> = vec![0; b.len() + 1];
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr: Vec<usize> = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(prev2[j - 2] + 1);
            }
            curr[j] = best;
        }
        std::mem::swap(&mut prev2, &mut prev);
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Canonicalizes message text before command lookup.
///
/// Applies NFKC, which folds full-width forms and the ideographic space to
/// ASCII, then converts Traditional Chinese to Simplified.
///
/// ```
/// use cqbot_proto::util::simplify;
///
/// assert_eq!(simplify("ｅｃｈｏ　ｈｉ！"), "echo hi!");
/// assert_eq!(simplify("天氣"), "天气");
/// assert_eq!(simplify("“quoted”"), "“quoted”");
/// ```
pub fn simplify(text: &str) -> String {
    let folded: String = text.nfkc().collect();
    zhconv(&folded, Variant::ZhHans)
}

/// Number of characters (not bytes) in `s`.
#[inline]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}
