use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

pub fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Fuzzy match, falling back to a case-insensitive substring test.
pub fn text_matches(matcher: &SkimMatcherV2, text: &str, query: &str) -> bool {
    fuzzy_match_score(matcher, text, query).is_some()
        || text.to_lowercase().contains(&query.to_lowercase())
}

/// Shortens a title to at most `max_chars` characters for drawing inside a bubble.
pub fn short_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_owned();
    }
    let mut short = title
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    short.push('…');
    short
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Value in `[0, 1)` derived from `key` with FNV-1a, so it does not change
/// between builds. Used to pick per-style colors.
pub fn stable_unit(key: &str) -> f32 {
    let hash = key.bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    });
    // 24 bits fit an f32 mantissa exactly, keeping the result below 1.
    let folded = ((hash ^ (hash >> 32)) & 0xff_ffff) as u32;
    folded as f32 / (1u32 << 24) as f32
}
