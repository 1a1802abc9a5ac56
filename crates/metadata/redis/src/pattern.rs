/// Build a `SCAN MATCH` pattern that matches every key starting with
/// `prefix`, escaping glob metacharacters in the prefix itself.
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}

/// Render an optional score bound for `ZRANGEBYSCORE`.
pub fn score_bound(bound: Option<i64>, unbounded: &str) -> String {
    bound.map_or_else(|| unbounded.to_owned(), |score| score.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prefix() {
        assert_eq!(prefix_pattern("attachments_"), "attachments_*");
    }

    #[test]
    fn escapes_glob_characters() {
        assert_eq!(prefix_pattern("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\*");
    }

    #[test]
    fn renders_bounds() {
        assert_eq!(score_bound(None, "-inf"), "-inf");
        assert_eq!(score_bound(Some(-5), "-inf"), "-5");
        assert_eq!(score_bound(Some(1_700_000_000_000), "+inf"), "1700000000000");
    }
}
