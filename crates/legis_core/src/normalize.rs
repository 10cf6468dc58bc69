//! Title normalization shared by every matcher.

/// Lowercase, collapse whitespace runs, trim, and drop an accidentally doubled title
/// ("abc abc" scraped twice from the same page element).
pub fn normalize_title(raw: &str) -> String {
    let collapsed = raw
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    strip_doubling(collapsed)
}

fn strip_doubling(text: String) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len < 2 {
        return text;
    }

    // "x x" (odd length, separated by a space)
    if len % 2 == 1 {
        let half = len / 2;
        if chars[half] == ' ' && chars[..half] == chars[half + 1..] && chars[..half].contains(&' ') {
            return chars[..half].iter().collect();
        }
    } else {
        // "xx" (glued together)
        let half = len / 2;
        if chars[..half] == chars[half..] && chars[..half].contains(&' ') {
            return chars[..half].iter().collect();
        }
    }
    text
}

/// Uniqueness key for dictionary names (tags, sectors, stakeholders).
pub fn normalize_name(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
