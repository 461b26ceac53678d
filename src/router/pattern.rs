use once_cell::sync::Lazy;
use regex::Regex;

static PATTERN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\w+)\s+)?([^/ ]+)?(/.*)?$").expect("route pattern grammar is valid")
});

/// The three parts of `"[METHOD ][HOST]/path"`. Empty strings stand for
/// absent parts; a pattern that does not fit the grammar is all empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PatternParts<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
}

pub fn pattern_parts(pattern: &str) -> PatternParts<'_> {
    let Some(caps) = PATTERN_RE.captures(pattern.trim()) else {
        return PatternParts::default();
    };
    let part = |i| caps.get(i).map_or("", |m| m.as_str());
    PatternParts {
        method: part(1),
        host: part(2),
        path: part(3),
    }
}
