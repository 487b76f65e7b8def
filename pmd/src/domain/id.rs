//! Record id generation and prefix resolution
//!
//! Ids have the form `{8-hex}-{kind}-{slug}`, e.g. `5c1e09ab-task-fix-ci`.
//! The hex part is taken from the random tail of a v7 UUID.

const MAX_SLUG_LEN: usize = 40;

/// Generate an id for a record of `kind` with a human title
pub fn generate_id(kind: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    let hex = &uuid[uuid.len() - 8..];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", hex, kind)
    } else {
        format!("{}-{}-{}", hex, kind, slug)
    }
}

/// Lowercase, hyphen-separated, apostrophes stripped, bounded length
pub fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.chars().count() <= MAX_SLUG_LEN {
        return slug;
    }
    let truncated: String = slug.chars().take(MAX_SLUG_LEN).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Outcome of resolving a user-supplied id or prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdMatch {
    Exact(String),
    Unique(String),
    Ambiguous(Vec<String>),
    NotFound,
}

/// Resolve an exact id or a unique prefix against known ids
pub fn resolve_id<'a>(input: &str, ids: impl IntoIterator<Item = &'a str>) -> IdMatch {
    let mut matches = Vec::new();
    for id in ids {
        if id == input {
            return IdMatch::Exact(id.to_string());
        }
        if id.starts_with(input) {
            matches.push(id.to_string());
        }
    }
    match matches.len() {
        0 => IdMatch::NotFound,
        1 => IdMatch::Unique(matches.remove(0)),
        _ => {
            matches.sort();
            IdMatch::Ambiguous(matches)
        }
    }
}
