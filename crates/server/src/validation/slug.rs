use anyhow::{Result, bail};

const MAX_SLUG_LEN: usize = 64;

/// Owner names claimed by fixed route prefixes.
const RESERVED_OWNERS: &[&str] = &["git-lfs"];

/// Owners are lowercase kebab-case.
pub fn validate_slug(slug: &str) -> Result<()> {
    if RESERVED_OWNERS.contains(&slug) {
        bail!("`{slug}` is reserved");
    }

    let is_valid = !slug.is_empty()
        && slug.len() <= MAX_SLUG_LEN
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if is_valid {
        Ok(())
    } else {
        bail!("slug `{slug}` must be lowercase kebab-case")
    }
}

/// Repository names follow slug rules but may also use `.` and `_` inside,
/// and never end in `.git`.
pub fn validate_repository_name(name: &str) -> Result<()> {
    let is_separator = |c: char| matches!(c, '-' | '.' | '_');
    let is_valid = !name.is_empty()
        && name.len() <= MAX_SLUG_LEN
        && !name.starts_with(is_separator)
        && !name.ends_with(is_separator)
        && !name.contains("..")
        && !name.ends_with(".git")
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c));

    if is_valid {
        Ok(())
    } else {
        bail!("repository name `{name}` must be lowercase, using letters, digits, '-', '.' or '_'")
    }
}
