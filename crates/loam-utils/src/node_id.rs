//! Graph node identifier parsing.
//!
//! A node identifier is a package key (`name@version`), optionally followed
//! by a `+`-separated disambiguation suffix appended when peer-dependency
//! resolution duplicates an instance, e.g. `@types/node@20.0.0+react@18.2.0`.

const SUFFIX_DELIMITER: char = '+';

/// The `name@version` portion of a node identifier, with any disambiguation
/// suffix stripped.
#[must_use]
pub fn package_key(node: &str) -> &str {
    match node.split_once(SUFFIX_DELIMITER) {
        Some((key, _)) => key,
        None => node,
    }
}

/// The package name of a node identifier, as it appears on disk under a
/// dependency-link directory.
///
/// Scoped names start with `@`, so the separator between name and version is
/// the first `@` after position 0, not the one at position 0.
#[must_use]
pub fn display_name(node: &str) -> &str {
    let key = package_key(node);

    if let Some(rest) = key.strip_prefix('@') {
        // Scoped name - the @ at position 0 is part of the name
        match rest.find('@') {
            Some(at) => &key[..at + 1],
            None => key,
        }
    } else {
        match key.split_once('@') {
            Some((name, _)) if !name.is_empty() => name,
            _ => key,
        }
    }
}

/// The unscoped short name: `@scope/tool` becomes `tool`, unscoped names are
/// returned unchanged. Used as the default command name for a string-valued
/// `bin` field.
#[must_use]
pub fn short_name(package_name: &str) -> &str {
    match package_name.rsplit_once('/') {
        Some((_, short)) => short,
        None => package_name,
    }
}
