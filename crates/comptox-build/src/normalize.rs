//! Identifier normalization: human-readable names to local-key slugs.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot derive a key from {0:?}: it contains no word characters")]
pub struct NormalizeError(pub String);

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Canonical slug for a label.
///
/// Characters that are neither word characters nor whitespace are dropped,
/// each whitespace run becomes one `_`, and the result is lowercased. Leading
/// and trailing whitespace is ignored.
///
/// ```
/// use comptox_build::normalize;
/// assert_eq!(normalize("Parkinson's  Disease").unwrap(), "parkinsons_disease");
/// ```
pub fn normalize(label: &str) -> Result<String, NormalizeError> {
    if !label.chars().any(is_word) {
        return Err(NormalizeError(label.to_string()));
    }

    let mut out = String::with_capacity(label.len());
    let mut pending_gap = false;
    for c in label.trim().chars() {
        if c.is_whitespace() {
            pending_gap = true;
        } else if is_word(c) {
            if pending_gap && !out.is_empty() {
                out.push('_');
            }
            pending_gap = false;
            out.extend(c.to_lowercase());
        }
    }
    Ok(out)
}

/// `<short_code>_<normalized name>`, e.g. `dis_parkinson_disease`.
pub fn local_key(short_code: &str, name: &str) -> Result<String, NormalizeError> {
    Ok(format!("{short_code}_{}", normalize(name)?))
}
