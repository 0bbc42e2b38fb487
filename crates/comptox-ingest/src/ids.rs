//! Identifier surgery shared by the importers.

/// `Compound::DB00945` → `DB00945`, `Disease::DOID:1234` → `DOID:1234`.
pub fn strip_namespace(id: &str) -> &str {
    id.rsplit("::").next().unwrap_or(id).trim()
}

/// Text after the last `delimiter`, e.g. `MESH:D005557` → `D005557`.
pub fn after_last(value: &str, delimiter: char) -> &str {
    value.rsplit(delimiter).next().unwrap_or(value).trim()
}

/// Values of a delimited cell carrying `prefix`, with the prefix removed:
/// `DO:DOID:1|OMIM:2|DO:DOID:3` with `DO:` → `[DOID:1, DOID:3]`.
pub fn prefixed<'a>(cell: &'a str, delimiter: char, prefix: &str) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::new();
    for id in cell
        .split(delimiter)
        .filter_map(|part| part.trim().strip_prefix(prefix))
        .map(str::trim)
        .filter(|id| !id.is_empty())
    {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_and_prefixes() {
        assert_eq!(strip_namespace("Compound::DB00945"), "DB00945");
        assert_eq!(strip_namespace("Disease::DOID:1234"), "DOID:1234");
        assert_eq!(strip_namespace("plain"), "plain");
        assert_eq!(after_last("MESH:D005557", ':'), "D005557");
        assert_eq!(after_last("EPA/TSCA", '/'), "TSCA");
        assert_eq!(
            prefixed("DO:DOID:1|OMIM:2| DO:DOID:3|DO:DOID:1", '|', "DO:"),
            vec!["DOID:1", "DOID:3"]
        );
        assert!(prefixed("", '|', "DO:").is_empty());
    }
}
