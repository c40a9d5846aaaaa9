use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CurateError;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Case/whitespace/punctuation-insensitive key for a column header.
///
/// `"GO terms"`, `"GO  Terms"` and `"go_terms"` all map to `go_terms`;
/// `"Gene/Protein"` maps to `gene_or_protein`.
pub fn normalize_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    WHITESPACE_RUN
        .replace_all(&lowered, "_")
        .replace('/', "_or_")
}

/// Source-to-target column matches produced by [`ColumnNormalizer::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameMap {
    matches: Vec<ColumnMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMatch {
    pub source: String,
    pub target: String,
}

impl RenameMap {
    /// Matches whose source header differs from the target header.
    pub fn renames(&self) -> impl Iterator<Item = &ColumnMatch> {
        self.matches.iter().filter(|m| m.source != m.target)
    }

    pub fn target_for(&self, source: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| m.source == source)
            .map(|m| m.target.as_str())
    }

    pub fn source_for(&self, target: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| m.target == target)
            .map(|m| m.source.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnNormalizer {
    aliases: BTreeMap<String, Vec<String>>,
}

impl ColumnNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `aliases` maps a target column to alternate headers that should land
    /// on it, tried in the listed order after the target's own key.
    pub fn with_aliases(aliases: BTreeMap<String, Vec<String>>) -> Self {
        Self { aliases }
    }

    fn candidate_keys(&self, target: &str) -> Vec<String> {
        let mut keys = vec![normalize_key(target)];
        if let Some(alternates) = self.aliases.get(target) {
            for alias in alternates {
                let key = normalize_key(alias);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    pub fn resolve<S, T>(
        &self,
        source_columns: &[S],
        target_columns: &[T],
    ) -> Result<RenameMap, CurateError>
    where
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let source_names: Vec<&str> = source_columns.iter().map(|c| c.as_ref()).collect();
        let target_names: Vec<&str> = target_columns.iter().map(|c| c.as_ref()).collect();

        let mut index: HashMap<String, Vec<&str>> = HashMap::new();
        for &column in &source_names {
            index.entry(normalize_key(column)).or_default().push(column);
        }

        let mut claimed: HashMap<&str, &str> = HashMap::new();
        let mut matches = Vec::new();

        for &target in &target_names {
            let exact = source_names.iter().copied().find(|column| *column == target);
            let found = match exact {
                Some(column) => Some(column),
                None => self.lookup(&index, target)?,
            };
            let Some(column) = found else {
                continue;
            };
            if let Some(previous) = claimed.insert(column, target) {
                return Err(CurateError::AmbiguousMapping {
                    source_column: column.to_string(),
                    first: previous.to_string(),
                    second: target.to_string(),
                });
            }
            matches.push(ColumnMatch {
                source: column.to_string(),
                target: target.to_string(),
            });
        }

        Ok(RenameMap { matches })
    }

    fn lookup<'a>(
        &self,
        index: &HashMap<String, Vec<&'a str>>,
        target: &str,
    ) -> Result<Option<&'a str>, CurateError> {
        for key in self.candidate_keys(target) {
            match index.get(&key).map(Vec::as_slice) {
                Some([only]) => return Ok(Some(*only)),
                Some([first, second, ..]) => {
                    return Err(CurateError::AmbiguousSource {
                        target: target.to_string(),
                        key,
                        first: first.to_string(),
                        second: second.to_string(),
                    });
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn keys_fold_case_whitespace_and_slash() {
        assert_eq!(normalize_key("GO terms"), "go_terms");
        assert_eq!(normalize_key(" GO \t Terms "), "go_terms");
        assert_eq!(normalize_key("Gene/Protein Identifier"), "gene_or_protein_identifier");
    }

    #[test]
    fn unmatched_columns_are_left_alone() {
        let map = ColumnNormalizer::new()
            .resolve(&["organism", "comment"], &["Organism", "source"])
            .unwrap();
        assert_eq!(map.target_for("organism"), Some("Organism"));
        assert_eq!(map.target_for("comment"), None);
        assert_eq!(map.source_for("source"), None);
    }

    #[test]
    fn exact_header_wins_over_key_collision() {
        let map = ColumnNormalizer::new()
            .resolve(&["organism", "Organism"], &["Organism"])
            .unwrap();
        assert_eq!(map.source_for("Organism"), Some("Organism"));
        assert_eq!(map.renames().count(), 0);
    }

    #[test]
    fn colliding_sources_without_exact_header_are_fatal() {
        let err = ColumnNormalizer::new()
            .resolve(&["organism", "ORGANISM"], &["Organism"])
            .unwrap_err();
        assert_matches!(err, CurateError::AmbiguousSource { target, .. } if target == "Organism");
    }

    #[test]
    fn two_targets_on_one_source_are_fatal() {
        let mut aliases = BTreeMap::new();
        aliases.insert("Species".to_string(), vec!["organism".to_string()]);
        let err = ColumnNormalizer::with_aliases(aliases)
            .resolve(&["organism"], &["Organism", "Species"])
            .unwrap_err();
        assert_matches!(
            err,
            CurateError::AmbiguousMapping { source_column, first, second }
                if source_column == "organism" && first == "Organism" && second == "Species"
        );
    }
}
