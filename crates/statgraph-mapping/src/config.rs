use serde::{Deserialize, Serialize};

/// Compiler output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// `LIMIT` clause, if any
    pub limit: Option<u64>,
    /// Emit `SELECT DISTINCT`
    pub distinct: bool,
    /// Emit a `# entry N` comment at the top of every branch
    pub debug_comments: bool,
    /// Language assigned to untagged literals decoded as text
    pub default_language: String,
    /// Name of the variable every branch binds to its index
    pub branch_variable: String,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            limit: None,
            distinct: false,
            debug_comments: false,
            default_language: "en".to_owned(),
            branch_variable: "branch".to_owned(),
        }
    }
}

impl CompilerOptions {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Where the Wikidata mapping points its IRIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WikidataConfig {
    /// Entity namespace of the backing store (`wd:`)
    pub entity_prefix: String,
    /// Property predicate namespace of the backing store (`p:`)
    pub prop_prefix: String,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        Self {
            entity_prefix: "http://www.wikidata.org/entity/".to_owned(),
            prop_prefix: "http://www.wikidata.org/prop/".to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let opts = CompilerOptions::from_json_str(r#"{"limit": 10, "distinct": true}"#).unwrap();
        assert_eq!(opts.limit, Some(10));
        assert!(opts.distinct);
        assert_eq!(opts.branch_variable, "branch");
        assert_eq!(opts.default_language, "en");
    }
}
