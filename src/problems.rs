//! Problem identifiers and the input files that list them.
//!
//! Two layouts are accepted: a flat JSON array of problem ids, or the tag
//! grouping produced by the problem-set crawler, where every tag maps to an
//! object holding its `prob_list`.

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashSet, fs, path::Path};

/// Judge-assigned problem number.
pub type ProblemId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagGroup {
    pub tag_id: String,
    pub kor_name: Option<String>,
    pub eng_name: Option<String>,
    pub prob_list: Vec<ProblemId>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagGroups {
    pub groups: Vec<TagGroup>,
}

impl TagGroups {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(map) = value else {
            return Err(GraphError::Config(
                "tag file must be an object keyed by tag".into(),
            ));
        };

        let mut groups = Vec::with_capacity(map.len());
        for (tag_id, entry) in map {
            let Value::Object(entry) = entry else {
                return Err(GraphError::Config(format!("tag {tag_id} is not an object")));
            };
            let prob_list = match entry.get("prob_list") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(parse_problem_id)
                    .collect::<Result<Vec<_>>>()?,
                _ => {
                    return Err(GraphError::Config(format!(
                        "tag {tag_id} has no prob_list array"
                    )))
                }
            };
            let name = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);

            groups.push(TagGroup {
                kor_name: name("kor_name"),
                eng_name: name("eng_name"),
                tag_id,
                prob_list,
            });
        }

        Ok(Self { groups })
    }

    /// All problems across tags, first occurrence wins.
    pub fn problem_ids(&self) -> Vec<ProblemId> {
        dedup_ids(self.groups.iter().flat_map(|g| g.prob_list.iter().copied()))
    }
}

/// Reads a flat JSON array of problem ids.
pub fn load_problem_list(path: impl AsRef<Path>) -> Result<Vec<ProblemId>> {
    let content = fs::read_to_string(path)?;
    parse_problem_list(&content)
}

pub fn parse_problem_list(content: &str) -> Result<Vec<ProblemId>> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Array(items) = value else {
        return Err(GraphError::Config("problem list must be a JSON array".into()));
    };
    let ids = items.iter().map(parse_problem_id).collect::<Result<Vec<_>>>()?;
    Ok(dedup_ids(ids))
}

fn dedup_ids(ids: impl IntoIterator<Item = ProblemId>) -> Vec<ProblemId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

// ids show up both as numbers and as numeric strings
fn parse_problem_id(value: &Value) -> Result<ProblemId> {
    let id = match value {
        Value::Number(n) => n.as_u64().and_then(|n| ProblemId::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| GraphError::Config(format!("invalid problem id: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAGS: &str = r#"{
        "dp": {"kor_name": "다이나믹 프로그래밍", "eng_name": "dynamic programming", "prob_list": [1003, 1149, 9095]},
        "greedy": {"kor_name": "그리디 알고리즘", "eng_name": "greedy", "prob_list": [11047, 1149, 1931]},
        "math": {"prob_list": ["9095", 2839]}
    }"#;

    #[test]
    fn tag_groups_should_flatten_in_first_seen_order() {
        let groups = TagGroups::from_json(TAGS).unwrap();
        assert_eq!(groups.groups.len(), 3);
        assert_eq!(groups.groups[0].eng_name.as_deref(), Some("dynamic programming"));
        assert_eq!(groups.groups[2].kor_name, None);
        assert_eq!(
            groups.problem_ids(),
            vec![1003, 1149, 9095, 11047, 1931, 2839]
        );
    }

    #[test]
    fn tag_groups_require_prob_list() {
        let err = TagGroups::from_json(r#"{"dp": {"kor_name": "x"}}"#).unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));

        let err = TagGroups::from_json(r#"{"dp": [1, 2]}"#).unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));

        let err = TagGroups::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }

    #[test]
    fn problem_list_accepts_numeric_strings() {
        let ids = parse_problem_list(r#"[1000, "1001", 1000, 1002]"#).unwrap();
        assert_eq!(ids, vec![1000, 1001, 1002]);

        assert!(parse_problem_list(r#"[1000, "abc"]"#).is_err());
        assert!(parse_problem_list(r#"[-5]"#).is_err());
    }
}
