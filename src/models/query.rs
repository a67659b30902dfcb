//! Query kinds and the immutable per-query descriptor.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of listing being crawled.
///
/// Parsed names are case-insensitive and stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QueryKind {
    /// Accounts followed by the source account
    Following,
    /// Any other listing wired through a custom source
    Custom(String),
}

impl QueryKind {
    pub fn as_str(&self) -> &str {
        match self {
            QueryKind::Following => "following",
            QueryKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        match name.as_str() {
            "" => Err("query kind must not be empty".to_string()),
            "following" => Ok(QueryKind::Following),
            _ => Ok(QueryKind::Custom(name)),
        }
    }
}

impl TryFrom<String> for QueryKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QueryKind> for String {
    fn from(kind: QueryKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Everything one fetch cycle needs to know about its query.
///
/// `page_size` and `max_iterations` are the source's rate-limit ceilings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub kind: QueryKind,
    pub account_id: String,
    pub page_size: u32,
    pub max_iterations: u32,
    pub cursor_table: String,
    pub namespace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!("following".parse::<QueryKind>(), Ok(QueryKind::Following));
        assert_eq!("Following".parse::<QueryKind>(), Ok(QueryKind::Following));
        assert_eq!(
            "followers".parse::<QueryKind>(),
            Ok(QueryKind::Custom("followers".to_string()))
        );
        assert!("  ".parse::<QueryKind>().is_err());
    }

    #[test]
    fn test_custom_kind_is_case_insensitive() {
        let upper: QueryKind = " Followers ".parse().unwrap();
        let lower: QueryKind = "followers".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "followers");

        let from_config: QueryKind = serde_json::from_str(r#""FOLLOWERS""#).unwrap();
        assert_eq!(from_config, lower);
    }

    #[test]
    fn test_kind_serde() {
        let kind: QueryKind = serde_json::from_str(r#""following""#).unwrap();
        assert_eq!(kind, QueryKind::Following);
        assert_eq!(serde_json::to_string(&kind).unwrap(), r#""following""#);
    }
}
