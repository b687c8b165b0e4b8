//! Search parameter configuration types.
//!
//! Each resource type supplies a [`SearchParamConfig`] that maps the search
//! parameter names it supports to a type and a storage column. The query
//! builder is agnostic to which resource type it serves.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Search parameter types understood by the query builder.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A code, matched exactly.
    Token,
    /// A simple string, matched case-insensitively.
    String,
    /// A reference to another resource, matched on its bare id.
    Reference,
    /// A date or dateTime.
    Date,
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchParamType::Token => write!(f, "token"),
            SearchParamType::String => write!(f, "string"),
            SearchParamType::Reference => write!(f, "reference"),
            SearchParamType::Date => write!(f, "date"),
        }
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token" => Ok(SearchParamType::Token),
            "string" => Ok(SearchParamType::String),
            "reference" => Ok(SearchParamType::Reference),
            "date" => Ok(SearchParamType::Date),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// Modifiers accepted after a parameter name (`name:contains`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchModifier {
    /// Case-sensitive whole-value match (string parameters).
    Exact,
    /// Case-insensitive substring match (string parameters).
    Contains,
}

impl SearchModifier {
    /// Parses a modifier suffix. Unknown modifiers yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "exact" => Some(SearchModifier::Exact),
            "contains" => Some(SearchModifier::Contains),
            _ => None,
        }
    }
}

/// Comparison prefixes for date parameters.
///
/// See: https://build.fhir.org/search.html#prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchPrefix {
    /// Equal (default).
    #[default]
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater or equal.
    Ge,
    /// Starts after. Matched as equality.
    Sa,
    /// Ends before. Matched as equality.
    Eb,
    /// Approximately. Matched as equality.
    Ap,
}

impl SearchPrefix {
    /// Splits a leading two-letter prefix off a value.
    ///
    /// Values without a recognised prefix are returned unchanged with
    /// [`SearchPrefix::Eq`].
    pub fn split(value: &str) -> (SearchPrefix, &str) {
        let prefix = match value.get(..2) {
            Some("eq") => SearchPrefix::Eq,
            Some("ne") => SearchPrefix::Ne,
            Some("lt") => SearchPrefix::Lt,
            Some("le") => SearchPrefix::Le,
            Some("gt") => SearchPrefix::Gt,
            Some("ge") => SearchPrefix::Ge,
            Some("sa") => SearchPrefix::Sa,
            Some("eb") => SearchPrefix::Eb,
            Some("ap") => SearchPrefix::Ap,
            _ => return (SearchPrefix::Eq, value),
        };
        (prefix, &value[2..])
    }

    /// Returns the SQL comparison operator.
    pub fn sql_operator(&self) -> &'static str {
        match self {
            SearchPrefix::Ne => "<>",
            SearchPrefix::Lt => "<",
            SearchPrefix::Le => "<=",
            SearchPrefix::Gt => ">",
            SearchPrefix::Ge => ">=",
            SearchPrefix::Eq | SearchPrefix::Sa | SearchPrefix::Eb | SearchPrefix::Ap => "=",
        }
    }
}

/// The declaration of one search parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParamDef {
    /// How values are matched.
    #[serde(rename = "type")]
    pub param_type: SearchParamType,
    /// The storage column the predicate targets.
    pub column: String,
}

/// Per-resource-type search parameter configuration.
///
/// # Examples
///
/// ```
/// use tessera_persistence::types::{SearchParamConfig, SearchParamType};
///
/// let config: SearchParamConfig = serde_json::from_str(r#"{
///     "params": {
///         "status": {"type": "token", "column": "status"},
///         "subject": {"type": "reference", "column": "subject_id"}
///     },
///     "defaultSort": "id"
/// }"#).unwrap();
///
/// assert_eq!(config.get("status").unwrap().param_type, SearchParamType::Token);
/// assert!(config.get("unknown").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParamConfig {
    #[serde(default)]
    params: HashMap<String, SearchParamDef>,
    #[serde(default, rename = "defaultSort", skip_serializing_if = "Option::is_none")]
    default_sort: Option<String>,
}

impl SearchParamConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter.
    pub fn with_param(
        mut self,
        name: impl Into<String>,
        param_type: SearchParamType,
        column: impl Into<String>,
    ) -> Self {
        self.params.insert(
            name.into(),
            SearchParamDef {
                param_type,
                column: column.into(),
            },
        );
        self
    }

    /// Sets the column used as the default ordering and pagination tie-breaker.
    pub fn with_default_sort(mut self, column: impl Into<String>) -> Self {
        self.default_sort = Some(column.into());
        self
    }

    /// Looks up a parameter declaration.
    pub fn get(&self, name: &str) -> Option<&SearchParamDef> {
        self.params.get(name)
    }

    /// Returns the default sort column, if any.
    pub fn default_sort(&self) -> Option<&str> {
        self.default_sort.as_deref()
    }

    /// Iterates over all declarations.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SearchParamDef)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns true when no parameters are declared.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
