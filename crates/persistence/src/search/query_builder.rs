//! SQL query builder for search requests.
//!
//! Translates a loosely-typed parameter bag into parameterized count and
//! data statements. Values are always bound; the only text spliced into the
//! SQL is identifiers, and those must pass [`validate_identifier`].

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::error::{SearchError, SearchResult};
use crate::types::{SearchModifier, SearchParamConfig, SearchParamDef, SearchParamType, SearchPrefix};

use super::values::{escape_like, normalize_reference, split_unescaped, token_code, unescape};

/// Parameters that control the result set rather than filter it.
const RESULT_PARAMETERS: &[&str] = &[
    "_count",
    "_offset",
    "_sort",
    "_total",
    "_summary",
    "_elements",
    "_format",
    "_include",
    "_revinclude",
];

/// Placeholder style for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlDialect {
    /// `?1`, `?2`, ...
    #[default]
    Sqlite,
    /// `$1`, `$2`, ...
    Postgres,
}

impl SqlDialect {
    fn placeholder(&self, n: usize) -> String {
        match self {
            SqlDialect::Sqlite => format!("?{}", n),
            SqlDialect::Postgres => format!("${}", n),
        }
    }
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlParam {
    /// Text parameter.
    Text(String),
    /// Integer parameter.
    Integer(i64),
}

impl SqlParam {
    /// Creates a text parameter.
    pub fn text(s: impl Into<String>) -> Self {
        SqlParam::Text(s.into())
    }

    /// Creates an integer parameter.
    pub fn integer(i: i64) -> Self {
        SqlParam::Integer(i)
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlParam::Text(s) => write!(f, "{:?}", s),
            SqlParam::Integer(i) => write!(f, "{}", i),
        }
    }
}

/// A complete SQL statement with its bound parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    /// The SQL text.
    pub sql: String,
    /// Bound parameter values.
    pub params: Vec<SqlParam>,
}

/// Checks that `identifier` is a plain, optionally schema-qualified, SQL
/// identifier.
pub fn validate_identifier(identifier: &str) -> SearchResult<()> {
    static IDENTIFIER_RE: OnceLock<Regex> = OnceLock::new();
    let re = IDENTIFIER_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("identifier pattern is valid")
    });
    if re.is_match(identifier) {
        Ok(())
    } else {
        Err(SearchError::InvalidIdentifier {
            identifier: identifier.to_string(),
        })
    }
}

fn validate_date(parameter: &str, value: &str) -> SearchResult<()> {
    static DATE_RE: OnceLock<Regex> = OnceLock::new();
    let re = DATE_RE.get_or_init(|| {
        Regex::new(
            r"^\d{4}(-\d{2}(-\d{2}([T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:\d{2})?)?)?)?$",
        )
        .expect("date pattern is valid")
    });
    if re.is_match(value) {
        Ok(())
    } else {
        Err(SearchError::InvalidParameter {
            parameter: parameter.to_string(),
            message: format!("{:?} is not an ISO-8601 date", value),
        })
    }
}

/// A search over one table.
///
/// # Examples
///
/// ```
/// use tessera_persistence::search::SearchQuery;
/// use tessera_persistence::types::{SearchParamConfig, SearchParamType};
///
/// let config = SearchParamConfig::new()
///     .with_param("status", SearchParamType::Token, "status")
///     .with_default_sort("id");
///
/// let mut query = SearchQuery::new("service_requests", &["resource"]).unwrap();
/// query.apply_params([("status", "active,on-hold")], &config).unwrap();
///
/// let count = query.count_sql();
/// assert_eq!(
///     count.sql,
///     "SELECT COUNT(*) FROM service_requests WHERE (status IN (?1, ?2))"
/// );
///
/// let data = query.data_sql(10, 0);
/// assert!(data.sql.ends_with("ORDER BY id ASC LIMIT ?3 OFFSET ?4"));
/// assert_eq!(data.params.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct SearchQuery {
    table: String,
    select_columns: Vec<String>,
    dialect: SqlDialect,
    predicates: Vec<String>,
    params: Vec<SqlParam>,
    order_by: Vec<(String, bool)>,
}

impl SearchQuery {
    /// Creates a query with no predicates.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidIdentifier`] if the table or any column
    /// is not a plain identifier, or if no columns are given.
    pub fn new<S: AsRef<str>>(table: &str, select_columns: &[S]) -> SearchResult<Self> {
        validate_identifier(table)?;
        if select_columns.is_empty() {
            return Err(SearchError::InvalidIdentifier {
                identifier: String::new(),
            });
        }
        let select_columns = select_columns
            .iter()
            .map(|c| {
                let c = c.as_ref();
                validate_identifier(c).map(|_| c.to_string())
            })
            .collect::<SearchResult<Vec<_>>>()?;

        Ok(Self {
            table: table.to_string(),
            select_columns,
            dialect: SqlDialect::default(),
            predicates: Vec::new(),
            params: Vec::new(),
            order_by: Vec::new(),
        })
    }

    /// Selects the placeholder style. Call before adding predicates.
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the number of predicates added so far.
    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    /// Adds one predicate per recognised input parameter.
    ///
    /// Predicates are combined with AND, across distinct keys and across
    /// repeated keys. Within one value, unescaped commas mean OR. Keys that
    /// `config` does not declare, and modifiers that do not apply to the
    /// parameter's type, are ignored. `_sort` sets the ordering.
    ///
    /// # Errors
    ///
    /// * [`SearchError::InvalidIdentifier`] - a configured column is not a
    ///   plain identifier
    /// * [`SearchError::InvalidParameter`] - a date value is not ISO-8601
    ///
    /// On error the query is left as it was before the call.
    pub fn apply_params<I, K, V>(&mut self, input: I, config: &SearchParamConfig) -> SearchResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let (predicates, params) = (self.predicates.len(), self.params.len());
        let order_by = self.order_by.clone();
        let result = self.apply_params_inner(input, config);
        if result.is_err() {
            self.predicates.truncate(predicates);
            self.params.truncate(params);
            self.order_by = order_by;
        }
        result
    }

    fn apply_params_inner<I, K, V>(&mut self, input: I, config: &SearchParamConfig) -> SearchResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut sort: Option<String> = None;

        for (key, value) in input {
            let (key, value) = (key.as_ref(), value.as_ref());
            if key == "_sort" {
                sort = Some(value.to_string());
                continue;
            }
            if RESULT_PARAMETERS.contains(&key) {
                continue;
            }

            let (name, modifier) = match key.split_once(':') {
                Some((name, modifier)) => match SearchModifier::parse(modifier) {
                    Some(m) => (name, Some(m)),
                    None => {
                        trace!(parameter = key, "ignoring unknown modifier");
                        continue;
                    }
                },
                None => (key, None),
            };

            let Some(def) = config.get(name) else {
                trace!(parameter = name, "ignoring unconfigured parameter");
                continue;
            };
            validate_identifier(&def.column)?;
            self.add_predicate(name, def, modifier, value)?;
        }

        self.set_order(sort.as_deref(), config)
    }

    fn add_param(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        self.dialect.placeholder(self.params.len())
    }

    fn add_predicate(
        &mut self,
        name: &str,
        def: &SearchParamDef,
        modifier: Option<SearchModifier>,
        raw: &str,
    ) -> SearchResult<()> {
        if modifier.is_some() && def.param_type != SearchParamType::String {
            trace!(parameter = name, "modifier does not apply to {} parameters", def.param_type);
            return Ok(());
        }

        let values: Vec<String> = split_unescaped(raw, ',')
            .into_iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .collect();
        if values.is_empty() {
            return Ok(());
        }

        let column = def.column.as_str();
        let clause = match def.param_type {
            SearchParamType::Token | SearchParamType::Reference => {
                let bare: Vec<String> = values
                    .iter()
                    .map(|v| match def.param_type {
                        SearchParamType::Token => unescape(token_code(v)),
                        _ => normalize_reference(&unescape(v)).to_string(),
                    })
                    .collect();
                self.equality_clause(column, bare)
            }
            SearchParamType::String => {
                let mut alternatives = Vec::with_capacity(values.len());
                for v in &values {
                    let v = unescape(v);
                    let alternative = match modifier {
                        Some(SearchModifier::Exact) => {
                            let p = self.add_param(SqlParam::text(v));
                            format!("{} = {}", column, p)
                        }
                        Some(SearchModifier::Contains) => {
                            let p = self.add_param(SqlParam::text(format!("%{}%", escape_like(&v))));
                            format!("LOWER({}) LIKE LOWER({}) ESCAPE '\\'", column, p)
                        }
                        None => {
                            let p = self.add_param(SqlParam::text(format!("{}%", escape_like(&v))));
                            format!("LOWER({}) LIKE LOWER({}) ESCAPE '\\'", column, p)
                        }
                    };
                    alternatives.push(alternative);
                }
                alternatives.join(" OR ")
            }
            SearchParamType::Date => {
                let mut dates = Vec::with_capacity(values.len());
                for v in &values {
                    let (prefix, date) = SearchPrefix::split(v);
                    validate_date(name, date)?;
                    dates.push((prefix, date));
                }
                let mut alternatives = Vec::with_capacity(dates.len());
                for (prefix, date) in dates {
                    let p = self.add_param(SqlParam::text(date));
                    alternatives.push(format!("{} {} {}", column, prefix.sql_operator(), p));
                }
                alternatives.join(" OR ")
            }
        };

        self.predicates.push(format!("({})", clause));
        Ok(())
    }

    fn equality_clause(&mut self, column: &str, values: Vec<String>) -> String {
        let placeholders: Vec<String> = values
            .into_iter()
            .map(|v| self.add_param(SqlParam::Text(v)))
            .collect();
        match placeholders.as_slice() {
            [single] => format!("{} = {}", column, single),
            _ => format!("{} IN ({})", column, placeholders.join(", ")),
        }
    }

    fn set_order(&mut self, sort: Option<&str>, config: &SearchParamConfig) -> SearchResult<()> {
        self.order_by.clear();

        if let Some(sort) = sort {
            for key in sort.split(',').map(str::trim).filter(|k| !k.is_empty()) {
                let (name, descending) = match key.strip_prefix('-') {
                    Some(name) => (name, true),
                    None => (key, false),
                };
                let Some(def) = config.get(name) else {
                    trace!(parameter = name, "ignoring unconfigured sort key");
                    continue;
                };
                validate_identifier(&def.column)?;
                if !self.order_by.iter().any(|(c, _)| c == &def.column) {
                    self.order_by.push((def.column.clone(), descending));
                }
            }
        }

        if let Some(column) = config.default_sort() {
            validate_identifier(column)?;
            if !self.order_by.iter().any(|(c, _)| c == column) {
                self.order_by.push((column.to_string(), false));
            }
        }
        Ok(())
    }

    fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.predicates.join(" AND "))
        }
    }

    /// Builds the statement that counts all matches.
    pub fn count_sql(&self) -> SqlStatement {
        SqlStatement {
            sql: format!("SELECT COUNT(*) FROM {}{}", self.table, self.where_clause()),
            params: self.params.clone(),
        }
    }

    /// Builds the statement that fetches one page of matches.
    pub fn data_sql(&self, limit: usize, offset: usize) -> SqlStatement {
        let mut params = self.params.clone();
        let mut sql = format!(
            "SELECT {} FROM {}{}",
            self.select_columns.join(", "),
            self.table,
            self.where_clause()
        );

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(c, desc)| format!("{} {}", c, if *desc { "DESC" } else { "ASC" }))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        params.push(SqlParam::integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        let limit_placeholder = self.dialect.placeholder(params.len());
        params.push(SqlParam::integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        let offset_placeholder = self.dialect.placeholder(params.len());
        sql.push_str(&format!(
            " LIMIT {} OFFSET {}",
            limit_placeholder, offset_placeholder
        ));

        SqlStatement { sql, params }
    }
}
