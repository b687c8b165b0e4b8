//! OperationOutcome documents.
//!
//! An outcome is a list of issues, each rendered as
//! `{severity, code, diagnostics, expression?}`.

use serde::Serialize;
use serde_json::{Value, json};

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// The interaction failed.
    Error,
    /// The interaction succeeded with concerns.
    Warning,
}

/// Issue codes used by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    /// Malformed request content.
    Invalid,
    /// No such resource or version.
    NotFound,
    /// The resource was deleted.
    Deleted,
    /// Version mismatch.
    Conflict,
    /// Unsupported media type.
    NotSupported,
    /// The request could not be applied to the current state.
    Processing,
    /// Server-side failure.
    Exception,
}

/// One issue of an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Severity.
    pub severity: IssueSeverity,
    /// Issue code.
    pub code: IssueType,
    /// Human-readable text.
    pub diagnostics: String,
    /// Locations of the problem, such as JSON Pointers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expression: Vec<String>,
}

impl Issue {
    /// An error issue.
    pub fn error(code: IssueType, diagnostics: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            code,
            diagnostics: diagnostics.into(),
            expression: Vec::new(),
        }
    }

    /// A warning issue.
    pub fn warning(code: IssueType, diagnostics: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            ..Self::error(code, diagnostics)
        }
    }

    /// Adds a location.
    pub fn at(mut self, expression: impl Into<String>) -> Self {
        self.expression.push(expression.into());
        self
    }
}

/// An OperationOutcome under construction.
///
/// ```
/// use tessera_rest::responses::{Issue, IssueType, OperationOutcome};
///
/// let doc = OperationOutcome::new()
///     .with_issue(Issue::error(IssueType::Processing, "test failed").at("/status"))
///     .to_json();
/// assert_eq!(doc["issue"][0]["expression"][0], "/status");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOutcome {
    issues: Vec<Issue>,
}

impl OperationOutcome {
    /// An outcome with no issues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an issue.
    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    /// The issues so far, in order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Whether any issue is an error.
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error)
    }

    /// Renders the document.
    pub fn to_json(&self) -> Value {
        json!({
            "resourceType": "OperationOutcome",
            "issue": self.issues,
        })
    }
}

/// Outcome for a resource with no version log.
pub fn not_found_outcome(resource_type: &str, id: &str) -> Value {
    OperationOutcome::new()
        .with_issue(Issue::error(
            IssueType::NotFound,
            format!("Resource {}/{} not found", resource_type, id),
        ))
        .to_json()
}

/// Outcome carrying a single error message.
pub fn error_outcome(message: &str) -> Value {
    OperationOutcome::new()
        .with_issue(Issue::error(IssueType::Processing, message))
        .to_json()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_codes_serialize_kebab_case() {
        let issue = Issue::error(IssueType::NotSupported, "nope");
        assert_eq!(
            serde_json::to_value(&issue).unwrap(),
            json!({"severity": "error", "code": "not-supported", "diagnostics": "nope"})
        );
    }

    #[test]
    fn test_mixed_severities() {
        let outcome = OperationOutcome::new()
            .with_issue(Issue::warning(IssueType::Processing, "ignored _foo"))
            .with_issue(Issue::error(IssueType::Invalid, "bad date").at("authored"));
        assert!(outcome.has_errors());

        let doc = outcome.to_json();
        assert_eq!(doc["issue"][0]["severity"], "warning");
        assert!(doc["issue"][0].get("expression").is_none());
        assert_eq!(doc["issue"][1]["expression"], json!(["authored"]));
    }

    #[test]
    fn test_warnings_only_are_not_errors() {
        let outcome =
            OperationOutcome::new().with_issue(Issue::warning(IssueType::Processing, "slow"));
        assert!(!outcome.has_errors());
        assert!(!OperationOutcome::new().has_errors());
        assert_eq!(OperationOutcome::new().to_json()["issue"], json!([]));
    }

    #[test]
    fn test_not_found_outcome() {
        let doc = not_found_outcome("Specimen", "s1");
        assert_eq!(doc["resourceType"], "OperationOutcome");
        assert_eq!(doc["issue"][0]["code"], "not-found");
        assert_eq!(doc["issue"][0]["diagnostics"], "Resource Specimen/s1 not found");
    }

    #[test]
    fn test_error_outcome() {
        let doc = error_outcome("boom");
        assert_eq!(doc["issue"][0]["severity"], "error");
        assert_eq!(doc["issue"][0]["code"], "processing");
        assert_eq!(doc["issue"][0]["diagnostics"], "boom");
    }
}
