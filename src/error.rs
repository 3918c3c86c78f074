use std::fmt::Display;

use miette::{LabeledSpan, Severity, SourceSpan};
use thiserror::Error;

use crate::utils::get_line_and_column;

/// Errors that abort a parse or serialize call. These are configuration or
/// resource-limit problems, never problems with the user's input.
#[derive(Error, Debug, miette::Diagnostic, Clone, PartialEq)]
pub enum LatexError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Dictionary(#[from] DictionaryError),

    #[error("Nesting depth exceeds the limit of {limit}")]
    #[diagnostic(
        code(latex::depth_exceeded),
        help("The input nests groups or operators too deeply. Raise `maxDepth` if this is expected.")
    )]
    DepthExceeded { limit: usize },
}

#[derive(Error, Debug, miette::Diagnostic, Clone, PartialEq)]
#[error("Invalid dictionary")]
pub enum DictionaryError {
    #[error("A notation entry has an empty name")]
    #[diagnostic(code(dictionary::empty_name))]
    EmptyName,

    #[error("Entry `{name}` has an empty trigger")]
    #[diagnostic(
        code(dictionary::empty_trigger),
        help("Omit the trigger for serialize-only entries instead of using an empty string.")
    )]
    EmptyTrigger { name: String },

    #[error("Entry `{name}` aliases unknown entry `{target}`")]
    #[diagnostic(code(dictionary::unknown_alias_target))]
    UnknownAliasTarget { name: String, target: String },

    #[error("Alias cycle: {cycle}")]
    #[diagnostic(
        code(dictionary::cyclic_alias),
        help("An alias must eventually resolve to an entry that is not an alias.")
    )]
    CyclicAlias { cycle: String },

    #[error("Matchfix entry `{name}` has no closing delimiter")]
    #[diagnostic(code(dictionary::missing_close_delimiter))]
    MissingCloseDelimiter { name: String },
}

/// Errors raised while serializing. Everything except `Fatal` is caught at
/// the top-level call and reported as a diagnostic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SerializeError {
    #[error("A {0} cannot be serialized to LaTeX")]
    NotSerializable(&'static str),

    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    Fatal(#[from] LatexError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathJsonError {
    #[error("Symbols cannot be empty")]
    EmptySymbol,
    #[error("A function expression needs a head")]
    EmptyFunction,
    #[error("Invalid number payload `{0}`")]
    InvalidNumber(String),
    #[error("Unexpected MathJSON value: {0}")]
    UnexpectedValue(String),
    #[error("Invalid JSON: {0}")]
    Json(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid JSON options: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML options: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Cannot read options file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Latex(#[from] LatexError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    #[error("Unknown command `{0}`")]
    UnknownCommand(String),
    #[error("Unknown symbol `{0}`")]
    UnknownSymbol(String),
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(String),
    #[error("Expected closing `{0}`")]
    ExpectedClosingDelimiter(String),
    #[error("Missing argument for `{0}`")]
    ExpectedArgument(String),
    #[error("Missing operand for `{0}`")]
    ExpectedOperand(String),
    #[error("Ambiguous digit grouping in `{0}`, the comma is read as a separator")]
    AmbiguousDigitGroup(String),
    #[error("A {0} cannot be serialized to LaTeX")]
    NotSerializable(String),
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
}

impl DiagnosticKind {
    /// The machine-readable code, as embedded in `Error` expressions.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnknownCommand(_) => "unknown-command",
            DiagnosticKind::UnknownSymbol(_) => "unknown-symbol",
            DiagnosticKind::UnexpectedToken(_) => "unexpected-token",
            DiagnosticKind::ExpectedClosingDelimiter(_) => "expected-closing-delimiter",
            DiagnosticKind::ExpectedArgument(_) => "expected-argument",
            DiagnosticKind::ExpectedOperand(_) => "expected-operand",
            DiagnosticKind::AmbiguousDigitGroup(_) => "ambiguous-digit-group",
            DiagnosticKind::NotSerializable(_) => "not-serializable",
            DiagnosticKind::SerializationFailed(_) => "serialization-failed",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnknownSymbol(_) | DiagnosticKind::AmbiguousDigitGroup(_) => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}

/// A recoverable problem found during one parse or serialize call.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}")]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub span: Option<SourceSpan>,
    pub trace: Vec<Diagnostic>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Option<SourceSpan>) -> Self {
        Diagnostic {
            kind,
            span,
            trace: Vec::new(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_error(&self) -> bool {
        self.kind.severity() == Severity::Error
    }

    /// A one-line description such as `1:5 unknown-command: Unknown command `\foo``.
    pub fn describe(&self, source: &str) -> String {
        match self.span {
            Some(span) => {
                let (line, column) = get_line_and_column(source, span.offset());
                format!("{line}:{column} {}: {}", self.code(), self.kind)
            }
            None => format!("{}: {}", self.code(), self.kind),
        }
    }
}

impl miette::Diagnostic for Diagnostic {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn severity(&self) -> Option<Severity> {
        Some(self.kind.severity())
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.kind.code().to_string()),
            span,
        ))))
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn miette::Diagnostic> + 'a>> {
        if self.trace.is_empty() {
            return None;
        }
        Some(Box::new(
            self.trace.iter().map(|d| d as &dyn miette::Diagnostic),
        ))
    }
}

impl From<SerializeError> for Diagnostic {
    fn from(error: SerializeError) -> Self {
        let kind = match error {
            SerializeError::NotSerializable(what) => DiagnosticKind::NotSerializable(what.to_string()),
            other => DiagnosticKind::SerializationFailed(other.to_string()),
        };
        Diagnostic::new(kind, None)
    }
}
