use std::sync::Arc;

use miette::{GraphicalReportHandler, NamedSource, Report};
use serde::{Serialize, Serializer as SerdeSerializer};

use crate::ast::Expression;
use crate::config::{LatexOptions, ParseOptions, SerializeOptions};
use crate::dictionary::{Dictionary, NotationEntry};
use crate::error::{Diagnostic, LatexError, SerializeError};
use crate::parser::Parser;
use crate::serializer::Serializer;

/// The result of parsing a LaTeX string.
///
/// Problems in the input do not fail the parse. They show up as `Error`
/// expressions inside `expression` and as entries in `diagnostics`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub expression: Expression,
    pub diagnostics: Vec<Diagnostic>,
}

impl Serialize for Parsed {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: SerdeSerializer,
    {
        self.expression.serialize(serializer)
    }
}

impl Parsed {
    /// The expression as pretty-printed MathJSON.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self)
    }

    /// The expression as MathJSON in YAML.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self)
    }

    /// Whether any diagnostic is an error rather than a warning.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Renders every diagnostic against `source` with miette's graphical handler.
    #[must_use]
    pub fn render_diagnostics(&self, source: &str, name: &str) -> String {
        let handler = GraphicalReportHandler::new();
        let mut buffer = String::new();
        for diagnostic in &self.diagnostics {
            let report = Report::new(diagnostic.clone())
                .with_source_code(NamedSource::new(name, source.to_string()));
            if handler.render_report(&mut buffer, &*report).is_err() {
                buffer.push_str(&diagnostic.describe(source));
                buffer.push('\n');
            }
        }
        buffer
    }
}

/// The result of serializing an expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Serialized {
    pub latex: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses `text` into a MathJSON expression.
///
/// # Errors
///
/// Returns a `LatexError` only when the nesting exceeds `options.max_depth`.
pub fn parse(
    text: &str,
    dictionary: &Dictionary,
    options: &ParseOptions,
) -> Result<Parsed, LatexError> {
    let mut parser = Parser::new(text, dictionary, options);
    let expression = parser.parse_root()?;
    Ok(Parsed {
        expression,
        diagnostics: parser.into_diagnostics(),
    })
}

/// Serializes `expr` to LaTeX.
///
/// An expression that cannot be serialized, or a hook that fails, yields an
/// empty string and a single diagnostic.
///
/// # Errors
///
/// Returns a `LatexError` only when the nesting exceeds `options.max_depth`.
pub fn serialize(
    expr: &Expression,
    dictionary: &Dictionary,
    options: &SerializeOptions,
) -> Result<Serialized, LatexError> {
    let mut serializer = Serializer::new(dictionary, options);
    match serializer.serialize(expr) {
        Ok(latex) => Ok(Serialized {
            latex,
            diagnostics: Vec::new(),
        }),
        Err(SerializeError::Fatal(error)) => Err(error),
        Err(error) => {
            let diagnostic = Diagnostic::from(error);
            log::debug!("{}: {}", diagnostic.code(), diagnostic);
            Ok(Serialized {
                latex: String::new(),
                diagnostics: vec![diagnostic],
            })
        }
    }
}

/// A configured LaTeX syntax: a dictionary plus parse and serialize options.
///
/// Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct LatexSyntax {
    dictionary: Arc<Dictionary>,
    parse_options: ParseOptions,
    serialize_options: SerializeOptions,
}

impl Default for LatexSyntax {
    fn default() -> Self {
        Self::new()
    }
}

impl LatexSyntax {
    pub fn new() -> Self {
        LatexSyntax {
            dictionary: Arc::new(Dictionary::standard().clone()),
            parse_options: ParseOptions::default(),
            serialize_options: SerializeOptions::default(),
        }
    }

    /// # Errors
    ///
    /// Returns a `LatexError` if the configured dictionary entries are invalid.
    pub fn with_options(options: LatexOptions) -> Result<Self, LatexError> {
        let dictionary = options.build_dictionary()?;
        Ok(LatexSyntax {
            dictionary: Arc::new(dictionary),
            parse_options: options.parse,
            serialize_options: options.serialize,
        })
    }

    /// Layers `entries` on top of the current dictionary.
    ///
    /// # Errors
    ///
    /// Returns a `LatexError` if the resulting dictionary is invalid.
    pub fn with_dictionary(mut self, entries: Vec<NotationEntry>) -> Result<Self, LatexError> {
        self.dictionary = Arc::new(self.dictionary.with_overrides(entries)?);
        Ok(self)
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    pub fn with_serialize_options(mut self, options: SerializeOptions) -> Self {
        self.serialize_options = options;
        self
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// # Errors
    ///
    /// See [`parse`].
    pub fn parse(&self, text: &str) -> Result<Parsed, LatexError> {
        parse(text, &self.dictionary, &self.parse_options)
    }

    /// # Errors
    ///
    /// See [`serialize`].
    pub fn serialize(&self, expr: &Expression) -> Result<Serialized, LatexError> {
        serialize(expr, &self.dictionary, &self.serialize_options)
    }
}
