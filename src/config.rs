use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::dictionary::{Dictionary, EntrySpec};
use crate::error::{ConfigError, LatexError};
use crate::number::NumberFormat;

/// What the parser does with a token the dictionary does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenDisposition {
    Symbol,
    /// A symbol that can be applied, as in `f(x)`.
    Function,
    Skip,
    Error,
}

pub type TokenCallback = Arc<dyn Fn(&str) -> TokenDisposition + Send + Sync>;

#[derive(Clone, Default)]
pub enum UnknownTokenPolicy {
    /// Commands are errors, `f`, `g`, `h` and multi-letter names are
    /// functions, other letters are symbols.
    #[default]
    Default,
    Always(TokenDisposition),
    Callback(TokenCallback),
}

impl UnknownTokenPolicy {
    pub fn disposition(&self, token: &str) -> TokenDisposition {
        match self {
            UnknownTokenPolicy::Default => default_disposition(token),
            UnknownTokenPolicy::Always(disposition) => *disposition,
            UnknownTokenPolicy::Callback(callback) => callback(token),
        }
    }
}

fn default_disposition(token: &str) -> TokenDisposition {
    if token.starts_with('\\') {
        return TokenDisposition::Error;
    }
    match token {
        "f" | "g" | "h" => TokenDisposition::Function,
        _ if token.chars().count() > 1 => TokenDisposition::Function,
        _ => TokenDisposition::Symbol,
    }
}

impl fmt::Debug for UnknownTokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownTokenPolicy::Default => write!(f, "Default"),
            UnknownTokenPolicy::Always(disposition) => write!(f, "Always({disposition:?})"),
            UnknownTokenPolicy::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

impl<'de> Deserialize<'de> for UnknownTokenPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        let disposition = match name.as_str() {
            "default" => return Ok(UnknownTokenPolicy::Default),
            "symbol" => TokenDisposition::Symbol,
            "function" => TokenDisposition::Function,
            "skip" => TokenDisposition::Skip,
            "error" => TokenDisposition::Error,
            other => {
                return Err(de::Error::unknown_variant(
                    other,
                    &["default", "symbol", "function", "skip", "error"],
                ))
            }
        };
        Ok(UnknownTokenPolicy::Always(disposition))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    pub parse_unknown_token: UnknownTokenPolicy,
    /// Consume the `[...]` and `{...}` groups following an unknown command.
    pub parse_arguments_of_unknown_latex_commands: bool,
    /// Nesting allowed before the parse fails with `DepthExceeded`.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            parse_unknown_token: UnknownTokenPolicy::Default,
            parse_arguments_of_unknown_latex_commands: true,
            max_depth: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerializeOptions {
    /// Glyph for an explicit product, e.g. `2\times2`.
    pub multiply: String,
    /// Glyph between juxtaposed factors, e.g. `2x`.
    pub invisible_multiply: String,
    pub text_command: String,
    #[serde(flatten)]
    pub number: NumberFormat,
    pub max_depth: usize,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            multiply: "\\times".to_string(),
            invisible_multiply: String::new(),
            text_command: "\\text".to_string(),
            number: NumberFormat::default(),
            max_depth: 64,
        }
    }
}

/// Everything a [`crate::LatexSyntax`] can be configured with, loadable from
/// JSON or YAML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LatexOptions {
    pub parse: ParseOptions,
    pub serialize: SerializeOptions,
    /// Entries added on top of the default dictionary.
    pub dictionary: Vec<EntrySpec>,
}

impl LatexOptions {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads options from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Self::from_json_str(&text),
        }
    }

    /// The standard dictionary extended with the configured entries.
    pub fn build_dictionary(&self) -> Result<Dictionary, LatexError> {
        if self.dictionary.is_empty() {
            return Ok(Dictionary::standard().clone());
        }
        let overrides = self
            .dictionary
            .iter()
            .cloned()
            .map(EntrySpec::into_entry)
            .collect();
        Dictionary::standard().with_overrides(overrides)
    }
}
