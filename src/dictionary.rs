use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Deserialize;

use crate::ast::{Expression, Number};
use crate::error::{DiagnosticKind, DictionaryError, LatexError, SerializeError};
use crate::parser::Parser;
use crate::serializer::Serializer;
use crate::utils::unescape_text;

pub type ParseHandler = Arc<
    dyn Fn(&mut Parser<'_>, Option<Expression>) -> Result<Option<Expression>, LatexError>
        + Send
        + Sync,
>;
pub type SerializeHandler =
    Arc<dyn Fn(&mut Serializer<'_>, &[Expression]) -> Result<String, SerializeError> + Send + Sync>;

// Binding precedences. Higher binds tighter.
pub const SEQUENCE: u16 = 20;
pub const OR: u16 = 230;
pub const AND: u16 = 235;
pub const ORDERING: u16 = 245;
pub const NOT_EQUAL: u16 = 255;
pub const EQUAL: u16 = 260;
pub const ADDITION: u16 = 275;
pub const MULTIPLICATION: u16 = 390;
pub const DIVISION: u16 = 660;
pub const POWER: u16 = 720;
pub const POSTFIX: u16 = 810;
pub const NOT: u16 = 880;
pub const ATOMIC: u16 = u16::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotationKind {
    Symbol,
    Prefix,
    Infix { variadic: bool },
    Postfix,
    /// Opened by the trigger, closed by `close`.
    Matchfix { close: String },
    /// A command followed by a fixed number of required arguments.
    Command { arguments: usize },
    /// A named function, `\sin x` or `\sin(x)`.
    Function,
    /// Parsing is entirely up to the entry's hook.
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Associativity {
    Left,
    Right,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub fn exactly(count: usize) -> Self {
        Arity {
            min: count,
            max: Some(count),
        }
    }

    pub fn at_least(count: usize) -> Self {
        Arity {
            min: count,
            max: None,
        }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }
}

/// One notation: how a name is triggered when parsing and how it is written
/// out when serializing.
#[derive(Clone)]
pub struct NotationEntry {
    pub name: String,
    pub trigger: Option<String>,
    /// Glyph used when serializing. Defaults to the trigger.
    pub latex: Option<String>,
    pub kind: NotationKind,
    pub precedence: u16,
    pub associativity: Associativity,
    pub arity: Arity,
    pub alias_of: Option<String>,
    pub parse_only: bool,
    pub serialize_only: bool,
    pub parse: Option<ParseHandler>,
    pub serialize: Option<SerializeHandler>,
}

impl fmt::Debug for NotationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotationEntry")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("latex", &self.latex)
            .field("kind", &self.kind)
            .field("precedence", &self.precedence)
            .field("associativity", &self.associativity)
            .field("arity", &self.arity)
            .field("alias_of", &self.alias_of)
            .field("parse_only", &self.parse_only)
            .field("serialize_only", &self.serialize_only)
            .field("parse", &self.parse.is_some())
            .field("serialize", &self.serialize.is_some())
            .finish()
    }
}

impl NotationEntry {
    fn base(name: &str, trigger: Option<&str>, kind: NotationKind, precedence: u16, arity: Arity) -> Self {
        NotationEntry {
            name: name.to_string(),
            trigger: trigger.map(str::to_string),
            latex: None,
            kind,
            precedence,
            associativity: Associativity::Left,
            arity,
            alias_of: None,
            parse_only: false,
            serialize_only: false,
            parse: None,
            serialize: None,
        }
    }

    pub fn symbol(name: &str, trigger: &str) -> Self {
        Self::base(name, Some(trigger), NotationKind::Symbol, ATOMIC, Arity::exactly(0))
    }

    pub fn prefix(name: &str, trigger: &str, precedence: u16) -> Self {
        Self::base(name, Some(trigger), NotationKind::Prefix, precedence, Arity::exactly(1))
    }

    pub fn infix(name: &str, trigger: &str, precedence: u16) -> Self {
        Self::base(
            name,
            Some(trigger),
            NotationKind::Infix { variadic: false },
            precedence,
            Arity::exactly(2),
        )
    }

    pub fn postfix(name: &str, trigger: &str, precedence: u16) -> Self {
        Self::base(name, Some(trigger), NotationKind::Postfix, precedence, Arity::exactly(1))
    }

    pub fn matchfix(name: &str, open: &str, close: &str) -> Self {
        Self::base(
            name,
            Some(open),
            NotationKind::Matchfix {
                close: close.to_string(),
            },
            ATOMIC,
            Arity::at_least(0),
        )
    }

    pub fn command(name: &str, trigger: &str, arguments: usize) -> Self {
        Self::base(
            name,
            Some(trigger),
            NotationKind::Command { arguments },
            ATOMIC,
            Arity::exactly(arguments),
        )
    }

    pub fn function(name: &str, trigger: &str) -> Self {
        Self::base(name, Some(trigger), NotationKind::Function, ATOMIC, Arity::at_least(1))
    }

    /// A parse-only entry whose hook does all the work.
    pub fn custom<F>(name: &str, trigger: &str, hook: F) -> Self
    where
        F: Fn(&mut Parser<'_>, Option<Expression>) -> Result<Option<Expression>, LatexError>
            + Send
            + Sync
            + 'static,
    {
        Self::base(name, Some(trigger), NotationKind::Custom, ATOMIC, Arity::at_least(0))
            .with_parser(hook)
            .parse_only()
    }

    /// A serialize-only entry for `name`.
    pub fn serializer<F>(name: &str, hook: F) -> Self
    where
        F: Fn(&mut Serializer<'_>, &[Expression]) -> Result<String, SerializeError>
            + Send
            + Sync
            + 'static,
    {
        Self::base(name, None, NotationKind::Custom, ATOMIC, Arity::at_least(0))
            .with_serializer(hook)
            .serialize_only()
    }

    /// `name` behaves like `target` on both sides.
    pub fn alias(name: &str, target: &str) -> Self {
        let mut entry = Self::base(name, None, NotationKind::Symbol, ATOMIC, Arity::at_least(0));
        entry.alias_of = Some(target.to_string());
        entry
    }

    pub fn with_trigger(mut self, trigger: &str) -> Self {
        self.trigger = Some(trigger.to_string());
        self
    }

    pub fn with_latex(mut self, latex: &str) -> Self {
        self.latex = Some(latex.to_string());
        self
    }

    pub fn with_arity(mut self, min: usize, max: Option<usize>) -> Self {
        self.arity = Arity { min, max };
        self
    }

    pub fn variadic(mut self) -> Self {
        self.kind = NotationKind::Infix { variadic: true };
        self.arity = Arity::at_least(2);
        self
    }

    pub fn right(mut self) -> Self {
        self.associativity = Associativity::Right;
        self
    }

    pub fn non_associative(mut self) -> Self {
        self.associativity = Associativity::None;
        self
    }

    pub fn with_parser<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Parser<'_>, Option<Expression>) -> Result<Option<Expression>, LatexError>
            + Send
            + Sync
            + 'static,
    {
        self.parse = Some(Arc::new(hook));
        self
    }

    pub fn with_serializer<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Serializer<'_>, &[Expression]) -> Result<String, SerializeError>
            + Send
            + Sync
            + 'static,
    {
        self.serialize = Some(Arc::new(hook));
        self
    }

    pub fn parse_only(mut self) -> Self {
        self.parse_only = true;
        self
    }

    pub fn serialize_only(mut self) -> Self {
        self.serialize_only = true;
        self
    }

    /// The glyph written when serializing.
    pub fn glyph(&self) -> &str {
        self.latex
            .as_deref()
            .or(self.trigger.as_deref())
            .unwrap_or(&self.name)
    }

    fn is_infix_position(&self) -> bool {
        matches!(self.kind, NotationKind::Infix { .. } | NotationKind::Postfix)
    }
}

/// The notation table, indexed for both directions. Immutable once built.
#[derive(Debug, Clone)]
pub struct Dictionary {
    entries: Vec<NotationEntry>,
    by_name: HashMap<String, usize>,
    prefix: HashMap<String, Vec<usize>>,
    infix: HashMap<String, Vec<usize>>,
    aliases: HashMap<String, String>,
}

impl Dictionary {
    /// Validates and indexes `entries`. Later entries shadow earlier ones.
    pub fn new(entries: Vec<NotationEntry>) -> Result<Self, LatexError> {
        let aliases = validate(&entries)?;
        let dictionary = Self::index(entries, aliases);
        log::debug!(
            "dictionary built: {} entries, {} prefix triggers, {} infix triggers",
            dictionary.entries.len(),
            dictionary.prefix.len(),
            dictionary.infix.len()
        );
        Ok(dictionary)
    }

    /// The default notation table, built once per process.
    pub fn standard() -> &'static Dictionary {
        static STANDARD: OnceLock<Dictionary> = OnceLock::new();
        STANDARD.get_or_init(|| Dictionary::index(default_entries(), HashMap::new()))
    }

    /// A new dictionary with `overrides` layered on top of this one.
    pub fn with_overrides(&self, overrides: Vec<NotationEntry>) -> Result<Self, LatexError> {
        for entry in &overrides {
            if !entry.parse_only && self.by_name.contains_key(&entry.name) {
                log::warn!("entry `{}` shadows an existing serialization", entry.name);
            }
        }
        let mut entries = self.entries.clone();
        entries.extend(overrides);
        Self::new(entries)
    }

    fn index(entries: Vec<NotationEntry>, aliases: HashMap<String, String>) -> Self {
        let mut by_name = HashMap::new();
        let mut targets = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            if entry.alias_of.is_some() {
                continue;
            }
            targets.insert(entry.name.clone(), idx);
            if !entry.parse_only {
                by_name.insert(entry.name.clone(), idx);
            }
        }

        let mut prefix: HashMap<String, Vec<usize>> = HashMap::new();
        let mut infix: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate().rev() {
            if entry.serialize_only {
                continue;
            }
            let Some(trigger) = &entry.trigger else {
                continue;
            };
            let resolved = match &entry.alias_of {
                Some(_) => match aliases
                    .get(&entry.name)
                    .and_then(|t| by_name.get(t).or_else(|| targets.get(t)))
                {
                    Some(target) => *target,
                    None => continue,
                },
                None => idx,
            };
            let table = if entries[resolved].is_infix_position() {
                &mut infix
            } else {
                &mut prefix
            };
            table.entry(trigger.clone()).or_default().push(resolved);
        }

        Dictionary {
            entries,
            by_name,
            prefix,
            infix,
            aliases,
        }
    }

    /// The serialization entry for `name`, following aliases.
    pub fn lookup(&self, name: &str) -> Option<&NotationEntry> {
        let name = self.canonical_name(name);
        self.by_name.get(name).map(|idx| &self.entries[*idx])
    }

    pub fn canonical_name<'n>(&'n self, name: &'n str) -> &'n str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Entries that can start an operand at `trigger`, most recent first.
    pub fn prefix_entries(&self, trigger: &str) -> impl Iterator<Item = &NotationEntry> {
        self.prefix
            .get(trigger)
            .into_iter()
            .flatten()
            .map(|idx| &self.entries[*idx])
    }

    /// Infix and postfix entries at `trigger`, most recent first.
    pub fn infix_entries(&self, trigger: &str) -> impl Iterator<Item = &NotationEntry> {
        self.infix
            .get(trigger)
            .into_iter()
            .flatten()
            .map(|idx| &self.entries[*idx])
    }

    pub fn has_infix(&self, trigger: &str) -> bool {
        self.infix.contains_key(trigger)
    }

    pub fn entries(&self) -> &[NotationEntry] {
        &self.entries
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Dictionary::standard().clone()
    }
}

/// Checks entries and resolves every alias to its final target.
fn validate(entries: &[NotationEntry]) -> Result<HashMap<String, String>, DictionaryError> {
    let mut names = HashSet::new();
    let mut alias_of = HashMap::new();
    for entry in entries {
        if entry.name.is_empty() {
            return Err(DictionaryError::EmptyName);
        }
        if entry.trigger.as_deref() == Some("") {
            return Err(DictionaryError::EmptyTrigger {
                name: entry.name.clone(),
            });
        }
        if let NotationKind::Matchfix { close } = &entry.kind {
            if close.is_empty() {
                return Err(DictionaryError::MissingCloseDelimiter {
                    name: entry.name.clone(),
                });
            }
        }
        names.insert(entry.name.as_str());
        if let Some(target) = &entry.alias_of {
            alias_of.insert(entry.name.as_str(), target.as_str());
        }
    }

    let mut resolved = HashMap::new();
    for (name, target) in &alias_of {
        if !names.contains(target) {
            return Err(DictionaryError::UnknownAliasTarget {
                name: name.to_string(),
                target: target.to_string(),
            });
        }
        let mut chain = vec![*name];
        let mut current = *target;
        while let Some(next) = alias_of.get(current) {
            if chain.contains(&current) {
                chain.push(current);
                return Err(DictionaryError::CyclicAlias {
                    cycle: chain.join(" -> "),
                });
            }
            chain.push(current);
            current = *next;
        }
        resolved.insert(name.to_string(), current.to_string());
    }
    Ok(resolved)
}

/// Data-only form of a [`NotationEntry`], as found in option files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySpec {
    pub name: String,
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub latex: Option<String>,
    #[serde(default)]
    pub kind: EntrySpecKind,
    #[serde(default)]
    pub precedence: Option<u16>,
    #[serde(default)]
    pub associativity: Option<Associativity>,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub close: Option<String>,
    #[serde(default)]
    pub arguments: Option<usize>,
    #[serde(default)]
    pub alias_of: Option<String>,
    #[serde(default)]
    pub parse_only: bool,
    #[serde(default)]
    pub serialize_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrySpecKind {
    #[default]
    Symbol,
    Prefix,
    Infix,
    Postfix,
    Matchfix,
    Command,
    Function,
}

impl EntrySpec {
    pub fn into_entry(self) -> NotationEntry {
        let trigger = self.trigger.as_deref().unwrap_or("");
        let mut entry = if let Some(target) = &self.alias_of {
            let mut alias = NotationEntry::alias(&self.name, target);
            alias.trigger = self.trigger.clone();
            alias
        } else {
            match self.kind {
                EntrySpecKind::Symbol => NotationEntry::symbol(&self.name, trigger),
                EntrySpecKind::Prefix => {
                    NotationEntry::prefix(&self.name, trigger, self.precedence.unwrap_or(NOT))
                }
                EntrySpecKind::Infix => {
                    let entry = NotationEntry::infix(
                        &self.name,
                        trigger,
                        self.precedence.unwrap_or(MULTIPLICATION),
                    );
                    if self.variadic {
                        entry.variadic()
                    } else {
                        entry
                    }
                }
                EntrySpecKind::Postfix => {
                    NotationEntry::postfix(&self.name, trigger, self.precedence.unwrap_or(POSTFIX))
                }
                EntrySpecKind::Matchfix => NotationEntry::matchfix(
                    &self.name,
                    trigger,
                    self.close.as_deref().unwrap_or(""),
                ),
                EntrySpecKind::Command => {
                    NotationEntry::command(&self.name, trigger, self.arguments.unwrap_or(1))
                }
                EntrySpecKind::Function => NotationEntry::function(&self.name, trigger),
            }
        };
        if self.trigger.is_none() {
            entry.trigger = None;
        }
        if let Some(associativity) = self.associativity {
            entry.associativity = associativity;
        }
        entry.latex = self.latex;
        entry.parse_only = self.parse_only;
        entry.serialize_only = self.serialize_only;
        entry
    }
}

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "rho", "sigma", "tau", "upsilon",
    "phi", "varphi", "chi", "psi", "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi", "Sigma",
    "Upsilon", "Phi", "Psi", "Omega",
];

/// The default notation table.
pub fn default_entries() -> Vec<NotationEntry> {
    let mut entries = vec![NotationEntry::symbol("Pi", "\\pi")];
    for name in GREEK {
        entries.push(NotationEntry::symbol(name, &format!("\\{name}")));
    }

    entries.extend([
        // Arithmetic
        NotationEntry::infix("Add", "+", ADDITION)
            .variadic()
            .with_arity(0, None)
            .with_serializer(serialize_add),
        NotationEntry::prefix("Add", "+", ADDITION)
            .with_parser(parse_unary_plus)
            .parse_only(),
        NotationEntry::infix("Subtract", "-", ADDITION),
        NotationEntry::prefix("Negate", "-", ADDITION),
        NotationEntry::infix("Multiply", "\\times", MULTIPLICATION)
            .variadic()
            .with_arity(0, None)
            .with_serializer(serialize_multiply),
        NotationEntry::infix("Multiply", "\\cdot", MULTIPLICATION)
            .variadic()
            .parse_only(),
        NotationEntry::infix("Multiply", "*", MULTIPLICATION)
            .variadic()
            .parse_only(),
        NotationEntry::infix("Divide", "/", DIVISION).parse_only(),
        NotationEntry::command("Divide", "\\frac", 2),
        NotationEntry::command("Divide", "\\dfrac", 2).parse_only(),
        NotationEntry::command("Divide", "\\tfrac", 2).parse_only(),
        NotationEntry::command("Rational", "\\frac", 2).serialize_only(),
        NotationEntry::infix("Power", "^", POWER)
            .right()
            .with_parser(parse_power)
            .with_serializer(serialize_power),
        NotationEntry::infix("Subscript", "_", POWER)
            .right()
            .with_parser(parse_subscript)
            .with_serializer(serialize_subscript),
        NotationEntry::command("Sqrt", "\\sqrt", 1).with_parser(parse_sqrt),
        NotationEntry::serializer("Root", serialize_root),
        NotationEntry::postfix("Factorial", "!", POSTFIX),
        // Delimiters
        NotationEntry::matchfix("Abs", "|", "|").with_arity(1, Some(1)),
        NotationEntry::matchfix("Abs", "\\lvert", "\\rvert").parse_only(),
        NotationEntry::matchfix("List", "[", "]"),
        // Relations
        NotationEntry::infix("Equal", "=", EQUAL).non_associative(),
        NotationEntry::infix("NotEqual", "\\ne", NOT_EQUAL).non_associative(),
        NotationEntry::infix("NotEqual", "\\neq", NOT_EQUAL).parse_only(),
        NotationEntry::infix("Less", "<", ORDERING).non_associative(),
        NotationEntry::infix("LessEqual", "\\le", ORDERING).non_associative(),
        NotationEntry::infix("LessEqual", "\\leq", ORDERING).parse_only(),
        NotationEntry::infix("Greater", ">", ORDERING).non_associative(),
        NotationEntry::infix("GreaterEqual", "\\ge", ORDERING).non_associative(),
        NotationEntry::infix("GreaterEqual", "\\geq", ORDERING).parse_only(),
        // Logic
        NotationEntry::infix("And", "\\land", AND).variadic(),
        NotationEntry::infix("And", "\\wedge", AND).variadic().parse_only(),
        NotationEntry::infix("Or", "\\lor", OR).variadic(),
        NotationEntry::infix("Or", "\\vee", OR).variadic().parse_only(),
        NotationEntry::prefix("Not", "\\lnot", NOT),
        // Sequences
        NotationEntry::infix("Sequence", ",", SEQUENCE)
            .variadic()
            .with_arity(0, None)
            .with_latex(", "),
        // Functions
        NotationEntry::function("Sin", "\\sin"),
        NotationEntry::function("Cos", "\\cos"),
        NotationEntry::function("Tan", "\\tan"),
        NotationEntry::function("Ln", "\\ln"),
        NotationEntry::function("Log", "\\log"),
        NotationEntry::function("Exp", "\\exp"),
        // Parse-side commands
        NotationEntry::custom("Identifier", "\\operatorname", parse_identifier),
        NotationEntry::custom("Identifier", "\\mathrm", parse_identifier),
        NotationEntry::custom("Text", "\\text", parse_text),
        NotationEntry::custom("Placeholder", "\\placeholder", parse_placeholder),
        NotationEntry::custom("PositiveInfinity", "\\infty", parse_infinity),
        // Serialize-side forms
        NotationEntry::serializer("Error", serialize_error),
        NotationEntry::serializer("LatexString", serialize_latex_string),
        NotationEntry::serializer("LatexTokens", serialize_latex_tokens),
    ]);
    entries
}

fn parse_unary_plus(
    parser: &mut Parser<'_>,
    _lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    let operand = parser.parse_expression(ADDITION + 1)?;
    if operand.is_missing() {
        return Ok(None);
    }
    Ok(Some(operand))
}

fn parse_power(
    parser: &mut Parser<'_>,
    lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    let base = lhs.unwrap_or(Expression::Missing);
    let exponent = parser.parse_required_argument("^")?;
    Ok(Some(Expression::function("Power", vec![base, exponent])))
}

fn parse_subscript(
    parser: &mut Parser<'_>,
    lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    let base = lhs.unwrap_or(Expression::Missing);
    let subscript = parser.parse_required_argument("_")?;
    Ok(Some(Expression::function("Subscript", vec![base, subscript])))
}

fn parse_sqrt(
    parser: &mut Parser<'_>,
    _lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    let index = parser.parse_optional_argument()?;
    let radicand = parser.parse_required_argument("\\sqrt")?;
    Ok(Some(match index {
        Some(index) => Expression::function("Root", vec![radicand, index]),
        None => Expression::function("Sqrt", vec![radicand]),
    }))
}

fn parse_identifier(
    parser: &mut Parser<'_>,
    _lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    let Some(raw) = parser.raw_group_text() else {
        parser.record_here(DiagnosticKind::ExpectedArgument("\\operatorname".to_string()));
        return Ok(Some(Expression::Missing));
    };
    let name: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if name.is_empty() {
        parser.record_here(DiagnosticKind::ExpectedArgument("\\operatorname".to_string()));
        return Ok(Some(Expression::Missing));
    }
    Ok(Some(Expression::Symbol(name)))
}

fn parse_text(
    parser: &mut Parser<'_>,
    _lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    match parser.raw_group_text() {
        Some(raw) => Ok(Some(Expression::String(unescape_text(&raw)))),
        None => {
            parser.record_here(DiagnosticKind::ExpectedArgument("\\text".to_string()));
            Ok(Some(Expression::Missing))
        }
    }
}

fn parse_placeholder(
    parser: &mut Parser<'_>,
    _lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    parser.parse_optional_argument()?;
    parser.raw_group_text();
    Ok(Some(Expression::Missing))
}

fn parse_infinity(
    _parser: &mut Parser<'_>,
    _lhs: Option<Expression>,
) -> Result<Option<Expression>, LatexError> {
    Ok(Some(Expression::Number(Number::Machine(f64::INFINITY))))
}

fn serialize_add(serializer: &mut Serializer<'_>, args: &[Expression]) -> Result<String, SerializeError> {
    let Some((first, rest)) = args.split_first() else {
        return Ok("0".to_string());
    };
    let mut result = serializer.wrap(first, ADDITION)?;
    for term in rest {
        let negative = term.head_name() == Some("Negate")
            || term.as_number().is_some_and(Number::is_negative);
        let text = if negative {
            serializer.serialize(term)?
        } else {
            serializer.wrap(term, ADDITION + 1)?
        };
        if !text.starts_with('-') {
            result.push('+');
        }
        result.push_str(&text);
    }
    Ok(result)
}

fn serialize_multiply(
    serializer: &mut Serializer<'_>,
    args: &[Expression],
) -> Result<String, SerializeError> {
    if args.is_empty() {
        return Ok("1".to_string());
    }
    let mut negative = false;
    let mut factors: Vec<Expression> = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        match arg.as_number() {
            Some(number) if number.is_negative() => {
                negative = !negative;
                let absorbed = i == 0 && args.len() > 1 && number.as_integer() == Some(-1);
                if !absorbed {
                    factors.push(Expression::Number(negate_number(number)));
                }
            }
            _ => factors.push(arg.clone()),
        }
    }

    let mut numerator = Vec::new();
    let mut denominator = Vec::new();
    for factor in factors {
        match reciprocal_base(&factor) {
            Some(base) => denominator.push(base),
            None => numerator.push(factor),
        }
    }

    let sign = if negative { "-" } else { "" };
    if !denominator.is_empty() {
        let top = join_factors(serializer, &numerator)?;
        let bottom = join_factors(serializer, &denominator)?;
        let top = if top.is_empty() { "1".to_string() } else { top };
        return Ok(format!("{sign}\\frac{{{top}}}{{{bottom}}}"));
    }
    Ok(format!("{sign}{}", join_factors(serializer, &numerator)?))
}

/// `b` for a factor `b^{-1}`, `b^{n}` for a factor `b^{-n}`.
fn reciprocal_base(factor: &Expression) -> Option<Expression> {
    if factor.head_name() != Some("Power") {
        return None;
    }
    let [base, exponent] = factor.arguments() else {
        return None;
    };
    let number = exponent.as_number().filter(|n| n.is_negative())?;
    let positive = negate_number(number);
    if positive.as_integer() == Some(1) {
        return Some(base.clone());
    }
    Some(Expression::function(
        "Power",
        vec![base.clone(), Expression::Number(positive)],
    ))
}

fn negate_number(number: &Number) -> Number {
    match number {
        Number::Machine(value) => Number::Machine(-value),
        Number::Decimal(decimal) => {
            let mut decimal = decimal.clone();
            decimal.negative = !decimal.negative;
            Number::Decimal(decimal)
        }
    }
}

fn join_factors(serializer: &mut Serializer<'_>, factors: &[Expression]) -> Result<String, SerializeError> {
    let mut result = String::new();
    let mut previous: Option<&Expression> = None;
    for factor in factors {
        let text = serializer.wrap(factor, MULTIPLICATION)?;
        if let Some(previous) = previous {
            let explicit = factor.as_number().is_some()
                || text.starts_with(|c: char| c.is_ascii_digit())
                || (previous.as_number().is_some()
                    && matches!(factor.head_name(), Some("Divide") | Some("Rational")));
            let glyph = if explicit {
                serializer.options().multiply.clone()
            } else {
                serializer.options().invisible_multiply.clone()
            };
            result = Serializer::join_latex(&result, &glyph);
            result = Serializer::join_latex(&result, &text);
        } else {
            result = text;
        }
        previous = Some(factor);
    }
    Ok(result)
}

/// `p/q` for an exponent written as a rational or a division of integers.
fn rational_parts(expr: &Expression) -> Option<(i64, i64)> {
    if let Some(number) = expr.as_number() {
        let value = number.as_f64()?;
        return if value == 0.5 {
            Some((1, 2))
        } else if value == -0.5 {
            Some((-1, 2))
        } else {
            None
        };
    }
    if !matches!(expr.head_name(), Some("Rational") | Some("Divide")) {
        return None;
    }
    let [p, q] = expr.arguments() else {
        return None;
    };
    Some((p.as_number()?.as_integer()?, q.as_number()?.as_integer()?))
}

fn serialize_power(serializer: &mut Serializer<'_>, args: &[Expression]) -> Result<String, SerializeError> {
    let [base, exponent] = args else {
        return serializer.serialize_application("Power", args);
    };
    if let Some(number) = exponent.as_number().filter(|n| n.is_negative()) {
        let positive = negate_number(number);
        let denominator = if positive.as_integer() == Some(1) {
            serializer.serialize(base)?
        } else {
            serializer.serialize(&Expression::function(
                "Power",
                vec![base.clone(), Expression::Number(positive)],
            ))?
        };
        return Ok(format!("\\frac{{1}}{{{denominator}}}"));
    }
    match rational_parts(exponent) {
        Some((1, 2)) => return Ok(format!("\\sqrt{{{}}}", serializer.serialize(base)?)),
        Some((-1, 2)) => {
            return Ok(format!("\\frac{{1}}{{\\sqrt{{{}}}}}", serializer.serialize(base)?))
        }
        Some((p, q)) => {
            let base_text = power_base(serializer, base)?;
            return Ok(format!("{base_text}^{{\\frac{{{p}}}{{{q}}}}}"));
        }
        None => {}
    }
    let base_text = power_base(serializer, base)?;
    let exponent_text = serializer.serialize(exponent)?;
    Ok(format!("{base_text}^{{{exponent_text}}}"))
}

fn power_base(serializer: &mut Serializer<'_>, base: &Expression) -> Result<String, SerializeError> {
    let text = serializer.wrap(base, POWER + 1)?;
    // A number written as `m\cdot10^{e}` already carries a superscript.
    let product = &serializer.options().number.exponent_product;
    let scientific = base.as_number().is_some()
        && (text.contains('^') || (!product.is_empty() && text.contains(product.as_str())));
    if text.starts_with('-') || scientific {
        return Ok(format!("({text})"));
    }
    Ok(text)
}

fn serialize_subscript(
    serializer: &mut Serializer<'_>,
    args: &[Expression],
) -> Result<String, SerializeError> {
    let [base, subscript] = args else {
        return serializer.serialize_application("Subscript", args);
    };
    let base_text = power_base(serializer, base)?;
    Ok(format!("{base_text}_{{{}}}", serializer.serialize(subscript)?))
}

fn serialize_root(serializer: &mut Serializer<'_>, args: &[Expression]) -> Result<String, SerializeError> {
    let [radicand, index] = args else {
        return serializer.serialize_application("Root", args);
    };
    let index = serializer.serialize(index)?;
    let radicand = serializer.serialize(radicand)?;
    Ok(format!("\\sqrt[{index}]{{{radicand}}}"))
}

fn latex_string_literal(expr: &Expression) -> Option<&str> {
    if expr.head_name() != Some("LatexString") {
        return None;
    }
    match expr.arguments() {
        [Expression::String(text)] => Some(text),
        _ => None,
    }
}

fn serialize_error(serializer: &mut Serializer<'_>, args: &[Expression]) -> Result<String, SerializeError> {
    if let Some(literal) = args.first().and_then(latex_string_literal) {
        return Ok(literal.to_string());
    }
    match args.first() {
        Some(Expression::String(code)) => Ok(format!("\\error{{{code}}}")),
        Some(first) => Ok(format!("\\error{{{}}}", serializer.serialize(first)?)),
        None => Ok("\\error{}".to_string()),
    }
}

fn serialize_latex_string(
    serializer: &mut Serializer<'_>,
    args: &[Expression],
) -> Result<String, SerializeError> {
    let mut result = String::new();
    for arg in args {
        let text = match arg {
            Expression::String(text) => text.clone(),
            other => serializer.serialize(other)?,
        };
        result = Serializer::join_latex(&result, &text);
    }
    Ok(result)
}

fn serialize_latex_tokens(
    serializer: &mut Serializer<'_>,
    args: &[Expression],
) -> Result<String, SerializeError> {
    let mut result = String::new();
    for arg in args {
        let text = match arg {
            Expression::String(token) => match token.as_str() {
                "<{>" => "{".to_string(),
                "<}>" => "}".to_string(),
                "<space>" => " ".to_string(),
                "<$>" => "$".to_string(),
                "<$$>" => "$$".to_string(),
                other => other.to_string(),
            },
            other => serializer.serialize(other)?,
        };
        result = Serializer::join_latex(&result, &text);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_dictionary_validates() {
        assert!(Dictionary::new(default_entries()).is_ok());
    }

    #[test]
    fn test_later_entries_shadow_earlier_ones() {
        let dictionary = Dictionary::standard()
            .with_overrides(vec![NotationEntry::symbol("Pi", "\\varpi")])
            .unwrap();
        assert_eq!(dictionary.lookup("Pi").unwrap().glyph(), "\\varpi");
        // the old trigger still parses
        assert_eq!(dictionary.prefix_entries("\\pi").next().unwrap().name, "Pi");
    }

    #[test]
    fn test_parse_only_entries_do_not_serialize() {
        let dictionary = Dictionary::standard();
        assert_eq!(dictionary.lookup("Multiply").unwrap().glyph(), "\\times");
        assert_eq!(dictionary.lookup("Divide").unwrap().glyph(), "\\frac");
        assert!(dictionary.lookup("Identifier").is_none());
    }

    #[test]
    fn test_prefix_and_infix_share_triggers() {
        let dictionary = Dictionary::standard();
        assert_eq!(dictionary.infix_entries("-").next().unwrap().name, "Subtract");
        assert_eq!(dictionary.prefix_entries("-").next().unwrap().name, "Negate");
    }

    #[test]
    fn test_alias_resolution() {
        let dictionary = Dictionary::standard()
            .with_overrides(vec![
                NotationEntry::alias("Plus", "Add").with_trigger("\\oplus"),
                NotationEntry::alias("Sum2", "Plus"),
            ])
            .unwrap();
        assert_eq!(dictionary.canonical_name("Sum2"), "Add");
        assert_eq!(dictionary.lookup("Sum2").unwrap().name, "Add");
        assert_eq!(dictionary.infix_entries("\\oplus").next().unwrap().name, "Add");
    }

    #[test]
    fn test_invalid_dictionaries() {
        let cyclic = Dictionary::new(vec![
            NotationEntry::alias("A", "B"),
            NotationEntry::alias("B", "A"),
        ]);
        assert!(matches!(
            cyclic,
            Err(LatexError::Dictionary(DictionaryError::CyclicAlias { .. }))
        ));

        let dangling = Dictionary::new(vec![NotationEntry::alias("A", "Nowhere")]);
        assert!(matches!(
            dangling,
            Err(LatexError::Dictionary(DictionaryError::UnknownAliasTarget { .. }))
        ));

        let empty = Dictionary::new(vec![NotationEntry::symbol("", "x")]);
        assert_eq!(empty.unwrap_err(), LatexError::Dictionary(DictionaryError::EmptyName));

        let no_trigger = Dictionary::new(vec![NotationEntry::symbol("X", "")]);
        assert!(matches!(
            no_trigger,
            Err(LatexError::Dictionary(DictionaryError::EmptyTrigger { .. }))
        ));

        let open = Dictionary::new(vec![NotationEntry::matchfix("Norm", "\\|", "")]);
        assert!(matches!(
            open,
            Err(LatexError::Dictionary(DictionaryError::MissingCloseDelimiter { .. }))
        ));
    }

    #[test]
    fn test_entry_spec_into_entry() {
        let spec = EntrySpec {
            name: "Union".to_string(),
            trigger: Some("\\cup".to_string()),
            latex: None,
            kind: EntrySpecKind::Infix,
            precedence: Some(350),
            associativity: None,
            variadic: true,
            close: None,
            arguments: None,
            alias_of: None,
            parse_only: false,
            serialize_only: false,
        };
        let entry = spec.into_entry();
        assert_eq!(entry.kind, NotationKind::Infix { variadic: true });
        assert_eq!(entry.precedence, 350);
        assert_eq!(entry.glyph(), "\\cup");
    }
}
