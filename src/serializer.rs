use crate::ast::Expression;
use crate::config::SerializeOptions;
use crate::dictionary::{Associativity, Dictionary, NotationEntry, NotationKind, ATOMIC};
use crate::error::{LatexError, SerializeError};
use crate::number::format_number;
use crate::utils::escape_text;

/// Writes expressions out as LaTeX using the serialization side of a
/// [`Dictionary`].
pub struct Serializer<'a> {
    dictionary: &'a Dictionary,
    options: &'a SerializeOptions,
    depth: usize,
}

impl<'a> Serializer<'a> {
    pub fn new(dictionary: &'a Dictionary, options: &'a SerializeOptions) -> Self {
        Serializer {
            dictionary,
            options,
            depth: 0,
        }
    }

    pub fn options(&self) -> &'a SerializeOptions {
        self.options
    }

    pub fn dictionary(&self) -> &'a Dictionary {
        self.dictionary
    }

    pub fn serialize(&mut self, expr: &Expression) -> Result<String, SerializeError> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            self.depth -= 1;
            return Err(LatexError::DepthExceeded {
                limit: self.options.max_depth,
            }
            .into());
        }
        let result = self.serialize_inner(expr);
        self.depth -= 1;
        result
    }

    fn serialize_inner(&mut self, expr: &Expression) -> Result<String, SerializeError> {
        match expr {
            Expression::Number(number) => Ok(format_number(number, &self.options.number)),
            Expression::Symbol(name) => Ok(self.serialize_symbol(name)),
            Expression::String(text) => Ok(format!(
                "{}{{{}}}",
                self.options.text_command,
                escape_text(text)
            )),
            Expression::Dictionary(_) => Err(SerializeError::NotSerializable("dictionary")),
            Expression::Missing => Ok("\\placeholder".to_string()),
            Expression::Function(head, args) => self.serialize_function(head, args),
        }
    }

    /// Serializes `expr`, parenthesized if it binds looser than `min_precedence`.
    pub fn wrap(&mut self, expr: &Expression, min_precedence: u16) -> Result<String, SerializeError> {
        let text = self.serialize(expr)?;
        if self.precedence_of(expr) < min_precedence {
            return Ok(format!("({text})"));
        }
        Ok(text)
    }

    /// How tightly the serialization of `expr` binds.
    pub fn precedence_of(&self, expr: &Expression) -> u16 {
        let Some(name) = expr.head_name() else {
            return ATOMIC;
        };
        match self.dictionary.lookup(name) {
            Some(entry)
                if matches!(
                    entry.kind,
                    NotationKind::Infix { .. } | NotationKind::Prefix | NotationKind::Postfix
                ) =>
            {
                entry.precedence
            }
            _ => ATOMIC,
        }
    }

    pub fn serialize_symbol(&self, name: &str) -> String {
        if let Some(entry) = self.dictionary.lookup(name) {
            if entry.kind == NotationKind::Symbol {
                return entry.glyph().to_string();
            }
        }
        if name.starts_with('\\') || name.chars().count() == 1 {
            return name.to_string();
        }
        format!("\\operatorname{{{name}}}")
    }

    fn serialize_function(
        &mut self,
        head: &Expression,
        args: &[Expression],
    ) -> Result<String, SerializeError> {
        let Some(name) = head.as_symbol() else {
            let head_text = self.wrap(head, ATOMIC)?;
            return Ok(format!("{head_text}({})", self.serialize_list(args)?));
        };
        let dictionary = self.dictionary;
        let Some(entry) = dictionary.lookup(name) else {
            return self.serialize_application(name, args);
        };
        if let Some(hook) = &entry.serialize {
            log::trace!("serialize hook `{}`", entry.name);
            return hook(&mut *self, args);
        }
        if !entry.arity.accepts(args.len()) {
            return self.serialize_application(name, args);
        }

        match &entry.kind {
            NotationKind::Infix { .. } => self.serialize_infix(entry, args),
            NotationKind::Prefix => {
                let operand = self.wrap(&args[0], entry.precedence.saturating_add(1))?;
                Ok(Self::join_latex(entry.glyph(), &operand))
            }
            NotationKind::Postfix => {
                let operand = self.wrap(&args[0], entry.precedence)?;
                Ok(format!("{operand}{}", entry.glyph()))
            }
            NotationKind::Matchfix { close } => {
                Ok(format!("{}{}{close}", entry.glyph(), self.serialize_list(args)?))
            }
            NotationKind::Command { .. } => {
                let mut result = entry.glyph().to_string();
                for arg in args {
                    result.push_str(&format!("{{{}}}", self.serialize(arg)?));
                }
                Ok(result)
            }
            NotationKind::Function => {
                Ok(format!("{}({})", entry.glyph(), self.serialize_list(args)?))
            }
            NotationKind::Symbol | NotationKind::Custom => self.serialize_application(name, args),
        }
    }

    fn serialize_infix(
        &mut self,
        entry: &NotationEntry,
        args: &[Expression],
    ) -> Result<String, SerializeError> {
        let precedence = entry.precedence;
        let last = args.len().saturating_sub(1);
        let mut result = String::new();
        for (i, arg) in args.iter().enumerate() {
            let min = match entry.associativity {
                Associativity::Left if i == 0 => precedence,
                Associativity::Right if i == last => precedence,
                _ => precedence.saturating_add(1),
            };
            let text = self.wrap(arg, min)?;
            if i > 0 {
                result = Self::join_latex(&result, entry.glyph());
            }
            result = Self::join_latex(&result, &text);
        }
        Ok(result)
    }

    /// `f(a, b)` for plain names, `\foo{a}{b}` for command names.
    pub fn serialize_application(
        &mut self,
        name: &str,
        args: &[Expression],
    ) -> Result<String, SerializeError> {
        if name.starts_with('\\') {
            let mut result = name.to_string();
            for arg in args {
                result.push_str(&format!("{{{}}}", self.serialize(arg)?));
            }
            return Ok(result);
        }
        Ok(format!(
            "{}({})",
            self.serialize_symbol(name),
            self.serialize_list(args)?
        ))
    }

    fn serialize_list(&mut self, args: &[Expression]) -> Result<String, SerializeError> {
        let items = args
            .iter()
            .map(|arg| self.serialize(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items.join(", "))
    }

    /// Concatenates two fragments, separating a trailing control word from a
    /// following letter.
    pub fn join_latex(left: &str, right: &str) -> String {
        let needs_space = right.starts_with(|c: char| c.is_ascii_alphabetic())
            && left.rfind('\\').is_some_and(|idx| {
                let word = &left[idx + 1..];
                !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic())
            });
        if needs_space {
            format!("{left} {right}")
        } else {
            format!("{left}{right}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_latex() {
        assert_eq!(Serializer::join_latex("\\pi", "x"), "\\pi x");
        assert_eq!(Serializer::join_latex("\\pi", "2"), "\\pi2");
        assert_eq!(Serializer::join_latex("\\frac{1}{2}", "x"), "\\frac{1}{2}x");
        assert_eq!(Serializer::join_latex("2\\times", "2"), "2\\times2");
        assert_eq!(Serializer::join_latex("", "x"), "x");
    }

    #[test]
    fn test_symbols() {
        let options = SerializeOptions::default();
        let serializer = Serializer::new(Dictionary::standard(), &options);
        assert_eq!(serializer.serialize_symbol("Pi"), "\\pi");
        assert_eq!(serializer.serialize_symbol("alpha"), "\\alpha");
        assert_eq!(serializer.serialize_symbol("x"), "x");
        assert_eq!(serializer.serialize_symbol("symbol"), "\\operatorname{symbol}");
        assert_eq!(serializer.serialize_symbol("\\foo"), "\\foo");
    }
}
