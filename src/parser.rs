use miette::SourceSpan;

use crate::ast::{Expression, Number};
use crate::config::{ParseOptions, TokenDisposition};
use crate::dictionary::{Associativity, Dictionary, NotationEntry, NotationKind, MULTIPLICATION};
use crate::error::{Diagnostic, DiagnosticKind, LatexError};
use crate::lexer::{Lexer, Token, TokenType};

/// Spacing commands, ignored wherever an operand or operator may appear.
const SPACING: &[&str] = &[",", ";", ":", "!", " ", "quad", "qquad", "enspace", "thinspace"];

struct Operand {
    expr: Expression,
    /// Whether a following `(` applies this operand as a function.
    callable: bool,
}

impl Operand {
    fn plain(expr: Expression) -> Self {
        Operand {
            expr,
            callable: false,
        }
    }
}

#[derive(Clone, Copy)]
struct Checkpoint {
    position: usize,
    diagnostics: usize,
    closers: usize,
    splits: usize,
}

/// A dictionary-driven precedence-climbing parser from LaTeX to MathJSON.
///
/// Problems in the input never abort a parse: they become `Error`
/// expressions in the tree and diagnostics on the side.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    position: usize,
    dictionary: &'a Dictionary,
    options: &'a ParseOptions,
    diagnostics: Vec<Diagnostic>,
    closers: Vec<String>,
    /// Digit runs cut by a single-digit argument, with the token they replaced.
    splits: Vec<(usize, Token)>,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, dictionary: &'a Dictionary, options: &'a ParseOptions) -> Self {
        let mut lexer = Lexer::new(source);
        let tokens: Vec<Token> = lexer
            .lex()
            .into_iter()
            .filter(|t| !matches!(t.ttype, TokenType::Whitespace | TokenType::Comment(_)))
            .collect();

        Self {
            source,
            tokens,
            position: 0,
            dictionary,
            options,
            diagnostics: Vec::new(),
            closers: Vec::new(),
            splits: Vec::new(),
            depth: 0,
        }
    }

    // === Main Parsing Methods ===

    /// Parses the whole input. Stray closing tokens become `unexpected-token`
    /// errors and the pieces around them are joined in a `Sequence`.
    pub fn parse_root(&mut self) -> Result<Expression, LatexError> {
        let mut parts = Vec::new();
        loop {
            let expr = self.parse_expression(0)?;
            if !expr.is_missing() {
                parts.push(expr);
            }
            if self.check(&TokenType::Eof) {
                break;
            }
            let token = self.current_token().clone();
            let literal = self.slice(token.pos_start, token.pos_end).to_string();
            self.record(
                DiagnosticKind::UnexpectedToken(literal.clone()),
                token.pos_start,
                token.pos_end,
            );
            parts.push(Expression::error("unexpected-token", &literal));
            self.advance();
        }
        Ok(match parts.len() {
            0 => Expression::Missing,
            1 => parts.remove(0),
            _ => Expression::function("Sequence", parts),
        })
    }

    /// Parses an expression whose operators all bind at least as tightly as
    /// `min_precedence`.
    pub fn parse_expression(&mut self, min_precedence: u16) -> Result<Expression, LatexError> {
        self.enter()?;
        let result = self.parse_expression_inner(min_precedence);
        self.depth -= 1;
        result
    }

    fn parse_expression_inner(&mut self, min_precedence: u16) -> Result<Expression, LatexError> {
        let mut lhs = match self.parse_prefix()? {
            Some(operand) => operand,
            None => {
                let token = self.current_token().clone();
                let key = token.trigger_key();
                match key {
                    Some(key) if self.dictionary.has_infix(&key) && !self.is_terminator() => {
                        self.record(
                            DiagnosticKind::ExpectedOperand(key),
                            token.pos_start,
                            token.pos_end,
                        );
                        Operand::plain(Expression::Missing)
                    }
                    _ => return Ok(Expression::Missing),
                }
            }
        };

        // Name of the variadic operator that built `lhs` in this loop.
        let mut flatten: Option<String> = None;
        loop {
            self.skip_spacing();
            if self.is_terminator() {
                break;
            }
            let start = self.position;

            if lhs.callable && self.current_token().is_punct('(') {
                let args = self.parse_delimited_arguments()?;
                lhs = Operand {
                    expr: Expression::apply(lhs.expr, args),
                    callable: true,
                };
                flatten = None;
                continue;
            }

            let key = self.current_token().trigger_key();
            if let Some(key) = key.filter(|k| self.dictionary.has_infix(k)) {
                let dictionary = self.dictionary;
                let candidates: Vec<&'a NotationEntry> = dictionary
                    .infix_entries(&key)
                    .filter(|entry| entry.precedence >= min_precedence)
                    .collect();
                let mut applied = None;
                for entry in candidates {
                    let checkpoint = self.checkpoint();
                    self.advance();
                    if let Some(expr) = self.apply_infix(entry, &mut lhs.expr, flatten.as_deref())? {
                        applied = Some((expr, entry));
                        break;
                    }
                    self.restore(checkpoint);
                }
                let Some((expr, entry)) = applied else {
                    break;
                };
                flatten = matches!(entry.kind, NotationKind::Infix { variadic: true })
                    .then(|| entry.name.clone());
                lhs = Operand::plain(expr);
                continue;
            }

            // Juxtaposition is an invisible multiplication.
            if MULTIPLICATION < min_precedence {
                break;
            }
            let rhs = self.parse_expression(MULTIPLICATION + 1)?;
            if self.position == start || rhs.is_missing() {
                break;
            }
            let product = match std::mem::replace(&mut lhs.expr, Expression::Missing) {
                Expression::Function(head, mut args) if flatten.as_deref() == Some("Multiply") => {
                    args.push(rhs);
                    Expression::Function(head, args)
                }
                lhs => Expression::function("Multiply", vec![lhs, rhs]),
            };
            lhs = Operand::plain(product);
            flatten = Some("Multiply".to_string());
        }
        Ok(lhs.expr)
    }

    /// Applies an infix or postfix entry whose trigger was just consumed.
    /// Returns `None` when the entry's hook declines.
    fn apply_infix(
        &mut self,
        entry: &NotationEntry,
        lhs: &mut Expression,
        flatten: Option<&str>,
    ) -> Result<Option<Expression>, LatexError> {
        if let Some(hook) = &entry.parse {
            log::trace!("infix hook `{}`", entry.name);
            return hook(&mut *self, Some(lhs.clone()));
        }
        let lhs = std::mem::replace(lhs, Expression::Missing);
        let variadic = match entry.kind {
            NotationKind::Postfix => {
                return Ok(Some(Expression::function(entry.name.as_str(), vec![lhs])))
            }
            NotationKind::Infix { variadic } => variadic,
            _ => return Ok(Some(lhs)),
        };
        let rhs_precedence = match entry.associativity {
            Associativity::Right => entry.precedence,
            Associativity::Left | Associativity::None => entry.precedence.saturating_add(1),
        };
        let rhs = self.parse_expression(rhs_precedence)?;
        if rhs.is_missing() {
            self.record_here(DiagnosticKind::ExpectedOperand(entry.glyph().trim().to_string()));
        }
        Ok(Some(match lhs {
            Expression::Function(head, mut args)
                if variadic && flatten == Some(entry.name.as_str()) =>
            {
                args.push(rhs);
                Expression::Function(head, args)
            }
            lhs => Expression::function(entry.name.as_str(), vec![lhs, rhs]),
        }))
    }

    /// Parses one operand. Returns `None`, consuming nothing, when the
    /// current token cannot start one.
    fn parse_prefix(&mut self) -> Result<Option<Operand>, LatexError> {
        loop {
            self.skip_spacing();
            if self.is_terminator() {
                return Ok(None);
            }
            let token = self.current_token().clone();

            match &token.ttype {
                TokenType::Digits(_) => return Ok(Some(Operand::plain(self.parse_number(false)?))),
                TokenType::Punct('.') if self.number_follows(0) => {
                    return Ok(Some(Operand::plain(self.parse_number(false)?)))
                }
                TokenType::Punct(sign @ ('-' | '+')) if self.number_follows(1) => {
                    let checkpoint = self.checkpoint();
                    self.advance();
                    let number = self.parse_number(*sign == '-')?;
                    // `-2^2` is `-(2^2)`
                    if !self.current_token().is_punct('^') {
                        return Ok(Some(Operand::plain(number)));
                    }
                    self.restore(checkpoint);
                }
                TokenType::Punct('(') => return Ok(Some(Operand::plain(self.parse_paren_group()?))),
                TokenType::GroupOpen => {
                    self.advance();
                    let body = self.parse_group_body("}", &TokenType::GroupClose)?;
                    return Ok(Some(Operand::plain(body)));
                }
                TokenType::Command(name) if name == "left" => {
                    return Ok(Some(Operand::plain(self.parse_left_right()?)))
                }
                TokenType::Unknown => {
                    self.advance();
                    return Ok(Some(Operand::plain(self.unexpected(&token))));
                }
                _ => {}
            }

            if let Some(key) = token.trigger_key() {
                let dictionary = self.dictionary;
                for entry in dictionary.prefix_entries(&key) {
                    let checkpoint = self.checkpoint();
                    self.advance();
                    if let Some(operand) = self.apply_prefix(entry)? {
                        return Ok(Some(operand));
                    }
                    self.restore(checkpoint);
                }
                if dictionary.has_infix(&key) {
                    return Ok(None);
                }
            }

            match &token.ttype {
                TokenType::Letter(c) => {
                    self.advance();
                    let name = c.to_string();
                    match self.options.parse_unknown_token.disposition(&name) {
                        TokenDisposition::Symbol => {
                            return Ok(Some(Operand::plain(Expression::Symbol(name))))
                        }
                        TokenDisposition::Function => {
                            return Ok(Some(Operand {
                                expr: Expression::Symbol(name),
                                callable: true,
                            }))
                        }
                        TokenDisposition::Skip => continue,
                        TokenDisposition::Error => {
                            self.record(
                                DiagnosticKind::UnknownSymbol(name.clone()),
                                token.pos_start,
                                token.pos_end,
                            );
                            return Ok(Some(Operand::plain(Expression::error(
                                "unknown-symbol",
                                &name,
                            ))));
                        }
                    }
                }
                TokenType::Command(name) => {
                    if let Some(operand) = self.parse_unknown_command(&token, name)? {
                        return Ok(Some(operand));
                    }
                }
                _ => {
                    self.advance();
                    return Ok(Some(Operand::plain(self.unexpected(&token))));
                }
            }
        }
    }

    /// Applies a prefix-position entry whose trigger was just consumed.
    /// Returns `None` when the entry does not apply here.
    fn apply_prefix(&mut self, entry: &NotationEntry) -> Result<Option<Operand>, LatexError> {
        if let Some(hook) = &entry.parse {
            log::trace!("prefix hook `{}`", entry.name);
            let Some(expr) = hook(&mut *self, None)? else {
                return Ok(None);
            };
            let callable = match &expr {
                Expression::Symbol(name) => {
                    self.options.parse_unknown_token.disposition(name) == TokenDisposition::Function
                }
                _ => false,
            };
            return Ok(Some(Operand { expr, callable }));
        }

        let expr = match &entry.kind {
            NotationKind::Symbol => Expression::symbol(entry.name.as_str()),
            NotationKind::Prefix => {
                let operand = self.parse_expression(entry.precedence.saturating_add(1))?;
                if operand.is_missing() {
                    self.record_here(DiagnosticKind::ExpectedOperand(entry.glyph().to_string()));
                }
                Expression::function(entry.name.as_str(), vec![operand])
            }
            NotationKind::Matchfix { close } => {
                self.closers.push(close.clone());
                let body = self.parse_expression(0);
                self.closers.pop();
                let body = body?;
                if self.current_token().trigger_key().as_deref() == Some(close.as_str()) {
                    self.advance();
                } else {
                    self.record_here(DiagnosticKind::ExpectedClosingDelimiter(close.clone()));
                }
                Expression::function(entry.name.as_str(), sequence_items(body))
            }
            NotationKind::Command { arguments } => {
                let mut args = Vec::with_capacity(*arguments);
                for _ in 0..*arguments {
                    args.push(self.parse_required_argument(entry.glyph())?);
                }
                Expression::function(entry.name.as_str(), args)
            }
            NotationKind::Function => {
                self.skip_spacing();
                let args = if self.current_token().is_punct('(') {
                    self.parse_delimited_arguments()?
                } else {
                    let argument = self.parse_expression(MULTIPLICATION)?;
                    if argument.is_missing() {
                        self.record_here(DiagnosticKind::ExpectedArgument(entry.glyph().to_string()));
                    }
                    vec![argument]
                };
                Expression::function(entry.name.as_str(), args)
            }
            NotationKind::Infix { .. } | NotationKind::Postfix | NotationKind::Custom => {
                return Ok(None)
            }
        };
        Ok(Some(Operand::plain(expr)))
    }

    fn parse_unknown_command(
        &mut self,
        token: &Token,
        name: &str,
    ) -> Result<Option<Operand>, LatexError> {
        let command = format!("\\{name}");
        let disposition = self.options.parse_unknown_token.disposition(&command);
        self.advance();

        let mut args = Vec::new();
        let mut end = token.pos_end;
        if self.options.parse_arguments_of_unknown_latex_commands {
            loop {
                let (close, closing) = match self.current_token().ttype {
                    TokenType::OptionalOpen => ("]", TokenType::OptionalClose),
                    TokenType::GroupOpen => ("}", TokenType::GroupClose),
                    _ => break,
                };
                self.advance();
                self.closers.push(close.to_string());
                let body = self.parse_expression(0);
                self.closers.pop();
                let body = body?;
                if !self.check(&closing) {
                    self.record_here(DiagnosticKind::ExpectedClosingDelimiter(close.to_string()));
                    args.push(body);
                    break;
                }
                end = self.current_token().pos_end;
                self.advance();
                args.push(body);
            }
        }

        match disposition {
            TokenDisposition::Skip => Ok(None),
            TokenDisposition::Error => {
                self.record(DiagnosticKind::UnknownCommand(command), token.pos_start, end);
                let literal = self.slice(token.pos_start, end);
                Ok(Some(Operand::plain(Expression::error("unknown-command", literal))))
            }
            TokenDisposition::Symbol | TokenDisposition::Function => {
                self.record(
                    DiagnosticKind::UnknownSymbol(command.clone()),
                    token.pos_start,
                    end,
                );
                if args.is_empty() {
                    Ok(Some(Operand {
                        expr: Expression::Symbol(command),
                        callable: disposition == TokenDisposition::Function,
                    }))
                } else {
                    Ok(Some(Operand::plain(Expression::function(command, args))))
                }
            }
        }
    }

    fn parse_paren_group(&mut self) -> Result<Expression, LatexError> {
        self.advance();
        let body = self.parse_group_body(")", &TokenType::Punct(')'))?;
        if body.is_missing() {
            return Ok(Expression::function("Sequence", vec![]));
        }
        Ok(body)
    }

    /// Parses up to `closing`, which is consumed if present.
    fn parse_group_body(&mut self, close: &str, closing: &TokenType) -> Result<Expression, LatexError> {
        self.closers.push(close.to_string());
        let body = self.parse_expression(0);
        self.closers.pop();
        let body = body?;
        if !self.match_token(closing) {
            self.record_here(DiagnosticKind::ExpectedClosingDelimiter(close.to_string()));
        }
        Ok(body)
    }

    /// `(a, b, c)` after a callable head. The current token is `(`.
    fn parse_delimited_arguments(&mut self) -> Result<Vec<Expression>, LatexError> {
        self.advance();
        let body = self.parse_group_body(")", &TokenType::Punct(')'))?;
        Ok(sequence_items(body))
    }

    fn parse_left_right(&mut self) -> Result<Expression, LatexError> {
        self.advance();
        let open = self.current_token().clone();
        let open_key = open.trigger_key();
        if !self.check(&TokenType::Eof) {
            self.advance();
        }

        self.closers.push("\\right".to_string());
        let body = self.parse_expression(0);
        self.closers.pop();
        let body = body?;
        if self.current_token().is_command("right") {
            self.advance();
            if !self.check(&TokenType::Eof) {
                self.advance();
            }
        } else {
            self.record_here(DiagnosticKind::ExpectedClosingDelimiter("\\right".to_string()));
        }

        let dictionary = self.dictionary;
        if let Some(key) = open_key.as_deref() {
            let matchfix = dictionary
                .prefix_entries(key)
                .find(|entry| matches!(entry.kind, NotationKind::Matchfix { .. }));
            if let Some(entry) = matchfix {
                return Ok(Expression::function(entry.name.as_str(), sequence_items(body)));
            }
        }
        if open_key.as_deref() == Some("(") && body.is_missing() {
            return Ok(Expression::function("Sequence", vec![]));
        }
        Ok(body)
    }

    // === Numbers ===

    /// Whether a number starts `offset` tokens ahead.
    fn number_follows(&self, offset: usize) -> bool {
        match &self.token_at(self.position + offset).ttype {
            TokenType::Digits(_) => true,
            TokenType::Punct('.') => {
                matches!(self.token_at(self.position + offset + 1).ttype, TokenType::Digits(_))
            }
            _ => false,
        }
    }

    fn parse_number(&mut self, negative: bool) -> Result<Expression, LatexError> {
        let start = self.current_token().pos_start;
        let mut whole = String::new();
        if let TokenType::Digits(digits) = &self.current_token().ttype {
            whole = digits.clone();
            self.advance();
            if !self.read_thin_space_groups(&mut whole) {
                self.read_comma_groups(&mut whole);
            }
        }

        let mut fraction = String::new();
        let mut repeating = String::new();
        if self.current_token().is_punct('.') {
            let after = self.token_at(self.position + 1).clone();
            let marker = self.current_token();
            let trailing = !whole.is_empty()
                && marker.pos_start == self.previous_token().pos_end
                && !matches!(after.ttype, TokenType::Digits(_))
                && !after.is_command("overline");
            if trailing {
                // `1.` has an empty fraction
                self.advance();
            } else if matches!(after.ttype, TokenType::Digits(_)) || after.is_command("overline") {
                self.advance();
                if let TokenType::Digits(digits) = &self.current_token().ttype {
                    fraction = digits.clone();
                    self.advance();
                    self.read_thin_space_groups(&mut fraction);
                }
                if let Some(digits) = self.read_overline() {
                    repeating = digits;
                }
            }
        }

        let exponent = self.read_exponent();

        let mut literal = String::new();
        if negative {
            literal.push('-');
        }
        literal.push_str(if whole.is_empty() { "0" } else { &whole });
        if !fraction.is_empty() || !repeating.is_empty() {
            literal.push('.');
            literal.push_str(&fraction);
        }
        if !repeating.is_empty() {
            literal.push_str(&format!("({repeating})"));
        }
        if let Some(exponent) = exponent {
            literal.push_str(&format!("e{exponent}"));
        }

        match Number::from_literal(&literal) {
            Some(number) => Ok(Expression::Number(number)),
            None => {
                let end = self.previous_token().pos_end;
                self.record(DiagnosticKind::UnexpectedToken(literal.clone()), start, end);
                Ok(Expression::error("unexpected-token", &literal))
            }
        }
    }

    /// `1\,234\,567`: digit groups joined by adjacent thin spaces.
    fn read_thin_space_groups(&mut self, digits: &mut String) -> bool {
        let mut found = false;
        loop {
            let previous_end = self.previous_token().pos_end;
            let space = self.current_token();
            let next = self.token_at(self.position + 1);
            match &next.ttype {
                TokenType::Digits(group)
                    if space.is_command(",")
                        && space.pos_start == previous_end
                        && next.pos_start == space.pos_end =>
                {
                    digits.push_str(group);
                    self.position += 2;
                    found = true;
                }
                _ => return found,
            }
        }
    }

    /// `1,234,567`: accepted only when every group after the first has
    /// exactly three digits and no fractional part follows. Otherwise the
    /// number ends before the first comma.
    fn read_comma_groups(&mut self, whole: &mut String) {
        let continues_chain = self.follows_comma_group(self.position.saturating_sub(1));
        let start = self.previous_token().pos_start;
        let mut previous_end = self.previous_token().pos_end;
        let mut index = self.position;
        let mut groups = Vec::new();
        loop {
            let comma = self.token_at(index);
            let digits = self.token_at(index + 1);
            match &digits.ttype {
                TokenType::Digits(group)
                    if comma.is_punct(',')
                        && comma.pos_start == previous_end
                        && digits.pos_start == comma.pos_end =>
                {
                    groups.push(group.clone());
                    previous_end = digits.pos_end;
                    index += 2;
                }
                _ => break,
            }
        }
        if groups.is_empty() {
            return;
        }

        let canonical = (1..=3).contains(&whole.len())
            && groups.iter().all(|group| group.len() == 3)
            && !self.token_at(index).is_punct('.');
        if canonical {
            for group in &groups {
                whole.push_str(group);
            }
            self.position = index;
        } else if !continues_chain && groups.iter().any(|group| group.len() >= 3) {
            let literal = self.slice(start, previous_end).to_string();
            self.record(DiagnosticKind::AmbiguousDigitGroup(literal), start, previous_end);
        }
    }

    /// Whether the digit run at `index` is a group of a rejected comma chain,
    /// already reported from its first number.
    fn follows_comma_group(&self, index: usize) -> bool {
        if index < 2 {
            return false;
        }
        let group = self.token_at(index);
        let comma = self.token_at(index - 1);
        let digits = self.token_at(index - 2);
        comma.is_punct(',')
            && comma.pos_end == group.pos_start
            && matches!(digits.ttype, TokenType::Digits(_))
            && digits.pos_end == comma.pos_start
    }

    /// `\overline{567}` after the fractional digits.
    fn read_overline(&mut self) -> Option<String> {
        if !self.current_token().is_command("overline") {
            return None;
        }
        let open = self.token_at(self.position + 1);
        let digits = self.token_at(self.position + 2);
        let close = self.token_at(self.position + 3);
        match (&open.ttype, &digits.ttype, &close.ttype) {
            (TokenType::GroupOpen, TokenType::Digits(digits), TokenType::GroupClose) => {
                let digits = digits.clone();
                self.position += 4;
                Some(digits)
            }
            _ => None,
        }
    }

    /// `\times10^{-5}` or `\cdot10^{3}` after a mantissa.
    fn read_exponent(&mut self) -> Option<String> {
        let product = self.current_token();
        if !(product.is_command("times") || product.is_command("cdot")) {
            return None;
        }
        let ten = self.token_at(self.position + 1);
        if ten.ttype != TokenType::Digits("10".to_string()) || !self.token_at(self.position + 2).is_punct('^') {
            return None;
        }
        let mut index = self.position + 3;
        let exponent = match &self.token_at(index).ttype {
            TokenType::Digits(digit) if digit.len() == 1 => {
                index += 1;
                digit.clone()
            }
            TokenType::GroupOpen => {
                index += 1;
                let mut exponent = String::new();
                if let TokenType::Punct(sign @ ('-' | '+')) = self.token_at(index).ttype {
                    exponent.push(sign);
                    index += 1;
                }
                let TokenType::Digits(digits) = &self.token_at(index).ttype else {
                    return None;
                };
                exponent.push_str(digits);
                if self.token_at(index + 1).ttype != TokenType::GroupClose {
                    return None;
                }
                index += 2;
                exponent
            }
            _ => return None,
        };
        self.position = index;
        Some(exponent)
    }

    // === Helpers for notation hooks ===

    /// A `{...}` group, if one is next.
    pub fn parse_brace_group(&mut self) -> Result<Option<Expression>, LatexError> {
        self.skip_spacing();
        if !self.check(&TokenType::GroupOpen) {
            return Ok(None);
        }
        self.advance();
        self.parse_group_body("}", &TokenType::GroupClose).map(Some)
    }

    /// The argument of a command, superscript or subscript: a brace group or
    /// a single token. A digit run contributes only its first digit.
    pub fn parse_required_argument(&mut self, command: &str) -> Result<Expression, LatexError> {
        if let Some(group) = self.parse_brace_group()? {
            return Ok(group);
        }
        let token = self.current_token().clone();
        if let TokenType::Digits(digits) = &token.ttype {
            let (first, rest) = digits.split_at(1);
            if rest.is_empty() {
                self.advance();
            } else {
                let remainder = Token::new(
                    TokenType::Digits(rest.to_string()),
                    token.pos_start + 1,
                    token.pos_end,
                );
                let original = std::mem::replace(&mut self.tokens[self.position], remainder);
                self.splits.push((self.position, original));
            }
            return Ok(Number::from_literal(first)
                .map(Expression::Number)
                .unwrap_or(Expression::Missing));
        }
        self.enter()?;
        let operand = self.parse_prefix();
        self.depth -= 1;
        match operand? {
            Some(operand) => Ok(operand.expr),
            None => {
                self.record_here(DiagnosticKind::ExpectedArgument(command.to_string()));
                Ok(Expression::Missing)
            }
        }
    }

    /// A `[...]` group, if one is next.
    pub fn parse_optional_argument(&mut self) -> Result<Option<Expression>, LatexError> {
        self.skip_spacing();
        if !self.check(&TokenType::OptionalOpen) {
            return Ok(None);
        }
        self.advance();
        self.parse_group_body("]", &TokenType::OptionalClose).map(Some)
    }

    /// The verbatim source between the braces of the next `{...}` group.
    pub fn raw_group_text(&mut self) -> Option<String> {
        self.skip_spacing();
        if !self.check(&TokenType::GroupOpen) {
            return None;
        }
        let open = self.current_token().clone();
        let mut depth = 0usize;
        let mut index = self.position;
        loop {
            let token = self.token_at(index);
            match token.ttype {
                TokenType::GroupOpen => depth += 1,
                TokenType::GroupClose => {
                    depth -= 1;
                    if depth == 0 {
                        let text = self.slice(open.pos_end, token.pos_start).to_string();
                        self.position = index + 1;
                        return Some(text);
                    }
                }
                TokenType::Eof => {
                    let text = self.slice(open.pos_end, token.pos_start).to_string();
                    self.position = index;
                    self.record_here(DiagnosticKind::ExpectedClosingDelimiter("}".to_string()));
                    return Some(text);
                }
                _ => {}
            }
            index += 1;
        }
    }

    pub fn skip_spacing(&mut self) {
        while let TokenType::Command(name) = &self.current_token().ttype {
            if !SPACING.contains(&name.as_str()) {
                break;
            }
            self.advance();
        }
    }

    /// Records a diagnostic at the current token.
    pub fn record_here(&mut self, kind: DiagnosticKind) {
        let token = self.current_token();
        let (start, end) = (token.pos_start, token.pos_end);
        self.record(kind, start, end);
    }

    pub fn dictionary(&self) -> &'a Dictionary {
        self.dictionary
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn record(&mut self, kind: DiagnosticKind, start: usize, end: usize) {
        log::debug!("{}: {} at {}..{}", kind.code(), kind, start, end);
        let span: SourceSpan = (start, end.saturating_sub(start)).into();
        self.diagnostics.push(Diagnostic::new(kind, Some(span)));
    }

    fn unexpected(&mut self, token: &Token) -> Expression {
        let literal = self.slice(token.pos_start, token.pos_end).to_string();
        self.record(
            DiagnosticKind::UnexpectedToken(literal.clone()),
            token.pos_start,
            token.pos_end,
        );
        Expression::error("unexpected-token", &literal)
    }

    fn is_terminator(&self) -> bool {
        let token = self.current_token();
        match &token.ttype {
            TokenType::Eof | TokenType::GroupClose | TokenType::OptionalClose => true,
            TokenType::Punct(')') | TokenType::Punct('&') => true,
            TokenType::Command(name) if name == "right" || name == "\\" => true,
            _ => match (self.closers.last(), token.trigger_key()) {
                (Some(closer), Some(key)) => *closer == key,
                _ => false,
            },
        }
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.source.get(start..end).unwrap_or("")
    }

    /// Counts one level of nesting against `max_depth`.
    fn enter(&mut self) -> Result<(), LatexError> {
        if self.depth >= self.options.max_depth {
            return Err(LatexError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            position: self.position,
            diagnostics: self.diagnostics.len(),
            closers: self.closers.len(),
            splits: self.splits.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.position = checkpoint.position;
        self.diagnostics.truncate(checkpoint.diagnostics);
        self.closers.truncate(checkpoint.closers);
        while self.splits.len() > checkpoint.splits {
            if let Some((index, token)) = self.splits.pop() {
                self.tokens[index] = token;
            }
        }
    }

    // === Tokenizer Helper Methods ===

    fn current_token(&self) -> &Token {
        self.token_at(self.position)
    }

    fn previous_token(&self) -> &Token {
        self.token_at(self.position.saturating_sub(1))
    }

    /// The token at `index`, or the final `Eof` past the end.
    fn token_at(&self, index: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[index.min(last)]
    }

    fn advance(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn match_token(&mut self, ttype: &TokenType) -> bool {
        if self.check(ttype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, ttype: &TokenType) -> bool {
        self.current_token().ttype == *ttype
    }
}

/// The items of a `Sequence`, or the expression itself as a single item.
fn sequence_items(body: Expression) -> Vec<Expression> {
    match body {
        Expression::Missing => vec![],
        Expression::Function(head, args) if head.as_symbol() == Some("Sequence") => args,
        other => vec![other],
    }
}
