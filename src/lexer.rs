/// The kinds of token the LaTeX tokenizer produces.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// End of input.
    Eof,
    /// One or more whitespace characters.
    Whitespace,
    /// A comment, from `%` to the end of the line.
    Comment(String),
    /// A lone backslash at the end of the input.
    Unknown,

    // == Commands and groups ==
    /// A control sequence without its backslash: `frac` for `\frac`, `,` for `\,`.
    Command(String),
    /// `{`
    GroupOpen,
    /// `}`
    GroupClose,
    /// `[`
    OptionalOpen,
    /// `]`
    OptionalClose,

    // == Literals ==
    /// A run of ASCII digits. Whitespace ends a run.
    Digits(String),
    /// A single letter. Juxtaposed letters are separate tokens.
    Letter(char),
    /// Any other single character: operators, parentheses, punctuation.
    Punct(char),
}

/// A token with its type and byte span.
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }

    /// The dictionary trigger this token can match, if any.
    pub fn trigger_key(&self) -> Option<String> {
        match &self.ttype {
            TokenType::Command(name) => Some(format!("\\{name}")),
            TokenType::Letter(c) | TokenType::Punct(c) => Some(c.to_string()),
            TokenType::OptionalOpen => Some("[".to_string()),
            TokenType::OptionalClose => Some("]".to_string()),
            _ => None,
        }
    }

    pub fn is_command(&self, name: &str) -> bool {
        matches!(&self.ttype, TokenType::Command(n) if n == name)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.ttype == TokenType::Punct(c)
    }
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token.ttype == TokenType::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        let start_pos = self.position;

        let ttype = if let Some(char) = self.advance() {
            match char {
                '{' => TokenType::GroupOpen,
                '}' => TokenType::GroupClose,
                '[' => TokenType::OptionalOpen,
                ']' => TokenType::OptionalClose,
                '%' => self.read_comment(),
                '\\' => self.read_command(),
                c if c.is_whitespace() => self.read_whitespace(),
                c if c.is_ascii_digit() => self.read_digits(c),
                c if c.is_alphabetic() => TokenType::Letter(c),
                c => TokenType::Punct(c),
            }
        } else {
            TokenType::Eof
        };

        Token::new(ttype, start_pos, self.position)
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn read_whitespace(&mut self) -> TokenType {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Whitespace
    }

    fn read_comment(&mut self) -> TokenType {
        let mut comment_text = String::new();
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            comment_text.push(c);
            self.advance();
        }
        TokenType::Comment(comment_text.trim().to_string())
    }

    fn read_command(&mut self) -> TokenType {
        let mut name = String::new();
        while let Some(&c) = self.peek() {
            if c.is_ascii_alphabetic() {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if !name.is_empty() {
            return TokenType::Command(name);
        }
        match self.advance() {
            Some(c) => TokenType::Command(c.to_string()),
            None => TokenType::Unknown,
        }
    }

    fn read_digits(&mut self, first_char: char) -> TokenType {
        let mut digits = String::new();
        digits.push(first_char);
        while let Some(&c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Digits(digits)
    }
}
