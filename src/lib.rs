pub mod api;
pub mod ast;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod lexer;
pub mod number;
pub mod parser;
pub mod serializer;
pub mod utils;
mod serialization;

pub use api::{parse, serialize, LatexSyntax, Parsed, Serialized};
pub use ast::{Decimal, Expression, Number};
pub use config::{LatexOptions, ParseOptions, SerializeOptions, TokenDisposition, UnknownTokenPolicy};
pub use dictionary::{Dictionary, NotationEntry, NotationKind};
pub use error::{Diagnostic, DiagnosticKind, LatexError};
