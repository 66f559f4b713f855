//! # dml-parser
//!
//! Lexer, recursive descent parser and validator for dml scripts.
//! Validation runs before any execution and reports invalid programs
//! as [DmlError::LanguageError].
//!
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

/// Syntax tree of scripts
pub mod ast;
/// Builtin function signatures
pub mod builtins;
/// Tokens of scripts
pub mod lexer;
mod parser;
mod validate;

use dml_core::error::DmlError;

pub use ast::Program;
pub use parser::parse;
pub use validate::{validate, Validation, VarInfo};

/// Parse script and check it for language errors
pub fn parse_and_validate(source: &str) -> Result<(Program, Validation), DmlError> {
    let program = parse(source)?;
    let validation = validate(&program)?;
    Ok((program, validation))
}
