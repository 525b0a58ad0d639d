//! Provides for the parsing and compilation of a legacy ECMAScript regular
//! expression into its corresponding runtime program.
//!
//! # Example
//!
//! ```rust
//! // Compilation of a pattern and its flags into a runnable program is
//! // accomplished by the `compile_str` function.
//! use regexp_compiler::compile_str;
//!
//! // Evaluating a given input against a program is accomplished via a single
//! // exposed function in the `regexp_runtime` crate.
//! use regexp_runtime::{execute, ExecMode, RegExpStatics};
//!
//! let program = compile_str("(l+)o", "").expect("failed to compile");
//!
//! // Inputs are sequences of UTF-16 code units.
//! let input: Vec<u16> = "hello\nworld".encode_utf16().collect();
//!
//! // The statics context records the last successful match, backing the
//! // legacy `RegExp.lastMatch` style accessors.
//! let mut statics = RegExpStatics::default();
//!
//! let found = execute(&program, &input, 0, ExecMode::Match, &mut statics)
//!     .into_match()
//!     .expect("pattern matches");
//!
//! // The whole match followed by each capturing group, as ranges of the input.
//! assert_eq!(Some(2..5), found.group_range(0));
//! assert_eq!(Some(2..4), found.group_range(1));
//! assert_eq!("ll".encode_utf16().collect::<Vec<_>>(), statics.last_paren());
//! ```

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod parser;
pub mod regexp;

pub use bytecode::to_binary;
pub use compiler::{compile, compile_str, compile_with_warnings};
pub use parser::{parse, parse_flags, SyntaxError, SyntaxErrorKind, Warning};
pub use regexp::RegExp;
