//! A compiled pattern paired with its `lastIndex` cursor.

use std::sync::Arc;

use regexp_runtime::{execute, ExecMode, Execution, Flags, MatchResult, Program, RegExpStatics};

use crate::compiler::compile;
use crate::parser::{parse_flags, SyntaxError};

/// A regular expression object. The compiled [Program] is shared, so cloning
/// a `RegExp` or handing its program to other threads never recompiles it.
///
/// # Example
///
/// ```
/// use regexp_compiler::RegExp;
/// use regexp_runtime::RegExpStatics;
///
/// let mut re = RegExp::new("a", "g").expect("valid pattern");
/// let mut statics = RegExpStatics::default();
/// let input: Vec<u16> = "aaa".encode_utf16().collect();
///
/// let indexes: Vec<_> = std::iter::from_fn(|| re.exec(&input, &mut statics))
///     .map(|m| m.index())
///     .collect();
///
/// assert_eq!(vec![0, 1, 2], indexes);
/// assert_eq!(0, re.last_index());
/// ```
#[derive(Debug, Clone)]
pub struct RegExp {
    program: Arc<Program>,
    last_index: usize,
}

impl RegExp {
    /// Compiles `pattern` with a flag string such as `"gim"`.
    pub fn new(pattern: &str, flags: &str) -> Result<Self, SyntaxError> {
        let flags = parse_flags(flags)?;
        let source: Vec<u16> = pattern.encode_utf16().collect();

        Self::with_flags(&source, flags)
    }

    pub fn with_flags(pattern: &[u16], flags: Flags) -> Result<Self, SyntaxError> {
        compile(pattern, flags, false).map(|program| Self::from_program(Arc::new(program)))
    }

    pub fn from_program(program: Arc<Program>) -> Self {
        Self {
            program,
            last_index: 0,
        }
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// The pattern source, with unpaired surrogates replaced.
    pub fn source(&self) -> String {
        String::from_utf16_lossy(self.program.source())
    }

    pub fn flags(&self) -> Flags {
        self.program.flags()
    }

    pub fn last_index(&self) -> usize {
        self.last_index
    }

    pub fn set_last_index(&mut self, last_index: usize) {
        self.last_index = last_index;
    }

    /// Searches `input`, from `lastIndex` under the `g` flag and from the
    /// start otherwise.
    pub fn exec<'i>(
        &mut self,
        input: &'i [u16],
        statics: &mut RegExpStatics,
    ) -> Option<MatchResult<'i>> {
        self.search(input, ExecMode::Match, statics)
            .into_match()
    }

    pub fn test(&mut self, input: &[u16], statics: &mut RegExpStatics) -> bool {
        // a global search needs the match end to advance `lastIndex`.
        let mode = if self.flags().global() {
            ExecMode::Match
        } else {
            ExecMode::Test
        };

        self.search(input, mode, statics).is_match()
    }

    /// Attempts a match beginning exactly at `index`, leaving `lastIndex`
    /// untouched.
    pub fn match_prefix<'i>(
        &self,
        input: &'i [u16],
        index: usize,
        statics: &mut RegExpStatics,
    ) -> Option<MatchResult<'i>> {
        execute(&self.program, input, index, ExecMode::Prefix, statics).into_match()
    }

    fn search<'i>(
        &mut self,
        input: &'i [u16],
        mode: ExecMode,
        statics: &mut RegExpStatics,
    ) -> Execution<'i> {
        if !self.flags().global() {
            return execute(&self.program, input, 0, mode, statics);
        }

        let res = execute(&self.program, input, self.last_index, mode, statics);
        self.last_index = match &res {
            Execution::Matched(Some(found)) => found.end(),
            _ => 0,
        };

        res
    }
}

impl std::fmt::Display for RegExp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = self.source();
        let source = if source.is_empty() { "(?:)" } else { &source };

        write!(f, "/{}/{}", source, self.flags())
    }
}
