//! The search loop wrapped around the matcher, along with match results and
//! the last-match context.

use std::ops::Range;

use log::trace;

use crate::chars::{is_line_terminator, units_eq};
use crate::matcher::{Capture, Matcher};
use crate::{AnchorHint, Program};

/// Selects what an execution searches for and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Search forward from the start index, reporting only whether a match
    /// exists.
    Test,
    /// Search forward from the start index, returning the match.
    Match,
    /// Attempt a match starting exactly at the start index.
    Prefix,
}

/// The outcome of an [execute] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution<'i> {
    /// The result of an [ExecMode::Test] execution.
    Tested(bool),
    /// The result of an [ExecMode::Match] or [ExecMode::Prefix] execution.
    Matched(Option<MatchResult<'i>>),
}

impl<'i> Execution<'i> {
    pub fn is_match(&self) -> bool {
        match self {
            Execution::Tested(found) => *found,
            Execution::Matched(found) => found.is_some(),
        }
    }

    /// Returns the match, if the execution produced one.
    pub fn into_match(self) -> Option<MatchResult<'i>> {
        match self {
            Execution::Tested(_) => None,
            Execution::Matched(found) => found,
        }
    }
}

/// A successful match, borrowing the input it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult<'i> {
    input: &'i [u16],
    /// The overall match followed by one entry per capturing group.
    captures: Vec<Option<Range<usize>>>,
}

impl<'i> MatchResult<'i> {
    pub(crate) fn new(input: &'i [u16], captures: Vec<Option<Range<usize>>>) -> Self {
        Self { input, captures }
    }

    /// The input the match was found in.
    pub fn input(&self) -> &'i [u16] {
        self.input
    }

    /// The offset of the first unit of the match.
    pub fn index(&self) -> usize {
        self.range().start
    }

    /// The offset one past the last unit of the match.
    pub fn end(&self) -> usize {
        self.range().end
    }

    pub fn range(&self) -> Range<usize> {
        self.captures
            .first()
            .cloned()
            .flatten()
            .unwrap_or_default()
    }

    /// The matched units.
    pub fn as_slice(&self) -> &'i [u16] {
        &self.input[self.range()]
    }

    /// The number of capturing groups in the pattern.
    pub fn group_count(&self) -> usize {
        self.captures.len().saturating_sub(1)
    }

    /// Returns group `n`, where `0` is the overall match. Unmatched and
    /// nonexistent groups are `None`.
    pub fn group(&self, n: usize) -> Option<&'i [u16]> {
        let range = self.captures.get(n).cloned().flatten()?;
        self.input.get(range)
    }

    /// The span of group `n`, where `0` is the overall match.
    pub fn group_range(&self, n: usize) -> Option<Range<usize>> {
        self.captures.get(n).cloned().flatten()
    }

    /// Iterates over the capturing groups in pattern order, excluding the
    /// overall match.
    pub fn groups(&self) -> impl Iterator<Item = Option<&'i [u16]>> + '_ {
        (1..self.captures.len()).map(|n| self.group(n))
    }

    /// Lossily decodes the matched units.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_slice())
    }
}

/// The last-match context consulted by legacy static accessors and `$n`
/// replacement interpolation.
///
/// A context is passed explicitly to every execution, and only successful
/// executions update it. Independent contexts never observe each other.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegExpStatics {
    input: Vec<u16>,
    multiline: bool,
    captures: Vec<Option<Range<usize>>>,
}

impl RegExpStatics {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every execution through this context treats `^` and `$` as
    /// multiline.
    pub fn multiline(&self) -> bool {
        self.multiline
    }

    pub fn set_multiline(&mut self, multiline: bool) {
        self.multiline = multiline
    }

    /// The input of the last successful match.
    pub fn input(&self) -> &[u16] {
        &self.input
    }

    fn slice(&self, range: Option<&Range<usize>>) -> &[u16] {
        range
            .and_then(|range| self.input.get(range.clone()))
            .unwrap_or_default()
    }

    /// The last matched substring, `$&`.
    pub fn last_match(&self) -> &[u16] {
        self.slice(self.captures.first().and_then(Option::as_ref))
    }

    /// The highest numbered group of the last match, `$+`.
    pub fn last_paren(&self) -> &[u16] {
        match self.captures.len() {
            0 | 1 => &[],
            len => self.slice(self.captures[len - 1].as_ref()),
        }
    }

    /// The input preceding the last match, `` $` ``.
    pub fn left_context(&self) -> &[u16] {
        let start = self
            .captures
            .first()
            .cloned()
            .flatten()
            .map_or(0, |range| range.start);
        self.input.get(..start).unwrap_or_default()
    }

    /// The input following the last match, `$'`.
    pub fn right_context(&self) -> &[u16] {
        let end = self
            .captures
            .first()
            .cloned()
            .flatten()
            .map_or(self.input.len(), |range| range.end);
        self.input.get(end..).unwrap_or_default()
    }

    /// Group `n` of the last match, `$1` through `$9` and beyond. Unmatched
    /// and nonexistent groups are empty.
    pub fn paren(&self, n: usize) -> &[u16] {
        if n == 0 {
            return &[];
        }

        self.slice(self.captures.get(n).and_then(Option::as_ref))
    }

    /// The number of groups recorded by the last match.
    pub fn paren_count(&self) -> usize {
        self.captures.len().saturating_sub(1)
    }

    fn record(&mut self, input: &[u16], captures: &[Option<Range<usize>>]) {
        if self.input != input {
            self.input.clear();
            self.input.extend_from_slice(input);
        }
        self.captures.clear();
        self.captures.extend_from_slice(captures);
    }
}

/// Runs `program` against `input` from `start_index`.
///
/// A successful execution updates `statics`; a failed one leaves it as it
/// was. A `start_index` beyond the end of the input never matches.
pub fn execute<'i>(
    program: &Program,
    input: &'i [u16],
    start_index: usize,
    mode: ExecMode,
    statics: &mut RegExpStatics,
) -> Execution<'i> {
    let multiline = statics.multiline() || program.flags().multiline();
    let found = search(program, input, start_index, mode, multiline);

    if let Some(captures) = &found {
        statics.record(input, captures);
    }

    match mode {
        ExecMode::Test => Execution::Tested(found.is_some()),
        ExecMode::Match | ExecMode::Prefix => {
            Execution::Matched(found.map(|captures| MatchResult::new(input, captures)))
        }
    }
}

fn search(
    program: &Program,
    input: &[u16],
    start_index: usize,
    mode: ExecMode,
    multiline: bool,
) -> Option<Vec<Option<Range<usize>>>> {
    if start_index > input.len() {
        return None;
    }

    let mut matcher = Matcher::new(program, input, multiline);
    let mut skipped = 0;

    loop {
        let start = match mode {
            ExecMode::Prefix => start_index,
            ExecMode::Test | ExecMode::Match => {
                next_candidate(program, input, start_index + skipped, multiline)?
            }
        };
        skipped = start - start_index;

        trace!("attempting match at {}", start);
        if let Some(end) = matcher.run(start) {
            let mut captures = Vec::with_capacity(program.paren_count() + 1);
            captures.push(Some(start..end));
            captures.extend(
                matcher
                    .captures()
                    .iter()
                    .map(|slot| slot.map(|Capture { index, length }| index..index + length)),
            );

            return Some(captures);
        }

        if mode == ExecMode::Prefix || start >= input.len() {
            return None;
        }
        skipped += 1;
    }
}

/// Returns the first offset at or after `from` where the anchor hint allows
/// a match to begin.
fn next_candidate(program: &Program, input: &[u16], from: usize, multiline: bool) -> Option<usize> {
    let fold = program.flags().fold();
    let scan = |predicate: &dyn Fn(u16) -> bool| {
        input
            .get(from..)?
            .iter()
            .position(|&c| predicate(c))
            .map(|offset| from + offset)
    };

    match program.anchor() {
        AnchorHint::None => Some(from),
        AnchorHint::StartOfLine if multiline => {
            (from..=input.len()).find(|&cp| cp == 0 || is_line_terminator(input[cp - 1]))
        }
        AnchorHint::StartOfLine => (from == 0).then_some(0),
        AnchorHint::Char(unit) => scan(&|c| units_eq(unit, c, fold)),
        AnchorHint::Class(index) => scan(&|c| program.class_matches(usize::from(index), c)),
        AnchorHint::Prereq(first, second) => scan(&|c| c == first || c == second),
        AnchorHint::PrereqClass(unit, index) => {
            scan(&|c| c == unit || program.class_matches(usize::from(index), c))
        }
    }
}
