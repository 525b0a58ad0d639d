//! The backtracking virtual machine.
//!
//! Execution never recurses. Control operations that need to come back to a
//! decision point record it on one of two heap stacks: quantifier and
//! lookahead bookkeeping goes on the state stack, and every choice that can
//! be revisited goes on the backtrack stack. A failure pops the most recent
//! backtrack frame and resumes its operation with the `matched` register
//! cleared.

mod stack;

use std::rc::Rc;

use crate::chars::{is_digit, is_line_terminator, is_space, is_word, units_eq};
use crate::instruction::Quantifier;
use crate::{read_arg, read_offset, Op, Program, ARG_LEN};

pub(crate) use stack::Capture;
use stack::{BacktrackFrame, FrameKind, Parens, StateStack};

/// The outcome of evaluating a single operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Continue with the operation at the given offset.
    Next(usize),
    /// Continue with an explicit continuation operation.
    Goto(Op, usize),
    Fail,
    Accept,
}

/// Per-invocation matcher state. A matcher is never shared between threads.
pub(crate) struct Matcher<'p, 'i> {
    program: &'p Program,
    input: &'i [u16],
    multiline: bool,
    cp: usize,
    parens: Parens,
    state: StateStack,
    backtrack: Vec<BacktrackFrame>,
}

impl<'p, 'i> Matcher<'p, 'i> {
    pub fn new(program: &'p Program, input: &'i [u16], multiline: bool) -> Self {
        Self {
            program,
            input,
            multiline,
            cp: 0,
            parens: Rc::new(vec![None; program.paren_count()]),
            state: StateStack::default(),
            backtrack: Vec::new(),
        }
    }

    /// The capture slots of the last successful run.
    pub fn captures(&self) -> &[Option<Capture>] {
        &self.parens
    }

    fn fetch(&self, pc: usize) -> Option<Op> {
        let program = self.program;
        program
            .code()
            .get(pc)
            .and_then(|&byte| Op::try_from(byte).ok())
    }

    fn push_backtrack(&mut self, op: Op, pc: usize) {
        self.backtrack.push(BacktrackFrame {
            op,
            pc,
            cp: self.cp,
            parens: Rc::clone(&self.parens),
            state: self.state.clone(),
        });
    }

    /// Attempts a match beginning exactly at `start`, returning the end
    /// offset of the match.
    pub fn run(&mut self, start: usize) -> Option<usize> {
        self.cp = start;
        self.state = StateStack::default();
        self.backtrack.clear();
        Rc::make_mut(&mut self.parens).fill(None);

        let mut op = self.fetch(0)?;
        let mut pc = 0;
        let mut matched = true;

        loop {
            let resume = match self.step(op, pc, matched) {
                Step::Accept => return Some(self.cp),
                Step::Next(next) => self.fetch(next).map(|next_op| (next_op, next)),
                Step::Goto(next_op, next) => Some((next_op, next)),
                Step::Fail => None,
            };

            (op, pc, matched) = match resume {
                Some((next_op, next)) => (next_op, next, true),
                None => {
                    let frame = self.backtrack.pop()?;
                    self.cp = frame.cp;
                    self.parens = frame.parens;
                    self.state = frame.state;
                    (frame.op, frame.pc, false)
                }
            };
        }
    }

    fn step(&mut self, op: Op, pc: usize, matched: bool) -> Step {
        let program = self.program;
        let code = program.code();

        match op {
            Op::Empty
            | Op::Bol
            | Op::Eol
            | Op::WordBoundary
            | Op::NonWordBoundary
            | Op::Dot
            | Op::Digit
            | Op::NonDigit
            | Op::Alnum
            | Op::NonAlnum
            | Op::Space
            | Op::NonSpace
            | Op::BackRef
            | Op::Flat
            | Op::FlatI
            | Op::Flat1
            | Op::Flat1I
            | Op::UcFlat1
            | Op::UcFlat1I
            | Op::Class
            | Op::NClass => match self.simple_match(op, pc) {
                Some(consumed) => {
                    self.cp += consumed;
                    Step::Next(pc + op.width())
                }
                None => Step::Fail,
            },
            Op::Alt | Op::AltPrereq | Op::AltPrereq2 => self.alternative(op, pc),
            Op::Jump => Step::Next(read_offset(code, pc + 1)),
            Op::EndAlt => Step::Next(pc + op.width()),
            Op::LParen => {
                let paren = usize::from(read_arg(code, pc + 1));
                let index = self.cp;
                if let Some(slot) = Rc::make_mut(&mut self.parens).get_mut(paren) {
                    *slot = Some(Capture { index, length: 0 });
                }
                Step::Next(pc + op.width())
            }
            Op::RParen => {
                let paren = usize::from(read_arg(code, pc + 1));
                let cp = self.cp;
                if let Some(Some(capture)) = Rc::make_mut(&mut self.parens).get_mut(paren) {
                    capture.length = cp.saturating_sub(capture.index);
                }
                Step::Next(pc + op.width())
            }
            Op::Assert | Op::AssertNot => {
                let test = read_offset(code, pc + 1);
                let test_op = if op == Op::Assert {
                    Op::AssertTest
                } else {
                    Op::AssertNotTest
                };

                let kind = FrameKind::Assertion {
                    backtrack_depth: self.backtrack.len(),
                    parens: Rc::clone(&self.parens),
                };
                self.state.push(kind, self.cp, test_op, test);
                self.push_backtrack(test_op, test);
                Step::Next(pc + op.width())
            }
            Op::AssertTest | Op::AssertNotTest => self.assertion_test(op, pc, matched),
            Op::Star | Op::Plus | Op::Opt | Op::Quant => {
                let quant = Quantifier::read(code, pc, op);
                if quant.max == Some(0) {
                    return Step::Next(quant.next);
                }

                let kind = FrameKind::Quantifier {
                    min: quant.min,
                    max: quant.max,
                };
                self.state.push(kind, self.cp, Op::Repeat, pc);
                if quant.min == 0 {
                    self.push_backtrack(Op::Repeat, pc);
                }
                Step::Next(quant.body)
            }
            Op::MinimalStar | Op::MinimalPlus | Op::MinimalOpt | Op::MinimalQuant => {
                let quant = Quantifier::read(code, pc, op);
                let kind = FrameKind::Quantifier {
                    min: quant.min,
                    max: quant.max,
                };
                self.state.push(kind, self.cp, Op::MinimalRepeat, pc);
                if quant.min != 0 {
                    return Step::Next(quant.body);
                }

                // try the continuation first, and one more iteration on failure.
                self.push_backtrack(Op::MinimalRepeat, pc);
                self.state.pop();
                Step::Next(quant.next)
            }
            Op::Repeat => self.repeat(pc, matched),
            Op::MinimalRepeat => self.minimal_repeat(pc, matched),
            Op::EndChild => match self.state.top() {
                Some(frame) => Step::Goto(frame.continue_op, frame.continue_pc),
                None => Step::Fail,
            },
            Op::End => Step::Accept,
        }
    }

    /// Evaluates a simple operation at the current cursor without moving it,
    /// returning the number of units it consumes.
    fn simple_match(&self, op: Op, pc: usize) -> Option<usize> {
        let program = self.program;
        let code = program.code();
        let input = self.input;
        let cp = self.cp;
        let current = input.get(cp).copied();

        let single = |predicate: &dyn Fn(u16) -> bool| current.filter(|&c| predicate(c)).map(|_| 1);

        match op {
            Op::Empty => Some(0),
            Op::Bol => {
                let at_start = cp == 0 || (self.multiline && is_line_terminator(input[cp - 1]));
                at_start.then_some(0)
            }
            Op::Eol => {
                let at_end = current.map_or(true, |c| self.multiline && is_line_terminator(c));
                at_end.then_some(0)
            }
            Op::WordBoundary | Op::NonWordBoundary => {
                let before = cp > 0 && is_word(input[cp - 1]);
                let after = current.map_or(false, is_word);
                ((before != after) == (op == Op::WordBoundary)).then_some(0)
            }
            Op::Dot => single(&|c| !is_line_terminator(c)),
            Op::Digit => single(&is_digit),
            Op::NonDigit => single(&|c| !is_digit(c)),
            Op::Alnum => single(&is_word),
            Op::NonAlnum => single(&|c| !is_word(c)),
            Op::Space => single(&is_space),
            Op::NonSpace => single(&|c| !is_space(c)),
            Op::BackRef => self.backref(usize::from(read_arg(code, pc + 1))),
            Op::Flat | Op::FlatI => {
                let offset = usize::from(read_arg(code, pc + 1));
                let length = usize::from(read_arg(code, pc + 1 + ARG_LEN));
                let literal = program.source().get(offset..offset + length)?;
                self.compare_at(literal, op.is_folded())
            }
            Op::Flat1 | Op::Flat1I => {
                let unit = u16::from(code[pc + 1]);
                single(&|c| units_eq(unit, c, op.is_folded()))
            }
            Op::UcFlat1 | Op::UcFlat1I => {
                let unit = read_arg(code, pc + 1);
                single(&|c| units_eq(unit, c, op.is_folded()))
            }
            Op::Class | Op::NClass => {
                let index = usize::from(read_arg(code, pc + 1));
                let negated = op == Op::NClass;
                single(&|c| program.class_contains(index, c) != negated)
            }
            Op::Alt
            | Op::AltPrereq
            | Op::AltPrereq2
            | Op::Jump
            | Op::EndAlt
            | Op::LParen
            | Op::RParen
            | Op::Assert
            | Op::AssertNot
            | Op::AssertTest
            | Op::AssertNotTest
            | Op::Star
            | Op::Plus
            | Op::Opt
            | Op::Quant
            | Op::MinimalStar
            | Op::MinimalPlus
            | Op::MinimalOpt
            | Op::MinimalQuant
            | Op::Repeat
            | Op::MinimalRepeat
            | Op::EndChild
            | Op::End => None,
        }
    }

    /// Compares `expected` against the input at the cursor.
    fn compare_at(&self, expected: &[u16], fold: bool) -> Option<usize> {
        let end = self.cp.checked_add(expected.len())?;
        let actual = self.input.get(self.cp..end)?;

        expected
            .iter()
            .zip(actual)
            .all(|(&e, &a)| units_eq(e, a, fold))
            .then_some(expected.len())
    }

    fn backref(&self, paren: usize) -> Option<usize> {
        // an unset or nonexistent group matches the empty string.
        let Some(Some(capture)) = self.parens.get(paren) else {
            return Some(0);
        };

        let captured = self.input.get(capture.index..capture.end())?;
        self.compare_at(captured, self.program.flags().fold())
    }

    fn alternative(&mut self, op: Op, pc: usize) -> Step {
        let program = self.program;
        let code = program.code();

        if op != Op::Alt {
            let Some(current) = self.input.get(self.cp).copied() else {
                return Step::Fail;
            };

            let first = read_arg(code, pc + 1 + ARG_LEN);
            let second = read_arg(code, pc + 1 + 2 * ARG_LEN);
            let admitted = match op {
                Op::AltPrereq => current == first || current == second,
                _ => current == first || program.class_matches(usize::from(second), current),
            };

            if !admitted {
                return Step::Fail;
            }
        }

        let alternate = read_offset(code, pc + 1);
        let Some(alternate_op) = self.fetch(alternate) else {
            return Step::Fail;
        };

        // skip the checkpoint when the left branch fails on its first operation.
        let body = pc + op.width();
        if let Some(first) = self.fetch(body).filter(|first| first.is_simple()) {
            if self.simple_match(first, body).is_none() {
                return Step::Goto(alternate_op, alternate);
            }
        }

        self.push_backtrack(alternate_op, alternate);
        Step::Next(body)
    }

    fn assertion_test(&mut self, op: Op, pc: usize, matched: bool) -> Step {
        let Some(frame) = self.state.pop() else {
            return Step::Fail;
        };
        let FrameKind::Assertion {
            backtrack_depth,
            parens,
        } = &frame.kind
        else {
            return Step::Fail;
        };

        // the assertion is zero-width and its body is never re-entered.
        self.cp = frame.index;
        self.backtrack.truncate(*backtrack_depth);
        self.parens = Rc::clone(parens);

        let holds = if op == Op::AssertTest {
            matched
        } else {
            !matched
        };

        if holds {
            Step::Next(pc + op.width())
        } else {
            Step::Fail
        }
    }

    /// Pops the quantifier frame owned by the loop head at `pc`.
    fn pop_quantifier(&mut self, pc: usize) -> Option<(Quantifier, usize, u16, Option<u16>)> {
        let program = self.program;
        let head = self.fetch(pc).filter(|op| op.is_quantifier())?;
        let quant = Quantifier::read(program.code(), pc, head);

        let frame = self.state.pop()?;
        match frame.kind {
            FrameKind::Quantifier { min, max } => Some((quant, frame.index, min, max)),
            FrameKind::Assertion { .. } => None,
        }
    }

    fn clear_parens(&mut self, quant: &Quantifier) {
        if quant.paren_count == 0 {
            return;
        }

        let start = usize::from(quant.paren_index);
        let end = start + usize::from(quant.paren_count);
        if let Some(slots) = Rc::make_mut(&mut self.parens).get_mut(start..end) {
            slots.fill(None);
        }
    }

    /// Continuation of a greedy loop, reached after an iteration completes or
    /// when the "stop here" checkpoint is resumed.
    fn repeat(&mut self, pc: usize, matched: bool) -> Step {
        let Some((quant, entry, min, max)) = self.pop_quantifier(pc) else {
            return Step::Fail;
        };

        if !matched {
            return if min == 0 {
                Step::Next(quant.next)
            } else {
                Step::Fail
            };
        }

        // an empty iteration once the minimum is met would loop forever.
        if min == 0 && self.cp == entry {
            return Step::Fail;
        }

        let min = min.saturating_sub(1);
        let max = max.map(|max| max.saturating_sub(1));
        if max == Some(0) {
            return Step::Next(quant.next);
        }

        self.state
            .push(FrameKind::Quantifier { min, max }, self.cp, Op::Repeat, pc);
        if min == 0 {
            self.push_backtrack(Op::Repeat, pc);
        }
        Step::Next(quant.body)
    }

    /// Continuation of a lazy loop, reached after an iteration completes or
    /// when the "one more iteration" checkpoint is resumed.
    fn minimal_repeat(&mut self, pc: usize, matched: bool) -> Step {
        let Some((quant, entry, min, max)) = self.pop_quantifier(pc) else {
            return Step::Fail;
        };

        if !matched {
            if max.map_or(false, |max| max == 0) {
                return Step::Fail;
            }

            self.clear_parens(&quant);
            self.state.push(
                FrameKind::Quantifier { min, max },
                self.cp,
                Op::MinimalRepeat,
                pc,
            );
            return Step::Next(quant.body);
        }

        if min == 0 && self.cp == entry {
            return Step::Fail;
        }

        let min = min.saturating_sub(1);
        let max = max.map(|max| max.saturating_sub(1));
        self.state.push(
            FrameKind::Quantifier { min, max },
            self.cp,
            Op::MinimalRepeat,
            pc,
        );

        if min != 0 {
            self.clear_parens(&quant);
            return Step::Next(quant.body);
        }

        self.push_backtrack(Op::MinimalRepeat, pc);
        self.state.pop();
        Step::Next(quant.next)
    }
}
