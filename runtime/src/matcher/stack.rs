//! The two explicit stacks driven by the matcher.
//!
//! The state stack is a persistent linked list so a backtrack frame can
//! capture the whole stack in constant time by cloning its head. Capture
//! slots follow the same idea: they live behind an `Rc` and are only copied
//! when a mutation happens while a backtrack frame still holds the old
//! version.

use std::rc::Rc;

use crate::Op;

/// A capture slot's span. A slot is opened with a zero length and takes its
/// final length when the group closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Capture {
    pub index: usize,
    pub length: usize,
}

impl Capture {
    pub fn end(&self) -> usize {
        self.index + self.length
    }
}

/// The capture slots, one per capturing group. `None` marks an unset slot.
pub(crate) type Parens = Rc<Vec<Option<Capture>>>;

#[derive(Debug)]
pub(crate) enum FrameKind {
    /// Remaining bounds of an active quantifier loop.
    Quantifier { min: u16, max: Option<u16> },
    /// An active lookahead, holding what must be restored once its body
    /// settles.
    Assertion {
        backtrack_depth: usize,
        parens: Parens,
    },
}

#[derive(Debug)]
pub(crate) struct StateFrame {
    pub kind: FrameKind,
    /// Cursor position when the loop iteration or assertion began.
    pub index: usize,
    pub continue_op: Op,
    pub continue_pc: usize,
    prev: StateStack,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StateStack(Option<Rc<StateFrame>>);

impl StateStack {
    pub fn push(&mut self, kind: FrameKind, index: usize, continue_op: Op, continue_pc: usize) {
        let prev = std::mem::take(self);
        self.0 = Some(Rc::new(StateFrame {
            kind,
            index,
            continue_op,
            continue_pc,
            prev,
        }));
    }

    pub fn pop(&mut self) -> Option<Rc<StateFrame>> {
        let top = self.0.take()?;
        *self = top.prev.clone();
        Some(top)
    }

    pub fn top(&self) -> Option<&StateFrame> {
        self.0.as_deref()
    }
}

/// A checkpoint to resume from once the current path fails.
#[derive(Debug)]
pub(crate) struct BacktrackFrame {
    /// The operation to resume with, evaluated in its failure mode.
    pub op: Op,
    pub pc: usize,
    pub cp: usize,
    pub parens: Parens,
    pub state: StateStack,
}
