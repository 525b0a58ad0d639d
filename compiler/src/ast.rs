//! An index-addressed arena holding the parsed form of a pattern.
//!
//! Sequencing is expressed with a `next` link on every node, while the
//! structural children of groups, alternations, quantifiers and assertions are
//! referenced by [NodeId].

/// An index into an [Ast].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Quantifier bounds along with the span of capturing groups the quantified
/// term contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantBounds {
    pub min: u16,
    /// `None` when the repetition is unbounded.
    pub max: Option<u16>,
    pub greedy: bool,
    /// The first capturing group within the quantified term.
    pub paren_index: u16,
    /// The number of capturing groups within the quantified term.
    pub paren_count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Matches the empty string, standing in for an empty alternative.
    Empty,
    Bol,
    Eol,
    WordBoundary,
    NonWordBoundary,
    Dot,
    Digit,
    NonDigit,
    Alnum,
    NonAlnum,
    Space,
    NonSpace,
    /// A backreference by zero-based capturing group index.
    BackRef(u16),
    /// A single literal code unit. Literals read verbatim from the pattern
    /// carry their source offset so adjacent ones can be emitted as one run.
    Flat { unit: u16, source: Option<usize> },
    /// A bracket expression, by class table index.
    Class { index: u16, negated: bool },
    /// `kid|kid2`. Longer alternations nest to the right.
    Alt { kid: NodeId, kid2: NodeId },
    /// A capturing group.
    Group { paren: u16, kid: NodeId },
    NonCapturing { kid: NodeId },
    Quant { bounds: QuantBounds, kid: NodeId },
    /// A positive or negative lookahead.
    Assert { negated: bool, kid: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// The node that follows this one in its sequence.
    pub next: Option<NodeId>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an unlinked node, returning its id.
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, next: None });
        id
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next
    }

    pub fn set_next(&mut self, id: NodeId, next: NodeId) {
        self.nodes[id.0].next = Some(next);
    }

    /// Links a sequence of nodes in order, returning its head or an `Empty`
    /// node when the sequence is empty.
    pub fn chain(&mut self, terms: &[NodeId]) -> NodeId {
        for pair in terms.windows(2) {
            self.set_next(pair[0], pair[1]);
        }

        match terms.first() {
            Some(&head) => head,
            None => self.push(NodeKind::Empty),
        }
    }

    /// Iterates over a sequence starting at `head`.
    pub fn iter_chain(&self, head: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(head), move |&id| self.next(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx), node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_link_chains_in_order() {
        let mut ast = Ast::new();
        let terms = [
            ast.push(NodeKind::Bol),
            ast.push(NodeKind::Dot),
            ast.push(NodeKind::Eol),
        ];

        let head = ast.chain(&terms);
        let kinds: Vec<_> = ast.iter_chain(head).map(|id| ast.kind(id)).collect();

        assert_eq!(vec![NodeKind::Bol, NodeKind::Dot, NodeKind::Eol], kinds);
    }

    #[test]
    fn should_substitute_empty_node_for_empty_chain() {
        let mut ast = Ast::new();
        let head = ast.chain(&[]);

        assert_eq!(NodeKind::Empty, ast.kind(head));
        assert_eq!(None, ast.next(head));
    }
}
