//! The regex AST produced by the parser and consumed by the writer

use crate::options::Options;
use core::fmt;
use std::collections::HashMap;

/// Sentinel for an unbounded quantifier maximum.
pub const INFINITE: i32 = i32::MAX;

/// Backtracking-verb codes carried in a `BacktrackingVerb` node's `m`.
pub mod verb {
    pub const ACCEPT: i32 = 0;
    pub const COMMIT: i32 = 1;
    pub const PRUNE: i32 = 2;
    pub const SKIP: i32 = 3;
    pub const THEN: i32 = 4;
}

/// The node discriminant.
///
/// Leaves match text or assert a position; interior kinds structure the
/// tree. `Group` is a transparent wrapper that emits nothing of its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// One literal UTF-16 unit, in `m`.
    One,
    /// Any unit except `m`.
    Notone,
    /// A unit in the serialized set carried in `data`.
    Set,
    /// A literal run of units, in `data`.
    Multi,
    /// Backreference to slot `m`.
    Ref,

    // Single-unit loops: min in `m`, max in `n`; the unit (or set) lives
    // in `data`.
    Oneloop,
    Onelazy,
    Notoneloop,
    Notonelazy,
    Setloop,
    Setlazy,

    Concatenate,
    Alternate,
    /// Transparent grouping, e.g. `(?:...)`.
    Group,
    /// Capturing group; external slot in `m`, unused balancing slot `n`
    /// is -1.
    Capture,
    /// Positive lookaround. Direction comes from the children's
    /// right-to-left option.
    Require,
    /// Negative lookaround.
    Prevent,
    /// Atomic (possessive) group.
    Greedy,
    /// Conditional on whether slot `m` captured; children are then/else.
    Testref,
    /// Conditional on an assertion; children are condition/then/else.
    Testgroup,
    /// `(?(DEFINE)...)`: present in the program but jumped over.
    DefinitionGroup,
    /// General quantifier around the single child; min `m`, max `n`.
    Loop,
    Lazyloop,
    /// Subroutine call to the group at slot `m` (0 = whole pattern).
    CallSubroutine,
    /// A `(*VERB)`; code in `m`.
    BacktrackingVerb,
    /// `\K`.
    ResetMatchStart,

    // Anchors.
    Bol,
    Eol,
    Beginning,
    End,
    EndZ,
    Start,
    Boundary,
    NonBoundary,
    EcmaBoundary,
    NonEcmaBoundary,

    /// Matches the empty string.
    Empty,
    /// Never matches.
    Nothing,
}

/// One AST node. `m` and `n` are small integer payloads whose meaning
/// depends on the kind (character, min, max, slot, verb code); `data`
/// carries a literal run or a serialized set. Nodes are mutated only while
/// parsing is active and are read-only once the tree is finished.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub m: i32,
    pub n: i32,
    pub data: Option<Box<[u32]>>,
    pub options: Options,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, options: Options) -> Node {
        Node {
            kind,
            m: 0,
            n: 0,
            data: None,
            options,
            children: Vec::new(),
        }
    }

    pub fn one(unit: u32, options: Options) -> Node {
        let mut n = Node::new(NodeKind::One, options);
        n.m = unit as i32;
        n
    }

    pub fn notone(unit: u32, options: Options) -> Node {
        let mut n = Node::new(NodeKind::Notone, options);
        n.m = unit as i32;
        n
    }

    pub fn multi(units: Vec<u32>, options: Options) -> Node {
        debug_assert!(units.len() > 1, "Multi must hold at least two units");
        let mut n = Node::new(NodeKind::Multi, options);
        n.data = Some(units.into_boxed_slice());
        n
    }

    pub fn set(payload: Vec<u32>, options: Options) -> Node {
        let mut n = Node::new(NodeKind::Set, options);
        n.data = Some(payload.into_boxed_slice());
        n
    }

    pub fn backref(slot: i32, options: Options) -> Node {
        let mut n = Node::new(NodeKind::Ref, options);
        n.m = slot;
        n
    }

    pub fn capture(slot: i32, options: Options) -> Node {
        let mut n = Node::new(NodeKind::Capture, options);
        n.m = slot;
        n.n = -1;
        n
    }

    pub fn with_child(mut self, child: Node) -> Node {
        self.children.push(child);
        self
    }

    /// \return whether this is a single-unit matcher that a quantifier
    /// turns into one of the fused loop kinds.
    pub fn is_one_unit(&self) -> bool {
        matches!(self.kind, NodeKind::One | NodeKind::Notone | NodeKind::Set)
    }

    /// \return whether this node is itself the product of a quantifier.
    pub fn is_quantifier(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Oneloop
                | NodeKind::Onelazy
                | NodeKind::Notoneloop
                | NodeKind::Notonelazy
                | NodeKind::Setloop
                | NodeKind::Setlazy
                | NodeKind::Loop
                | NodeKind::Lazyloop
        )
    }
}

fn display_node(node: &Node, depth: usize, f: &mut fmt::Formatter) -> fmt::Result {
    for _ in 0..depth {
        write!(f, "..")?;
    }
    write!(f, "{:?}", node.kind)?;
    match node.kind {
        NodeKind::One | NodeKind::Notone => write!(f, " 0x{:x}", node.m)?,
        NodeKind::Ref | NodeKind::Capture | NodeKind::CallSubroutine | NodeKind::Testref => {
            write!(f, " #{}", node.m)?
        }
        NodeKind::Loop
        | NodeKind::Lazyloop
        | NodeKind::Oneloop
        | NodeKind::Onelazy
        | NodeKind::Notoneloop
        | NodeKind::Notonelazy
        | NodeKind::Setloop
        | NodeKind::Setlazy => {
            if node.n == INFINITE {
                write!(f, " {{{},}}", node.m)?
            } else {
                write!(f, " {{{},{}}}", node.m, node.n)?
            }
        }
        NodeKind::BacktrackingVerb => write!(f, " verb {}", node.m)?,
        _ => {}
    }
    if let Some(data) = &node.data {
        write!(f, " [")?;
        for (i, u) in data.iter().take(16).enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:x}", u)?;
        }
        if data.len() > 16 {
            write!(f, " ...")?;
        }
        write!(f, "]")?;
    }
    writeln!(f)?;
    for child in &node.children {
        display_node(child, depth + 1, f)?;
    }
    Ok(())
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        display_node(self, 0, f)
    }
}

/// A parsed pattern: the node tree plus the capture bookkeeping the writer
/// needs to compute its dense slot remap.
#[derive(Debug, Clone)]
pub struct RegexTree {
    /// The root; always a `Capture` for slot 0 wrapping the pattern.
    pub root: Node,

    /// External slot number -> byte position of its opening paren.
    pub caps: HashMap<i32, usize>,

    /// Group name -> external slot number.
    pub capnames: HashMap<String, i32>,

    /// Group names in declaration order.
    pub capnamelist: Vec<String>,

    /// One past the maximum observed slot.
    pub captop: i32,

    /// Sorted list of used slots, present only when non-contiguous.
    pub capnumlist: Option<Vec<i32>>,

    /// The options the pattern was compiled with (after modifiers and
    /// leading pragmas).
    pub options: Options,
}

impl fmt::Display for RegexTree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        display_node(&self.root, 0, f)
    }
}
