//! Rewrites explicit UTF-8 byte-range sequences into UTF-16 sets
//!
//! Patterns written against UTF-8 bytes spell multi-byte characters as
//! concatenations like `[\xC2-\xDF][\x80-\xBF]`. The matcher operates on
//! UTF-16 code units, so this pass replaces each recognized byte-sequence
//! shape with the equivalent single set (or surrogate pair of sets for
//! four-byte sequences). Anything unrecognized is left exactly as parsed;
//! the rewrite is a canonicalization, not a requirement for correctness.

use crate::charclass;
use crate::tree::{Node, NodeKind, RegexTree};

/// A byte-level token read from one concatenation child.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Tok {
    Byte(u8),
    Range(u8, u8),
}

/// The replacement for a completed sequence: one UTF-16 range, or a high
/// surrogate range followed by the low surrogate range.
#[derive(Debug, Copy, Clone)]
struct Rewrite {
    first: (u32, u32),
    second: Option<(u32, u32)>,
}

const LOW_SURROGATES: (u32, u32) = (0xDC00, 0xDFFF);

/// Recognizer states. The machine is a pure value; `step` consumes one
/// token and returns the next state, a completed rewrite, or a dead end.
#[derive(Debug, Copy, Clone)]
enum State {
    Start,
    /// Seen \xE0; expect [\xA0-\xBF].
    LeadE0,
    /// Seen \xED; expect [\x80-\x9F].
    LeadEd,
    /// Seen \xF0; expect [\x90-\xBF].
    LeadF0,
    /// Seen \xF4; expect [\x80-\x8F].
    LeadF4,
    /// Expect `remaining` more continuation ranges, then rewrite.
    Tail { remaining: u8, out: Rewrite },
}

#[derive(Debug, Copy, Clone)]
enum Step {
    Next(State),
    Done(Rewrite),
    Dead,
}

fn single(first: u32, last: u32) -> Rewrite {
    Rewrite {
        first: (first, last),
        second: None,
    }
}

fn pair(first: u32, last: u32) -> Rewrite {
    Rewrite {
        first: (first, last),
        second: Some(LOW_SURROGATES),
    }
}

fn tail(remaining: u8, out: Rewrite) -> Step {
    Step::Next(State::Tail { remaining, out })
}

fn step(state: State, tok: Tok) -> Step {
    match (state, tok) {
        (State::Start, Tok::Range(0xC2, 0xDF)) => tail(1, single(0x80, 0x7FF)),
        (State::Start, Tok::Byte(0xE0)) => Step::Next(State::LeadE0),
        (State::Start, Tok::Range(0xE1, 0xEC)) => tail(2, single(0x1000, 0xCFFF)),
        (State::Start, Tok::Byte(0xED)) => Step::Next(State::LeadEd),
        (State::Start, Tok::Range(0xEE, 0xEF)) => tail(2, single(0xE000, 0xFFFF)),
        (State::Start, Tok::Byte(0xF0)) => Step::Next(State::LeadF0),
        (State::Start, Tok::Range(0xF1, 0xF3)) => tail(3, pair(0xD8C0, 0xDBBF)),
        (State::Start, Tok::Byte(0xF4)) => Step::Next(State::LeadF4),
        (State::LeadE0, Tok::Range(0xA0, 0xBF)) => tail(1, single(0x800, 0xFFF)),
        (State::LeadEd, Tok::Range(0x80, 0x9F)) => tail(1, single(0xD000, 0xD7FF)),
        (State::LeadF0, Tok::Range(0x90, 0xBF)) => tail(2, pair(0xD800, 0xD8BF)),
        (State::LeadF4, Tok::Range(0x80, 0x8F)) => tail(2, pair(0xDBC0, 0xDBFF)),
        (State::Tail { remaining: 1, out }, Tok::Range(0x80, 0xBF)) => Step::Done(out),
        (State::Tail { remaining, out }, Tok::Range(0x80, 0xBF)) => tail(remaining - 1, out),
        _ => Step::Dead,
    }
}

/// Read a node as a byte token, with a repetition count for unrolled
/// loops. Case-insensitive and right-to-left nodes never participate;
/// case folding has already rewritten their byte values.
fn classify(node: &Node) -> Option<(Tok, i32)> {
    if node.options.ignore_case || node.options.right_to_left {
        return None;
    }
    match node.kind {
        NodeKind::One if node.m <= 0xFF => Some((Tok::Byte(node.m as u8), 1)),
        NodeKind::Set => {
            let (lo, hi) = charclass::single_range(node.data.as_ref().unwrap())?;
            (hi <= 0xFF).then(|| (Tok::Range(lo as u8, hi as u8), 1))
        }
        NodeKind::Setloop if node.m == node.n && (1..=3).contains(&node.m) => {
            let (lo, hi) = charclass::single_range(node.data.as_ref().unwrap())?;
            (hi <= 0xFF).then(|| (Tok::Range(lo as u8, hi as u8), node.m))
        }
        _ => None,
    }
}

/// Try to recognize one full sequence beginning at \p start. \return the
/// number of children consumed and the rewrite, or None with no effect.
fn try_match_at(children: &[Node], start: usize) -> Option<(usize, Rewrite)> {
    let mut state = State::Start;
    for (offset, child) in children[start..].iter().enumerate() {
        let (tok, reps) = classify(child)?;
        for rep in 0..reps {
            match step(state, tok) {
                Step::Next(next) => state = next,
                Step::Done(out) => {
                    // A loop child may not be split across the boundary.
                    if rep + 1 != reps {
                        return None;
                    }
                    return Some((offset + 1, out));
                }
                Step::Dead => return None,
            }
        }
    }
    None
}

fn rewrite_nodes(out: Rewrite, template: &Node) -> Vec<Node> {
    let opts = template.options;
    let mut nodes = vec![Node::set(
        charclass::range_payload(out.first.0, out.first.1),
        opts,
    )];
    if let Some((lo, hi)) = out.second {
        nodes.push(Node::set(charclass::range_payload(lo, hi), opts));
    }
    nodes
}

fn transform_children(children: &mut Vec<Node>) {
    let mut i = 0;
    while i < children.len() {
        match try_match_at(children, i) {
            Some((consumed, out)) => {
                let replacement = rewrite_nodes(out, &children[i]);
                let advance = replacement.len();
                children.splice(i..i + consumed, replacement);
                i += advance;
            }
            None => i += 1,
        }
    }
}

/// Apply the rewrite to every concatenation in the tree.
pub fn convert_tree(tree: &mut RegexTree) {
    let mut work: Vec<&mut Node> = vec![&mut tree.root];
    while let Some(node) = work.pop() {
        if node.kind == NodeKind::Concatenate {
            transform_children(&mut node.children);
        }
        work.extend(node.children.iter_mut());
    }
}
