//! Derived program metadata: leading anchors, the literal prefix, and the
//! set of possible first units

use crate::charclass;
use crate::codepointset::CodePointSet;
use crate::insn::{anchor, FirstChars, LiteralPrefix};
use crate::tree::{Node, NodeKind};
use memchr::memmem;

/// Bail out of first-chars analysis past this depth; the metadata is
/// optional and a deep tree is not worth the walk.
const MAX_FC_DEPTH: usize = 24;

/// \return the single leading anchor of the pattern, if any, walking the
/// leftmost spine through transparent nodes.
pub fn scan_anchors(root: &Node) -> u32 {
    let mut cur = root;
    let mut concat: Option<&Node> = None;
    let mut next_child = 0;
    loop {
        match cur.kind {
            NodeKind::Concatenate => {
                if !cur.children.is_empty() {
                    concat = Some(cur);
                    next_child = 0;
                }
            }
            NodeKind::Capture | NodeKind::Group | NodeKind::Greedy => {
                cur = &cur.children[0];
                concat = None;
                continue;
            }
            NodeKind::Bol => return anchor::BOL,
            NodeKind::Eol => return anchor::EOL,
            NodeKind::Beginning => return anchor::BEGINNING,
            NodeKind::Start => return anchor::START,
            NodeKind::EndZ => return anchor::ENDZ,
            NodeKind::End => return anchor::END,
            NodeKind::Boundary | NodeKind::EcmaBoundary => return anchor::BOUNDARY,
            // Zero-width nodes that guarantee nothing; continue with the
            // next sibling.
            NodeKind::Empty | NodeKind::Require => {}
            _ => return 0,
        }
        match concat {
            Some(c) if next_child < c.children.len() => {
                cur = &c.children[next_child];
                next_child += 1;
            }
            _ => return 0,
        }
    }
}

/// Collect the literal UTF-16 units every match must begin with.
pub fn literal_prefix(root: &Node) -> Option<LiteralPrefix> {
    let mut units: Vec<u32> = Vec::new();
    let mut ci = false;
    let mut cur = root;
    let mut concat: Option<&Node> = None;
    let mut next_child = 0;
    'walk: loop {
        match cur.kind {
            NodeKind::Concatenate => {
                if !cur.children.is_empty() {
                    concat = Some(cur);
                    next_child = 0;
                }
            }
            NodeKind::Capture | NodeKind::Group | NodeKind::Greedy => {
                cur = &cur.children[0];
                concat = None;
                continue;
            }
            NodeKind::One => {
                if !push_prefix_unit(&mut units, &mut ci, cur, cur.m as u32) {
                    break 'walk;
                }
            }
            NodeKind::Multi => {
                for &u in cur.data.as_ref().unwrap().iter() {
                    if !push_prefix_unit(&mut units, &mut ci, cur, u) {
                        break 'walk;
                    }
                }
            }
            NodeKind::Oneloop | NodeKind::Onelazy => {
                if cur.m > 0 {
                    let u = cur.data.as_ref().unwrap()[0];
                    for _ in 0..cur.m {
                        if !push_prefix_unit(&mut units, &mut ci, cur, u) {
                            break 'walk;
                        }
                    }
                }
                // The optional repetitions end the known prefix.
                if cur.m != cur.n {
                    break 'walk;
                }
            }
            // Zero-width assertions contribute nothing and do not end the
            // prefix.
            NodeKind::Bol
            | NodeKind::Eol
            | NodeKind::Beginning
            | NodeKind::Start
            | NodeKind::EndZ
            | NodeKind::End
            | NodeKind::Boundary
            | NodeKind::NonBoundary
            | NodeKind::EcmaBoundary
            | NodeKind::NonEcmaBoundary
            | NodeKind::Empty => {}
            _ => break 'walk,
        }
        match concat {
            Some(c) if next_child < c.children.len() => {
                cur = &c.children[next_child];
                next_child += 1;
            }
            _ => break 'walk,
        }
    }

    if units.is_empty() {
        return None;
    }
    // The substring searcher runs over UTF-8 bytes; an unpaired surrogate
    // has no encoding, so stop the prefix there.
    let mut text = String::new();
    let mut iter = units.iter().copied().peekable();
    let mut used = 0;
    while let Some(u) = iter.next() {
        let c = if (0xD800..0xDC00).contains(&u) {
            match iter.peek() {
                Some(&lo) if (0xDC00..0xE000).contains(&lo) => {
                    iter.next();
                    used += 1;
                    char::from_u32(0x10000 + ((u - 0xD800) << 10) + (lo - 0xDC00))
                }
                _ => None,
            }
        } else {
            char::from_u32(u)
        };
        match c {
            Some(c) => {
                text.push(c);
                used += 1;
            }
            None => break,
        }
    }
    if used == 0 {
        return None;
    }
    units.truncate(used);
    let finder = memmem::Finder::new(text.as_bytes()).into_owned();
    Some(LiteralPrefix {
        units: units.into_boxed_slice(),
        case_insensitive: ci,
        finder,
    })
}

fn push_prefix_unit(units: &mut Vec<u32>, ci: &mut bool, node: &Node, unit: u32) -> bool {
    if node.options.right_to_left {
        return false;
    }
    if units.is_empty() {
        *ci = node.options.ignore_case;
    } else if *ci != node.options.ignore_case {
        return false;
    }
    units.push(unit);
    true
}

/// Compute the set of units a match could start with. \return None when
/// the analysis cannot be precise.
pub fn first_chars(root: &Node) -> Option<FirstChars> {
    let (set, ci, _complete) = node_fc(root, 0)?;
    if set.is_empty() {
        return None;
    }
    Some(FirstChars {
        set: charclass::set_payload(&set).into_boxed_slice(),
        case_insensitive: ci,
    })
}

/// \return (possible first units, any contributor case-insensitive,
/// whether the node always consumes at least one unit), or None to bail.
fn node_fc(node: &Node, depth: usize) -> Option<(CodePointSet, bool, bool)> {
    if depth > MAX_FC_DEPTH || node.options.right_to_left {
        return None;
    }
    let one = |u: u32| {
        let mut s = CodePointSet::new();
        s.add_one(u);
        s
    };
    match node.kind {
        NodeKind::One => Some((one(node.m as u32), node.options.ignore_case, true)),
        NodeKind::Notone => Some((
            one(node.m as u32).inverted(),
            node.options.ignore_case,
            true,
        )),
        NodeKind::Multi => Some((
            one(node.data.as_ref().unwrap()[0]),
            node.options.ignore_case,
            true,
        )),
        NodeKind::Set => {
            let cps = charclass::payload_ranges(node.data.as_ref().unwrap())?;
            Some((cps, node.options.ignore_case, true))
        }
        NodeKind::Oneloop | NodeKind::Onelazy => Some((
            one(node.data.as_ref().unwrap()[0]),
            node.options.ignore_case,
            node.m > 0,
        )),
        NodeKind::Notoneloop | NodeKind::Notonelazy => Some((
            one(node.data.as_ref().unwrap()[0]).inverted(),
            node.options.ignore_case,
            node.m > 0,
        )),
        NodeKind::Setloop | NodeKind::Setlazy => {
            let cps = charclass::payload_ranges(node.data.as_ref().unwrap())?;
            Some((cps, node.options.ignore_case, node.m > 0))
        }
        NodeKind::Concatenate => {
            let mut total = CodePointSet::new();
            let mut ci = false;
            for child in &node.children {
                let (set, child_ci, complete) = node_fc(child, depth + 1)?;
                ci |= child_ci && !set.is_empty();
                total.add_set(set);
                if complete {
                    return Some((total, ci, true));
                }
            }
            Some((total, ci, false))
        }
        NodeKind::Alternate => {
            let mut total = CodePointSet::new();
            let mut ci = false;
            let mut complete = true;
            for child in &node.children {
                let (set, child_ci, child_complete) = node_fc(child, depth + 1)?;
                ci |= child_ci && !set.is_empty();
                total.add_set(set);
                complete &= child_complete;
            }
            Some((total, ci, complete))
        }
        NodeKind::Capture | NodeKind::Group | NodeKind::Greedy => {
            node_fc(&node.children[0], depth + 1)
        }
        NodeKind::Loop | NodeKind::Lazyloop => {
            let (set, ci, complete) = node_fc(&node.children[0], depth + 1)?;
            Some((set, ci, complete && node.m > 0))
        }
        // Assertions and anchors consume nothing and guarantee nothing
        // about the first unit.
        NodeKind::Require
        | NodeKind::Prevent
        | NodeKind::Bol
        | NodeKind::Eol
        | NodeKind::Beginning
        | NodeKind::Start
        | NodeKind::EndZ
        | NodeKind::End
        | NodeKind::Boundary
        | NodeKind::NonBoundary
        | NodeKind::EcmaBoundary
        | NodeKind::NonEcmaBoundary
        | NodeKind::Empty
        | NodeKind::ResetMatchStart => Some((CodePointSet::new(), false, false)),
        // A branch that can never match contributes nothing but is
        // "complete": it never falls through to later units.
        NodeKind::Nothing => Some((CodePointSet::new(), false, true)),
        NodeKind::Ref
        | NodeKind::Testref
        | NodeKind::Testgroup
        | NodeKind::DefinitionGroup
        | NodeKind::CallSubroutine
        | NodeKind::BacktrackingVerb => None,
    }
}
