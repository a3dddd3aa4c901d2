//! Writer: linearizes a regex tree into the flat bytecode program

use crate::insn::{op, CompiledRegex};
use crate::prefix;
use crate::tree::{Node, NodeKind, RegexTree, INFINITE};
use std::collections::HashMap;

/// Type which wraps up the context needed to emit a program.
struct Writer {
    emitted: Vec<i32>,
    patches: Vec<usize>,
    string_hash: HashMap<Box<[u32]>, i32>,
    string_table: Vec<Box<[u32]>>,
    track_count: usize,
    caps: Option<HashMap<i32, i32>>,
    cap_positions: Vec<i32>,
}

impl Writer {
    /// \return the offset of the next instruction emitted.
    fn cur_pos(&self) -> i32 {
        self.emitted.len() as i32
    }

    fn emit1(&mut self, code: i32) {
        if op::backtracks(code) {
            self.track_count += 1;
        }
        self.emitted.push(code);
    }

    fn emit2(&mut self, code: i32, operand: i32) {
        self.emit1(code);
        self.emitted.push(operand);
    }

    fn emit3(&mut self, code: i32, operand0: i32, operand1: i32) {
        self.emit1(code);
        self.emitted.push(operand0);
        self.emitted.push(operand1);
    }

    /// Remember the position of a forward jump whose target is patched
    /// later.
    fn push_patch(&mut self) {
        self.patches.push(self.emitted.len());
    }

    fn pop_patch(&mut self) -> usize {
        self.patches.pop().expect("Patch stack underflow")
    }

    /// Point the jump emitted at \p jump_pos to \p target.
    fn patch_jump(&mut self, jump_pos: usize, target: i32) {
        debug_assert!(op::size(self.emitted[jump_pos]) >= 2, "Not a jump");
        self.emitted[jump_pos + 1] = target;
    }

    /// Intern a string-table entry, deduplicated.
    fn string_code(&mut self, data: &[u32]) -> i32 {
        if let Some(&idx) = self.string_hash.get(data) {
            return idx;
        }
        let idx = self.string_table.len() as i32;
        self.string_table.push(data.into());
        self.string_hash.insert(data.into(), idx);
        idx
    }

    fn map_capnum(&self, slot: i32) -> i32 {
        match (&self.caps, slot) {
            (_, -1) => -1,
            (Some(map), _) => *map.get(&slot).expect("Unmapped capture slot"),
            (None, _) => slot,
        }
    }

    /// RTL and case-insensitivity ride along as flag bits on the
    /// character-matching instructions.
    fn bits(node: &Node) -> i32 {
        let mut bits = 0;
        if node.options.right_to_left {
            bits |= op::RTL;
        }
        if node.options.ignore_case {
            bits |= op::CI;
        }
        bits
    }

    /// Walk the tree depth first with an explicit stack, emitting each
    /// node's fragments around its children.
    fn emit_tree(&mut self, root: &Node) {
        let mut stack: Vec<(&Node, usize)> = Vec::new();
        let mut cur = root;
        let mut child = 0;
        loop {
            if cur.children.is_empty() {
                self.emit_leaf(cur);
            } else if child < cur.children.len() {
                self.emit_before(cur, child);
                stack.push((cur, child));
                cur = &cur.children[child];
                child = 0;
                continue;
            }
            let Some((parent, idx)) = stack.pop() else {
                break;
            };
            self.emit_after(parent, idx);
            cur = parent;
            child = idx + 1;
        }
    }

    fn emit_leaf(&mut self, node: &Node) {
        let bits = Self::bits(node);
        match node.kind {
            NodeKind::Empty | NodeKind::Concatenate | NodeKind::Group => {}
            NodeKind::Nothing => self.emit1(op::NOTHING),
            NodeKind::One => self.emit2(op::ONE | bits, node.m),
            NodeKind::Notone => self.emit2(op::NOTONE | bits, node.m),
            NodeKind::Set => {
                let code = self.string_code(node.data.as_ref().unwrap());
                self.emit2(op::SET | bits, code);
            }
            NodeKind::Multi => {
                let code = self.string_code(node.data.as_ref().unwrap());
                self.emit2(op::MULTI | bits, code);
            }
            NodeKind::Ref => {
                let slot = self.map_capnum(node.m);
                self.emit2(op::REF | bits, slot);
            }
            NodeKind::Oneloop
            | NodeKind::Onelazy
            | NodeKind::Notoneloop
            | NodeKind::Notonelazy
            | NodeKind::Setloop
            | NodeKind::Setlazy => self.emit_char_loop(node, bits),
            NodeKind::Bol => self.emit1(op::BOL),
            NodeKind::Eol => self.emit1(op::EOL),
            NodeKind::Beginning => self.emit1(op::BEGINNING),
            NodeKind::Start => self.emit1(op::START),
            NodeKind::EndZ => self.emit1(op::ENDZ),
            NodeKind::End => self.emit1(op::END),
            NodeKind::Boundary => self.emit1(op::BOUNDARY),
            NodeKind::NonBoundary => self.emit1(op::NONBOUNDARY),
            NodeKind::EcmaBoundary => self.emit1(op::ECMABOUNDARY),
            NodeKind::NonEcmaBoundary => self.emit1(op::NONECMABOUNDARY),
            NodeKind::ResetMatchStart => self.emit1(op::RESETMATCHSTART),
            NodeKind::BacktrackingVerb => self.emit2(op::BACKTRACKINGVERB, node.m),
            NodeKind::CallSubroutine => {
                let slot = self.map_capnum(node.m);
                self.emit2(op::CALLSUBROUTINE, slot);
            }
            NodeKind::Alternate
            | NodeKind::Capture
            | NodeKind::Require
            | NodeKind::Prevent
            | NodeKind::Greedy
            | NodeKind::Testref
            | NodeKind::Testgroup
            | NodeKind::DefinitionGroup
            | NodeKind::Loop
            | NodeKind::Lazyloop => {
                panic!("Interior node {:?} has no children", node.kind)
            }
        }
    }

    /// A quantified single-unit matcher: a fixed repetition for the
    /// mandatory part, then the loop form for the remainder.
    fn emit_char_loop(&mut self, node: &Node, bits: i32) {
        let data = node.data.as_ref().unwrap();
        let (rep_op, loop_op) = match node.kind {
            NodeKind::Oneloop => (op::ONEREP, op::ONELOOP),
            NodeKind::Onelazy => (op::ONEREP, op::ONELAZY),
            NodeKind::Notoneloop => (op::NOTONEREP, op::NOTONELOOP),
            NodeKind::Notonelazy => (op::NOTONEREP, op::NOTONELAZY),
            NodeKind::Setloop => (op::SETREP, op::SETLOOP),
            NodeKind::Setlazy => (op::SETREP, op::SETLAZY),
            _ => unreachable!(),
        };
        let operand = if matches!(node.kind, NodeKind::Setloop | NodeKind::Setlazy) {
            self.string_code(data)
        } else {
            data[0] as i32
        };
        if node.m > 0 {
            self.emit3(rep_op | bits, operand, node.m);
        }
        if node.n > node.m {
            let remaining = if node.n == INFINITE {
                i32::MAX
            } else {
                node.n - node.m
            };
            self.emit3(loop_op | bits, operand, remaining);
        }
    }

    fn emit_before(&mut self, node: &Node, child: usize) {
        match node.kind {
            NodeKind::Concatenate | NodeKind::Group => {}
            NodeKind::Alternate => {
                if child < node.children.len() - 1 {
                    self.push_patch();
                    self.emit2(op::LAZYBRANCH, 0);
                }
            }
            NodeKind::Capture => {
                let slot = self.map_capnum(node.m);
                self.cap_positions[slot as usize] = self.cur_pos();
                self.emit1(op::SETMARK);
            }
            NodeKind::Require => {
                self.emit1(op::SETJUMP);
                self.emit1(op::SETMARK);
            }
            NodeKind::Prevent => {
                self.emit1(op::SETJUMP);
                self.push_patch();
                self.emit2(op::LAZYBRANCH, 0);
            }
            NodeKind::Greedy => self.emit1(op::SETJUMP),
            NodeKind::Loop | NodeKind::Lazyloop => self.emit_loop_head(node),
            NodeKind::Testref => {
                if child == 0 {
                    self.emit1(op::SETJUMP);
                    self.push_patch();
                    self.emit2(op::LAZYBRANCH, 0);
                    let slot = self.map_capnum(node.m);
                    self.emit2(op::TESTREF, slot);
                    self.emit1(op::FOREJUMP);
                }
            }
            NodeKind::Testgroup => {
                if child == 0 {
                    self.emit1(op::SETJUMP);
                    self.emit1(op::SETMARK);
                    self.push_patch();
                    self.emit2(op::LAZYBRANCH, 0);
                }
            }
            NodeKind::DefinitionGroup => {
                self.push_patch();
                self.emit2(op::GOTO, 0);
            }
            _ => panic!("Node {:?} has children", node.kind),
        }
    }

    fn emit_loop_head(&mut self, node: &Node) {
        // Counted loops track an iteration count; unbounded min 0/1 loops
        // only need a position mark.
        if node.n < INFINITE || node.m > 1 {
            if node.m == 0 {
                self.emit2(op::NULLCOUNT, 0);
            } else {
                self.emit2(op::SETCOUNT, 1 - node.m);
            }
        } else if node.m == 0 {
            self.emit1(op::NULLMARK);
        } else {
            self.emit1(op::SETMARK);
        }
        if node.m == 0 {
            // Early exit straight to the loop's branch decision.
            self.push_patch();
            self.emit2(op::GOTO, 0);
        }
        self.patches.push(self.emitted.len());
    }

    fn emit_after(&mut self, node: &Node, child: usize) {
        match node.kind {
            NodeKind::Concatenate | NodeKind::Group => {}
            NodeKind::Alternate => {
                let last = node.children.len() - 1;
                if child < last {
                    let lazybranch = self.pop_patch();
                    self.push_patch();
                    self.emit2(op::GOTO, 0);
                    let target = self.cur_pos();
                    self.patch_jump(lazybranch, target);
                } else {
                    let target = self.cur_pos();
                    for _ in 0..child {
                        let goto_pos = self.pop_patch();
                        self.patch_jump(goto_pos, target);
                    }
                }
            }
            NodeKind::Capture => {
                let open = self.map_capnum(node.m);
                let uncap = self.map_capnum(node.n);
                self.emit3(op::CAPTUREMARK, open, uncap);
            }
            NodeKind::Require => {
                self.emit1(op::GETMARK);
                self.emit1(op::FOREJUMP);
            }
            NodeKind::Prevent => {
                self.emit1(op::BACKJUMP);
                let lazybranch = self.pop_patch();
                let target = self.cur_pos();
                self.patch_jump(lazybranch, target);
                self.emit1(op::FOREJUMP);
            }
            NodeKind::Greedy => self.emit1(op::FOREJUMP),
            NodeKind::Loop | NodeKind::Lazyloop => self.emit_loop_tail(node),
            NodeKind::Testref => match child {
                0 => {
                    let lazybranch = self.pop_patch();
                    self.push_patch();
                    self.emit2(op::GOTO, 0);
                    let else_entry = self.cur_pos();
                    self.patch_jump(lazybranch, else_entry);
                    self.emit1(op::FOREJUMP);
                    if node.children.len() <= 1 {
                        let goto_pos = self.pop_patch();
                        let target = self.cur_pos();
                        self.patch_jump(goto_pos, target);
                    }
                }
                _ => {
                    let goto_pos = self.pop_patch();
                    let target = self.cur_pos();
                    self.patch_jump(goto_pos, target);
                }
            },
            NodeKind::Testgroup => match child {
                0 => {
                    // Condition done: restore position, discard its
                    // backtracking.
                    self.emit1(op::GETMARK);
                    self.emit1(op::FOREJUMP);
                }
                1 => {
                    let lazybranch = self.pop_patch();
                    self.push_patch();
                    self.emit2(op::GOTO, 0);
                    let else_entry = self.cur_pos();
                    self.patch_jump(lazybranch, else_entry);
                    self.emit1(op::GETMARK);
                    self.emit1(op::FOREJUMP);
                    if node.children.len() <= 2 {
                        let goto_pos = self.pop_patch();
                        let target = self.cur_pos();
                        self.patch_jump(goto_pos, target);
                    }
                }
                _ => {
                    let goto_pos = self.pop_patch();
                    let target = self.cur_pos();
                    self.patch_jump(goto_pos, target);
                }
            },
            NodeKind::DefinitionGroup => {
                let goto_pos = self.pop_patch();
                let target = self.cur_pos();
                self.patch_jump(goto_pos, target);
            }
            _ => panic!("Node {:?} has children", node.kind),
        }
    }

    fn emit_loop_tail(&mut self, node: &Node) {
        let body_start = self.patches.pop().expect("Patch stack underflow") as i32;
        let branch_pos = self.cur_pos();
        let lazy = if node.kind == NodeKind::Lazyloop { 1 } else { 0 };
        if node.n < INFINITE || node.m > 1 {
            let remaining = if node.n == INFINITE {
                i32::MAX
            } else {
                node.n - node.m
            };
            self.emit3(op::BRANCHCOUNT + lazy, body_start, remaining);
        } else {
            self.emit2(op::BRANCHMARK + lazy, body_start);
        }
        if node.m == 0 {
            // The zero-iteration entry jumps straight to the branch op.
            let goto_pos = self.pop_patch();
            self.patch_jump(goto_pos, branch_pos);
        }
    }
}

/// Compile a parsed tree into an immutable program.
pub fn write(tree: &RegexTree) -> CompiledRegex {
    let (caps, cap_size) = match &tree.capnumlist {
        Some(list) => {
            let map: HashMap<i32, i32> = list
                .iter()
                .enumerate()
                .map(|(i, &slot)| (slot, i as i32))
                .collect();
            (Some(map), list.len())
        }
        None => (None, tree.captop as usize),
    };

    let mut w = Writer {
        emitted: Vec::new(),
        patches: Vec::new(),
        string_hash: HashMap::new(),
        string_table: Vec::new(),
        track_count: 0,
        caps,
        cap_positions: vec![-1; cap_size],
    };

    // The program proper is wrapped in a Lazybranch so a failed attempt
    // can advance the scan position, and ends with Stop.
    w.push_patch();
    w.emit2(op::LAZYBRANCH, 0);
    w.emit_tree(&tree.root);
    let end = w.cur_pos();
    let root_branch = w.pop_patch();
    w.patch_jump(root_branch, end);
    w.emit1(op::STOP);
    debug_assert!(w.patches.is_empty(), "Unbalanced patch stack");

    let anchors = prefix::scan_anchors(&tree.root);
    let fc_prefix = prefix::first_chars(&tree.root);
    let literal = prefix::literal_prefix(&tree.root);

    CompiledRegex {
        codes: w.emitted,
        strings: w.string_table,
        track_count: w.track_count,
        caps: w.caps,
        cap_size,
        cap_positions: w.cap_positions,
        fc_prefix,
        prefix: literal,
        anchors,
        right_to_left: tree.options.right_to_left,
    }
}
