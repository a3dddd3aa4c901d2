//! Parser from delimited patterns to the regex tree

use crate::charclass::{self, CharClass, ClassKind};
use crate::error::{Error, ErrorKind};
use crate::options::{Bsr, Newline, Options};
use crate::preparse;
use crate::tree::{verb, Node, NodeKind, RegexTree, INFINITE};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::mem;

/// Append a code point to a vector of UTF-16 units, folding case first if
/// requested.
fn push_units(units: &mut Vec<u32>, cp: u32, fold_case: bool) {
    let cp = if fold_case { charclass::fold(cp) } else { cp };
    if cp <= 0xFFFF {
        units.push(cp);
    } else {
        let v = cp - 0x10000;
        units.push(0xD800 + (v >> 10));
        units.push(0xDC00 + (v & 0x3FF));
    }
}

/// Make a node from a finished run of siblings.
fn make_concat(mut nodes: Vec<Node>, options: Options) -> Node {
    match nodes.len() {
        0 => Node::new(NodeKind::Empty, options),
        1 => nodes.pop().unwrap(),
        _ => {
            let mut n = Node::new(NodeKind::Concatenate, options);
            n.children = nodes;
            n
        }
    }
}

fn make_alternate(mut branches: Vec<Node>, options: Options) -> Node {
    debug_assert!(!branches.is_empty());
    if branches.len() == 1 {
        branches.pop().unwrap()
    } else {
        let mut n = Node::new(NodeKind::Alternate, options);
        n.children = branches;
        n
    }
}

/// What kind of group an open paren started.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum GroupKind {
    Capture(i32),
    Group,
    Require,
    Prevent,
    Greedy,
    Testref(i32),
    Testgroup,
    Define,
}

/// Branch-reset accounting for one `(?|...)` group.
#[derive(Debug, Copy, Clone)]
struct BranchReset {
    start_autocap: i32,
    max_autocap: i32,
}

/// One open group during the main scan. The previous group's siblings are
/// parked here and restored when the matching close paren arrives, so
/// nesting depth lives on this explicit stack rather than the host stack.
#[derive(Debug)]
struct GroupFrame {
    kind: GroupKind,
    open_pos: usize,
    saved_options: Options,
    branch_reset: Option<BranchReset>,
    concat: Vec<Node>,
    alternation: Vec<Node>,
}

/// The parser. One instance performs the capture prescan and then the main
/// scan over the same body.
struct Parser<'a> {
    body: &'a str,
    body_offset: usize,
    pos: usize,
    options: Options,
    initial_options: Options,

    // Main-scan registers.
    frames: Vec<GroupFrame>,
    concat: Vec<Node>,
    alternation: Vec<Node>,
    unit: Option<Node>,
    last_was_quantifier: bool,

    // Capture bookkeeping (built by the prescan, read by the main scan).
    autocap: i32,
    caps: HashMap<i32, usize>,
    capnames: HashMap<String, i32>,
    capnamelist: Vec<String>,
    captop: i32,
    ignore_next_paren: bool,

    // Prescan scratch: named groups awaiting slots, name per slot for
    // collision checks, and the branch-reset stack.
    pending_names: Vec<(String, usize)>,
    slot_names: HashMap<i32, String>,
    prescan_frames: SmallVec<[Option<BranchReset>; 8]>,

    // Capture-group open positions sorted by position, for resolving
    // relative subroutine calls.
    cap_positions: Vec<(usize, i32)>,
}

impl<'a> Parser<'a> {
    fn new(body: &'a str, body_offset: usize, options: Options) -> Parser<'a> {
        Parser {
            body,
            body_offset,
            pos: 0,
            options,
            initial_options: options,
            frames: Vec::new(),
            concat: Vec::new(),
            alternation: Vec::new(),
            unit: None,
            last_was_quantifier: false,
            autocap: 1,
            caps: HashMap::new(),
            capnames: HashMap::new(),
            capnamelist: Vec::new(),
            captop: 0,
            ignore_next_paren: false,
            pending_names: Vec::new(),
            slot_names: HashMap::new(),
            prescan_frames: SmallVec::new(),
            cap_positions: Vec::new(),
        }
    }

    // Cursor helpers.

    fn rest(&self) -> &str {
        &self.body[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.rest().chars().next()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Consume a character which the caller has already peeked.
    fn consume(&mut self, c: char) {
        let nc = self.bump();
        debug_assert!(nc == Some(c), "char was not next");
    }

    /// If our contents begin with the char \p c, consume it and return true.
    fn try_consume(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    /// If our contents begin with the string \p s, consume it and return
    /// true.
    fn try_consume_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// \return the current offset into the raw input.
    fn offset(&self) -> usize {
        self.body_offset + self.pos
    }

    fn err<T>(&self, kind: ErrorKind) -> Result<T, Error> {
        Err(Error::new(kind, self.offset()))
    }

    fn err_at<T>(&self, kind: ErrorKind, abs_offset: usize) -> Result<T, Error> {
        Err(Error::new(kind, abs_offset))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.body.len()
    }

    /// Scan a run of decimal digits, saturating on overflow.
    fn scan_decimal(&mut self) -> Option<i32> {
        let mut val: i64 = 0;
        let mut any = false;
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            self.bump();
            any = true;
            val = (val * 10 + d as i64).min(i32::MAX as i64);
        }
        if any {
            Some(val as i32)
        } else {
            None
        }
    }

    /// Scan up to three octal digits, stopping at 0xFF.
    fn scan_octal(&mut self) -> u32 {
        let mut val: u32 = 0;
        for _ in 0..3 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(d) if val * 8 + d <= 0xFF => {
                    self.bump();
                    val = val * 8 + d;
                }
                _ => break,
            }
        }
        val
    }

    /// Scan a group name up to \p terminator. Word characters only.
    fn scan_name(&mut self, terminator: char) -> Result<String, Error> {
        let start = self.offset();
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
                name.push(c);
            } else {
                break;
            }
        }
        if name.is_empty() || !self.try_consume(terminator) {
            return self.err_at(ErrorKind::MalformedNameRef, start);
        }
        Ok(name)
    }

    // Capture bookkeeping.

    fn note_capture_slot(&mut self, slot: i32, pos: usize) {
        self.caps.insert(slot, pos);
        if slot >= self.captop {
            self.captop = slot + 1;
        }
    }

    fn in_branch_reset_prescan(&self) -> bool {
        self.prescan_frames.iter().any(|f| f.is_some())
    }

    fn in_branch_reset(&self) -> bool {
        self.frames.iter().any(|f| f.branch_reset.is_some())
    }

    fn note_capture_name(&mut self, name: String, pos: usize) -> Result<(), Error> {
        if name.chars().all(|c| c.is_ascii_digit()) {
            // An explicitly numbered group like (?<3>...).
            let slot: i32 = name.parse().map_err(|_| Error::new(ErrorKind::CaptureOutOfRange, pos))?;
            if slot == 0 {
                return self.err_at(ErrorKind::CaptureGroupZero, pos);
            }
            self.note_capture_slot(slot, pos);
            return Ok(());
        }
        if self.in_branch_reset_prescan() {
            // Named groups inside (?|...) take shared auto slots.
            let slot = self.autocap;
            self.autocap += 1;
            self.note_capture_slot(slot, pos);
            match self.capnames.get(&name) {
                Some(&existing) if existing == slot => {}
                Some(_) => {
                    if !self.options.dup_names {
                        return self.err_at(ErrorKind::DuplicateName(name), pos);
                    }
                }
                None => {
                    if let Some(other) = self.slot_names.get(&slot) {
                        if *other != name {
                            return self.err_at(ErrorKind::DuplicateSlotName(slot), pos);
                        }
                    }
                    self.slot_names.insert(slot, name.clone());
                    self.capnames.insert(name.clone(), slot);
                    self.capnamelist.push(name);
                }
            }
            return Ok(());
        }
        if self.pending_names.iter().any(|(n, _)| *n == name) || self.capnames.contains_key(&name) {
            if !self.options.dup_names {
                return self.err_at(ErrorKind::DuplicateName(name), pos);
            }
            // Under dup-names the later group shares the first name's slot.
            return Ok(());
        }
        self.pending_names.push((name, pos));
        Ok(())
    }

    /// Give every named group a slot: numeric slots first, then names in
    /// declaration order filling the unused numbers.
    fn assign_name_slots(&mut self) -> Result<(), Error> {
        for (name, pos) in mem::take(&mut self.pending_names) {
            while self.caps.contains_key(&self.autocap) {
                self.autocap += 1;
            }
            let slot = self.autocap;
            self.autocap += 1;
            if let Some(other) = self.slot_names.get(&slot) {
                if *other != name {
                    return self.err_at(ErrorKind::DuplicateSlotName(slot), pos);
                }
            }
            self.slot_names.insert(slot, name.clone());
            self.capnames.insert(name.clone(), slot);
            self.capnamelist.push(name);
            self.note_capture_slot(slot, pos);
        }
        self.cap_positions = self
            .caps
            .iter()
            .filter(|(&slot, _)| slot != 0)
            .map(|(&slot, &pos)| (pos, slot))
            .collect();
        self.cap_positions.sort_unstable();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Capture prescan: a tokenization-faithful pass that only counts
    // groups and records names, producing caps/capnames/captop before the
    // main scan needs them.
    // ------------------------------------------------------------------

    fn count_captures(&mut self) -> Result<(), Error> {
        self.note_capture_slot(0, 0);
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    self.bump();
                }
                '#' if self.options.extended => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '[' => {
                    let open = self.offset() - 1;
                    self.scan_class(open, true)?;
                }
                '(' => self.prescan_group()?,
                ')' => {
                    if let Some(Some(br)) = self.prescan_frames.pop() {
                        self.autocap = self.autocap.max(br.max_autocap);
                    }
                }
                '|' => {
                    if let Some(Some(br)) = self.prescan_frames.last_mut() {
                        br.max_autocap = br.max_autocap.max(self.autocap);
                        self.autocap = br.start_autocap;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn prescan_group(&mut self) -> Result<(), Error> {
        let open_pos = self.offset() - 1;
        let ignore = mem::take(&mut self.ignore_next_paren);
        if !self.try_consume('?') {
            // A bare paren captures unless suppressed.
            if !self.options.explicit_capture && !ignore {
                let slot = self.autocap;
                self.autocap += 1;
                self.note_capture_slot(slot, open_pos);
            }
            self.prescan_frames.push(None);
            return Ok(());
        }
        match self.peek() {
            Some('#') => {
                // Comment group: consumed inline, no frame.
                self.consume('#');
                loop {
                    match self.bump() {
                        Some(')') => break,
                        Some(_) => {}
                        None => return self.err_at(ErrorKind::UnterminatedComment, open_pos),
                    }
                }
            }
            Some('|') => {
                self.consume('|');
                self.prescan_frames.push(Some(BranchReset {
                    start_autocap: self.autocap,
                    max_autocap: self.autocap,
                }));
            }
            Some('(') => {
                // Conditional: its condition group must not be counted.
                self.ignore_next_paren = true;
                self.prescan_frames.push(None);
            }
            Some('P') if self.peek_at(1) == Some('<') => {
                self.consume('P');
                self.consume('<');
                self.prescan_name_note('>', open_pos)?;
                self.prescan_frames.push(None);
            }
            Some('<') if !matches!(self.peek_at(1), Some('=') | Some('!')) => {
                self.consume('<');
                self.prescan_name_note('>', open_pos)?;
                self.prescan_frames.push(None);
            }
            Some('\'') => {
                self.consume('\'');
                self.prescan_name_note('\'', open_pos)?;
                self.prescan_frames.push(None);
            }
            Some(c) if c == '-' || c.is_ascii_alphabetic() => {
                // Possibly an inline option switch; `(?i)` is consumed
                // whole, `(?i:` opens a frame, anything else is left for
                // the main scan to reject. Validation happens there.
                let save = self.pos;
                while let Some(c) = self.peek() {
                    if c == '-' || c.is_ascii_alphabetic() {
                        self.bump();
                    } else {
                        break;
                    }
                }
                match self.peek() {
                    Some(')') => {
                        self.consume(')');
                    }
                    Some(':') => {
                        self.consume(':');
                        self.prescan_frames.push(None);
                    }
                    _ => {
                        self.pos = save;
                        self.prescan_frames.push(None);
                    }
                }
            }
            _ => {
                self.prescan_frames.push(None);
            }
        }
        Ok(())
    }

    /// Best-effort name scan for the prescan; malformed names are left for
    /// the main scan to report.
    fn prescan_name_note(&mut self, terminator: char, open_pos: usize) -> Result<(), Error> {
        let save = self.pos;
        match self.scan_name(terminator) {
            Ok(name) => self.note_capture_name(name, open_pos),
            Err(_) => {
                self.pos = save;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Main scan
    // ------------------------------------------------------------------

    fn reset_for_main_scan(&mut self) {
        self.pos = 0;
        self.options = self.initial_options;
        self.autocap = 1;
        self.ignore_next_paren = false;
        self.last_was_quantifier = false;
        debug_assert!(self.frames.is_empty());
        debug_assert!(self.concat.is_empty());
        debug_assert!(self.unit.is_none());
    }

    fn flush_unit(&mut self) {
        if let Some(u) = self.unit.take() {
            self.concat.push(u);
        }
    }

    /// Attach a finished atom; it becomes the target of any quantifier
    /// that follows.
    fn add_unit(&mut self, node: Node) {
        self.flush_unit();
        self.unit = Some(node);
        self.last_was_quantifier = false;
    }

    /// Push a node behind the pending unit position.
    fn push_concat(&mut self, node: Node) {
        self.flush_unit();
        self.concat.push(node);
    }

    /// Drain the current run of siblings into a single node, honoring
    /// right-to-left emission order.
    fn take_branch(&mut self) -> Node {
        self.flush_unit();
        let mut nodes = mem::take(&mut self.concat);
        if self.options.right_to_left {
            nodes.reverse();
        }
        make_concat(nodes, self.options)
    }

    fn is_stopper(&self, c: char) -> bool {
        if self.options.extended && (c.is_whitespace() || c == '#') {
            return true;
        }
        matches!(
            c,
            '\\' | '[' | '(' | ')' | '|' | '^' | '$' | '.' | '*' | '+' | '?' | '{'
        )
    }

    fn skip_extended_whitespace(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    self.bump();
                    while let Some(c) = self.peek() {
                        self.bump();
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_regex(&mut self) -> Result<Node, Error> {
        loop {
            if self.options.extended {
                self.skip_extended_whitespace();
            }
            let Some(c) = self.peek() else { break };
            match c {
                '(' => {
                    self.consume('(');
                    self.scan_group_open()?;
                }
                ')' => {
                    self.consume(')');
                    self.scan_group_close()?;
                }
                '|' => {
                    self.consume('|');
                    self.add_alternate();
                }
                '[' => {
                    let open = self.offset();
                    self.consume('[');
                    let node = self.scan_class(open, false)?;
                    self.add_unit(node);
                }
                '\\' => {
                    self.consume('\\');
                    let node = self.scan_backslash()?;
                    self.add_unit(node);
                }
                '^' => {
                    self.consume('^');
                    let node = self.make_bol();
                    self.add_unit(node);
                }
                '$' => {
                    self.consume('$');
                    let node = self.make_eol();
                    self.add_unit(node);
                }
                '.' => {
                    self.consume('.');
                    let node = self.make_dot();
                    self.add_unit(node);
                }
                '*' | '+' | '?' | '{' => {
                    self.scan_quantifier(c)?;
                }
                _ => self.scan_run(),
            }
        }
        if !self.frames.is_empty() {
            return self.err(ErrorKind::NotEnoughParens);
        }
        self.flush_unit();
        let branch = self.take_branch();
        let body = if self.alternation.is_empty() {
            branch
        } else {
            let mut branches = mem::take(&mut self.alternation);
            branches.push(branch);
            make_alternate(branches, self.options)
        };
        let body = if self.initial_options.anchored {
            let mut cat = Node::new(NodeKind::Concatenate, self.initial_options);
            cat.children.push(Node::new(NodeKind::Start, self.initial_options));
            cat.children.push(body);
            cat
        } else {
            body
        };
        Ok(Node::capture(0, self.initial_options).with_child(body))
    }

    /// Scan a run of ordinary characters.
    fn scan_run(&mut self) {
        let fold = self.options.ignore_case;
        let mut units: Vec<u32> = Vec::new();
        while let Some(c) = self.peek() {
            if self.is_stopper(c) {
                break;
            }
            self.bump();
            push_units(&mut units, c as u32, fold);
        }
        debug_assert!(!units.is_empty());
        let quantifier_next = matches!(self.peek(), Some('*' | '+' | '?' | '{'));
        if quantifier_next && units.len() > 1 {
            // Only the final unit is quantified; the rest are a literal run.
            let last = units.pop().unwrap();
            if units.len() == 1 {
                let one = Node::one(units[0], self.options);
                self.push_concat(one);
            } else {
                let multi = Node::multi(units, self.options);
                self.push_concat(multi);
            }
            self.add_unit(Node::one(last, self.options));
        } else if units.len() == 1 {
            self.add_unit(Node::one(units[0], self.options));
        } else {
            self.add_unit(Node::multi(units, self.options));
        }
    }

    // Alternation and group machinery.

    fn add_alternate(&mut self) {
        let branch = self.take_branch();
        self.alternation.push(branch);
        self.last_was_quantifier = false;
        if let Some(frame) = self.frames.last_mut() {
            if let Some(br) = &mut frame.branch_reset {
                br.max_autocap = br.max_autocap.max(self.autocap);
                self.autocap = br.start_autocap;
            }
        }
    }

    fn push_frame(
        &mut self,
        kind: GroupKind,
        open_pos: usize,
        saved_options: Options,
        branch_reset: Option<BranchReset>,
    ) {
        self.flush_unit();
        let frame = GroupFrame {
            kind,
            open_pos,
            saved_options,
            branch_reset,
            concat: mem::take(&mut self.concat),
            alternation: mem::take(&mut self.alternation),
        };
        self.frames.push(frame);
    }

    fn scan_group_open(&mut self) -> Result<(), Error> {
        let open_pos = self.offset() - 1;
        let saved = self.options;
        let ignore = mem::take(&mut self.ignore_next_paren);

        if self.try_consume('*') {
            return self.scan_verb(open_pos);
        }
        if !self.try_consume('?') {
            if self.options.explicit_capture || ignore {
                self.push_frame(GroupKind::Group, open_pos, saved, None);
            } else {
                let slot = self.autocap;
                self.autocap += 1;
                self.push_frame(GroupKind::Capture(slot), open_pos, saved, None);
            }
            return Ok(());
        }

        match self.peek() {
            None => self.err_at(ErrorKind::UnrecognizedGrouping, open_pos),
            Some(':') => {
                self.consume(':');
                self.push_frame(GroupKind::Group, open_pos, saved, None);
                Ok(())
            }
            Some('=') => {
                self.consume('=');
                self.options.right_to_left = false;
                self.push_frame(GroupKind::Require, open_pos, saved, None);
                Ok(())
            }
            Some('!') => {
                self.consume('!');
                self.options.right_to_left = false;
                self.push_frame(GroupKind::Prevent, open_pos, saved, None);
                Ok(())
            }
            Some('>') => {
                self.consume('>');
                self.push_frame(GroupKind::Greedy, open_pos, saved, None);
                Ok(())
            }
            Some('|') => {
                self.consume('|');
                let br = BranchReset {
                    start_autocap: self.autocap,
                    max_autocap: self.autocap,
                };
                self.push_frame(GroupKind::Group, open_pos, saved, Some(br));
                Ok(())
            }
            Some('#') => {
                self.consume('#');
                loop {
                    match self.bump() {
                        Some(')') => break,
                        Some(_) => {}
                        None => return self.err_at(ErrorKind::UnterminatedComment, open_pos),
                    }
                }
                Ok(())
            }
            Some('(') => self.scan_conditional(open_pos),
            Some('<') => match self.peek_at(1) {
                Some('=') => {
                    self.consume('<');
                    self.consume('=');
                    self.options.right_to_left = true;
                    self.push_frame(GroupKind::Require, open_pos, saved, None);
                    Ok(())
                }
                Some('!') => {
                    self.consume('<');
                    self.consume('!');
                    self.options.right_to_left = true;
                    self.push_frame(GroupKind::Prevent, open_pos, saved, None);
                    Ok(())
                }
                _ => {
                    self.consume('<');
                    let name = self.scan_name('>')?;
                    self.open_named_capture(name, open_pos, saved)
                }
            },
            Some('\'') => {
                self.consume('\'');
                let name = self.scan_name('\'')?;
                self.open_named_capture(name, open_pos, saved)
            }
            Some('P') => {
                self.consume('P');
                match self.peek() {
                    Some('<') => {
                        self.consume('<');
                        let name = self.scan_name('>')?;
                        self.open_named_capture(name, open_pos, saved)
                    }
                    Some('=') => {
                        self.consume('=');
                        let name = self.scan_name(')')?;
                        let slot = self.resolve_name(&name, open_pos)?;
                        let node = Node::backref(slot, self.options);
                        self.add_unit(node);
                        Ok(())
                    }
                    Some('>') => {
                        self.consume('>');
                        let name = self.scan_name(')')?;
                        let slot = self.resolve_name(&name, open_pos)?;
                        self.add_subroutine(slot);
                        Ok(())
                    }
                    _ => self.err_at(ErrorKind::MalformedNameRef, open_pos),
                }
            }
            Some('&') => {
                self.consume('&');
                let name = self.scan_name(')')?;
                let slot = self.resolve_name(&name, open_pos)?;
                self.add_subroutine(slot);
                Ok(())
            }
            Some('R') => {
                self.consume('R');
                if !self.try_consume(')') {
                    return self.err_at(ErrorKind::UnrecognizedGrouping, open_pos);
                }
                self.add_subroutine(0);
                Ok(())
            }
            Some(c) if c.is_ascii_digit() => {
                let n = self.scan_decimal().unwrap();
                if !self.try_consume(')') {
                    return self.err_at(ErrorKind::UnrecognizedGrouping, open_pos);
                }
                if !self.caps.contains_key(&n) {
                    return self.err_at(ErrorKind::UndefinedSubroutine(n), open_pos);
                }
                self.add_subroutine(n);
                Ok(())
            }
            Some(sign @ ('+' | '-')) if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.consume(sign);
                let n = self.scan_decimal().unwrap();
                if !self.try_consume(')') {
                    return self.err_at(ErrorKind::UnrecognizedGrouping, open_pos);
                }
                let slot = self.resolve_relative_subroutine(sign == '-', n, open_pos)?;
                self.add_subroutine(slot);
                Ok(())
            }
            Some(c) if c == '-' || c.is_ascii_alphabetic() => self.scan_option_switch(open_pos, saved),
            Some(_) => self.err_at(ErrorKind::UnrecognizedGrouping, open_pos),
        }
    }

    fn open_named_capture(
        &mut self,
        name: String,
        open_pos: usize,
        saved: Options,
    ) -> Result<(), Error> {
        let slot = if name.chars().all(|c| c.is_ascii_digit()) {
            name.parse()
                .map_err(|_| Error::new(ErrorKind::CaptureOutOfRange, open_pos))?
        } else if self.in_branch_reset() {
            // Mirror the prescan: shared numbering inside (?|...).
            let slot = self.autocap;
            self.autocap += 1;
            slot
        } else {
            match self.capnames.get(&name) {
                Some(&slot) => slot,
                None => return self.err_at(ErrorKind::UndefinedNameRef(name), open_pos),
            }
        };
        self.push_frame(GroupKind::Capture(slot), open_pos, saved, None);
        Ok(())
    }

    fn resolve_name(&self, name: &str, open_pos: usize) -> Result<i32, Error> {
        if name.chars().all(|c| c.is_ascii_digit()) {
            let n: i32 = name
                .parse()
                .map_err(|_| Error::new(ErrorKind::CaptureOutOfRange, open_pos))?;
            if self.caps.contains_key(&n) {
                return Ok(n);
            }
            return Err(Error::new(ErrorKind::UndefinedBackref(n), open_pos));
        }
        match self.capnames.get(name) {
            Some(&slot) => Ok(slot),
            None => Err(Error::new(
                ErrorKind::UndefinedNameRef(name.to_string()),
                open_pos,
            )),
        }
    }

    fn add_subroutine(&mut self, slot: i32) {
        let mut node = Node::new(NodeKind::CallSubroutine, self.options);
        node.m = slot;
        self.add_unit(node);
    }

    /// Resolve `(?-N)` / `(?+N)` by walking capture-group open positions a
    /// signed distance from the call site.
    fn resolve_relative_subroutine(
        &self,
        backwards: bool,
        n: i32,
        open_pos: usize,
    ) -> Result<i32, Error> {
        if n == 0 {
            return Err(Error::new(ErrorKind::CaptureGroupZero, open_pos));
        }
        let n = n as usize;
        let split = self
            .cap_positions
            .partition_point(|&(pos, _)| pos < open_pos);
        let found = if backwards {
            (n <= split).then(|| self.cap_positions[split - n].1)
        } else {
            self.cap_positions[split..].get(n - 1).map(|&(_, slot)| slot)
        };
        found.ok_or_else(|| {
            let signed = if backwards { -(n as i32) } else { n as i32 };
            Error::new(ErrorKind::UndefinedSubroutine(signed), open_pos)
        })
    }

    fn scan_conditional(&mut self, open_pos: usize) -> Result<(), Error> {
        let saved = self.options;
        self.consume('(');
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let n = self.scan_decimal().unwrap();
                if !self.try_consume(')') {
                    return self.err_at(ErrorKind::MalformedNameRef, open_pos);
                }
                if n == 0 {
                    return self.err_at(ErrorKind::CaptureGroupZero, open_pos);
                }
                if !self.caps.contains_key(&n) {
                    return self.err_at(ErrorKind::UndefinedBackref(n), open_pos);
                }
                self.push_frame(GroupKind::Testref(n), open_pos, saved, None);
                Ok(())
            }
            Some('<') => {
                self.consume('<');
                let name = self.scan_name('>')?;
                if !self.try_consume(')') {
                    return self.err_at(ErrorKind::MalformedNameRef, open_pos);
                }
                let slot = self.resolve_name(&name, open_pos)?;
                self.push_frame(GroupKind::Testref(slot), open_pos, saved, None);
                Ok(())
            }
            Some('\'') => {
                self.consume('\'');
                let name = self.scan_name('\'')?;
                if !self.try_consume(')') {
                    return self.err_at(ErrorKind::MalformedNameRef, open_pos);
                }
                let slot = self.resolve_name(&name, open_pos)?;
                self.push_frame(GroupKind::Testref(slot), open_pos, saved, None);
                Ok(())
            }
            Some(c) if c.is_ascii_alphanumeric() || c == '_' => {
                let name = self.scan_name(')')?;
                if name == "DEFINE" {
                    self.push_frame(GroupKind::Define, open_pos, saved, None);
                    return Ok(());
                }
                let slot = self.resolve_name(&name, open_pos)?;
                self.push_frame(GroupKind::Testref(slot), open_pos, saved, None);
                Ok(())
            }
            Some('?') => {
                // An assertion condition: rewind so the paren we consumed
                // opens the assertion group itself.
                self.pos -= 1;
                self.push_frame(GroupKind::Testgroup, open_pos, saved, None);
                Ok(())
            }
            _ => self.err_at(ErrorKind::UnrecognizedGrouping, open_pos),
        }
    }

    fn scan_option_switch(&mut self, open_pos: usize, saved: Options) -> Result<(), Error> {
        let mut on = true;
        loop {
            match self.peek() {
                Some('-') => {
                    self.consume('-');
                    on = false;
                }
                Some(c) if c.is_ascii_alphabetic() => {
                    self.consume(c);
                    if !self.options.apply_inline(c, on) {
                        return self.err_at(ErrorKind::UnrecognizedGrouping, open_pos);
                    }
                }
                Some(':') => {
                    self.consume(':');
                    self.push_frame(GroupKind::Group, open_pos, saved, None);
                    return Ok(());
                }
                Some(')') => {
                    // A tailless switch like (?i) alters the enclosing
                    // scope; the surrounding group restores it on close.
                    self.consume(')');
                    self.flush_unit();
                    return Ok(());
                }
                _ => return self.err_at(ErrorKind::UnrecognizedGrouping, open_pos),
            }
        }
    }

    fn scan_verb(&mut self, open_pos: usize) -> Result<(), Error> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let name = self.body[start..self.pos].to_string();
        if name.is_empty() || !self.try_consume(')') {
            return self.err_at(ErrorKind::UnrecognizedVerb(name), open_pos);
        }
        let code = match name.as_str() {
            "ACCEPT" => verb::ACCEPT,
            "COMMIT" => verb::COMMIT,
            "PRUNE" => verb::PRUNE,
            "SKIP" => verb::SKIP,
            "THEN" => verb::THEN,
            "F" | "FAIL" => {
                let node = Node::new(NodeKind::Nothing, self.options);
                self.add_unit(node);
                return Ok(());
            }
            _ => return self.err_at(ErrorKind::UnrecognizedVerb(name), open_pos),
        };
        let mut node = Node::new(NodeKind::BacktrackingVerb, self.options);
        node.m = code;
        self.add_unit(node);
        Ok(())
    }

    fn scan_group_close(&mut self) -> Result<(), Error> {
        let close_pos = self.offset() - 1;
        let Some(frame) = self.frames.pop() else {
            return self.err_at(ErrorKind::TooManyParens, close_pos);
        };
        let branch = self.take_branch();
        let mut branches = mem::replace(&mut self.alternation, frame.alternation);
        self.concat = frame.concat;
        branches.push(branch);

        if let Some(br) = frame.branch_reset {
            self.autocap = self.autocap.max(br.max_autocap);
        }

        let inner_options = self.options;
        self.options = frame.saved_options;

        let node = match frame.kind {
            GroupKind::Capture(slot) => {
                let body = make_alternate(branches, inner_options);
                Node::capture(slot, inner_options).with_child(body)
            }
            GroupKind::Group => {
                let body = make_alternate(branches, inner_options);
                Node::new(NodeKind::Group, inner_options).with_child(body)
            }
            GroupKind::Require => {
                let body = make_alternate(branches, inner_options);
                Node::new(NodeKind::Require, inner_options).with_child(body)
            }
            GroupKind::Prevent => {
                let body = make_alternate(branches, inner_options);
                Node::new(NodeKind::Prevent, inner_options).with_child(body)
            }
            GroupKind::Greedy => {
                let body = make_alternate(branches, inner_options);
                Node::new(NodeKind::Greedy, inner_options).with_child(body)
            }
            GroupKind::Define => {
                if branches.len() > 1 {
                    return self.err_at(ErrorKind::DefineMoreThanOneBranch, frame.open_pos);
                }
                let body = make_alternate(branches, inner_options);
                Node::new(NodeKind::DefinitionGroup, inner_options).with_child(body)
            }
            GroupKind::Testref(slot) => {
                if branches.len() > 2 {
                    return self.err_at(ErrorKind::TooManyAlternates, frame.open_pos);
                }
                let mut node = Node::new(NodeKind::Testref, inner_options);
                node.m = slot;
                node.children = branches;
                node
            }
            GroupKind::Testgroup => {
                if branches.len() > 2 {
                    return self.err_at(ErrorKind::TooManyAlternates, frame.open_pos);
                }
                let first = branches.remove(0);
                let (condition, then_branch) = split_condition(first, inner_options);
                let mut node = Node::new(NodeKind::Testgroup, inner_options);
                node.children.push(condition);
                node.children.push(then_branch);
                if let Some(else_branch) = branches.pop() {
                    node.children.push(else_branch);
                }
                node
            }
        };
        self.add_unit(node);
        Ok(())
    }

    // Quantifiers.

    fn scan_quantifier(&mut self, c: char) -> Result<(), Error> {
        let quant_pos = self.offset();
        let (min, max) = match c {
            '*' => {
                self.consume('*');
                (0, INFINITE)
            }
            '+' => {
                self.consume('+');
                (1, INFINITE)
            }
            '?' => {
                self.consume('?');
                (0, 1)
            }
            '{' => {
                let save = self.pos;
                self.consume('{');
                match self.scan_braced_quantifier() {
                    Some(bounds) => bounds,
                    None => {
                        // Not a quantifier after all; `{` is a literal.
                        self.pos = save;
                        self.consume('{');
                        let node = Node::one('{' as u32, self.options);
                        self.add_unit(node);
                        return Ok(());
                    }
                }
            }
            _ => unreachable!("not a quantifier"),
        };

        if self.unit.is_none() {
            return self.err_at(ErrorKind::NothingToQuantify, quant_pos);
        }
        if self.last_was_quantifier {
            return self.err_at(ErrorKind::NestedQuantifier, quant_pos);
        }

        let mut lazy = false;
        let mut possessive = false;
        if self.try_consume('?') {
            lazy = true;
        } else if self.try_consume('+') {
            possessive = true;
        }
        if self.options.ungreedy && !possessive {
            lazy = !lazy;
        }
        if min > max {
            return self.err_at(ErrorKind::IllegalRange, quant_pos);
        }

        let target = self.unit.take().unwrap();
        let mut node = if target.is_one_unit() {
            let kind = match (target.kind, lazy) {
                (NodeKind::One, false) => NodeKind::Oneloop,
                (NodeKind::One, true) => NodeKind::Onelazy,
                (NodeKind::Notone, false) => NodeKind::Notoneloop,
                (NodeKind::Notone, true) => NodeKind::Notonelazy,
                (NodeKind::Set, false) => NodeKind::Setloop,
                (NodeKind::Set, true) => NodeKind::Setlazy,
                _ => unreachable!(),
            };
            let mut n = Node::new(kind, target.options);
            n.data = match target.kind {
                NodeKind::Set => target.data,
                _ => Some(vec![target.m as u32].into_boxed_slice()),
            };
            n.m = min;
            n.n = max;
            n
        } else {
            let kind = if lazy {
                NodeKind::Lazyloop
            } else {
                NodeKind::Loop
            };
            let mut n = Node::new(kind, self.options);
            n.m = min;
            n.n = max;
            n.children.push(target);
            n
        };
        if possessive {
            node = Node::new(NodeKind::Greedy, self.options).with_child(node);
        }
        self.unit = Some(node);
        self.last_was_quantifier = true;
        Ok(())
    }

    /// Scan the inside of `{m}`, `{m,}` or `{m,n}` after the open brace.
    /// \return None if this is not a well-formed quantifier.
    fn scan_braced_quantifier(&mut self) -> Option<(i32, i32)> {
        let min = self.scan_decimal()?;
        if self.try_consume('}') {
            return Some((min, min));
        }
        if !self.try_consume(',') {
            return None;
        }
        if self.try_consume('}') {
            return Some((min, INFINITE));
        }
        let max = self.scan_decimal()?;
        if !self.try_consume('}') {
            return None;
        }
        Some((min, max))
    }

    // ------------------------------------------------------------------
    // Character classes
    // ------------------------------------------------------------------

    fn scan_class(&mut self, open_pos: usize, scan_only: bool) -> Result<Node, Error> {
        let mut cc = CharClass::new();
        if self.try_consume('^') {
            cc.negate();
        }
        let mut first = true;
        loop {
            if self.at_end() {
                return self.err_at(ErrorKind::UnterminatedBracket, open_pos);
            }
            if !first && self.try_consume(']') {
                break;
            }
            // POSIX classes are recognized and skipped.
            if self.try_skip_posix_class() {
                first = false;
                continue;
            }
            let lhs = self.scan_class_atom(first)?;
            first = false;

            // A dash may begin a range unless it abuts the closing bracket.
            if !matches!(self.peek(), Some('-')) || self.peek_at(1) == Some(']') {
                add_atom(&mut cc, lhs);
                continue;
            }
            let dash_pos = self.offset();
            self.consume('-');
            let rhs = self.scan_class_atom(false)?;
            match (lhs, rhs) {
                (ClassAtom::Char(a), ClassAtom::Char(b)) if a <= b => cc.add_range(a, b),
                _ => return self.err_at(ErrorKind::ReversedClassRange, dash_pos),
            }
        }
        if scan_only {
            return Ok(Node::new(NodeKind::Empty, self.options));
        }
        if self.options.ignore_case {
            cc.close_case_insensitive();
        }
        Ok(Node::set(cc.into_payload(), self.options))
    }

    /// Skip `[:alpha:]` style POSIX classes silently. \return whether one
    /// was consumed.
    fn try_skip_posix_class(&mut self) -> bool {
        let rest = self.rest();
        if !rest.starts_with("[:") {
            return false;
        }
        let Some(end) = rest.find(":]") else {
            return false;
        };
        // The body must not contain a bare closing bracket.
        if rest[2..end].contains(']') || rest[2..end].is_empty() {
            return false;
        }
        self.pos += end + 2;
        true
    }

    fn scan_class_atom(&mut self, first: bool) -> Result<ClassAtom, Error> {
        let c = match self.peek() {
            Some(c) => c,
            None => return self.err(ErrorKind::UnterminatedBracket),
        };
        match c {
            ']' if first => {
                // A leading bracket is a literal member.
                self.consume(']');
                Ok(ClassAtom::Char(']' as u32))
            }
            '\\' => {
                self.consume('\\');
                let ec = match self.peek() {
                    Some(ec) => ec,
                    None => return self.err(ErrorKind::IllegalEndEscape),
                };
                match ec {
                    'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
                        self.consume(ec);
                        let kind = match ec.to_ascii_lowercase() {
                            'd' => ClassKind::Digit,
                            's' => ClassKind::Space,
                            _ => ClassKind::Word,
                        };
                        Ok(ClassAtom::Class {
                            kind,
                            positive: ec.is_ascii_lowercase(),
                        })
                    }
                    'p' | 'P' => {
                        self.consume(ec);
                        let name = self.scan_property_name()?;
                        Ok(ClassAtom::Property {
                            name,
                            negated: ec == 'P',
                        })
                    }
                    'b' => {
                        // Backspace inside a class.
                        self.consume('b');
                        Ok(ClassAtom::Char(0x08))
                    }
                    _ => {
                        let cp = self.scan_char_escape(!self.options.extra)?;
                        Ok(ClassAtom::Char(cp))
                    }
                }
            }
            c => {
                self.consume(c);
                Ok(ClassAtom::Char(c as u32))
            }
        }
    }

    // ------------------------------------------------------------------
    // Escapes
    // ------------------------------------------------------------------

    fn scan_backslash(&mut self) -> Result<Node, Error> {
        let c = match self.peek() {
            Some(c) => c,
            None => return self.err(ErrorKind::IllegalEndEscape),
        };
        let ecma = self.options.ecma_script;
        match c {
            'b' => {
                self.consume('b');
                let kind = if ecma {
                    NodeKind::EcmaBoundary
                } else {
                    NodeKind::Boundary
                };
                Ok(Node::new(kind, self.options))
            }
            'B' => {
                self.consume('B');
                let kind = if ecma {
                    NodeKind::NonEcmaBoundary
                } else {
                    NodeKind::NonBoundary
                };
                Ok(Node::new(kind, self.options))
            }
            'A' => {
                self.consume('A');
                Ok(Node::new(NodeKind::Beginning, self.options))
            }
            'G' => {
                self.consume('G');
                Ok(Node::new(NodeKind::Start, self.options))
            }
            'z' => {
                self.consume('z');
                Ok(Node::new(NodeKind::End, self.options))
            }
            'Z' => {
                self.consume('Z');
                Ok(self.make_end_z())
            }
            'K' => {
                self.consume('K');
                Ok(Node::new(NodeKind::ResetMatchStart, self.options))
            }
            'd' | 'D' | 's' | 'S' | 'w' | 'W' => {
                self.consume(c);
                let kind = match c.to_ascii_lowercase() {
                    'd' => ClassKind::Digit,
                    's' => ClassKind::Space,
                    _ => ClassKind::Word,
                };
                let payload = charclass::class_payload(kind, c.is_ascii_lowercase(), ecma);
                Ok(Node::set(payload, self.options))
            }
            'p' | 'P' => {
                self.consume(c);
                let name = self.scan_property_name()?;
                let payload = charclass::property_payload(&name, c == 'P');
                Ok(Node::set(payload, self.options))
            }
            'R' => {
                self.consume('R');
                Ok(self.make_r_escape())
            }
            'k' => {
                self.consume('k');
                let ref_pos = self.offset() - 2;
                let name = match self.peek() {
                    Some('<') => {
                        self.consume('<');
                        self.scan_name('>')?
                    }
                    Some('\'') => {
                        self.consume('\'');
                        self.scan_name('\'')?
                    }
                    Some('{') => {
                        self.consume('{');
                        self.scan_name('}')?
                    }
                    _ => return self.err_at(ErrorKind::MalformedNameRef, ref_pos),
                };
                let slot = self.resolve_name(&name, ref_pos)?;
                Ok(Node::backref(slot, self.options))
            }
            'g' => {
                self.consume('g');
                let ref_pos = self.offset() - 2;
                if !self.try_consume('{') {
                    return self.err_at(ErrorKind::MalformedNameRef, ref_pos);
                }
                let name = self.scan_name('}')?;
                let slot = self.resolve_name(&name, ref_pos)?;
                Ok(Node::backref(slot, self.options))
            }
            '<' => {
                self.consume('<');
                let ref_pos = self.offset() - 2;
                let name = self.scan_name('>')?;
                let slot = self.resolve_name(&name, ref_pos)?;
                Ok(Node::backref(slot, self.options))
            }
            '1'..='9' => self.scan_numeric_backref(),
            _ => {
                let cp = self.scan_char_escape(!self.options.extra)?;
                Ok(self.make_literal_node(cp))
            }
        }
    }

    fn make_literal_node(&mut self, cp: u32) -> Node {
        let mut units = Vec::new();
        push_units(&mut units, cp, self.options.ignore_case);
        if units.len() == 1 {
            Node::one(units[0], self.options)
        } else {
            Node::multi(units, self.options)
        }
    }

    /// A bare `\N`: a backreference when group N exists, otherwise an
    /// octal escape. The ECMAScript dialect instead extends digit by digit
    /// while the number stays a valid group.
    fn scan_numeric_backref(&mut self) -> Result<Node, Error> {
        let start = self.pos;
        let ref_pos = self.offset() - 1;
        if self.options.ecma_script {
            let first = self.peek().unwrap();
            let mut val = first.to_digit(10).unwrap() as i32;
            if !self.caps.contains_key(&val) {
                // Not a group: octal if it can be, else the literal digit.
                if first <= '7' {
                    let cp = self.scan_octal();
                    return Ok(self.make_literal_node(cp));
                }
                self.consume(first);
                return Ok(self.make_literal_node(first as u32));
            }
            self.consume(first);
            while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
                let next = val.saturating_mul(10).saturating_add(d as i32);
                if !self.caps.contains_key(&next) {
                    break;
                }
                self.bump();
                val = next;
            }
            return Ok(Node::backref(val, self.options));
        }
        let n = self.scan_decimal().unwrap();
        if self.caps.contains_key(&n) {
            return Ok(Node::backref(n, self.options));
        }
        // A single digit always names a group; longer runs fall back to
        // octal when they can.
        let first = self.body[start..].chars().next().unwrap();
        if n >= 10 && first <= '7' {
            self.pos = start;
            let cp = self.scan_octal();
            return Ok(self.make_literal_node(cp));
        }
        self.err_at(ErrorKind::UndefinedBackref(n), ref_pos)
    }

    fn scan_property_name(&mut self) -> Result<String, Error> {
        let prop_pos = self.offset() - 2;
        let name = if self.try_consume('{') {
            let start = self.pos;
            loop {
                match self.bump() {
                    Some('}') => break,
                    Some(_) => {}
                    None => return self.err_at(ErrorKind::IncompleteProperty, prop_pos),
                }
            }
            self.body[start..self.pos - 1].to_string()
        } else {
            // The one-letter shorthand \pL.
            match self.bump() {
                Some(c) if c.is_ascii_alphabetic() => c.to_string(),
                _ => return self.err_at(ErrorKind::IncompleteProperty, prop_pos),
            }
        };
        if name.is_empty() {
            return self.err_at(ErrorKind::IncompleteProperty, prop_pos);
        }
        if !crate::unicode::is_valid_property(&name) {
            return self.err_at(ErrorKind::UnknownProperty(name), prop_pos);
        }
        Ok(name)
    }

    /// Scan a character-valued escape; the backslash is already consumed.
    /// With \p allow_non_special, an unrecognized letter is itself.
    fn scan_char_escape(&mut self, allow_non_special: bool) -> Result<u32, Error> {
        let c = match self.bump() {
            Some(c) => c,
            None => return self.err(ErrorKind::IllegalEndEscape),
        };
        match c {
            'a' => Ok(0x07),
            'b' => Ok(0x08),
            'e' => Ok(0x1B),
            'f' => Ok(0x0C),
            'n' => Ok(0x0A),
            'r' => Ok(0x0D),
            't' => Ok(0x09),
            'v' => Ok(0x0B),
            'c' => {
                let nc = match self.bump() {
                    Some(nc) if nc.is_ascii() && !nc.is_ascii_control() => nc,
                    _ => return self.err(ErrorKind::MissingControl),
                };
                Ok((nc.to_ascii_uppercase() as u32) ^ 0x40)
            }
            '0'..='7' => {
                self.pos -= 1;
                Ok(self.scan_octal())
            }
            'x' => {
                if self.try_consume('{') {
                    let mut val: u32 = 0;
                    let mut digits = 0;
                    while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                        self.bump();
                        digits += 1;
                        if digits > 6 {
                            return self.err(ErrorKind::InvalidCodePoint);
                        }
                        val = val * 16 + d;
                    }
                    if digits == 0 || !self.try_consume('}') {
                        return self.err(ErrorKind::TooFewHex);
                    }
                    if val > 0x10FFFF {
                        return self.err(ErrorKind::InvalidCodePoint);
                    }
                    Ok(val)
                } else {
                    let mut val: u32 = 0;
                    for _ in 0..2 {
                        match self.peek().and_then(|c| c.to_digit(16)) {
                            Some(d) => {
                                self.bump();
                                val = val * 16 + d;
                            }
                            None => break,
                        }
                    }
                    Ok(val)
                }
            }
            'u' => {
                let mut val: u32 = 0;
                for _ in 0..4 {
                    match self.peek().and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            self.bump();
                            val = val * 16 + d;
                        }
                        None => return self.err(ErrorKind::TooFewHex),
                    }
                }
                Ok(val)
            }
            c if c.is_ascii_alphanumeric() => {
                if allow_non_special {
                    Ok(c as u32)
                } else {
                    let pos = self.offset() - c.len_utf8();
                    self.err_at(ErrorKind::UnrecognizedEscape(c), pos)
                }
            }
            c => Ok(c as u32),
        }
    }

    // ------------------------------------------------------------------
    // Pseudo-nodes for newline conventions
    // ------------------------------------------------------------------

    fn rtl_options(&self) -> Options {
        let mut o = self.options;
        o.right_to_left = true;
        o
    }

    /// A literal matcher for one newline sequence under the current
    /// conventions: CRLF as a unit where it applies, else a single char.
    fn make_newline_alternatives(&self, opts: Options) -> Node {
        match opts.newline {
            Newline::Cr => Node::one(0x0D, opts),
            Newline::CrLf => Node::multi(vec![0x0D, 0x0A], opts),
            _ => {
                let mut alt = Node::new(NodeKind::Alternate, opts);
                alt.children.push(Node::multi(vec![0x0D, 0x0A], opts));
                alt.children.push(Node::set(
                    charclass::chars_payload(opts.newline.chars()),
                    opts,
                ));
                alt
            }
        }
    }

    /// `^`: plain anchors when possible, else a synthesized alternation of
    /// `\A` and a lookbehind over the configured terminators, refusing the
    /// position inside a CR LF pair.
    fn make_bol(&self) -> Node {
        let opts = self.options;
        if !opts.multiline {
            return Node::new(NodeKind::Beginning, opts);
        }
        if opts.newline.is_lf() {
            return Node::new(NodeKind::Bol, opts);
        }
        let rtl = self.rtl_options();
        let after_newline = match opts.newline {
            Newline::Cr => Node::new(NodeKind::Require, opts).with_child(Node::one(0x0D, rtl)),
            Newline::CrLf => {
                Node::new(NodeKind::Require, opts).with_child(Node::multi(vec![0x0D, 0x0A], rtl))
            }
            _ => {
                let behind = Node::new(NodeKind::Require, opts)
                    .with_child(Node::set(charclass::chars_payload(opts.newline.chars()), rtl));
                // Not between CR and LF: (?! (?<= \r) \n ).
                let mid = Node::new(NodeKind::Prevent, opts).with_child(make_concat(
                    vec![
                        Node::new(NodeKind::Require, opts).with_child(Node::one(0x0D, rtl)),
                        Node::one(0x0A, opts),
                    ],
                    opts,
                ));
                make_concat(vec![behind, mid], opts)
            }
        };
        let mut alt = Node::new(NodeKind::Alternate, opts);
        alt.children.push(Node::new(NodeKind::Beginning, opts));
        alt.children.push(after_newline);
        Node::new(NodeKind::Group, opts).with_child(alt)
    }

    /// `$`.
    fn make_eol(&self) -> Node {
        let opts = self.options;
        if opts.multiline {
            if opts.newline.is_lf() {
                return Node::new(NodeKind::Eol, opts);
            }
            let rtl = self.rtl_options();
            let mut alt = Node::new(NodeKind::Alternate, opts);
            alt.children.push(Node::new(NodeKind::End, opts));
            match opts.newline {
                Newline::Cr => {
                    alt.children
                        .push(Node::new(NodeKind::Require, opts).with_child(Node::one(0x0D, opts)));
                }
                Newline::CrLf => {
                    alt.children.push(
                        Node::new(NodeKind::Require, opts)
                            .with_child(Node::multi(vec![0x0D, 0x0A], opts)),
                    );
                }
                _ => {
                    // Before any starter other than LF, or before an LF that
                    // does not close a CR LF pair.
                    let starters: Vec<u32> = opts
                        .newline
                        .chars()
                        .iter()
                        .copied()
                        .filter(|&c| c != 0x0A)
                        .collect();
                    alt.children.push(
                        Node::new(NodeKind::Require, opts)
                            .with_child(Node::set(charclass::chars_payload(&starters), opts)),
                    );
                    alt.children.push(make_concat(
                        vec![
                            Node::new(NodeKind::Prevent, opts).with_child(Node::one(0x0D, rtl)),
                            Node::new(NodeKind::Require, opts).with_child(Node::one(0x0A, opts)),
                        ],
                        opts,
                    ));
                }
            }
            return Node::new(NodeKind::Group, opts).with_child(alt);
        }
        if opts.dollar_end_only {
            return Node::new(NodeKind::End, opts);
        }
        self.make_end_z()
    }

    /// `\Z` (and the default `$`): end of input, or before a single final
    /// terminator. Non-LF conventions synthesize `(?=(?>crlf|[...])?\z)`.
    fn make_end_z(&self) -> Node {
        let opts = self.options;
        if opts.newline.is_lf() {
            return Node::new(NodeKind::EndZ, opts);
        }
        let seq = Node::new(NodeKind::Greedy, opts).with_child(self.make_newline_alternatives(opts));
        let mut opt_seq = Node::new(NodeKind::Loop, opts);
        opt_seq.m = 0;
        opt_seq.n = 1;
        opt_seq.children.push(seq);
        let body = make_concat(vec![opt_seq, Node::new(NodeKind::End, opts)], opts);
        Node::new(NodeKind::Require, opts).with_child(body)
    }

    /// `\R`: an atomic alternation of CRLF and the single terminators.
    fn make_r_escape(&self) -> Node {
        let opts = self.options;
        let unicode_set = match opts.bsr {
            Bsr::AnyCrLf => false,
            Bsr::Unicode => true,
            Bsr::Default => opts.utf8,
        };
        let singles: &[u32] = if unicode_set {
            &[0x0D, 0x0A, 0x0B, 0x0C, 0x85, 0x2028, 0x2029]
        } else {
            &[0x0D, 0x0A]
        };
        let mut alt = Node::new(NodeKind::Alternate, opts);
        alt.children.push(Node::multi(vec![0x0D, 0x0A], opts));
        alt.children
            .push(Node::set(charclass::chars_payload(singles), opts));
        Node::new(NodeKind::Greedy, opts).with_child(alt)
    }

    /// `.`.
    fn make_dot(&self) -> Node {
        let opts = self.options;
        if opts.singleline {
            return Node::set(charclass::anything_payload(), opts);
        }
        if opts.newline.is_lf() {
            return Node::notone(0x0A, opts);
        }
        Node::set(charclass::negated_chars_payload(opts.newline.chars()), opts)
    }
}

/// Split a conditional group's first branch into its leading assertion and
/// the remaining "then" expression.
fn split_condition(first: Node, options: Options) -> (Node, Node) {
    if first.kind == NodeKind::Concatenate && !first.children.is_empty() {
        let mut children = first.children;
        let condition = children.remove(0);
        (condition, make_concat(children, options))
    } else {
        (first, Node::new(NodeKind::Empty, options))
    }
}

enum ClassAtom {
    Char(u32),
    Class { kind: ClassKind, positive: bool },
    Property { name: String, negated: bool },
}

fn add_atom(cc: &mut CharClass, atom: ClassAtom) {
    match atom {
        ClassAtom::Char(cp) => cc.add_char(cp),
        ClassAtom::Class { kind, positive } => cc.add_class(kind, positive, false),
        ClassAtom::Property { name, negated } => cc.add_property(&name, negated),
    }
}

/// Parse a raw delimited pattern into a regex tree.
pub fn parse(raw: &str, initial_options: Options) -> Result<RegexTree, Error> {
    let pre = preparse::preparse(raw, initial_options)?;
    let mut p = Parser::new(pre.body, pre.body_offset, pre.options);
    p.count_captures()?;
    p.assign_name_slots()?;
    p.reset_for_main_scan();
    let root = p.scan_regex()?;

    let capcount = p.caps.len();
    let capnumlist = if p.captop as usize != capcount {
        let mut slots: Vec<i32> = p.caps.keys().copied().collect();
        slots.sort_unstable();
        Some(slots)
    } else {
        None
    };
    Ok(RegexTree {
        root,
        caps: p.caps,
        capnames: p.capnames,
        capnamelist: p.capnamelist,
        captop: p.captop,
        capnumlist,
        options: pre.options,
    })
}

/// Backslash every metacharacter in \p input so it matches literally.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0C' => out.push_str("\\f"),
            '\\' | '*' | '+' | '?' | '|' | '{' | '[' | '(' | ')' | '^' | '$' | '.' | '#' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Undo [`escape`]: interpret every backslash escape, taking unrecognized
/// escaped letters literally.
pub fn unescape(input: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(input.len());
    let mut p = Parser::new(input, 0, Options::new());
    while let Some(c) = p.peek() {
        if c != '\\' {
            p.consume(c);
            out.push(c);
            continue;
        }
        p.consume('\\');
        let cp = p.scan_char_escape(true)?;
        match char::from_u32(cp) {
            Some(c) => out.push(c),
            None => return Err(Error::new(ErrorKind::InvalidCodePoint, p.offset())),
        }
    }
    Ok(out)
}
