use perlre::{compile, op, parse_pattern, CompiledRegex, Error, ErrorKind, Node, NodeKind, Options, RegexTree};

/// Parse \p pattern with default options, panicking on failure.
pub fn parse(pattern: &str) -> RegexTree {
    parse_pattern(pattern, Options::new())
        .unwrap_or_else(|e| panic!("Pattern should have parsed: {}: {}", pattern, e))
}

/// Compile \p pattern with default options, panicking on failure.
pub fn compile_ok(pattern: &str) -> CompiledRegex {
    compile(pattern, Options::new())
        .unwrap_or_else(|e| panic!("Pattern should have compiled: {}: {}", pattern, e))
}

/// \return the error from a pattern which must not parse.
pub fn parse_err(pattern: &str) -> Error {
    match parse_pattern(pattern, Options::new()) {
        Ok(_) => panic!("Pattern should not have parsed: {}", pattern),
        Err(e) => e,
    }
}

/// Test that \p pattern fails with the given error kind.
pub fn test_parse_fails(pattern: &str, kind: ErrorKind) {
    let err = parse_err(pattern);
    assert_eq!(err.kind, kind, "wrong error for {}", pattern);
}

/// \return the pattern body under the implicit whole-match capture.
pub fn body(tree: &RegexTree) -> &Node {
    assert_eq!(tree.root.kind, NodeKind::Capture);
    assert_eq!(tree.root.m, 0);
    &tree.root.children[0]
}

/// Collect every node of the given kind, in depth-first order.
pub fn find_all<'t>(node: &'t Node, kind: NodeKind, out: &mut Vec<&'t Node>) {
    if node.kind == kind {
        out.push(node);
    }
    for child in &node.children {
        find_all(child, kind, out);
    }
}

pub fn count_kind(node: &Node, kind: NodeKind) -> usize {
    let mut v = Vec::new();
    find_all(node, kind, &mut v);
    v.len()
}

pub fn find_first<'t>(node: &'t Node, kind: NodeKind) -> Option<&'t Node> {
    let mut v = Vec::new();
    find_all(node, kind, &mut v);
    v.first().copied()
}

/// The slot of every capture node in depth-first order, the implicit
/// whole-match capture included.
pub fn capture_slots(tree: &RegexTree) -> Vec<i32> {
    let mut v = Vec::new();
    find_all(&tree.root, NodeKind::Capture, &mut v);
    v.iter().map(|n| n.m).collect()
}

/// Decode the program into (offset, opcode-with-flags, operands) triples.
pub fn instructions(prog: &CompiledRegex) -> Vec<(usize, i32, Vec<i32>)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < prog.codes.len() {
        let code = prog.codes[pos];
        let size = op::size(code);
        out.push((pos, code, prog.codes[pos + 1..pos + size].to_vec()));
        pos += size;
    }
    out
}

/// The bare opcode sequence with flag bits stripped.
pub fn opcodes(prog: &CompiledRegex) -> Vec<i32> {
    instructions(prog)
        .iter()
        .map(|(_, code, _)| code & op::MASK)
        .collect()
}

/// The string-table payloads referenced by Set-family instructions, in
/// emission order.
pub fn set_payloads(prog: &CompiledRegex) -> Vec<Vec<u32>> {
    instructions(prog)
        .iter()
        .filter_map(|(_, code, operands)| match code & op::MASK {
            op::SET | op::SETREP | op::SETLOOP | op::SETLAZY => {
                Some(prog.strings[operands[0] as usize].to_vec())
            }
            _ => None,
        })
        .collect()
}

/// Check the structural contract of a program: every jump in range, every
/// string operand present, every slot within the dense space, and the
/// advertised track count consistent with the opcodes.
pub fn assert_well_formed(prog: &CompiledRegex) {
    let len = prog.codes.len() as i32;
    let mut tracks = 0;
    for (pos, code, operands) in instructions(prog) {
        let opcode = code & op::MASK;
        if op::backtracks(code) {
            tracks += 1;
        }
        match opcode {
            op::LAZYBRANCH | op::GOTO | op::BRANCHMARK | op::LAZYBRANCHMARK | op::BRANCHCOUNT
            | op::LAZYBRANCHCOUNT => {
                let target = operands[0];
                assert!(
                    (0..len).contains(&target),
                    "jump at {} out of range: {}",
                    pos,
                    target
                );
            }
            op::SET | op::MULTI | op::SETREP | op::SETLOOP | op::SETLAZY => {
                let idx = operands[0];
                assert!(
                    (0..prog.strings.len() as i32).contains(&idx),
                    "string operand at {} out of range: {}",
                    pos,
                    idx
                );
            }
            op::REF | op::TESTREF | op::CALLSUBROUTINE => {
                let slot = operands[0];
                assert!(
                    (0..prog.cap_size as i32).contains(&slot),
                    "slot operand at {} out of range: {}",
                    pos,
                    slot
                );
            }
            op::CAPTUREMARK => {
                let open = operands[0];
                assert!((0..prog.cap_size as i32).contains(&open));
                let uncap = operands[1];
                assert!(uncap == -1 || (0..prog.cap_size as i32).contains(&uncap));
            }
            _ => {}
        }
    }
    assert_eq!(prog.track_count, tracks, "track count disagrees");
    assert_eq!(
        prog.codes.last().map(|c| c & op::MASK),
        Some(op::STOP),
        "program must end with Stop"
    );
}
