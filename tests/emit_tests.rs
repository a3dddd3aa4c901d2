// Work around dead code warnings: rust-lang issue #46379
pub mod common;

use common::*;
use perlre::charclass::set_contains;
use perlre::{anchor, compile, op, Options};

/// A grab bag of valid patterns exercising every emitter fragment.
const CORPUS: &[&str] = &[
    "/abc/",
    "/a|b|c/",
    "/(foo)(bar)(baz)/",
    "/(a(b(c)))\\3/",
    "/a*b+c?d{2,5}e{3,}f{4}/",
    "/a*?b+?c??/",
    "/(ab|cd)*ef/",
    "/(?:non)capture/",
    "/(?<name>x)\\k<name>/",
    "/(?=ahead)(?!not)x/",
    "/(?<=behind)(?<!not)x/",
    "/(?>atomic)+/",
    "/a*+b++/",
    "/(?|(a)|(b))(\\1)/",
    "/(x)(?(1)yes|no)/",
    "/(?(?=cond)yes|no)/",
    "/(?(DEFINE)(?<d>[0-9]+))(?&d)/",
    "/(a)(?1)(?R)/",
    "/a(*COMMIT)b(*PRUNE)c/",
    "/(*FAIL)|ok/",
    "/ab\\Kcd/",
    "/^start$|\\Amid\\z|\\Gend\\Z/m",
    "/[a-z\\d\\p{Lu}]+[^xyz]/",
    "/\\bword\\B/",
    "/\\R\\x41\\x{1F600}/u",
    "/(*CRLF)^a$.b/m",
    "/(*ANYCRLF)a\\Z/",
    "/ığĞ/i",
    "/(?i:Mixed)Case/",
    "/(?<5>a)(b)\\5/",
];

#[test]
fn corpus_is_well_formed() {
    for pattern in CORPUS {
        let prog = compile_ok(pattern);
        assert_well_formed(&prog);
    }
}

#[test]
fn program_shape() {
    let prog = compile_ok("/(a)/");
    let ops = opcodes(&prog);
    assert_eq!(ops[0], op::LAZYBRANCH);
    assert_eq!(*ops.last().unwrap(), op::STOP);
    // Setmark/Capturemark for the implicit capture and the group.
    assert_eq!(ops.iter().filter(|&&o| o == op::SETMARK).count(), 2);
    assert_eq!(ops.iter().filter(|&&o| o == op::CAPTUREMARK).count(), 2);
    // The whole-match capture opens right after the root branch.
    assert_eq!(prog.cap_positions[0], 2);
    assert!(prog.cap_positions.iter().all(|&p| p >= 0));
}

#[test]
fn dense_remap_is_total() {
    let prog = compile_ok("/(?<5>a)(b)/");
    assert_eq!(prog.cap_size, 3);
    let caps = prog.caps.as_ref().expect("non-contiguous slots need a map");
    let mut dense: Vec<i32> = caps.values().copied().collect();
    dense.sort_unstable();
    assert_eq!(dense, vec![0, 1, 2]);
    assert_eq!(prog.map_capnum(5), 2);
    assert_eq!(prog.map_capnum(1), 1);
    assert_eq!(prog.map_capnum(0), 0);
    // Every dense slot opens somewhere in the program.
    assert!(prog.cap_positions.iter().all(|&p| p >= 0));

    let prog = compile_ok("/(a)(b)/");
    assert!(prog.caps.is_none());
    assert_eq!(prog.cap_size, 3);
}

#[test]
fn ungreedy_flips_bytecode() {
    let flipped = [
        ("/a+b*?(cd|ef){1,3}x??/U", "/a+?b*(cd|ef){1,3}?x?/"),
        ("/\\d*/U", "/\\d*?/"),
        ("/(ab)+/U", "/(ab)+?/"),
    ];
    for (ungreedy, manual) in flipped {
        let a = compile(ungreedy, Options::new()).unwrap();
        let b = compile(manual, Options::new()).unwrap();
        assert_eq!(a.codes, b.codes, "{} vs {}", ungreedy, manual);
        assert_eq!(a.strings, b.strings, "{} vs {}", ungreedy, manual);
    }

    // Possessive quantifiers are not inverted.
    let a = compile("/a*+/U", Options::new()).unwrap();
    let b = compile("/a*+/", Options::new()).unwrap();
    assert_eq!(a.codes, b.codes);
}

#[test]
fn anchors() {
    assert_eq!(compile_ok("/^a/").anchors, anchor::BEGINNING);
    assert_eq!(compile_ok("/^a/m").anchors, anchor::BOL);
    assert_eq!(compile_ok("/\\Aa/").anchors, anchor::BEGINNING);
    assert_eq!(compile_ok("/\\Ga/").anchors, anchor::START);
    assert_eq!(compile_ok("/a/A").anchors, anchor::START);
    assert_eq!(compile_ok("/\\ba/").anchors, anchor::BOUNDARY);
    assert_eq!(compile_ok("/a^/").anchors, 0);
    assert_eq!(compile_ok("/(?:(^a))/m").anchors, anchor::BOL);
}

#[test]
fn dollar_opcodes() {
    assert!(opcodes(&compile_ok("/a$/")).contains(&op::ENDZ));
    assert!(opcodes(&compile_ok("/a$/D")).contains(&op::END));
    assert!(!opcodes(&compile_ok("/a$/D")).contains(&op::ENDZ));
    assert!(opcodes(&compile_ok("/a$/mD")).contains(&op::EOL));
}

#[test]
fn literal_prefix() {
    let prog = compile_ok("/foobar+x/");
    let prefix = prog.prefix.as_ref().expect("should have a prefix");
    let units: Vec<u32> = "foobar".chars().map(|c| c as u32).collect();
    assert_eq!(prefix.units.as_ref(), units.as_slice());
    assert!(!prefix.case_insensitive);
    assert_eq!(prefix.finder.find(b"say foobar!"), Some(4));

    let prog = compile_ok("/abc/i");
    let prefix = prog.prefix.as_ref().unwrap();
    assert!(prefix.case_insensitive);

    // Prefixes stop at the first uncertain node.
    let prog = compile_ok("/ab(c|d)/");
    let prefix = prog.prefix.as_ref().unwrap();
    let units: Vec<u32> = "ab".chars().map(|c| c as u32).collect();
    assert_eq!(prefix.units.as_ref(), units.as_slice());

    assert!(compile_ok("/[ab]c/").prefix.is_none());
}

#[test]
fn first_chars() {
    let prog = compile_ok("/[ab]x|cd/");
    let fc = prog.fc_prefix.as_ref().expect("should have first chars");
    for good in ['a', 'b', 'c'] {
        assert!(set_contains(&fc.set, good as u32));
    }
    for bad in ['d', 'x'] {
        assert!(!set_contains(&fc.set, bad as u32));
    }

    // An optional leading loop widens the set.
    let prog = compile_ok("/z*[0-9]/");
    let fc = prog.fc_prefix.as_ref().unwrap();
    assert!(set_contains(&fc.set, 'z' as u32));
    assert!(set_contains(&fc.set, '5' as u32));
    assert!(!set_contains(&fc.set, 'a' as u32));

    // Recursion defeats the analysis.
    assert!(compile_ok("/(?R)a/").fc_prefix.is_none());
}

#[test]
fn set_deduplication() {
    let prog = compile_ok("/\\d-\\d/");
    assert_eq!(prog.strings.len(), 1);
}

#[test]
fn flag_bits() {
    let prog = compile_ok("/a/i");
    let (_, code, operands) = instructions(&prog)
        .into_iter()
        .find(|(_, code, _)| code & op::MASK == op::ONE)
        .expect("one insn");
    assert!(code & op::CI != 0);
    assert_eq!(operands[0], 'a' as i32);

    let prog = compile_ok("/(?<=ab)c/");
    let multi = instructions(&prog)
        .into_iter()
        .find(|(_, code, _)| code & op::MASK == op::MULTI)
        .expect("multi insn");
    assert!(multi.1 & op::RTL != 0);
}

#[test]
fn loop_emission() {
    // a{2,5}: a fixed repetition then the residue loop.
    let prog = compile_ok("/a{2,5}/");
    let insns = instructions(&prog);
    let rep = insns
        .iter()
        .find(|(_, code, _)| code & op::MASK == op::ONEREP)
        .expect("rep part");
    assert_eq!(rep.2, vec!['a' as i32, 2]);
    let lp = insns
        .iter()
        .find(|(_, code, _)| code & op::MASK == op::ONELOOP)
        .expect("loop part");
    assert_eq!(lp.2, vec!['a' as i32, 3]);

    // A counted group loop uses Branchcount.
    let ops = opcodes(&compile_ok("/(ab){2,4}/"));
    assert!(ops.contains(&op::SETCOUNT));
    assert!(ops.contains(&op::BRANCHCOUNT));

    // An unbounded zero-min group loop uses Nullmark/Branchmark.
    let ops = opcodes(&compile_ok("/(?:ab)*/"));
    assert!(ops.contains(&op::NULLMARK));
    assert!(ops.contains(&op::BRANCHMARK));
    assert!(ops.contains(&op::GOTO));

    let ops = opcodes(&compile_ok("/(?:ab)*?/"));
    assert!(ops.contains(&op::LAZYBRANCHMARK));
}

#[test]
fn lookaround_emission() {
    let ops = opcodes(&compile_ok("/(?=a)b/"));
    assert!(ops.contains(&op::SETJUMP));
    assert!(ops.contains(&op::GETMARK));
    assert!(ops.contains(&op::FOREJUMP));

    let ops = opcodes(&compile_ok("/(?!a)b/"));
    assert!(ops.contains(&op::BACKJUMP));

    let ops = opcodes(&compile_ok("/(?>a)b/"));
    assert!(ops.contains(&op::SETJUMP));
    assert!(ops.contains(&op::FOREJUMP));
}

#[test]
fn conditional_emission() {
    let prog = compile_ok("/(x)(?(1)a|b)/");
    let insns = instructions(&prog);
    let testref = insns
        .iter()
        .find(|(_, code, _)| code & op::MASK == op::TESTREF)
        .expect("testref insn");
    assert_eq!(testref.2, vec![1]);

    let ops = opcodes(&compile_ok("/(?(?=x)a|b)/"));
    assert!(ops.contains(&op::SETJUMP));
    assert!(ops.contains(&op::GETMARK));
}

#[test]
fn subroutine_emission() {
    let prog = compile_ok("/(a)(?1)/");
    let insns = instructions(&prog);
    let call = insns
        .iter()
        .find(|(_, code, _)| code & op::MASK == op::CALLSUBROUTINE)
        .expect("call insn");
    assert_eq!(call.2, vec![1]);
    // The call target is the group's open position.
    assert!(prog.cap_positions[1] >= 0);
}

#[test]
fn define_is_jumped_over() {
    let prog = compile_ok("/(?(DEFINE)(?<d>x))(?&d)/");
    let insns = instructions(&prog);
    let goto = insns
        .iter()
        .find(|(_, code, _)| code & op::MASK == op::GOTO)
        .expect("skip goto");
    // The goto lands past the definition body.
    let target = goto.2[0] as usize;
    assert!(target > goto.0);
    assert_well_formed(&prog);
}
