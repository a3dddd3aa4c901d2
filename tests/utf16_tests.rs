// Work around dead code warnings: rust-lang issue #46379
pub mod common;

use common::*;
use perlre::charclass::set_contains;
use perlre::{convert_tree, parse_pattern, Options};

fn range(lo: u32, hi: u32) -> Vec<u32> {
    vec![0, 2, 0, lo, hi]
}

#[test]
fn two_byte_sequences() {
    let prog = compile_ok("/[\\xC2-\\xDF][\\x80-\\xBF]/");
    assert_eq!(set_payloads(&prog), vec![range(0x80, 0x7FF)]);

    // U+0159 is a two-byte character; the rewritten set contains it.
    let payload = &set_payloads(&prog)[0];
    assert!(set_contains(payload, 0x0159));
    assert!(!set_contains(payload, 'a' as u32));
}

#[test]
fn three_byte_sequences() {
    let prog = compile_ok("/\\xE0[\\xA0-\\xBF][\\x80-\\xBF]/");
    assert_eq!(set_payloads(&prog), vec![range(0x800, 0xFFF)]);

    let prog = compile_ok("/[\\xE1-\\xEC][\\x80-\\xBF]{2}/");
    assert_eq!(set_payloads(&prog), vec![range(0x1000, 0xCFFF)]);

    let prog = compile_ok("/\\xED[\\x80-\\x9F][\\x80-\\xBF]/");
    assert_eq!(set_payloads(&prog), vec![range(0xD000, 0xD7FF)]);

    let prog = compile_ok("/[\\xEE-\\xEF][\\x80-\\xBF]{2}/");
    assert_eq!(set_payloads(&prog), vec![range(0xE000, 0xFFFF)]);
}

#[test]
fn four_byte_sequences_become_surrogate_pairs() {
    let prog = compile_ok("/\\xF0[\\x90-\\xBF][\\x80-\\xBF]{2}/");
    assert_eq!(
        set_payloads(&prog),
        vec![range(0xD800, 0xD8BF), range(0xDC00, 0xDFFF)]
    );

    let prog = compile_ok("/[\\xF1-\\xF3][\\x80-\\xBF]{3}/");
    assert_eq!(
        set_payloads(&prog),
        vec![range(0xD8C0, 0xDBBF), range(0xDC00, 0xDFFF)]
    );

    let prog = compile_ok("/\\xF4[\\x80-\\x8F][\\x80-\\xBF]{2}/");
    assert_eq!(
        set_payloads(&prog),
        vec![range(0xDBC0, 0xDBFF), range(0xDC00, 0xDFFF)]
    );
}

#[test]
fn sequences_inside_larger_patterns() {
    // The rewrite applies inside groups and leaves neighbors alone.
    let prog = compile_ok("/a([\\xC2-\\xDF][\\x80-\\xBF])z/");
    assert_eq!(set_payloads(&prog), vec![range(0x80, 0x7FF)]);
}

#[test]
fn partial_runs_are_untouched() {
    let prog = compile_ok("/[\\xC2-\\xDF]x/");
    assert_eq!(set_payloads(&prog), vec![range(0xC2, 0xDF)]);

    // Wrong continuation range for an E0 lead.
    let prog = compile_ok("/\\xE0[\\x80-\\xBF]/");
    assert_eq!(set_payloads(&prog), vec![range(0x80, 0xBF)]);

    // A loop child may not be split: E0 wants one continuation, not two.
    let prog = compile_ok("/\\xE0[\\xA0-\\xBF][\\x80-\\xBF]{2}/");
    assert!(!set_payloads(&prog).contains(&range(0x800, 0xFFF)));

    // Case-insensitive byte nodes never participate.
    let prog = perlre::compile("/[\\xC2-\\xDF][\\x80-\\xBF]/i", Options::new()).unwrap();
    assert!(!set_payloads(&prog).contains(&range(0x80, 0x7FF)));
}

#[test]
fn conversion_is_idempotent() {
    let patterns = [
        "/[\\xC2-\\xDF][\\x80-\\xBF]/",
        "/\\xF0[\\x90-\\xBF][\\x80-\\xBF]{2}/",
        "/a[\\xE1-\\xEC][\\x80-\\xBF]{2}b|[\\xC2-\\xDF][\\x80-\\xBF]/",
        "/plain(no|bytes)here/",
    ];
    for pattern in patterns {
        let mut tree = parse_pattern(pattern, Options::new()).unwrap();
        convert_tree(&mut tree);
        let once = tree.to_string();
        convert_tree(&mut tree);
        assert_eq!(once, tree.to_string(), "not idempotent: {}", pattern);
    }
}
