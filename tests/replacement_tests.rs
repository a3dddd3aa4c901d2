// Work around dead code warnings: rust-lang issue #46379
pub mod common;

use common::*;
use perlre::{compile, parse_pattern, parse_replacement, Options, Replacement, ReplacementItem};

use ReplacementItem::*;

fn parse_rep(pattern: &str, rep: &str) -> Replacement {
    let tree = parse_pattern(pattern, Options::new()).unwrap();
    let prog = compile(pattern, Options::new()).unwrap();
    parse_replacement(rep, &tree, &prog).unwrap()
}

fn lit(s: &str) -> ReplacementItem {
    Literal(s.to_string())
}

#[test]
fn group_references() {
    let rep = parse_rep("/(\\d+)-(\\d+)/", "$2/$1");
    assert_eq!(rep.items, vec![Group(2), lit("/"), Group(1)]);

    // Backslash-digit is the other spelling.
    let rep = parse_rep("/(\\d+)-(\\d+)/", "\\2\\1");
    assert_eq!(rep.items, vec![Group(2), Group(1)]);

    // Braced references take names or numbers.
    let rep = parse_rep("/(?<mon>\\d+)/", "${mon}!");
    assert_eq!(rep.items, vec![Group(1), lit("!")]);
    let rep = parse_rep("/(\\d+)/", "${1}");
    assert_eq!(rep.items, vec![Group(1)]);
}

#[test]
fn specials() {
    let rep = parse_rep("/a/", "x$`y$'z");
    assert_eq!(
        rep.items,
        vec![lit("x"), LeftPortion, lit("y"), RightPortion, lit("z")]
    );

    let rep = parse_rep("/a/", "$& $_ $+");
    assert_eq!(
        rep.items,
        vec![WholeMatch, lit(" "), WholeInput, lit(" "), LastGroup]
    );

    // $$ is a literal dollar.
    let rep = parse_rep("/a/", "cost: $$5");
    assert_eq!(rep.items, vec![lit("cost: $5")]);
}

#[test]
fn unknown_references_stay_literal() {
    let rep = parse_rep("/(a)/", "$9");
    assert_eq!(rep.items, vec![lit("$9")]);

    let rep = parse_rep("/(a)/", "${nope}");
    assert_eq!(rep.items, vec![lit("${nope}")]);

    let rep = parse_rep("/(a)/", "a$");
    assert_eq!(rep.items, vec![lit("a$")]);

    let rep = parse_rep("/(a)/", "\\9");
    assert_eq!(rep.items, vec![lit("\\9")]);
}

#[test]
fn references_use_the_dense_remap() {
    // Slot 5 is dense index 2 here (after 0 and 1).
    let rep = parse_rep("/(?<5>a)(b)/", "$5$1");
    assert_eq!(rep.items, vec![Group(2), Group(1)]);
}

#[test]
fn literals_merge() {
    let rep = parse_rep("/a/", "plain text, no refs");
    assert_eq!(rep.items, vec![lit("plain text, no refs")]);
    assert!(!rep.right_to_left);
}
