// Work around dead code warnings: rust-lang issue #46379
pub mod common;

use common::*;
use perlre::ErrorKind;

#[test]
fn delimiter_and_modifier_errors() {
    test_parse_fails("", ErrorKind::EmptyRegex);
    test_parse_fails("   ", ErrorKind::EmptyRegex);
    test_parse_fails("123", ErrorKind::NoEndDelimiter);
    test_parse_fails("/iu", ErrorKind::NoEndDelimiter);
    test_parse_fails("/a/Q", ErrorKind::UnknownModifier('Q'));
    test_parse_fails("{a+b)", ErrorKind::NoEndDelimiter);

    let err = parse_err("/a/iz");
    assert_eq!(err.kind, ErrorKind::UnknownModifier('z'));
    assert_eq!(err.offset, 4);
}

#[test]
fn paren_balance() {
    let err = parse_err("/a)b/");
    assert_eq!(err.kind, ErrorKind::TooManyParens);
    assert_eq!(err.offset, 2);

    test_parse_fails("/((a)/", ErrorKind::NotEnoughParens);
    test_parse_fails("/(?:a/", ErrorKind::NotEnoughParens);
}

#[test]
fn quantifier_errors() {
    let err = parse_err("/a{3,1}/");
    assert_eq!(err.kind, ErrorKind::IllegalRange);
    assert_eq!(err.offset, 2);

    test_parse_fails("/*a/", ErrorKind::NothingToQuantify);
    test_parse_fails("/|*/", ErrorKind::NothingToQuantify);
    test_parse_fails("/(?i)*/", ErrorKind::NothingToQuantify);
    test_parse_fails("/a**/", ErrorKind::NestedQuantifier);
    test_parse_fails("/a*??/", ErrorKind::NestedQuantifier);
    test_parse_fails("/a*+?/", ErrorKind::NestedQuantifier);
}

#[test]
fn class_errors() {
    let err = parse_err("/[z-a]/");
    assert_eq!(err.kind, ErrorKind::ReversedClassRange);
    assert_eq!(err.offset, 3);

    let err = parse_err("/[abc/");
    assert_eq!(err.kind, ErrorKind::UnterminatedBracket);
    assert_eq!(err.offset, 1);

    // Shorthand classes cannot bound a range.
    test_parse_fails("/[a-\\d]/", ErrorKind::ReversedClassRange);
    test_parse_fails("/[\\d-z]/", ErrorKind::ReversedClassRange);
}

#[test]
fn comment_errors() {
    let err = parse_err("/(?#foo/");
    assert_eq!(err.kind, ErrorKind::UnterminatedComment);
    assert_eq!(err.offset, 1);
}

#[test]
fn escape_errors() {
    test_parse_fails("/a\\/", ErrorKind::IllegalEndEscape);
    test_parse_fails("/\\c/", ErrorKind::MissingControl);
    test_parse_fails("/\\x{}/", ErrorKind::TooFewHex);
    test_parse_fails("/\\x{zz}/", ErrorKind::TooFewHex);
    test_parse_fails("/\\u12/", ErrorKind::TooFewHex);
    test_parse_fails("/\\x{110000}/", ErrorKind::InvalidCodePoint);
    test_parse_fails("/\\p/", ErrorKind::IncompleteProperty);
    test_parse_fails("/\\p{/", ErrorKind::IncompleteProperty);
    test_parse_fails("/\\p{Bogus}/", ErrorKind::UnknownProperty("Bogus".to_string()));
}

#[test]
fn reference_errors() {
    test_parse_fails("/\\1/", ErrorKind::UndefinedBackref(1));
    test_parse_fails("/(a)\\2/", ErrorKind::UndefinedBackref(2));
    test_parse_fails("/\\g{2}/", ErrorKind::UndefinedBackref(2));
    test_parse_fails(
        "/\\k<nope>/",
        ErrorKind::UndefinedNameRef("nope".to_string()),
    );
    test_parse_fails("/\\k/", ErrorKind::MalformedNameRef);
    test_parse_fails("/\\k<>/", ErrorKind::MalformedNameRef);
    test_parse_fails(
        "/(?P=nope)/",
        ErrorKind::UndefinedNameRef("nope".to_string()),
    );
}

#[test]
fn subroutine_errors() {
    test_parse_fails("/(?5)/", ErrorKind::UndefinedSubroutine(5));
    test_parse_fails("/(a)(?-2)/", ErrorKind::UndefinedSubroutine(-2));
    test_parse_fails("/(?+1)/", ErrorKind::UndefinedSubroutine(1));
    test_parse_fails("/(?&nope)/", ErrorKind::UndefinedNameRef("nope".to_string()));
}

#[test]
fn group_errors() {
    test_parse_fails("/(?Q)/", ErrorKind::UnrecognizedGrouping);
    test_parse_fails("/(?_)/", ErrorKind::UnrecognizedGrouping);
    test_parse_fails("/(?<0>a)/", ErrorKind::CaptureGroupZero);
    test_parse_fails("/(?<>a)/", ErrorKind::MalformedNameRef);
}

#[test]
fn conditional_errors() {
    test_parse_fails("/(?(1)a)/", ErrorKind::UndefinedBackref(1));
    test_parse_fails("/(?(0)a)/", ErrorKind::CaptureGroupZero);
    test_parse_fails("/(x)(?(1)a|b|c)/", ErrorKind::TooManyAlternates);
    test_parse_fails("/(?(DEFINE)a|b)/", ErrorKind::DefineMoreThanOneBranch);
    test_parse_fails("/(?(R)a)/", ErrorKind::UndefinedNameRef("R".to_string()));
}

#[test]
fn verb_errors() {
    test_parse_fails("/(*BOGUS)a/", ErrorKind::UnrecognizedVerb("BOGUS".to_string()));
    test_parse_fails("/a(*CRLF)b/", ErrorKind::UnrecognizedVerb("CRLF".to_string()));
    test_parse_fails("/(*MARK:x)/", ErrorKind::UnrecognizedVerb("MARK".to_string()));
}

#[test]
fn duplicate_name_errors() {
    test_parse_fails(
        "/(?<a>x)(?<a>y)/",
        ErrorKind::DuplicateName("a".to_string()),
    );
    test_parse_fails("/(?|(?<a>x)|(?<b>y))/", ErrorKind::DuplicateSlotName(1));
}
