use perlre::{escape, unescape, ErrorKind};

#[test]
fn escape_metacharacters() {
    assert_eq!(escape("a.b"), "a\\.b");
    assert_eq!(escape("1+1=2"), "1\\+1=2");
    assert_eq!(escape("(x|y)*"), "\\(x\\|y\\)\\*");
    assert_eq!(escape("a b"), "a\\ b");
    assert_eq!(escape("#{}["), "\\#\\{}\\[");
    assert_eq!(escape("\n\r\t\x0C"), "\\n\\r\\t\\f");
    assert_eq!(escape("^start$end"), "\\^start\\$end");
    assert_eq!(escape("back\\slash"), "back\\\\slash");
}

#[test]
fn unescape_basics() {
    assert_eq!(unescape("\\n\\r\\t").unwrap(), "\n\r\t");
    assert_eq!(unescape("\\x41\\x42").unwrap(), "AB");
    assert_eq!(unescape("\\x{48}\\x{49}").unwrap(), "HI");
    assert_eq!(unescape("\\101").unwrap(), "A");
    assert_eq!(unescape("\\0").unwrap(), "\0");
    assert_eq!(unescape("\\cJ").unwrap(), "\n");
    assert_eq!(unescape("\\e").unwrap(), "\x1B");
    assert_eq!(unescape("\\a\\b\\f\\v").unwrap(), "\x07\x08\x0C\x0B");
    assert_eq!(unescape("\\x{1F600}").unwrap(), "\u{1F600}");
    // Unrecognized escaped letters are themselves.
    assert_eq!(unescape("\\j\\q").unwrap(), "jq");
    assert_eq!(unescape("plain text").unwrap(), "plain text");
}

#[test]
fn unescape_errors() {
    assert_eq!(unescape("abc\\").unwrap_err().kind, ErrorKind::IllegalEndEscape);
    assert_eq!(unescape("\\c").unwrap_err().kind, ErrorKind::MissingControl);
    assert_eq!(
        unescape("\\x{D800}").unwrap_err().kind,
        ErrorKind::InvalidCodePoint
    );
}

#[test]
fn escape_round_trips() {
    let samples = [
        "",
        "plain",
        "a+b*c?",
        "1 2\t3\n4",
        "100% | (parens) [brackets] {braces}",
        "^anchors$ and \\ slashes",
        "#comment-ish . dot",
        "\u{00FC}nic\u{00F6}de \u{1F600} text",
        "crlf\r\n and ff\x0C",
    ];
    for s in samples {
        let escaped = escape(s);
        let back = unescape(&escaped)
            .unwrap_or_else(|e| panic!("unescape failed for {:?}: {}", escaped, e));
        assert_eq!(back, s, "round trip failed for {:?}", s);
    }
}
