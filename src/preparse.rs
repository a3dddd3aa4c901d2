//! Delimiter stripping, trailing modifiers, and leading (*NAME) pragmas

use crate::error::{Error, ErrorKind};
use crate::options::{Bsr, Newline, Options};

/// The result of preprocessing: the pattern body as a slice of the raw
/// input, its byte offset (so parse errors can point into the raw string),
/// and the options with modifiers and pragmas applied.
#[derive(Debug, Clone)]
pub struct Preparsed<'a> {
    pub body: &'a str,
    pub body_offset: usize,
    pub options: Options,
}

/// \return the closing delimiter matching an opening one. Brackets close
/// with their mirror; anything else closes with itself.
fn closing_delimiter(open: char) -> char {
    match open {
        '[' => ']',
        '(' => ')',
        '{' => '}',
        '<' => '>',
        c => c,
    }
}

/// Preprocess a raw delimited pattern: scan trailing modifier letters,
/// strip the delimiters, and consume leading option pragmas.
pub fn preparse(raw: &str, mut options: Options) -> Result<Preparsed<'_>, Error> {
    // Step 1: trailing modifiers. Walk from the right end over letters and
    // whitespace; the index past the first other character is the end of
    // the delimited body.
    let mut end_of_body = 0;
    let mut modifiers: Vec<(usize, char)> = Vec::new();
    for (idx, c) in raw.char_indices().rev() {
        if c.is_ascii_alphabetic() {
            modifiers.push((idx, c));
        } else if c.is_whitespace() {
            continue;
        } else {
            end_of_body = idx + c.len_utf8();
            break;
        }
    }
    for &(idx, c) in modifiers.iter().rev() {
        if !options.apply_modifier(c) {
            return Err(Error::new(ErrorKind::UnknownModifier(c), idx));
        }
    }

    // Step 2: delimiters. The first non-whitespace character opens; it may
    // not be a letter, digit or backslash.
    let mut start = 0;
    let mut open = None;
    for (idx, c) in raw.char_indices() {
        if c.is_whitespace() {
            continue;
        }
        start = idx;
        open = Some(c);
        break;
    }
    let open = match open {
        Some(c) => c,
        None => return Err(Error::new(ErrorKind::EmptyRegex, 0)),
    };
    if open.is_ascii_alphanumeric() || open == '\\' {
        return Err(Error::new(ErrorKind::NoEndDelimiter, start));
    }
    let body_start = start + open.len_utf8();
    let close = match raw[..end_of_body].chars().next_back() {
        Some(c) if end_of_body > body_start => c,
        _ => return Err(Error::new(ErrorKind::NoEndDelimiter, start)),
    };
    if close != closing_delimiter(open) {
        return Err(Error::new(ErrorKind::NoEndDelimiter, end_of_body - close.len_utf8()));
    }
    let body_end = end_of_body - close.len_utf8();

    // Step 3: leading (*NAME) sequences that select options. An unknown
    // name ends preprocessing; it may be a backtracking verb for the
    // parser.
    let mut body_offset = body_start;
    loop {
        let body = &raw[body_offset..body_end];
        let Some(rest) = body.strip_prefix("(*") else {
            break;
        };
        let name_len = rest
            .find(|c: char| !(c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'))
            .unwrap_or(rest.len());
        if name_len == 0 || !rest[name_len..].starts_with(')') {
            break;
        }
        match &rest[..name_len] {
            "UTF8" => options.utf8 = true,
            "BSR_UNICODE" => options.bsr = Bsr::Unicode,
            "BSR_ANYCRLF" => options.bsr = Bsr::AnyCrLf,
            "CR" => options.newline = Newline::Cr,
            "LF" => options.newline = Newline::Lf,
            "CRLF" => options.newline = Newline::CrLf,
            "ANYCRLF" => options.newline = Newline::AnyCrLf,
            "ANY" => options.newline = Newline::Any,
            _ => break,
        }
        body_offset += 2 + name_len + 1;
    }

    Ok(Preparsed {
        body: &raw[body_offset..body_end],
        body_offset,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(raw: &str) -> Preparsed<'_> {
        preparse(raw, Options::new()).expect("should preparse")
    }

    #[test]
    fn strips_plain_delimiters() {
        let p = ok("/abc/");
        assert_eq!(p.body, "abc");
        assert_eq!(p.body_offset, 1);
    }

    #[test]
    fn collects_modifiers() {
        let p = ok("/a/imsx");
        assert!(p.options.ignore_case);
        assert!(p.options.multiline);
        assert!(p.options.singleline);
        assert!(p.options.extended);
        assert_eq!(p.body, "a");
    }

    #[test]
    fn bracket_delimiters_mirror() {
        assert_eq!(ok("{a+b}i").body, "a+b");
        assert_eq!(ok("<abc>").body, "abc");
        assert_eq!(ok("[x]").body, "x");
        // A non-bracket delimiter closes with itself.
        assert_eq!(ok("#abc#").body, "abc");
    }

    #[test]
    fn unknown_modifier_is_an_error() {
        let err = preparse("/a/iz", Options::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownModifier('z'));
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn delimiter_failures() {
        assert_eq!(
            preparse("abc", Options::new()).unwrap_err().kind,
            ErrorKind::NoEndDelimiter
        );
        assert_eq!(
            preparse("/abc", Options::new()).unwrap_err().kind,
            ErrorKind::NoEndDelimiter
        );
        assert_eq!(
            preparse("", Options::new()).unwrap_err().kind,
            ErrorKind::EmptyRegex
        );
        assert_eq!(
            preparse("   ", Options::new()).unwrap_err().kind,
            ErrorKind::EmptyRegex
        );
    }

    #[test]
    fn leading_pragmas() {
        let p = ok("/(*CRLF)(*BSR_ANYCRLF)abc/");
        assert_eq!(p.options.newline, Newline::CrLf);
        assert_eq!(p.options.bsr, Bsr::AnyCrLf);
        assert_eq!(p.body, "abc");
        assert_eq!(p.body_offset, 1 + "(*CRLF)(*BSR_ANYCRLF)".len());

        let p = ok("/(*UTF8)x/");
        assert!(p.options.utf8);
        assert_eq!(p.body, "x");

        // Unknown names are left in the body for the parser.
        let p = ok("/(*COMMIT)x/");
        assert_eq!(p.body, "(*COMMIT)x");
    }
}
