//! Pattern options and the newline / \R conventions

use core::fmt;

/// The newline convention in effect for `^`, `$`, `\Z` and `.`.
///
/// `Default` behaves as `Lf` but records that no convention was chosen
/// explicitly, so a later `(*LF)` style pragma is not a change.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Newline {
    #[default]
    Default,
    Cr,
    Lf,
    CrLf,
    AnyCrLf,
    Any,
}

impl Newline {
    /// \return whether this convention needs synthesized pseudo-nodes in
    /// place of the plain Bol/Eol/EndZ leaves.
    pub fn is_lf(self) -> bool {
        matches!(self, Newline::Default | Newline::Lf)
    }

    /// The single code points that terminate a line under this convention.
    /// CRLF pairing is handled separately by the caller.
    pub fn chars(self) -> &'static [u32] {
        match self {
            Newline::Default | Newline::Lf => &[0x0A],
            Newline::Cr => &[0x0D],
            Newline::CrLf => &[0x0D, 0x0A],
            Newline::AnyCrLf => &[0x0D, 0x0A],
            Newline::Any => &[0x0D, 0x0A, 0x0B, 0x0C, 0x85, 0x2028, 0x2029],
        }
    }

    /// \return whether a lone CR followed by LF counts as a single
    /// terminator under this convention.
    pub fn pairs_crlf(self) -> bool {
        matches!(self, Newline::CrLf | Newline::AnyCrLf | Newline::Any)
    }
}

/// What `\R` matches.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Bsr {
    #[default]
    Default,
    Unicode,
    AnyCrLf,
}

/// Options controlling parsing and matching.
///
/// The letter constructor follows the trailing-modifier convention of
/// delimited patterns: `/pat/imsx`. Options are immutable within one
/// compilation; the parser keeps a private stack for inline `(?ims-x)`
/// switches.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Case-insensitive matching ('i').
    pub ignore_case: bool,

    /// `^` and `$` match at line boundaries, not just the input
    /// boundaries ('m').
    pub multiline: bool,

    /// `.` matches line terminators as well ('s').
    pub singleline: bool,

    /// Unescaped whitespace in the pattern is ignored and `#` starts a
    /// comment ('x').
    pub extended: bool,

    /// Bare `(...)` does not capture ('n').
    pub explicit_capture: bool,

    /// Match from right to left. Never set from a modifier letter; forced
    /// inside lookbehind assertions.
    pub right_to_left: bool,

    /// ECMAScript dialect: affects `\d \s \w` and the backreference
    /// longest-valid-prefix rule.
    pub ecma_script: bool,

    /// Culture-invariant case folding.
    pub invariant_culture: bool,

    /// The whole pattern is anchored at the match start ('A').
    pub anchored: bool,

    /// `$` matches only at the very end of the input ('D'). Ignored when
    /// `multiline` is set.
    pub dollar_end_only: bool,

    /// Invert greedy and lazy quantifiers ('U'). Possessive quantifiers
    /// are unaffected.
    pub ungreedy: bool,

    /// UTF-8 mode ('u' or `(*UTF8)`): enables `\x{...}` escapes and the
    /// Unicode `\R` set.
    pub utf8: bool,

    /// Forbid meaningless escapes ('X'): `\j` is an error instead of a
    /// literal 'j'.
    pub extra: bool,

    /// Allow the same group name on more than one group ('J').
    pub dup_names: bool,

    /// Newline convention for `^`, `$`, `\Z` and `.`.
    pub newline: Newline,

    /// Convention for `\R`.
    pub bsr: Bsr,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    /// Apply one trailing modifier letter. \return false if the letter is
    /// not a known modifier.
    pub(crate) fn apply_modifier(&mut self, c: char) -> bool {
        match c {
            'i' => self.ignore_case = true,
            'm' => self.multiline = true,
            's' => self.singleline = true,
            'x' => self.extended = true,
            'n' => self.explicit_capture = true,
            'A' => self.anchored = true,
            'D' => self.dollar_end_only = true,
            'U' => self.ungreedy = true,
            'u' => self.utf8 = true,
            'X' => self.extra = true,
            'J' => self.dup_names = true,
            // 'S' is a study hint and 'e' a deprecated eval modifier; both
            // are accepted and ignored.
            'S' | 'e' => {}
            _ => return false,
        }
        true
    }

    /// Apply one inline option letter from a `(?imsx-imsx)` switch.
    /// \return false if the letter is not valid inline.
    pub(crate) fn apply_inline(&mut self, c: char, on: bool) -> bool {
        match c {
            'i' => self.ignore_case = on,
            'm' => self.multiline = on,
            's' => self.singleline = on,
            'x' => self.extended = on,
            'n' => self.explicit_capture = on,
            'U' => self.ungreedy = on,
            'X' => self.extra = on,
            'J' => self.dup_names = on,
            _ => return false,
        }
        true
    }
}

impl fmt::Display for Options {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (set, c) in [
            (self.ignore_case, 'i'),
            (self.multiline, 'm'),
            (self.singleline, 's'),
            (self.extended, 'x'),
            (self.explicit_capture, 'n'),
            (self.anchored, 'A'),
            (self.dollar_end_only, 'D'),
            (self.ungreedy, 'U'),
            (self.utf8, 'u'),
            (self.extra, 'X'),
            (self.dup_names, 'J'),
        ] {
            if set {
                fmt::Write::write_char(f, c)?;
            }
        }
        Ok(())
    }
}
