//! Character class builder and its serialized set payload
//!
//! A class is accumulated as code point intervals plus Unicode property
//! references, then serialized to an opaque `u32` sequence the emitter
//! embeds in the program's string table verbatim:
//!
//! ```text
//! [flags, range_words, cat_words, lo0, hi0, lo1, hi1, ..., cat entries...]
//! ```
//!
//! where bit 0 of `flags` is the negation flag, ranges are inclusive code
//! point pairs, and each category entry is a length word (with bit 31 set
//! when the property is negated) followed by the property name's chars.
//! The payload is `u32` rather than `char` based because UTF-16 surrogate
//! units from the byte-range rewriter are legal set members.

use crate::codepointset::{CodePointSet, Interval, CODE_POINT_MAX};
use crate::unicode;

const FLAG_NEGATED: u32 = 1;
const CAT_NEGATED: u32 = 1 << 31;

/// The shorthand classes \d, \s and \w.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClassKind {
    Digit,
    Space,
    Word,
}

const fn r(first: u32, last: u32) -> Interval {
    Interval { first, last }
}

// \d and \w are the same in both dialects.
const DIGITS: [Interval; 1] = [r(0x30, 0x39)];
const WORD_CHARS: [Interval; 4] = [r(0x30, 0x39), r(0x41, 0x5A), r(0x5F, 0x5F), r(0x61, 0x7A)];

// \s: horizontal tab through carriage return, plus space.
const SPACE_CHARS: [Interval; 2] = [r(0x09, 0x0D), r(0x20, 0x20)];

// The ECMAScript dialect's \s covers the Unicode space separators and the
// line terminators as well.
const ECMA_SPACE_CHARS: [Interval; 10] = [
    r(0x09, 0x0D),
    r(0x20, 0x20),
    r(0x85, 0x85),
    r(0xA0, 0xA0),
    r(0x1680, 0x1680),
    r(0x2000, 0x200A),
    r(0x2028, 0x2029),
    r(0x202F, 0x202F),
    r(0x205F, 0x205F),
    r(0x3000, 0x3000),
];

/// \return the code point set for a shorthand class.
pub(crate) fn class_set(kind: ClassKind, ecma: bool) -> CodePointSet {
    let ivs: &[Interval] = match (kind, ecma) {
        (ClassKind::Digit, _) => &DIGITS,
        (ClassKind::Word, _) => &WORD_CHARS,
        (ClassKind::Space, false) => &SPACE_CHARS,
        (ClassKind::Space, true) => &ECMA_SPACE_CHARS,
    };
    CodePointSet::from_sorted_disjoint_intervals(ivs.to_vec())
}

/// Fold a code point the way case-insensitive literals are folded: the
/// simple single-char lowercase mapping, or the input itself.
pub(crate) fn fold(cp: u32) -> u32 {
    let Some(c) = char::from_u32(cp) else {
        return cp;
    };
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l as u32,
        _ => cp,
    }
}

#[derive(Debug, Clone)]
struct PropertyRef {
    name: Box<str>,
    negated: bool,
}

/// Accumulates a character class during parsing.
#[derive(Debug, Clone, Default)]
pub struct CharClass {
    negated: bool,
    cps: CodePointSet,
    props: Vec<PropertyRef>,
}

impl CharClass {
    pub fn new() -> CharClass {
        CharClass::default()
    }

    pub fn negate(&mut self) {
        self.negated = true;
    }

    pub fn add_char(&mut self, cp: u32) {
        self.cps.add_one(cp);
    }

    pub fn add_range(&mut self, lo: u32, hi: u32) {
        debug_assert!(lo <= hi);
        self.cps.add(Interval::new(lo, hi));
    }

    pub fn add_set(&mut self, set: CodePointSet) {
        self.cps.add_set(set);
    }

    /// Add a shorthand class; a negative shorthand (\D etc.) contributes
    /// the complement as a union member.
    pub fn add_class(&mut self, kind: ClassKind, positive: bool, ecma: bool) {
        let set = class_set(kind, ecma);
        self.cps.add_set(if positive { set } else { set.inverted() });
    }

    /// Add a \p{name} (or \P{name} when \p negated) property reference.
    pub fn add_property(&mut self, name: &str, negated: bool) {
        self.props.push(PropertyRef {
            name: name.into(),
            negated,
        });
    }

    /// Close the accumulated ranges under case folding, so a matcher that
    /// folds its input finds every member. Each interval is intersected
    /// against the table of code points with a distinct lowercase form;
    /// only the cased slices of a wide interval are enumerated.
    pub fn close_case_insensitive(&mut self) {
        let mut folded = CodePointSet::new();
        let ivs = self.cps.intervals();
        let mut i = 0;
        for (first, last) in unicode::lowercase_change_ranges() {
            while i < ivs.len() && ivs[i].last < first {
                i += 1;
            }
            // One table range can touch several intervals, and the last
            // interval touched may also overlap the next table range, so
            // only `i` itself advances.
            let mut j = i;
            while j < ivs.len() && ivs[j].first <= last {
                let lo = ivs[j].first.max(first);
                let hi = ivs[j].last.min(last);
                for cp in lo..=hi {
                    let f = fold(cp);
                    if f != cp {
                        folded.add_one(f);
                    }
                }
                j += 1;
            }
        }
        self.cps.add_set(folded);
    }

    /// Serialize to the opaque payload.
    pub fn into_payload(self) -> Vec<u32> {
        let ranges = self.cps.intervals();
        let mut out = Vec::with_capacity(3 + ranges.len() * 2);
        out.push(if self.negated { FLAG_NEGATED } else { 0 });
        out.push((ranges.len() * 2) as u32);
        out.push(0); // patched below
        for iv in ranges {
            out.push(iv.first);
            out.push(iv.last);
        }
        let cat_start = out.len();
        for p in &self.props {
            let mut len_word = p.name.chars().count() as u32;
            if p.negated {
                len_word |= CAT_NEGATED;
            }
            out.push(len_word);
            out.extend(p.name.chars().map(|c| c as u32));
        }
        out[2] = (out.len() - cat_start) as u32;
        out
    }
}

/// \return a payload matching the inclusive range [lo, hi].
pub(crate) fn range_payload(lo: u32, hi: u32) -> Vec<u32> {
    vec![0, 2, 0, lo, hi]
}

/// \return a payload matching exactly the given code points.
pub(crate) fn chars_payload(chars: &[u32]) -> Vec<u32> {
    let mut cc = CharClass::new();
    for &c in chars {
        cc.add_char(c);
    }
    cc.into_payload()
}

/// \return a payload matching anything except the given code points.
pub(crate) fn negated_chars_payload(chars: &[u32]) -> Vec<u32> {
    let mut cc = CharClass::new();
    for &c in chars {
        cc.add_char(c);
    }
    cc.negate();
    cc.into_payload()
}

/// \return a payload matching every code point.
pub(crate) fn anything_payload() -> Vec<u32> {
    range_payload(0, CODE_POINT_MAX)
}

/// \return a payload for a shorthand escape outside a bracket.
pub(crate) fn class_payload(kind: ClassKind, positive: bool, ecma: bool) -> Vec<u32> {
    let mut cc = CharClass::new();
    cc.add_class(kind, positive, ecma);
    cc.into_payload()
}

/// \return a payload for a bare \p{name} / \P{name} escape.
pub(crate) fn property_payload(name: &str, negated: bool) -> Vec<u32> {
    let mut cc = CharClass::new();
    cc.add_property(name, negated);
    cc.into_payload()
}

/// \return a payload for an already-built code point set.
pub(crate) fn set_payload(cps: &CodePointSet) -> Vec<u32> {
    let mut cc = CharClass::new();
    cc.add_set(cps.clone());
    cc.into_payload()
}

/// Decode a payload back to its interval set, when it is a plain union of
/// ranges (no negation, no property entries).
pub(crate) fn payload_ranges(set: &[u32]) -> Option<CodePointSet> {
    if set.len() < 3 || set[0] != 0 || set[2] != 0 {
        return None;
    }
    let nranges = set[1] as usize;
    let mut cps = CodePointSet::new();
    for pair in set[3..3 + nranges].chunks_exact(2) {
        cps.add(Interval::new(pair[0], pair[1]));
    }
    Some(cps)
}

/// \return whether \p set is negated.
pub fn is_negated(set: &[u32]) -> bool {
    !set.is_empty() && set[0] & FLAG_NEGATED != 0
}

/// If \p set is a plain single inclusive range (no negation, no
/// properties), return it. Used by the byte-range rewriter.
pub(crate) fn single_range(set: &[u32]) -> Option<(u32, u32)> {
    if set.len() == 5 && set[0] == 0 && set[1] == 2 && set[2] == 0 {
        Some((set[3], set[4]))
    } else {
        None
    }
}

/// Decode a serialized set and test membership of one code point.
pub fn set_contains(set: &[u32], cp: u32) -> bool {
    debug_assert!(set.len() >= 3, "Malformed set payload");
    let negated = set[0] & FLAG_NEGATED != 0;
    let nranges = set[1] as usize;
    let ranges = &set[3..3 + nranges];

    let mut found = false;
    for pair in ranges.chunks_exact(2) {
        if pair[0] <= cp && cp <= pair[1] {
            found = true;
            break;
        }
    }
    if !found {
        let mut cats = &set[3 + nranges..];
        while let Some(&len_word) = cats.first() {
            let cat_negated = len_word & CAT_NEGATED != 0;
            let len = (len_word & !CAT_NEGATED) as usize;
            let name: String = cats[1..1 + len]
                .iter()
                .map(|&u| char::from_u32(u).unwrap_or('\u{FFFD}'))
                .collect();
            if unicode::property_contains(&name, cp) != cat_negated {
                found = true;
                break;
            }
            cats = &cats[1 + len..];
        }
    }
    found != negated
}
