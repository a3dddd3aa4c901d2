//! The replacement-string minilanguage

use crate::error::Error;
use crate::options::Options;
use std::collections::HashMap;

/// One piece of a parsed replacement string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementItem {
    Literal(String),
    /// A capture by dense slot.
    Group(i32),
    /// `$&`.
    WholeMatch,
    /// `` $` ``: everything left of the match.
    LeftPortion,
    /// `$'`: everything right of the match.
    RightPortion,
    /// `$+`: the last matched group.
    LastGroup,
    /// `$_`: the whole input.
    WholeInput,
}

/// A parsed replacement. In right-to-left mode the applier walks the items
/// emitting into a buffer it reverses at the end; parsing is unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub items: Vec<ReplacementItem>,
    pub right_to_left: bool,
}

struct Builder {
    items: Vec<ReplacementItem>,
    literal: String,
}

impl Builder {
    fn push_char(&mut self, c: char) {
        self.literal.push(c);
    }

    fn push_str(&mut self, s: &str) {
        self.literal.push_str(s);
    }

    fn push_item(&mut self, item: ReplacementItem) {
        if !self.literal.is_empty() {
            self.items
                .push(ReplacementItem::Literal(std::mem::take(&mut self.literal)));
        }
        self.items.push(item);
    }

    fn finish(mut self) -> Vec<ReplacementItem> {
        if !self.literal.is_empty() {
            self.items.push(ReplacementItem::Literal(self.literal));
        }
        self.items
    }
}

/// Map an external slot to its dense index, mirroring the program's remap.
fn map_slot(caps: Option<&HashMap<i32, i32>>, slot: i32) -> Option<i32> {
    match caps {
        Some(map) => map.get(&slot).copied(),
        None => Some(slot),
    }
}

/// Parse a replacement string against the capture tables of a compiled
/// pattern. Unrecognized `$` sequences are literal text.
pub fn parse_replacement(
    rep: &str,
    options: Options,
    caps: Option<&HashMap<i32, i32>>,
    cap_size: i32,
    capnames: &HashMap<String, i32>,
) -> Result<Replacement, Error> {
    let mut b = Builder {
        items: Vec::new(),
        literal: String::new(),
    };
    let mut chars = rep.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => b.push_char('\\'),
                Some(d @ '0'..='9') => {
                    let slot = d.to_digit(10).unwrap() as i32;
                    match map_slot(caps, slot) {
                        Some(dense) if dense < cap_size => b.push_item(ReplacementItem::Group(dense)),
                        _ => {
                            b.push_char('\\');
                            b.push_char(d);
                        }
                    }
                }
                Some(other) => {
                    b.push_char('\\');
                    b.push_char(other);
                }
                None => b.push_char('\\'),
            },
            '$' => match chars.peek().copied() {
                Some('$') => {
                    chars.next();
                    b.push_char('$');
                }
                Some('&') => {
                    chars.next();
                    b.push_item(ReplacementItem::WholeMatch);
                }
                Some('`') => {
                    chars.next();
                    b.push_item(ReplacementItem::LeftPortion);
                }
                Some('\'') => {
                    chars.next();
                    b.push_item(ReplacementItem::RightPortion);
                }
                Some('+') => {
                    chars.next();
                    b.push_item(ReplacementItem::LastGroup);
                }
                Some('_') => {
                    chars.next();
                    b.push_item(ReplacementItem::WholeInput);
                }
                Some(d) if d.is_ascii_digit() => {
                    // Longest run of digits naming an existing group;
                    // otherwise the text stays literal.
                    let mut digits = String::new();
                    while let Some(&d) = chars.peek() {
                        if d.is_ascii_digit() {
                            digits.push(d);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let slot: i32 = digits.parse().unwrap_or(i32::MAX);
                    match map_slot(caps, slot) {
                        Some(dense) if dense < cap_size => b.push_item(ReplacementItem::Group(dense)),
                        _ => {
                            b.push_char('$');
                            b.push_str(&digits);
                        }
                    }
                }
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    let mut closed = false;
                    for d in chars.by_ref() {
                        if d == '}' {
                            closed = true;
                            break;
                        }
                        name.push(d);
                    }
                    let slot = if name.chars().all(|c| c.is_ascii_digit()) && !name.is_empty() {
                        name.parse().ok()
                    } else {
                        capnames.get(&name).copied()
                    };
                    let dense = slot.and_then(|s| map_slot(caps, s));
                    match (closed, dense) {
                        (true, Some(dense)) if dense < cap_size => {
                            b.push_item(ReplacementItem::Group(dense))
                        }
                        _ => {
                            b.push_str("${");
                            b.push_str(&name);
                            if closed {
                                b.push_char('}');
                            }
                        }
                    }
                }
                _ => b.push_char('$'),
            },
            c => b.push_char(c),
        }
    }
    Ok(Replacement {
        items: b.finish(),
        right_to_left: options.right_to_left,
    })
}
