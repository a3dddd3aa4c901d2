//! The compiled bytecode program and its opcode set

use memchr::memmem;
use std::collections::HashMap;
use std::fmt;

/// Opcodes. The program is a flat `i32` array of opcodes and operands; a
/// backtracking matcher dispatches on `code & op::MASK` and reads the
/// operands that follow.
pub mod op {
    /// Fixed repetitions of a single unit, set or negated unit:
    /// operands (unit-or-string, count).
    pub const ONEREP: i32 = 0;
    pub const NOTONEREP: i32 = 1;
    pub const SETREP: i32 = 2;

    /// Greedy loops: operands (unit-or-string, max).
    pub const ONELOOP: i32 = 3;
    pub const NOTONELOOP: i32 = 4;
    pub const SETLOOP: i32 = 5;

    /// Lazy loops: operands (unit-or-string, max).
    pub const ONELAZY: i32 = 6;
    pub const NOTONELAZY: i32 = 7;
    pub const SETLAZY: i32 = 8;

    /// Single matches: operand (unit) or (string index).
    pub const ONE: i32 = 9;
    pub const NOTONE: i32 = 10;
    pub const SET: i32 = 11;

    /// A literal run: operand (string index).
    pub const MULTI: i32 = 12;

    /// Backreference: operand (mapped slot).
    pub const REF: i32 = 13;

    // Anchors; no operands.
    pub const BOL: i32 = 14;
    pub const EOL: i32 = 15;
    pub const BOUNDARY: i32 = 16;
    pub const NONBOUNDARY: i32 = 17;
    pub const BEGINNING: i32 = 18;
    pub const START: i32 = 19;
    pub const ENDZ: i32 = 20;
    pub const END: i32 = 21;

    /// Always fails; no operands.
    pub const NOTHING: i32 = 22;

    /// Control flow. Branch targets are absolute code offsets.
    pub const LAZYBRANCH: i32 = 23;
    pub const BRANCHMARK: i32 = 24;
    pub const LAZYBRANCHMARK: i32 = 25;
    pub const NULLCOUNT: i32 = 26;
    pub const SETCOUNT: i32 = 27;
    pub const BRANCHCOUNT: i32 = 28;
    pub const LAZYBRANCHCOUNT: i32 = 29;
    pub const NULLMARK: i32 = 30;
    pub const SETMARK: i32 = 31;
    pub const CAPTUREMARK: i32 = 32;
    pub const GETMARK: i32 = 33;
    pub const SETJUMP: i32 = 34;
    pub const BACKJUMP: i32 = 35;
    pub const FOREJUMP: i32 = 36;
    pub const TESTREF: i32 = 37;
    pub const GOTO: i32 = 38;

    /// End of program.
    pub const STOP: i32 = 40;

    pub const ECMABOUNDARY: i32 = 41;
    pub const NONECMABOUNDARY: i32 = 42;

    /// Call the subpattern whose capture opens at `cap_positions[slot]`.
    pub const CALLSUBROUTINE: i32 = 43;

    /// `\K`.
    pub const RESETMATCHSTART: i32 = 44;

    /// A `(*VERB)`; operand is the verb code.
    pub const BACKTRACKINGVERB: i32 = 45;

    /// Mask selecting the opcode from a code word.
    pub const MASK: i32 = 63;

    /// Flag bit: this instruction matches right to left.
    pub const RTL: i32 = 64;

    /// Flag bit: this instruction matches case-insensitively.
    pub const CI: i32 = 128;

    /// \return the total size in words of the instruction, opcode
    /// included.
    pub fn size(opcode: i32) -> usize {
        match opcode & MASK {
            NOTHING | BOL | EOL | BOUNDARY | NONBOUNDARY | ECMABOUNDARY | NONECMABOUNDARY
            | BEGINNING | START | ENDZ | END | NULLMARK | SETMARK | GETMARK | SETJUMP
            | BACKJUMP | FOREJUMP | STOP | RESETMATCHSTART => 1,
            ONE | NOTONE | SET | MULTI | REF | TESTREF | GOTO | LAZYBRANCH | BRANCHMARK
            | LAZYBRANCHMARK | NULLCOUNT | SETCOUNT | CALLSUBROUTINE | BACKTRACKINGVERB => 2,
            ONEREP | NOTONEREP | SETREP | ONELOOP | NOTONELOOP | SETLOOP | ONELAZY | NOTONELAZY
            | SETLAZY | BRANCHCOUNT | LAZYBRANCHCOUNT | CAPTUREMARK => 3,
            _ => panic!("Unknown opcode {}", opcode),
        }
    }

    /// \return whether this opcode pushes a backtracking track frame.
    pub fn backtracks(opcode: i32) -> bool {
        matches!(
            opcode & MASK,
            ONELOOP
                | NOTONELOOP
                | SETLOOP
                | ONELAZY
                | NOTONELAZY
                | SETLAZY
                | LAZYBRANCH
                | BRANCHMARK
                | LAZYBRANCHMARK
                | NULLCOUNT
                | SETCOUNT
                | BRANCHCOUNT
                | LAZYBRANCHCOUNT
                | NULLMARK
                | SETMARK
                | CAPTUREMARK
                | GETMARK
                | SETJUMP
                | BACKJUMP
                | FOREJUMP
                | GOTO
                | CALLSUBROUTINE
        )
    }

    pub(crate) fn name(opcode: i32) -> &'static str {
        match opcode & MASK {
            ONEREP => "Onerep",
            NOTONEREP => "Notonerep",
            SETREP => "Setrep",
            ONELOOP => "Oneloop",
            NOTONELOOP => "Notoneloop",
            SETLOOP => "Setloop",
            ONELAZY => "Onelazy",
            NOTONELAZY => "Notonelazy",
            SETLAZY => "Setlazy",
            ONE => "One",
            NOTONE => "Notone",
            SET => "Set",
            MULTI => "Multi",
            REF => "Ref",
            BOL => "Bol",
            EOL => "Eol",
            BOUNDARY => "Boundary",
            NONBOUNDARY => "Nonboundary",
            BEGINNING => "Beginning",
            START => "Start",
            ENDZ => "EndZ",
            END => "End",
            NOTHING => "Nothing",
            LAZYBRANCH => "Lazybranch",
            BRANCHMARK => "Branchmark",
            LAZYBRANCHMARK => "Lazybranchmark",
            NULLCOUNT => "Nullcount",
            SETCOUNT => "Setcount",
            BRANCHCOUNT => "Branchcount",
            LAZYBRANCHCOUNT => "Lazybranchcount",
            NULLMARK => "Nullmark",
            SETMARK => "Setmark",
            CAPTUREMARK => "Capturemark",
            GETMARK => "Getmark",
            SETJUMP => "Setjump",
            BACKJUMP => "Backjump",
            FOREJUMP => "Forejump",
            TESTREF => "Testref",
            GOTO => "Goto",
            STOP => "Stop",
            ECMABOUNDARY => "ECMABoundary",
            NONECMABOUNDARY => "NonECMABoundary",
            CALLSUBROUTINE => "CallSubroutine",
            RESETMATCHSTART => "ResetMatchStart",
            BACKTRACKINGVERB => "BacktrackingVerb",
            _ => "???",
        }
    }
}

/// Leading-anchor bits derived from the program.
pub mod anchor {
    pub const BEGINNING: u32 = 1 << 0;
    pub const BOL: u32 = 1 << 1;
    pub const START: u32 = 1 << 2;
    pub const EOL: u32 = 1 << 3;
    pub const ENDZ: u32 = 1 << 4;
    pub const END: u32 = 1 << 5;
    pub const BOUNDARY: u32 = 1 << 6;
}

/// The set of UTF-16 units a match could possibly start with, as a
/// serialized set payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstChars {
    pub set: Box<[u32]>,
    pub case_insensitive: bool,
}

/// A literal prefix every match must start with, plus a substring searcher
/// over its UTF-8 encoding for rapid scanning.
#[derive(Debug, Clone)]
pub struct LiteralPrefix {
    pub units: Box<[u32]>,
    pub case_insensitive: bool,
    pub finder: memmem::Finder<'static>,
}

/// A compiled pattern: the flat code array, its string table, and derived
/// metadata. Immutable once built and safe to share across threads.
#[derive(Debug, Clone)]
pub struct CompiledRegex {
    /// Opcodes and operands.
    pub codes: Vec<i32>,

    /// Deduplicated table of literal runs and set payloads, as UTF-16
    /// units (sets use the class payload encoding).
    pub strings: Vec<Box<[u32]>>,

    /// Static upper bound of backtracking track frames, for matcher stack
    /// pre-allocation.
    pub track_count: usize,

    /// External slot -> dense slot, when the external numbering has holes.
    pub caps: Option<HashMap<i32, i32>>,

    /// Number of dense capture slots.
    pub cap_size: usize,

    /// Code offset where each dense slot's capture opens (its Setmark),
    /// or -1 if it never opens. Subroutine calls index this at run time.
    pub cap_positions: Vec<i32>,

    /// Possible first units of a match.
    pub fc_prefix: Option<FirstChars>,

    /// Required literal prefix.
    pub prefix: Option<LiteralPrefix>,

    /// Leading anchors.
    pub anchors: u32,

    /// Whether the pattern matches right to left.
    pub right_to_left: bool,
}

impl CompiledRegex {
    /// Map an external slot number to its dense index. Slot -1 (no slot)
    /// passes through.
    pub fn map_capnum(&self, slot: i32) -> i32 {
        match (&self.caps, slot) {
            (_, -1) => -1,
            (Some(map), _) => *map.get(&slot).expect("Unmapped capture slot"),
            (None, _) => slot,
        }
    }
}

impl fmt::Display for CompiledRegex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut pos = 0;
        while pos < self.codes.len() {
            let code = self.codes[pos];
            let size = op::size(code);
            write!(f, "{:04} {}", pos, op::name(code))?;
            if code & op::CI != 0 {
                write!(f, "-Ci")?;
            }
            if code & op::RTL != 0 {
                write!(f, "-Rtl")?;
            }
            for operand in &self.codes[pos + 1..pos + size] {
                write!(f, " {}", operand)?;
            }
            writeln!(f)?;
            pos += size;
        }
        Ok(())
    }
}
