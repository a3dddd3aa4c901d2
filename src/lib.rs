/*!

# perlre - a PCRE-compatible regex front-end

This crate compiles delimited PCRE-style patterns into a compact linear
bytecode program for a backtracking NFA matcher. It is the front half of a
regex engine: the parser, the tree, and the writer. Executing the program,
caching compiled patterns, and applying replacements are the consumer's
side of the interface.

# Example: compiling a pattern

```rust
use perlre::{compile, Options};
let program = compile(r"/(\d{4})-(\d{2})/", Options::new()).unwrap();
assert_eq!(program.cap_size, 3); // the whole match plus two groups
```

# Example: patterns carry their own modifiers

A pattern is delimited the way `preg` functions expect, with trailing
modifier letters:

```rust
use perlre::{parse_pattern, Options};
let tree = parse_pattern("{colou?r}i", Options::new()).unwrap();
assert!(tree.options.ignore_case);
```

# Supported syntax

The PCRE core: alternation, greedy/lazy/possessive quantifiers, character
classes with Unicode properties, named and numbered groups and
backreferences, lookaround, atomic groups, branch-reset alternation
`(?|...)`, conditionals `(?(1)...)`, subroutine calls `(?&name)`/`(?-1)`,
backtracking verbs `(*PRUNE)`, and the `(*CRLF)`-family newline pragmas.

Pattern text is parsed to UTF-16 semantics: the program's literals and
sets are in UTF-16 code units, and explicit UTF-8 byte-range idioms like
`[\xC2-\xDF][\x80-\xBF]` are rewritten to the equivalent UTF-16 sets
before emission.

# Errors

Compilation either succeeds or fails at the first offending character
with a structured [`Error`] carrying the byte offset into the raw input.
There are no warnings.

*/

#![warn(clippy::all)]
#![allow(clippy::upper_case_acronyms, clippy::match_like_matches_macro)]

pub use crate::api::*;
pub use crate::error::{Error, ErrorKind};
pub use crate::insn::{anchor, op, CompiledRegex, FirstChars, LiteralPrefix};
pub use crate::options::{Bsr, Newline, Options};
pub use crate::replacement::{Replacement, ReplacementItem};
pub use crate::tree::{Node, NodeKind, RegexTree, INFINITE};
pub use crate::utf16conv::convert_tree;

mod api;
pub mod charclass;
mod codepointset;
mod emit;
mod error;
mod insn;
mod options;
mod parse;
mod prefix;
mod preparse;
mod replacement;
mod tree;
mod unicode;
mod utf16conv;
