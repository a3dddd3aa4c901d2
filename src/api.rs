use crate::emit;
use crate::error::Error;
use crate::insn::CompiledRegex;
use crate::options::Options;
use crate::parse;
use crate::replacement::{self, Replacement};
use crate::tree::RegexTree;
use crate::utf16conv;

pub use crate::parse::{escape, unescape};

/// Parse a delimited pattern into its tree form without emitting code.
///
/// The raw string carries its own delimiters and trailing modifiers, e.g.
/// `/ab+c/i`; `initial_options` supplies anything the caller configures
/// out of band.
#[inline]
pub fn parse_pattern(raw: &str, initial_options: Options) -> Result<RegexTree, Error> {
    parse::parse(raw, initial_options)
}

/// Compile a delimited pattern to its bytecode program.
///
/// This wires the pipeline together: preprocess and parse, canonicalize
/// UTF-8 byte ranges to UTF-16 sets, then write the program. Compilation
/// of a bounded pattern terminates in bounded time; the result is
/// immutable and safe to share across threads. Callers that reuse
/// patterns should cache the result keyed by `(pattern, options)`.
///
/// ```rust
/// use perlre::{compile, Options};
/// let program = compile("/ab+c/i", Options::new()).unwrap();
/// assert!(program.cap_size >= 1);
/// ```
pub fn compile(raw: &str, initial_options: Options) -> Result<CompiledRegex, Error> {
    let mut tree = parse::parse(raw, initial_options)?;
    utf16conv::convert_tree(&mut tree);
    Ok(emit::write(&tree))
}

/// Parse a replacement string against a compiled pattern's capture
/// tables. The tree supplies names; the program supplies the dense remap.
pub fn parse_replacement(
    rep: &str,
    tree: &RegexTree,
    program: &CompiledRegex,
) -> Result<Replacement, Error> {
    replacement::parse_replacement(
        rep,
        tree.options,
        program.caps.as_ref(),
        program.cap_size as i32,
        &tree.capnames,
    )
}
