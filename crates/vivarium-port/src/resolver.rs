// SPDX-License-Identifier: Apache-2.0
//! Symbolic label resolution contract.

/// Resolves a label hash to a grid location on behalf of external tooling
/// (compilers, debuggers, genome browsers).
///
/// The core's label index implements this trait; adapters may wrap it with
/// caching or remoting but must preserve the determinism contract: for a
/// fixed grid state, identical queries return identical answers, and ties are
/// broken toward the smallest flat index.
pub trait LabelResolver {
    /// Returns the flat index of the nearest `LABEL` molecule with value
    /// `hash` owned by `owner`, measured by absolute flat-index distance from
    /// `from`, or `None` when the owner has no such label.
    fn resolve_label(&mut self, owner: u32, hash: u32, from: usize) -> Option<usize>;
}
