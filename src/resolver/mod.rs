//! Path and module resolution, shared across language adapters.
//!
//! Three families, each pure over the supplied set and the phase-one
//! indexes:
//!
//! - [`probe`]: relative-path resolution by extension probing and index-file
//!   conventions (`index.ts`, `__init__.py`, `mod.rs`), plus glob expansion
//!   for embed directives.
//! - [`manifest`]: manifest-aware root resolution, walking up to `go.mod`
//!   or `Cargo.toml`, mapping module paths to directories, honoring local
//!   path remaps (`replace` directives, `path` dependencies).
//! - [`fuzzy`]: last-resort matching of qualified references against file
//!   path components, with a strict unique-winner rule.
//!
//! None of these touch the filesystem. Candidates exist only if the supplied
//! set contains them.

pub mod fuzzy;
pub mod manifest;
pub mod probe;
