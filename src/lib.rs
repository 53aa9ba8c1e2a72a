//! Purpose: Typed, multi-version object serialization and conversion library.
//! Exports: `api` (stable surface), `core` (registry, conversion, framing, codecs, errors).
//! Role: Library backing the `scheme-codec` CLI and downstream applications.
//! Invariants: No global state; registries and catalogs are passed explicitly.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
