//! Transport Layer (spec §4.9): STDIO with autodetected framing, and an
//! HTTP JSON-RPC endpoint. Both share the same [`crate::protocol::Dispatcher`].

pub mod http;
pub mod stdio;

/// The two STDIO framings a process can settle into (REDESIGN FLAGS,
/// "Autodetected framing"). Chosen once from the first non-empty input and
/// locked for the process lifetime; downstream writers pick their encoder
/// via a single match on this type rather than re-inspecting the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    LengthPrefixed,
    Ndjson,
}
