/// Raw weather document ingestion.
///
/// - `cimis` — CIMIS-style provider/record payloads.

pub mod cimis;
