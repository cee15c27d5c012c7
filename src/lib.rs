// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) wires these modules together into the upload sequence.
//
// Module responsibilities:
// - `config`: Reads and writes the YAML config file holding each
//   client's partner id, hardware id and OAuth token pair.
// - `partner`: Compiled-in table of per-reseller OAuth and upload
//   endpoints, keyed by partner id.
// - `api`: Encapsulates the HTTP interactions with the partner cloud
//   (token refresh, document upload) and the debug response tracing.
// - `error`: Error types shared by the modules above.
pub mod api;
pub mod config;
pub mod error;
pub mod partner;
