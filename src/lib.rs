// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the interactive explorer.
//
// Module responsibilities:
// - `api`: the OAuth-1.0a-signed client for the Cirrus Notes REST API
//   (authorization flow plus notebook, note and attachment operations).
// - `model`: value objects the client returns and their wire mapping.
// - `error`: the error taxonomy shared by every operation.
// - `ui`: the terminal explorer and access-token persistence, which
//   delegate all network work to `api`.
//
// Keeping this separation makes it easier to test the API logic or
// replace the UI in the future (for example, adding a TUI or GUI).
pub mod api;
pub mod error;
pub mod model;
pub mod ui;
