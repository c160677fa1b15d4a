pub mod generation; // Generator client, payload parsing, retry wrapper
pub mod reconcile; // Quote → byte span location
pub mod analysis; // Chunked parallel risk analysis
pub mod workflow; // Staged drafting state machine
