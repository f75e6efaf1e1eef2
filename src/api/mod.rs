// =============================================================================
// HTTP API — REST endpoints and the push websocket
// =============================================================================

pub mod rest;
pub mod ws;
