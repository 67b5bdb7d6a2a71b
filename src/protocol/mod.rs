// ABOUTME: Protocol module for the relay
// ABOUTME: Text control messages, replies and the speaker-side client

/// WebSocket client for the speaker side
pub mod client;
/// Control message parsing and server replies
pub mod messages;
