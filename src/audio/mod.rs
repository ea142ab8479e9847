//! # Audio Module
//!
//! Per-guild playback: a FIFO queue, a three-phase state machine and the
//! voice transport contract.
//!
//! ### [`player`] - Orchestrator
//! - Drives Idle / Playing / CountdownToDisconnect for every guild
//! - Consumes track completions and countdown expiries from one event loop
//!
//! ### [`queue`] - Queue Management
//! - Guild state guarded by its own lock
//! - Generation counter that turns stale notifications into no-ops
//!
//! ### [`voice`] - Transport
//! - `VoiceGateway` / `VoiceSession` traits, implemented over songbird in `bot::voice`

pub mod player;
pub mod queue;
pub mod registry;
pub mod track;
pub mod voice;
