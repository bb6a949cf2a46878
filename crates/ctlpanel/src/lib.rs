//! # ctlpanel
//!
//! Wiring shared by the `ctlpanel` server and the `ctlpanel-client` tool:
//! audio device selection and a small WebSocket client.

#![deny(unsafe_code)]

pub mod client;
pub mod device;

pub use device::build_audio_device;
