//! # ctlpanel-core
//!
//! Foundation pieces shared by the control panel server and its clients.
//!
//! - [`protocol`]: JSON command envelopes, the sentinel reply, PCM format constants
//! - [`commands`]: validated command id → handler table and the default command set
//! - [`audio`]: blocking audio device trait with a silent and a `cpal` backend
//! - [`logging`]: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod audio;
pub mod commands;
pub mod logging;
pub mod protocol;

pub use audio::{AudioDevice, AudioError, NullAudioDevice, PcmClip};
pub use commands::{CommandError, CommandHandler, CommandTable};
pub use protocol::{CommandResponse, Inbound};
