//! # tether-push
//!
//! The optional event transport: a websocket session that delivers
//! snapshot/patch/event frames from the daemon, reconnecting with
//! exponential backoff. While connected it supersedes polling; the
//! scheduler consumes its events and toggles the active transport.

#![deny(unsafe_code)]

mod session;
mod shadow;

pub use session::{PushEvent, PushSession, PushSessionConfig};
pub use shadow::ShadowMap;
