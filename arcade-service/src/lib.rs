//! # Arcade Service
//!
//! The request surface over the VM:
//! 1. `start_game` compiles the agent's files and opens a session
//! 2. `update_state` swaps in a new state, reusing the cached artifact
//! 3. The returned [`GameFrame`] is handed to a [`Viewer`], which keeps one
//!    live scene per rendering target and feeds it each frame
//!
//! The service owns the session cache, the viewer owns the scenes.

mod service;
mod viewer;

pub use service::{GameFrame, GameResponse, GameService, StartRequest, UpdateRequest};
pub use viewer::Viewer;
