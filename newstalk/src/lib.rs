// Library interface for newstalk modules
// This allows tests and the CLI binary to import modules

pub mod api;
pub mod bias;
pub mod dialogue;
pub mod extension;
pub mod facts;
pub mod lifetime;
pub mod models;
pub mod personas;
pub mod playback;
pub mod seed;
pub mod source;
pub mod view;
