pub mod audio;
pub mod backend;
pub mod cli;
pub mod config;
pub mod global;
pub mod meeting;
pub mod pipeline;
pub mod playback;
pub mod resources;
