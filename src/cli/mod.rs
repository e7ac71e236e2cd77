pub mod args;
pub mod play;
pub mod record;
pub mod show;
pub mod track;
pub mod upload;

pub use args::{Cli, CliCommand};
pub use play::handle_play_command;
pub use record::handle_record_command;
pub use show::{handle_ask_command, handle_show_command};
pub use track::handle_track_command;
pub use upload::handle_upload_command;
