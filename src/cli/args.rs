use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::backend::{MAX_SPEAKERS, MIN_SPEAKERS};

#[derive(Parser, Debug)]
#[command(name = "meetcap")]
#[command(about = "Record meetings and follow their processing", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Record a meeting from the microphone and submit it for processing
    Record(RecordCliArgs),
    /// Submit an existing audio file for processing
    Upload(UploadCliArgs),
    /// Follow the processing of a job that was already submitted
    Track(TrackCliArgs),
    /// Print the transcript and summary of a processed meeting
    Show(ShowCliArgs),
    /// Ask a question about a processed meeting
    Ask(AskCliArgs),
    /// Play back an audio file with seeking
    Play(PlayCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct RecordCliArgs {
    /// Number of speakers in the meeting (defaults to the configured value)
    #[arg(short, long, value_parser = speaker_count)]
    pub speakers: Option<u8>,
    /// Also save the recording as a WAV file (in DIR, or the data directory)
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    pub save: Option<Option<PathBuf>>,
    /// Stop after recording; do not submit
    #[arg(long)]
    pub no_submit: bool,
}

#[derive(ClapArgs, Debug)]
pub struct UploadCliArgs {
    /// Audio file to process
    pub file: PathBuf,
    /// Number of speakers in the meeting (defaults to the configured value)
    #[arg(short, long, value_parser = speaker_count)]
    pub speakers: Option<u8>,
}

#[derive(ClapArgs, Debug)]
pub struct TrackCliArgs {
    /// Job ID returned when the meeting was submitted
    pub job_id: String,
    /// The job came from a live recording rather than an uploaded file
    #[arg(long)]
    pub recording: bool,
}

#[derive(ClapArgs, Debug)]
pub struct ShowCliArgs {
    pub job_id: String,
}

#[derive(ClapArgs, Debug)]
pub struct AskCliArgs {
    pub job_id: String,
    /// Question about the meeting
    pub question: String,
    /// Number of transcript excerpts to retrieve
    #[arg(long, default_value = "5")]
    pub top_k: usize,
}

#[derive(ClapArgs, Debug)]
pub struct PlayCliArgs {
    /// Audio file to play
    pub file: PathBuf,
}

fn speaker_count(value: &str) -> Result<u8, String> {
    let count: u8 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !(MIN_SPEAKERS..=MAX_SPEAKERS).contains(&count) {
        return Err(format!(
            "must be between {MIN_SPEAKERS} and {MAX_SPEAKERS}"
        ));
    }
    Ok(count)
}
