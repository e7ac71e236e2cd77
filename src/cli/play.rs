//! Terminal playback with seeking.

use anyhow::{Context, Result};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::audio::AudioArtifact;
use crate::cli::args::PlayCliArgs;
use crate::playback::{
    format_position, PlaybackController, PlaybackCursor, PlaybackEngine, RodioEngine,
};

pub type CommandLines = Lines<BufReader<Stdin>>;

const SKIP_SECONDS: f64 = 5.0;
const BAR_WIDTH: usize = 30;

/// Line-oriented commands from stdin, shared by recording and playback.
pub fn command_lines() -> CommandLines {
    BufReader::new(tokio::io::stdin()).lines()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerCommand {
    Toggle,
    Seek(f64),
    Skip(f64),
    Quit,
}

pub fn parse_player_command(line: &str) -> Option<PlayerCommand> {
    match line.trim() {
        "" | "p" => Some(PlayerCommand::Toggle),
        "q" => Some(PlayerCommand::Quit),
        "+" => Some(PlayerCommand::Skip(SKIP_SECONDS)),
        "-" => Some(PlayerCommand::Skip(-SKIP_SECONDS)),
        other => other.parse::<f64>().ok().map(PlayerCommand::Seek),
    }
}

/// `[=====>      ] 0:05 / 0:20`
pub fn render_scrub_bar(cursor: &PlaybackCursor, width: usize) -> String {
    let fraction = if cursor.duration > 0.0 {
        (cursor.current_time / cursor.duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * width as f64).round() as usize;
    let bar: String = (0..width)
        .map(|i| match i.cmp(&filled) {
            std::cmp::Ordering::Less => '=',
            std::cmp::Ordering::Equal => '>',
            std::cmp::Ordering::Greater => ' ',
        })
        .collect();
    format!(
        "[{}] {} / {}{}",
        bar,
        format_position(cursor.current_time),
        format_position(cursor.duration),
        if cursor.is_playing { "" } else { " (paused)" }
    )
}

/// Handle the play CLI command.
pub async fn handle_play_command(args: PlayCliArgs) -> Result<()> {
    let engine = RodioEngine::open(&args.file)
        .with_context(|| format!("Cannot play {}", args.file.display()))?;
    let mut lines = command_lines();
    run_player(engine, &mut lines).await
}

/// Listen to a finished recording before deciding what to do with it.
pub async fn preview(artifact: &AudioArtifact, lines: &mut CommandLines) -> Result<()> {
    let engine = RodioEngine::for_artifact(artifact)?;
    run_player(engine, lines).await
}

async fn run_player<E: PlaybackEngine>(engine: E, lines: &mut CommandLines) -> Result<()> {
    let mut player = PlaybackController::new(engine);
    player.poll_engine();

    println!("[Enter] play/pause, [seconds] seek, [+]/[-] skip {SKIP_SECONDS}s, [q] done");
    player.toggle_play()?;

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_player_command(&line) {
                    Some(PlayerCommand::Toggle) => {
                        player.toggle_play()?;
                    }
                    Some(PlayerCommand::Seek(time)) => {
                        player.seek(time);
                    }
                    Some(PlayerCommand::Skip(delta)) => {
                        let target = player.cursor().current_time + delta;
                        player.seek(target);
                    }
                    Some(PlayerCommand::Quit) => break,
                    None => println!("Unknown command '{}'", line.trim()),
                }
            }
            _ = ticker.tick() => {
                player.poll_engine();
                print!("\r{}", render_scrub_bar(&player.cursor(), BAR_WIDTH));
                let _ = std::io::stdout().flush();
            }
        }
    }
    println!();

    if player.cursor().is_playing {
        player.toggle_play()?;
    }
    debug!("Playback closed at {}", format_position(player.cursor().current_time));
    Ok(())
}
