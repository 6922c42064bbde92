// Line-oriented terminal front-end.
//
// Reads commands from stdin, forwards them to the event loop, and prints
// every `UiUpdate` it receives as styled text.

use std::io::Write;

use crossterm::style::Stylize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use mash_core::backend::ProfileSide;
use mash_core::format::{format_number, format_score, format_vote_count};
use mash_core::protocol::{ConnectionView, Severity, Side, UiUpdate, UserCommand};
use mash_core::wallet::{ProviderId, UnknownProvider};

const HELP: &str = "\
commands:
  connect <provider>        phantom, solflare, backpack, coinbase, trust, glow
  disconnect
  left | right              vote in the current battle
  chad <id> | jeet <id>     vote on a profile
  comments <id>             show a profile's comments
  comment <id> <text>       post a comment
  like <comment-id>         toggle a like
  next                      skip to the next battle
  top                       refresh the leaderboard
  quit";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(UserCommand),
    Help,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command `{0}`; type `help` for a list")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Provider(#[from] UnknownProvider),
}

pub fn parse_command(line: &str) -> Result<Input, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let cmd = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(Input::Empty),
        "help" | "?" => return Ok(Input::Help),
        "connect" => {
            if rest.is_empty() {
                return Err(ParseError::Usage("connect <provider>"));
            }
            UserCommand::Connect(rest.parse::<ProviderId>()?)
        }
        "disconnect" => UserCommand::Disconnect,
        "left" | "l" | "1" => UserCommand::VoteBattle(Side::Left),
        "right" | "r" | "2" => UserCommand::VoteBattle(Side::Right),
        "chad" | "jeet" => {
            let side = if word.eq_ignore_ascii_case("chad") {
                ProfileSide::Chad
            } else {
                ProfileSide::Jeet
            };
            UserCommand::VoteProfile {
                entity_id: single_arg(rest, "chad|jeet <id>")?,
                side,
            }
        }
        "comments" => UserCommand::ShowComments {
            target_id: single_arg(rest, "comments <id>")?,
        },
        "comment" => {
            let Some((target, text)) = rest.split_once(char::is_whitespace) else {
                return Err(ParseError::Usage("comment <id> <text>"));
            };
            UserCommand::PostComment {
                target_id: target.to_string(),
                text: text.trim().to_string(),
            }
        }
        "like" => UserCommand::LikeComment {
            comment_id: single_arg(rest, "like <comment-id>")?,
        },
        "next" | "n" => UserCommand::NextBattle,
        "top" | "leaderboard" => UserCommand::RefreshLeaderboard,
        "quit" | "q" | "exit" => UserCommand::Quit,
        _ => return Err(ParseError::Unknown(word.to_string())),
    };
    Ok(Input::Command(cmd))
}

fn single_arg(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(arg), None) => Ok(arg.to_string()),
        _ => Err(ParseError::Usage(usage)),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render(update: &UiUpdate) -> String {
    match update {
        UiUpdate::BattlePair { round, left, right } => format!(
            "{} {} ({}) vs {} ({})",
            format!("Battle #{round}").bold(),
            left.username,
            left.handle,
            right.username,
            right.handle,
        ),
        UiUpdate::BattleTally(t) => format!(
            "  {} {:>3}% {} {:>3}% {}   [{} / {}]",
            t.left,
            t.left_percent,
            bar(t.left_percent),
            t.right_percent,
            t.right,
            format_vote_count(t.left_votes),
            format_vote_count(t.right_votes),
        ),
        UiUpdate::ProfileTally(t) => format!(
            "  {}: CHAD {} ({}%) / JEET {} ({}%)",
            t.entity_id,
            format_vote_count(t.chad_votes),
            t.chad_percent,
            format_vote_count(t.jeet_votes),
            t.jeet_percent,
        ),
        UiUpdate::GlobalStats(s) => format!(
            "global: {} chad / {} jeet / {} total ({}% jeet)",
            format_number(s.total_chad),
            format_number(s.total_jeet),
            format_number(s.total),
            s.jeet_percent,
        ),
        UiUpdate::Connection(ConnectionView::Connected {
            provider,
            short_address,
        }) => format!("{} {} {}", "●".green(), provider.display_name(), short_address),
        UiUpdate::Connection(ConnectionView::Disconnected) => {
            format!("{} not connected", "○".dark_grey())
        }
        UiUpdate::HighlightConnect => format!(
            "{} connect <{}>",
            ">>".yellow().bold(),
            ProviderId::ALL.map(ProviderId::as_str).join("|")
        ),
        UiUpdate::Notification { message, severity } => match severity {
            Severity::Success => message.as_str().green().to_string(),
            Severity::Info => message.as_str().cyan().to_string(),
            Severity::Warning => message.as_str().yellow().to_string(),
            Severity::Error => message.as_str().red().bold().to_string(),
        },
        UiUpdate::Streak(n) => format!("streak: {n}"),
        UiUpdate::UserVotes(n) => format!("your votes: {n}"),
        UiUpdate::Leaderboard(entities) => {
            let mut out = "leaderboard".bold().to_string();
            for (i, e) in entities.iter().enumerate() {
                out.push_str(&format!(
                    "\n  {:>2}. {:<20} {:>8}",
                    i + 1,
                    e.username,
                    format_score(e.votes)
                ));
            }
            out
        }
        UiUpdate::Comments {
            target_id,
            comments,
        } => {
            let mut out = format!("comments on {target_id} ({})", comments.len());
            for c in comments {
                out.push_str(&format!("\n  [{}] {} ♥{}", c.id, c.text, c.likes));
            }
            out
        }
        UiUpdate::CommentPosted(c) => format!("  [{}] {} ♥{}", c.id, c.text, c.likes),
        UiUpdate::LikeState {
            comment_id,
            liked,
            likes,
        } => format!(
            "  [{comment_id}] {}{likes}",
            if *liked { "♥" } else { "♡" }
        ),
    }
}

/// Text shown for a line that could not be parsed. An unknown wallet
/// reads the same as a provider that is missing at connect time.
pub fn render_parse_error(err: &ParseError) -> String {
    match err {
        ParseError::Provider(UnknownProvider(name)) => render(&UiUpdate::Notification {
            message: format!("{} wallet not found", name.trim().to_ascii_lowercase()),
            severity: Severity::Error,
        }),
        other => other.to_string().yellow().to_string(),
    }
}

fn bar(left_percent: u8) -> String {
    const WIDTH: usize = 20;
    let filled = (usize::from(left_percent) * WIDTH + 50) / 100;
    format!(
        "{}{}",
        "█".repeat(filled).red(),
        "█".repeat(WIDTH - filled).blue()
    )
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Drive the terminal until the user quits, stdin closes, or the event
/// loop goes away.
pub async fn run(
    mut ui_rx: mpsc::UnboundedReceiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::SetTitle("mash"))?;
    writeln!(stdout, "{HELP}")?;

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                let Some(update) = update else { break };
                writeln!(stdout, "{}", render(&update))?;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    let _ = cmd_tx.send(UserCommand::Quit).await;
                    break;
                };
                match parse_command(&line) {
                    Ok(Input::Command(cmd)) => {
                        debug!(?cmd, "terminal command");
                        let quit = cmd == UserCommand::Quit;
                        if cmd_tx.send(cmd).await.is_err() || quit {
                            break;
                        }
                    }
                    Ok(Input::Help) => writeln!(stdout, "{HELP}")?,
                    Ok(Input::Empty) => {}
                    Err(e) => writeln!(stdout, "{}", render_parse_error(&e))?,
                }
            }
        }
    }
    Ok(())
}
