//! Interactive command loop.
//!
//! Every input line is split into words (double quotes group words) and
//! parsed with clap, so `help` and `<command> --help` work as usual.

use crate::commands;
use crate::output::{self, OutputFormat};
use clap::{Parser, Subcommand};
use taskboard_api::{Priority, Progress};
use taskboard_session::SessionContext;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::debug;

pub type Input = Lines<BufReader<Stdin>>;

#[derive(Parser, Debug)]
#[command(name = "taskboard", no_binary_name = true, disable_version_flag = true)]
pub struct Line {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    /// Sign in with email and password
    Login {
        /// Account email; prompted when omitted
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        /// Account email; prompted when omitted
        email: Option<String>,
    },
    /// Sign out and clear cached data
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List tasks
    List,
    /// Add a task
    Add {
        /// Task title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        #[arg(short, long, default_value = "MEDIUM", value_parser = parse_priority)]
        priority: Priority,
        #[arg(long, default_value = "0", value_parser = parse_progress)]
        progress: Progress,
    },
    /// Change fields of a task
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long, value_parser = parse_priority)]
        priority: Option<Priority>,
        #[arg(long, value_parser = parse_progress)]
        progress: Option<Progress>,
    },
    /// Toggle a task between complete and not started
    Done { id: i64 },
    /// Delete a task
    Delete { id: i64 },
    /// Show task counts by priority and by progress
    Stats,
    /// Show what the route guards decide right now
    Guard,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

fn parse_priority(raw: &str) -> Result<Priority, String> {
    raw.parse().map_err(|e: taskboard_api::ApiError| field_message(&e))
}

fn parse_progress(raw: &str) -> Result<Progress, String> {
    let value: i64 = raw
        .trim_end_matches('%')
        .parse()
        .map_err(|_| format!("\"{raw}\" is not a number"))?;
    Progress::try_from(value).map_err(|e| field_message(&e))
}

fn field_message(error: &taskboard_api::ApiError) -> String {
    error
        .field_errors()
        .and_then(|errors| errors.first_message())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Split a line into words. Double quotes group words; a backslash escapes
/// the next character.
pub fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "dangling backslash".to_string())?;
                current.push(escaped);
                in_word = true;
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err("unterminated quote".to_string());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Parse one input line. `Ok(None)` for a blank line.
pub fn parse_line(line: &str) -> Result<Option<ShellCommand>, String> {
    let words = split_words(line)?;
    if words.is_empty() {
        return Ok(None);
    }
    Line::try_parse_from(words)
        .map(|parsed| Some(parsed.command))
        .map_err(|e| e.render().to_string())
}

/// Print a prompt and read one line. `None` at end of input.
pub async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?)
}

/// Run until `quit` or end of input.
pub async fn run(ctx: &SessionContext, format: OutputFormat) -> anyhow::Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    println!("Type 'help' for commands.");
    while let Some(line) = prompt(&mut input, "taskboard> ").await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                eprintln!("{}", message.trim_end());
                continue;
            }
        };
        debug!(?command, "Shell command");

        if command == ShellCommand::Quit {
            break;
        }
        if let Err(e) = commands::execute(ctx, &mut input, command, format).await {
            output::print_error(&format!("{e:#}"), format);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_quotes_and_escapes() {
        assert_eq!(
            split_words(r#"add "Write the report" -p high"#).unwrap(),
            ["add", "Write the report", "-p", "high"]
        );
        assert_eq!(split_words(r#"add say\ \"hi\""#).unwrap(), ["add", "say \"hi\""]);
        assert_eq!(split_words(r#"add """#).unwrap(), ["add", ""]);
        assert!(split_words("   ").unwrap().is_empty());
    }

    #[test]
    fn test_split_words_rejects_unbalanced_input() {
        assert!(split_words(r#"add "oops"#).is_err());
        assert!(split_words("add oops\\").is_err());
    }

    #[test]
    fn test_parse_add_joins_title_words() {
        let command = parse_line("add Buy milk --priority low --progress 40%")
            .unwrap()
            .unwrap();
        let ShellCommand::Add {
            title,
            priority,
            progress,
        } = command
        else {
            panic!("expected an add command");
        };
        assert_eq!(title.join(" "), "Buy milk");
        assert_eq!(priority, Priority::Low);
        assert_eq!(progress.value(), 40);
    }

    #[test]
    fn test_parse_add_defaults() {
        let command = parse_line("add Thing").unwrap().unwrap();
        assert_eq!(
            command,
            ShellCommand::Add {
                title: vec!["Thing".to_string()],
                priority: Priority::Medium,
                progress: Progress::ZERO,
            }
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range_progress() {
        let err = parse_line("add Thing --progress 150").unwrap_err();
        assert!(err.contains("between 0 and 100"), "{err}");
    }

    #[test]
    fn test_parse_update_and_ids() {
        assert_eq!(
            parse_line("update 4 --title \"New name\"").unwrap(),
            Some(ShellCommand::Update {
                id: 4,
                title: Some("New name".to_string()),
                priority: None,
                progress: None,
            })
        );
        assert_eq!(parse_line("done 9").unwrap(), Some(ShellCommand::Done { id: 9 }));
        assert!(parse_line("delete nine").is_err());
    }

    #[test]
    fn test_parse_blank_and_quit() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("exit").unwrap(), Some(ShellCommand::Quit));
        assert_eq!(
            parse_line("login a@b.com").unwrap(),
            Some(ShellCommand::Login {
                email: Some("a@b.com".to_string())
            })
        );
    }
}
