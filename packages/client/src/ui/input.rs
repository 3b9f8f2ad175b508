//! Interactive line input.

use std::thread;

use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::{mpsc, watch};

use crate::{
    ui::{console::Console, session::UserCommand},
    usecase::HealthReport,
};

const HELP: &str = "\
Commands:
  TEXT                               send a chat message
  /appearance NAME #RRGGBB [PASSWORD] change name, colour and tripcode
  /answer TEXT                       answer the captcha
  /captcha                           request a new captcha
  /users                             list users in the chat
  /status                            show the stream status
  /help                              show this help
  /quit                              exit";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// Forwarded to the session
    Session(UserCommand),
    Status,
    Help,
    Quit,
    /// Unknown command or bad arguments
    Invalid(String),
}

/// Parse one line typed by the user; `None` for a blank line.
pub fn parse_line(line: &str) -> Option<InputLine> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Some(InputLine::Session(UserCommand::Say(
            line.trim_end_matches(['\r', '\n']).to_string(),
        )));
    };

    let (command, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();
    let parsed = match command {
        "appearance" | "name" => {
            let mut parts = args.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(name), Some(color)) => InputLine::Session(UserCommand::Appearance {
                    name: name.to_string(),
                    color: color.to_string(),
                    password: parts.collect::<Vec<_>>().join(" "),
                }),
                _ => InputLine::Invalid("usage: /appearance NAME #RRGGBB [PASSWORD]".to_string()),
            }
        }
        "answer" if !args.is_empty() => InputLine::Session(UserCommand::Answer(args.to_string())),
        "answer" => InputLine::Invalid("usage: /answer TEXT".to_string()),
        "captcha" => InputLine::Session(UserCommand::RequestCaptcha),
        "users" => InputLine::Session(UserCommand::ShowUsers),
        "status" => InputLine::Status,
        "help" => InputLine::Help,
        "quit" | "exit" => InputLine::Quit,
        // "//text" sends "/text"
        _ if command.starts_with('/') => {
            InputLine::Session(UserCommand::Say(trimmed[1..].to_string()))
        }
        other => InputLine::Invalid(format!("unknown command /{other}, try /help")),
    };
    Some(parsed)
}

/// Read lines on a dedicated thread until `/quit` or end of input.
///
/// Session commands go to `commands`; dropping the sender on exit tells the
/// session to shut down.
pub fn spawn_input(
    commands: mpsc::Sender<UserCommand>,
    status: watch::Receiver<Option<HealthReport>>,
    console: Console,
) -> std::io::Result<()> {
    thread::Builder::new()
        .name("input".to_string())
        .spawn(move || read_lines(commands, status, console))?;
    Ok(())
}

fn read_lines(
    commands: mpsc::Sender<UserCommand>,
    status: watch::Receiver<Option<HealthReport>>,
    console: Console,
) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            tracing::error!("Failed to initialize line editor: {}", e);
            return;
        }
    };

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                tracing::error!("Failed to read input: {}", e);
                break;
            }
        };
        let Some(parsed) = parse_line(&line) else {
            continue;
        };
        if let Err(e) = editor.add_history_entry(line.as_str()) {
            tracing::debug!("Failed to add history entry: {}", e);
        }

        match parsed {
            InputLine::Session(command) => {
                if commands.blocking_send(command).is_err() {
                    break;
                }
            }
            InputLine::Status => match status.borrow().as_ref() {
                Some(report) => console.print_status(report),
                None => println!("* No stream status yet"),
            },
            InputLine::Help => println!("{HELP}"),
            InputLine::Quit => break,
            InputLine::Invalid(message) => println!("! {message}"),
        }
    }
    tracing::debug!("Input closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_line_is_chat() {
        // テスト項目: コマンドでない行はそのままチャットとして送る
        assert_eq!(
            parse_line("  hello world "),
            Some(InputLine::Session(UserCommand::Say(
                "  hello world ".to_string()
            )))
        );
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn test_parse_appearance() {
        // テスト項目: /appearance は名前・色・パスワード（空白を含む）に分解される
        assert_eq!(
            parse_line("/appearance alice #ff0000 open sesame"),
            Some(InputLine::Session(UserCommand::Appearance {
                name: "alice".to_string(),
                color: "#ff0000".to_string(),
                password: "open sesame".to_string(),
            }))
        );
        assert!(matches!(
            parse_line("/appearance alice"),
            Some(InputLine::Invalid(_))
        ));
    }

    #[test]
    fn test_parse_commands() {
        // テスト項目: 各コマンドの解釈
        assert_eq!(
            parse_line("/answer x7k2"),
            Some(InputLine::Session(UserCommand::Answer("x7k2".to_string())))
        );
        assert!(matches!(parse_line("/answer"), Some(InputLine::Invalid(_))));
        assert_eq!(
            parse_line("/captcha"),
            Some(InputLine::Session(UserCommand::RequestCaptcha))
        );
        assert_eq!(
            parse_line("/users"),
            Some(InputLine::Session(UserCommand::ShowUsers))
        );
        assert_eq!(parse_line("/status"), Some(InputLine::Status));
        assert_eq!(parse_line("/quit"), Some(InputLine::Quit));
        assert!(matches!(parse_line("/dance"), Some(InputLine::Invalid(_))));
    }

    #[test]
    fn test_parse_escaped_slash() {
        // テスト項目: "//" で始まる行は先頭のスラッシュを一つ外してチャットとして送る
        assert_eq!(
            parse_line("//shrug"),
            Some(InputLine::Session(UserCommand::Say("/shrug".to_string())))
        );
    }
}
