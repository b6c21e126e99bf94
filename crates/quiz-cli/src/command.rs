//! Parsing of the commands typed on stdin.

use quiz_core::protocol::Question;

/// One line of user input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join,
    Start,
    Stop,
    /// Raw answer argument; may be an option number.
    Answer(String),
    Reset,
    Status,
    Help,
    Quit,
    /// Blank line, skipped.
    Empty,
    /// Unrecognized input (kept for the error message).
    Unknown(String),
}

pub const HELP: &str = "\
commands:
  join              join the game
  start             ask the server to start the game
  stop              ask the server to stop the game
  answer <text|n>   answer the current question (text or option number)
  reset             clear the local game state
  status            print the current state
  quit              disconnect and exit";

/// Parse one input line. Command names are case-insensitive.
pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "join" => Command::Join,
        "start" => Command::Start,
        "stop" => Command::Stop,
        "answer" | "a" if !rest.is_empty() => Command::Answer(rest.to_string()),
        "reset" => Command::Reset,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// Turn an answer argument into the answer text: a 1-based option number
/// picks that option, anything else is sent as typed.
pub fn resolve_answer(question: &Question, input: &str) -> String {
    if let Ok(n) = input.parse::<usize>()
        && let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i))
    {
        return option.text().to_string();
    }
    input.to_string()
}
