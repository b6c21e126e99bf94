//! Client orchestrator: wires the WebSocket channel, the session controller
//! and the terminal together.
//!
//! This module owns the event loop and drives:
//! - [`quiz_client::controller::GameSessionController`]: session state and countdown
//! - stdin: one [`Command`] per line

use tokio::io::{AsyncBufReadExt, BufReader};

use quiz_client::adapter::EventChannelAdapter;
use quiz_client::config::ChannelConfig;
use quiz_client::controller::{GameSessionController, PollResult};
use quiz_client::error::ClientError;
use quiz_client::identity::IdentityProvider;
use quiz_client::state::{GameSessionState, SessionChange, SessionInput, SessionPhase};
use quiz_core::protocol::ServerEvent;
use quiz_core::ws_transport::WsConnector;

use crate::command::{Command, HELP, parse_command, resolve_answer};

type Controller = GameSessionController<EventChannelAdapter<WsConnector>>;

/// Connect to the game channel and run until the user quits or stdin closes.
pub async fn start_client(
    config: ChannelConfig,
    identity: &impl IdentityProvider,
) -> Result<(), Box<dyn std::error::Error>> {
    let adapter = EventChannelAdapter::new(WsConnector, config);
    let mut ctrl = GameSessionController::new(adapter.clone(), identity);
    println!("Playing as '{}'. Type 'help' for commands.", ctrl.user_id());

    let result = run_event_loop(&mut ctrl).await;
    drop(ctrl);
    adapter.destroy();
    result
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

async fn run_event_loop(ctrl: &mut Controller) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            poll = ctrl.recv() => {
                if let PollResult::Updated(input, changed) = poll {
                    render(&input, changed, ctrl.state());
                }
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if handle_command(ctrl, parse_command(&line)) {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Run one command. Returns `true` when the user asked to quit.
fn handle_command(ctrl: &mut Controller, command: Command) -> bool {
    let result: Result<(), ClientError> = match command {
        Command::Join => ctrl.join_game(),
        Command::Start => ctrl.start_game(),
        Command::Stop => ctrl.stop_game(),
        Command::Answer(input) => {
            let answer = ctrl
                .state()
                .current_question
                .as_ref()
                .map(|q| resolve_answer(q, &input))
                .unwrap_or(input);
            match ctrl.submit_answer(&answer) {
                Ok(true) => {
                    println!("Answer sent: {answer}");
                    Ok(())
                }
                Ok(false) => {
                    println!("Nothing to answer right now.");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Reset => {
            ctrl.reset_game();
            println!("Game state cleared.");
            Ok(())
        }
        Command::Status => {
            print_status(ctrl.state());
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Quit => return true,
        Command::Empty => Ok(()),
        Command::Unknown(text) => {
            println!("Unknown command '{text}'. Type 'help' for commands.");
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("Error: {e}");
    }
    false
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn render(input: &SessionInput, changed: SessionChange, state: &GameSessionState) {
    match input {
        SessionInput::Connected => println!("Connected."),
        SessionInput::Disconnected => println!("Disconnected. Waiting for reconnection..."),
        SessionInput::ChannelError(error) => println!("Channel error: {error}"),
        SessionInput::Server(ServerEvent::NewQuestion(nq)) => {
            println!();
            println!(
                "Question {}/{} ({}s): {}",
                nq.question_number,
                nq.total_questions,
                state.time_remaining_secs,
                nq.question.prompt()
            );
            for (i, option) in nq.question.option_texts().enumerate() {
                println!("  {}. {}", i + 1, option);
            }
        }
        SessionInput::Server(ServerEvent::AnswerResult(result)) => {
            if result.correct {
                println!("Correct! Score: {}", state.score);
            } else {
                println!(
                    "Wrong, the answer was '{}'. Score: {}",
                    result.correct_answer, state.score
                );
            }
        }
        SessionInput::Server(ServerEvent::GameEnded(_)) => {
            println!("Game over. Final score: {}", state.score);
        }
        SessionInput::Server(ServerEvent::GameStopped) => println!("Game stopped."),
        SessionInput::Tick => {
            let secs = state.time_remaining_secs;
            if secs == 0 {
                println!("Time's up!");
            } else if secs <= 5 {
                println!("{secs}s left");
            }
        }
        SessionInput::Joined | SessionInput::AnswerSubmitted { .. } | SessionInput::Reset => {
            if changed.phase {
                println!("[{}]", state.phase);
            }
        }
    }
}

fn print_status(state: &GameSessionState) {
    println!(
        "user: {} | {} | phase: {} | score: {}",
        state.user_id,
        if state.connected { "connected" } else { "disconnected" },
        state.phase,
        state.score
    );
    if let Some(question) = &state.current_question {
        println!(
            "question {}/{}: {} ({}s left)",
            state.question_number,
            state.total_questions,
            question.prompt(),
            state.time_remaining_secs
        );
        if let Some(answer) = &state.submitted_answer {
            println!("answered: {answer}");
        }
    } else if state.phase == SessionPhase::Waiting {
        println!("waiting for the game to start");
    }
    if let Some(error) = &state.last_error {
        println!("last error: {error}");
    }
}
