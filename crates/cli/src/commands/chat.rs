use std::io::{self, BufRead, Write};

use fixfurn_agent::orchestrator::TurnError;
use fixfurn_core::config::LoadOptions;
use fixfurn_server::bootstrap::bootstrap;

use super::CommandResult;

/// One interactive session against the configured backend. Reads lines from
/// stdin until EOF or an exit word; a failed turn keeps the session open.
pub fn run() -> CommandResult {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime",
                format!("could not start async runtime: {error}"),
                2,
            );
        }
    };

    let app = match runtime.block_on(bootstrap(LoadOptions::default())) {
        Ok(app) => app,
        Err(error) => {
            return CommandResult::failure("chat", "bootstrap", error.to_string(), 2);
        }
    };

    let session_id = format!("cli-{}", std::process::id());
    let stdin = io::stdin();
    let mut turns = 0u32;

    println!("fixfurn concierge - type your message, or `exit` to leave");
    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(error) => {
                return CommandResult::failure("chat", "stdin", error.to_string(), 2);
            }
        }

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        match runtime.block_on(app.orchestrator.handle_user_message(&session_id, message)) {
            Ok(reply) => {
                turns += 1;
                println!("concierge> {reply}");
            }
            Err(TurnError::Backend(error)) => {
                println!("concierge> (unavailable: {error} - your session is still open, try again)");
            }
        }
    }

    CommandResult::success("chat", format!("session ended after {turns} completed turns"))
}
