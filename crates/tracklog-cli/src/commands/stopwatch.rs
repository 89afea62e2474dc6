use std::rc::Rc;

use clap::Subcommand;
use tracklog_core::{Database, Stopwatch};

use super::print_event;

const STOPWATCH_KEY: &str = "stopwatch_engine";

#[derive(Subcommand)]
pub enum StopwatchAction {
    /// Start a new session
    Start,
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Stop, logging the session if it reached one minute
    Stop,
    /// Discard the session without logging
    Reset,
    /// Print current state as JSON
    Status,
}

pub fn run(action: StopwatchAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Rc::new(Database::open()?);
    let mut engine = Stopwatch::new(Rc::clone(&db), STOPWATCH_KEY).with_sink(Rc::clone(&db));

    match action {
        StopwatchAction::Start => print_event(engine.start())?,
        StopwatchAction::Pause => print_event(engine.pause())?,
        StopwatchAction::Resume => print_event(engine.resume())?,
        StopwatchAction::Stop => print_event(engine.stop())?,
        StopwatchAction::Reset => print_event(engine.reset())?,
        StopwatchAction::Status => {
            // Tick to fold in time since the last invocation.
            engine.tick();
            let status = serde_json::json!({
                "snapshot": engine.snapshot(),
                "display": engine.display(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
