use std::rc::Rc;

use clap::Subcommand;
use tracklog_core::{Config, Database, IntervalTimer};

use super::print_event;

const TIMER_KEY: &str = "interval_engine";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a work phase
    Start,
    /// Pause the active phase
    Pause,
    /// Resume the paused phase
    Resume,
    /// Stop, logging the work phase if it reached one minute
    Stop,
    /// End the current break early without logging
    SkipBreak,
    /// Reset to idle defaults
    Reset,
    /// Print current timer state as JSON
    Status,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default().interval_config();
    let db = Rc::new(Database::open()?);
    let mut engine =
        IntervalTimer::new(Rc::clone(&db), TIMER_KEY, config).with_sink(Rc::clone(&db));

    match action {
        TimerAction::Start => print_event(engine.start())?,
        TimerAction::Pause => print_event(engine.pause())?,
        TimerAction::Resume => print_event(engine.resume())?,
        TimerAction::Stop => print_event(engine.stop())?,
        TimerAction::SkipBreak => print_event(engine.skip_break())?,
        TimerAction::Reset => print_event(engine.reset())?,
        TimerAction::Status => {
            // Tick to fold in time since the last invocation; this is also
            // where a crossed phase edge fires.
            let completed = engine.tick();
            let status = serde_json::json!({
                "snapshot": engine.snapshot(),
                "display": engine.display(),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            if let Some(event) = completed {
                println!("{}", serde_json::to_string_pretty(&event)?);
            }
        }
    }

    Ok(())
}
