pub mod config;
pub mod sessions;
pub mod stopwatch;
pub mod timer;

use tracklog_core::TimerEvent;

/// Print an operation's event as JSON, or a no-op marker when the engine
/// refused the transition.
pub(crate) fn print_event(event: Option<TimerEvent>) -> Result<(), Box<dyn std::error::Error>> {
    match event {
        Some(event) => println!("{}", serde_json::to_string_pretty(&event)?),
        None => println!("{{\"type\": \"noop\"}}"),
    }
    Ok(())
}
