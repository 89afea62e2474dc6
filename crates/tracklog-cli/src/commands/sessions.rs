use clap::Subcommand;
use tracklog_core::Database;

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List recent work sessions, newest first
    List {
        /// Maximum number of sessions to print
        #[arg(long, default_value = "20")]
        limit: u32,
    },
    /// Today's and all-time aggregates
    Stats,
}

pub fn run(action: SessionsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        SessionsAction::List { limit } => {
            let sessions = db.recent_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionsAction::Stats => {
            let stats = db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}
