use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "somnia-cli", version, about = "Somnia CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sleep tracking
    Sleep {
        #[command(subcommand)]
        action: commands::sleep::SleepAction,
    },
    /// Wake-up alarm
    Alarm {
        #[command(subcommand)]
        action: commands::alarm::AlarmAction,
    },
    /// Bedtime and wake time
    Schedule {
        #[command(subcommand)]
        action: commands::schedule::ScheduleAction,
    },
    /// Dream journal
    Journal {
        #[command(subcommand)]
        action: commands::journal::JournalAction,
    },
    /// Notification inbox
    Notifications {
        #[command(subcommand)]
        action: commands::notifications::NotificationsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so stdout stays valid JSON. Level comes from
/// `SOMNIA_LOG`, defaulting to warnings only.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SOMNIA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Sleep { action } => commands::sleep::run(action),
        Commands::Alarm { action } => commands::alarm::run(action),
        Commands::Schedule { action } => commands::schedule::run(action),
        Commands::Journal { action } => commands::journal::run(action),
        Commands::Notifications { action } => commands::notifications::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
