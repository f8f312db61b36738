pub mod daemon_path;
pub mod data;
pub mod dates;
pub mod finance;
pub mod output;
pub mod process;
pub mod profile;
pub mod tasks;

use std::{io::Write, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use data::{process_export_command, process_import_command, process_reset_command};
use dates::DateStyle;
use finance::{
    process_dashboard_command, process_expense_command, process_stats_command,
    resolve_expense_advice, ExpenseCommand, StatsCommand,
};
use process::{kill_previous_servers, restart_server};
use profile::{process_profile_command, process_settings_command, ProfileCommand, SettingsCommand};
use tasks::{process_task_command, resolve_task_advice, TaskCommand};
use tracing::{debug, level_filters::LevelFilter};

use crate::{
    advice::{AdviceClient, AdviceContext, View},
    config::AdviceConfig,
    daemon::{data_dir, start_daemon},
    state::{
        persistence::{FilePersistence, PersistenceGateway},
        store::AppState,
    },
    utils::{
        dir::resolve_application_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "DailyFocus", version, long_about = None)]
#[command(about = "Tasks with reminders and a small expense ledger, right in the terminal", long_about = None)]
pub(crate) struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a reminder daemon for the application")]
    Init {},
    #[command(
        about = "Run the reminder daemon directly in current console. Used for debugging"
    )]
    Serve {},
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(subcommand, about = "Manage tasks and their reminders")]
    Task(TaskCommand),
    #[command(subcommand, about = "Record and review income and expenses")]
    Expense(ExpenseCommand),
    #[command(about = "Monthly spending and category breakdown")]
    Stats {
        #[command(flatten)]
        command: StatsCommand,
    },
    #[command(about = "Overview of the day")]
    Dashboard {},
    #[command(subcommand, about = "Show or edit the user profile")]
    Profile(ProfileCommand),
    #[command(subcommand, about = "Show or edit reminder settings")]
    Settings(SettingsCommand),
    #[command(about = "Write a backup of all data into a directory")]
    Export {
        #[arg(long, help = "Target directory. Defaults to the current directory")]
        out: Option<PathBuf>,
    },
    #[command(about = "Replace all data with a backup")]
    Import { file: PathBuf },
    #[command(about = "Delete all data")]
    Reset {
        #[arg(long, help = "Confirm that everything should be deleted")]
        yes: bool,
    },
    #[command(about = "A short tip for the chosen part of the application")]
    Advice {
        #[arg(long, default_value_t = View::Dashboard)]
        view: View,
    },
}

/// Things every command gets to see besides the state.
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    pub now: DateTime<Local>,
    pub date_style: DateStyle,
}

/// Exclusive access to the store for the duration of one command.
pub struct Session<G: PersistenceGateway> {
    gateway: G,
    lock: G::Lock,
    pub state: AppState,
}

impl<G: PersistenceGateway> Session<G> {
    pub async fn open(gateway: G) -> Result<Self> {
        let lock = gateway.lock().await?;
        let state = AppState::load(&gateway).await;
        Ok(Self {
            gateway,
            lock,
            state,
        })
    }

    /// Saves what the command changed and lets other processes in.
    pub async fn close(mut self) -> Result<()> {
        self.state.persist_changes(&self.gateway).await?;
        drop(self.lock);
        Ok(())
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let app_dir = resolve_application_path(args.dir.clone())?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    let invocation = Invocation {
        now: Local::now(),
        date_style: args.date_style,
    };

    match args.commands {
        Commands::Init {} => {
            restart_server(&app_dir)?;
            Ok(())
        }
        Commands::Stop {} => {
            let daemon = daemon_path::to_daemon_path(std::env::current_exe()?);
            kill_previous_servers(&daemon)?;
            Ok(())
        }
        Commands::Serve {} => {
            start_daemon(app_dir, true).await?;
            Ok(())
        }
        command => {
            let advice = AdviceClient::from_config(&AdviceConfig::from_env()?)?;
            let gateway = FilePersistence::new(data_dir(&app_dir))?;
            let command = resolve_advice(command, &advice).await;
            let mut stdout = std::io::stdout().lock();
            if is_read_only(&command) {
                let mut state = AppState::load(&gateway).await;
                run_command(command, &mut state, &gateway, &advice, invocation, &mut stdout).await
            } else {
                let mut session = Session::open(&gateway).await?;
                run_command(
                    command,
                    &mut session.state,
                    &gateway,
                    &advice,
                    invocation,
                    &mut stdout,
                )
                .await?;
                session.close().await
            }
        }
    }
}

/// Finishes the AI requests of commands that change state, so none is awaited while the store
/// is locked.
async fn resolve_advice(command: Commands, advice: &AdviceClient) -> Commands {
    match command {
        Commands::Task(command) => Commands::Task(resolve_task_advice(command, advice).await),
        Commands::Expense(command) => {
            Commands::Expense(resolve_expense_advice(command, advice).await)
        }
        command => command,
    }
}

/// Commands that never change state. They run on a snapshot without taking the store lock.
fn is_read_only(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Task(
            TaskCommand::List { .. } | TaskCommand::Polish { .. } | TaskCommand::Summarize { .. }
        ) | Commands::Expense(
            ExpenseCommand::List { .. } | ExpenseCommand::Tips {} | ExpenseCommand::Predict { .. }
        ) | Commands::Stats { .. }
            | Commands::Dashboard {}
            | Commands::Advice { .. }
    )
}

async fn run_command<G: PersistenceGateway>(
    command: Commands,
    state: &mut AppState,
    gateway: &G,
    advice: &AdviceClient,
    invocation: Invocation,
    out: &mut impl Write,
) -> Result<()> {
    debug!("Running {command:?}");
    match command {
        Commands::Task(command) => {
            process_task_command(command, state, advice, invocation, out).await
        }
        Commands::Expense(command) => {
            process_expense_command(command, state, advice, invocation, out).await
        }
        Commands::Stats { command } => process_stats_command(command, state, out),
        Commands::Dashboard {} => process_dashboard_command(state, invocation, out),
        Commands::Profile(command) => process_profile_command(command, state, out).await,
        Commands::Settings(command) => process_settings_command(command, state, out),
        Commands::Export { out: dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            process_export_command(state, &dir, invocation, out).await
        }
        Commands::Import { file } => process_import_command(state, &file, out).await,
        Commands::Reset { yes } => {
            process_reset_command(state, gateway, yes, out).await
        }
        Commands::Advice { view } => {
            let context = AdviceContext::new(view, state.data());
            writeln!(out, "{}", advice.generate_contextual_advice(&context).await)?;
            Ok(())
        }
        Commands::Init {} | Commands::Serve {} | Commands::Stop {} => Ok(()),
    }
}
