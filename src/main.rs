use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

mod actions;
mod api;
mod config;
mod error;
mod export;
mod filters;
mod models;
mod notifier;
mod poller;
mod render;
mod siren;
mod state;
mod storage;
#[cfg(test)]
mod testing;
mod validation;

use crate::actions::ActionOutcome;
use crate::api::{ApiClient, DataSource};
use crate::config::AdminConfig;
use crate::error::AdminError;
use crate::export::CsvMode;
use crate::filters::{DateRange, SortOrder, Stats, ViewFilters};
use crate::models::ReportStatus;
use crate::notifier::AlertNotifier;
use crate::poller::{EventCallback, PollIntervals, PollingSession, SessionEvent};
#[cfg(feature = "audio")]
use crate::siren::RodioSiren;
use crate::siren::{BellSiren, SirenDevice};
use crate::state::{DashboardState, SharedState};
use crate::storage::{LocalStore, ADMIN_DATA, ADMIN_TOKEN};

#[derive(Parser)]
#[command(name = "campus-shield-admin")]
#[command(about = "Administrator console for Campus Shield safety reports and siren alerts", long_about = None)]
struct Cli {
    /// Admin API base URL (overrides CAMPUS_SHIELD_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ViewArgs {
    /// Case-insensitive text to look for
    #[arg(long, default_value = "")]
    search: String,
    /// all, today, week or month
    #[arg(long, default_value = "all")]
    range: DateRange,
    /// newest or oldest
    #[arg(long, default_value = "newest")]
    sort: SortOrder,
}

impl ViewArgs {
    fn filters(&self) -> ViewFilters {
        ViewFilters {
            date_range: self.range,
            search: self.search.clone(),
            sort: self.sort,
            ..ViewFilters::default()
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum View {
    Users,
    Reports,
    Sirens,
}

impl View {
    fn name(self) -> &'static str {
        match self {
            View::Users => "users",
            View::Reports => "reports",
            View::Sirens => "sirens",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Store the admin credential issued by the sign-in flow
    Login {
        #[arg(long)]
        token: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Forget the credential and remembered alerts
    Logout,
    /// List registered users
    Users {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long)]
        college: Option<String>,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        year: Option<String>,
        /// Print the values available for --college, --course and --year
        #[arg(long)]
        options: bool,
    },
    /// List incident reports
    Reports {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long)]
        status: Option<ReportStatus>,
        /// Print the values available for --status
        #[arg(long)]
        options: bool,
    },
    /// List emergency siren alerts
    Sirens {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Show dashboard totals
    Stats {
        #[arg(long, default_value = "all")]
        range: DateRange,
    },
    /// Export a collection to CSV
    Export {
        #[arg(long, value_enum)]
        view: View,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Quote fields that contain delimiters
        #[arg(long)]
        quoted: bool,
    },
    /// Delete a user account
    DeleteUser {
        #[arg(long)]
        id: String,
    },
    /// Mark a report resolved
    Resolve {
        #[arg(long)]
        id: String,
    },
    /// Delete a report
    DeleteReport {
        #[arg(long)]
        id: String,
    },
    /// Check a registration payload against the backend rules
    Validate {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        college_email: String,
    },
    /// Poll continuously and sound the siren on new alerts
    Watch {
        /// Use the terminal bell instead of the audio device
        #[arg(long)]
        bell: bool,
    },
}

fn connect(config: &AdminConfig, store: &LocalStore) -> anyhow::Result<ApiClient> {
    ApiClient::from_store(config, store).map_err(|err| match err {
        AdminError::MissingCredential => {
            anyhow!("not signed in; run `campus-shield-admin login --token <token>` first")
        }
        other => other.into(),
    })
}

async fn load_dashboard(
    config: &AdminConfig,
    store: &LocalStore,
) -> anyhow::Result<(ApiClient, SharedState)> {
    let api = connect(config, store)?;
    let state = DashboardState::shared();
    let generation = state::lock(&state).generation();
    poller::refresh_data(&api, &state, generation)
        .await
        .context("failed to fetch users and reports")?;
    Ok((api, state))
}

async fn fetch_sirens(api: &ApiClient) -> anyhow::Result<Vec<models::AlertRecord>> {
    let envelope = api.fetch_sirens().await.context("failed to fetch sirens")?;
    if !envelope.success {
        return Err(AdminError::Rejected("/getsirens".to_string()).into());
    }
    Ok(envelope.sirens)
}

fn describe(outcome: ActionOutcome, done: &str) -> String {
    match outcome {
        ActionOutcome::Applied => done.to_string(),
        ActionOutcome::NotLoaded => format!("{done} (record was not in the current view)"),
        ActionOutcome::Skipped => "Nothing to do.".to_string(),
    }
}

fn siren_device(config: &AdminConfig, bell: bool) -> Arc<dyn SirenDevice> {
    #[cfg(feature = "audio")]
    if !bell {
        return Arc::new(RodioSiren::new(config.siren_sound.clone()));
    }
    #[cfg(not(feature = "audio"))]
    if !bell {
        if let Some(path) = &config.siren_sound {
            warn!("built without the audio feature; ignoring {}", path.display());
        }
    }
    Arc::new(BellSiren::default())
}

async fn watch(config: &AdminConfig, store: Arc<LocalStore>, bell: bool) -> anyhow::Result<()> {
    let api: Arc<dyn DataSource> = Arc::new(connect(config, &store)?);
    let siren = siren_device(config, bell);
    let notifier = Arc::new(
        AlertNotifier::new(Arc::clone(&store), siren, config.siren_timeout)
            .with_quiet_cold_start(config.quiet_cold_start),
    );

    let state = DashboardState::shared();
    let watch_state = Arc::clone(&state);
    let printer_state = Arc::clone(&state);
    let on_event: EventCallback = Arc::new(move |event: SessionEvent| match event {
        SessionEvent::DataRefreshed { users, reports } => {
            info!("refreshed {users} users and {reports} reports");
            let guard = state::lock(&printer_state);
            let stats = Stats::compute(&guard, DateRange::Today, Local::now());
            print!("{}", render::render_stats(&stats, DateRange::Today));
        }
        SessionEvent::SirensObserved(observation) if observation.triggered => {
            println!(
                "!!! {} new emergency alert(s), {} total. Press Enter to silence.",
                observation.current - observation.previous,
                observation.current
            );
        }
        SessionEvent::SirensObserved(_) => {}
        SessionEvent::Error(message) => print!("{}", render::render_banner(Some(message.as_str()))),
    });

    let intervals = PollIntervals {
        data: config.data_interval,
        sirens: config.siren_interval,
    };
    let session = PollingSession::start(
        api,
        state,
        Arc::clone(&notifier),
        intervals,
        Some(on_event),
    );
    println!("Watching {}. Enter silences the siren, `logout` signs out, Ctrl-C exits.", config.api_url);
    if state::lock(&watch_state).loading {
        println!("Loading users and reports...");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut logged_out = false;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim() == "logout" => {
                    logged_out = true;
                    break;
                }
                Ok(Some(_)) => {
                    if notifier.is_sounding() {
                        notifier.silence();
                        println!("Siren silenced.");
                    }
                }
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!("stdin closed: {err}");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    notifier.silence();
    session.stop().await;

    if logged_out {
        store.clear_session().context("failed to clear session")?;
        println!("Signed out.");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = AdminConfig::from_env();
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }

    let store = Arc::new(LocalStore::open(&config.state_dir).with_context(|| {
        format!(
            "failed to open state directory {}",
            config.state_dir.display()
        )
    })?);

    match cli.command {
        Commands::Login { token, name } => {
            store.set(ADMIN_TOKEN, token.trim())?;
            if let Some(name) = name {
                store.set(ADMIN_DATA, &json!({ "name": name }))?;
            }
            info!("credential stored in {}", config.state_dir.display());
            println!("Signed in.");
        }
        Commands::Logout => {
            store.clear_session()?;
            println!("Signed out.");
        }
        Commands::Users {
            view,
            college,
            course,
            year,
            options,
        } => {
            let (_, state) = load_dashboard(&config, &store).await?;
            if options {
                let guard = state::lock(&state);
                let mut years = filters::distinct_values(&guard.users, |u| u.year.as_deref());
                years.sort();
                print!(
                    "{}",
                    render::render_options(&[
                        ("college", filters::distinct_values(&guard.users, |u| u.college.as_deref())),
                        ("course", filters::distinct_values(&guard.users, |u| u.course.as_deref())),
                        ("year", years),
                    ])
                );
                return Ok(());
            }
            let filters = ViewFilters {
                college,
                course,
                year,
                ..view.filters()
            };
            let guard = state::lock(&state);
            let users = filters::filter_users(&guard.users, &filters, Local::now());
            print!("{}", render::render_users(&users));
        }
        Commands::Reports {
            view,
            status,
            options,
        } => {
            let (_, state) = load_dashboard(&config, &store).await?;
            if options {
                let guard = state::lock(&state);
                let statuses = filters::distinct_values(&guard.reports, |r| Some(r.status.as_str()));
                print!("{}", render::render_options(&[("status", statuses)]));
                return Ok(());
            }
            let filters = ViewFilters {
                status,
                ..view.filters()
            };
            let guard = state::lock(&state);
            let reports = filters::filter_reports(&guard.reports, &filters, Local::now());
            print!("{}", render::render_reports(&reports));
        }
        Commands::Sirens { view } => {
            let api = connect(&config, &store)?;
            let alerts = fetch_sirens(&api).await?;
            let alerts = filters::filter_alerts(&alerts, &view.filters(), Local::now());
            print!("{}", render::render_sirens(&alerts));
        }
        Commands::Stats { range } => {
            let (api, state) = load_dashboard(&config, &store).await?;
            let alerts = fetch_sirens(&api).await?;
            let mut guard = state::lock(&state);
            guard.sirens = alerts;
            let stats = Stats::compute(&guard, range, Local::now());
            print!("{}", render::render_stats(&stats, range));
        }
        Commands::Export {
            view,
            out_dir,
            quoted,
        } => {
            let mode = if quoted { CsvMode::Quoted } else { CsvMode::Legacy };
            let now = Utc::now();
            let (api, state) = load_dashboard(&config, &store).await?;
            let result = match view {
                View::Users => {
                    let users = state::lock(&state).users.clone();
                    export::write_export(&out_dir, view.name(), &users, mode, now)
                }
                View::Reports => {
                    let reports = state::lock(&state).reports.clone();
                    export::write_export(&out_dir, view.name(), &reports, mode, now)
                }
                View::Sirens => {
                    let alerts = fetch_sirens(&api).await?;
                    export::write_export(&out_dir, view.name(), &alerts, mode, now)
                }
            };
            match result {
                Ok(path) => println!("Exported {} to {}.", view.name(), path.display()),
                Err(AdminError::EmptyExport) => println!("No {} to export.", view.name()),
                Err(err) => return Err(err).context("export failed"),
            }
        }
        Commands::DeleteUser { id } => {
            let (api, state) = load_dashboard(&config, &store).await?;
            let outcome = actions::delete_user(&api, &state, &id)
                .await
                .context(actions::DELETE_USER_ERROR)?;
            println!("{}", describe(outcome, "User deleted."));
        }
        Commands::Resolve { id } => {
            let (api, state) = load_dashboard(&config, &store).await?;
            let outcome = actions::resolve_report(&api, &state, &id)
                .await
                .context(actions::UPDATE_STATUS_ERROR)?;
            match outcome {
                ActionOutcome::Skipped => println!("Report {id} is already resolved."),
                other => println!("{}", describe(other, "Report marked resolved.")),
            }
        }
        Commands::DeleteReport { id } => {
            let (api, state) = load_dashboard(&config, &store).await?;
            let outcome = actions::delete_report(&api, &state, &id)
                .await
                .context(actions::DELETE_REPORT_ERROR)?;
            println!("{}", describe(outcome, "Report deleted."));
        }
        Commands::Validate {
            username,
            password,
            college_email,
        } => {
            let payload = json!({
                "username": username,
                "password": password,
                "college_email": college_email,
            });
            match validation::validate_registration(&payload) {
                Ok(()) => println!("Payload is valid."),
                Err(failure) => {
                    println!("HTTP {}", failure.status);
                    println!("{}", serde_json::to_string_pretty(&failure)?);
                    return Err(AdminError::Validation(failure).into());
                }
            }
        }
        Commands::Watch { bell } => watch(&config, Arc::clone(&store), bell).await?,
    }

    Ok(())
}
