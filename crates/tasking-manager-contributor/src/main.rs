/*
[INPUT]:  CLI arguments, YAML configuration file, TM_TOKEN/TM_USERNAME environment
[OUTPUT]: Login, task listings, or an interactive contribution session
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, subcommands, or startup flow
*/

mod cli;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use dialoguer::Input;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tasking_manager_adapter::{
    AuthManager, ContributionMode, EditorDispatcher, SessionManager, TaskCategory, TaskingClient,
    ValidationPermission, categorize,
};
use tasking_manager_contributor::{ContributorConfig, ControllerSettings, TaskActionController};

use cli::console::{ConsoleNavigator, ConsoleNotifier};

const CONFIG_DIR_NAME: &str = "tm-contribute";
const DEFAULT_REDIRECT_URI: &str = "https://tasks.hotosm.org/authorized";

#[derive(Parser, Debug)]
#[command(name = "tm-contribute", version, about = "Tasking Manager contribution client")]
struct Cli {
    /// YAML configuration; defaults to <config dir>/tm-contribute/config.yaml when present
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    log_level: String,
    #[arg(long = "api-url", value_name = "URL")]
    api_url: Option<String>,
    #[arg(long, env = "TM_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[arg(long, env = "TM_USERNAME")]
    username: Option<String>,
    /// Preferred editor key (ID, JOSM, POTLATCH_2, FIELD_PAPERS, CUSTOM)
    #[arg(long)]
    editor: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in through OpenStreetMap and print the session token
    Login {
        #[arg(long, default_value = DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
    },
    /// Show the tasks you currently hold locks on
    Locked,
    /// List the tasks of a project
    Tasks {
        project_id: u64,
        #[arg(long, value_enum, default_value_t = ModeArg::Map)]
        mode: ModeArg,
    },
    /// Lock tasks, open the editor and submit the result
    Contribute {
        project_id: u64,
        #[arg(long, value_enum, default_value_t = ModeArg::Map)]
        mode: ModeArg,
        /// Tasks to select up front, comma separated
        #[arg(long, value_delimiter = ',')]
        tasks: Vec<u64>,
        /// Validate with elevated rights (invalidated and validated tasks too)
        #[arg(long)]
        elevated: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Map,
    Validate,
}

impl From<ModeArg> for ContributionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Map => ContributionMode::Mapping,
            ModeArg::Validate => ContributionMode::Validation,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(&args)?;
    let _log_guard = init_tracing(&args.log_level, config.log_dir.as_deref())?;

    info!(api = %config.api_base_url, command = ?args.command, "starting tm-contribute");

    match args.command {
        Command::Login { redirect_uri } => login(&config, &redirect_uri).await,
        Command::Locked => show_locked(&config).await,
        Command::Tasks { project_id, mode } => show_tasks(&config, project_id, mode.into()).await,
        Command::Contribute {
            project_id,
            mode,
            tasks,
            elevated,
        } => contribute(&config, project_id, mode.into(), &tasks, elevated).await,
    }
}

fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tm-contribute.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            Ok(None)
        }
    }
}

/// File configuration with command-line overrides applied
fn load_config(args: &Cli) -> Result<ContributorConfig> {
    let path = args.config_path.clone().or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join("config.yaml"))
            .filter(|path| path.exists())
    });

    let mut config = match path {
        Some(path) => {
            let path_str = path.to_str().context("config path must be valid utf-8")?;
            ContributorConfig::from_file(path_str)
                .with_context(|| format!("load config {}", path.display()))?
        }
        None => ContributorConfig::default(),
    };

    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(token) = &args.token {
        config.token = Some(token.clone());
    }
    if let Some(username) = &args.username {
        config.username = Some(username.clone());
    }
    if let Some(editor) = &args.editor {
        config.default_editor = editor.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_client(config: &ContributorConfig, require_session: bool) -> Result<TaskingClient> {
    let session = SessionManager::new();
    match (&config.token, &config.username) {
        (Some(token), Some(username)) => {
            session.set_session(token.clone(), username.clone(), config.locale.clone());
        }
        _ if require_session => {
            bail!("not logged in: run `tm-contribute login`, then set TM_TOKEN and TM_USERNAME")
        }
        _ => {}
    }
    TaskingClient::with_config_and_base_url(config.client_config(), &config.api_base_url, session)
        .context("create Tasking Manager client")
}

async fn login(config: &ContributorConfig, redirect_uri: &str) -> Result<()> {
    let auth = AuthManager::new(build_client(config, false)?);
    let authorize = auth
        .login_url(redirect_uri)
        .await
        .context("request login URL")?;

    println!("Open this URL and authorize the application:");
    println!("  {}", style(&authorize.auth_url).underlined());
    let code: String = Input::new()
        .with_prompt("Authorization code from the redirect")
        .interact_text()?;

    let response = auth
        .complete_login(redirect_uri, &code, config.locale.clone())
        .await
        .context("complete login")?;
    println!(
        "{} Logged in as {}",
        style("✓").green(),
        style(&response.username).bold()
    );
    println!("export TM_USERNAME={}", response.username);
    println!("export TM_TOKEN={}", response.session_token);
    Ok(())
}

async fn show_locked(config: &ContributorConfig) -> Result<()> {
    let client = build_client(config, true)?;
    let locked = client.locked_tasks().await.context("query locked tasks")?;
    match (locked.project_id, locked.is_empty()) {
        (_, true) | (None, _) => println!("You hold no task locks."),
        (Some(project_id), false) => println!(
            "Project #{project_id}: tasks {:?} ({})",
            locked.locked_tasks,
            locked.task_status.as_deref().unwrap_or("locked")
        ),
    }
    Ok(())
}

async fn show_tasks(
    config: &ContributorConfig,
    project_id: u64,
    mode: ContributionMode,
) -> Result<()> {
    let client = build_client(config, false)?;
    let tasks = client
        .project_tasks(project_id)
        .await
        .with_context(|| format!("load tasks of project {project_id}"))?;

    let username = config.username.as_deref().unwrap_or_default();
    for task in &tasks {
        let category = categorize(task, username, mode, config.validation_permission);
        let marker = match category {
            Ok(TaskCategory::Ready) => style("●").green(),
            Ok(TaskCategory::LockedByMe) => style("◆").cyan(),
            Ok(_) => style("○").dim(),
            Err(_) => style("?").yellow(),
        };
        let label = category.map_or_else(|_| "unknown".to_string(), |c| c.to_string());
        println!(
            "{marker} #{:<5} {:<22} {:<16} {}",
            task.task_id,
            task.task_status,
            label,
            task.lock_holder.as_deref().unwrap_or("")
        );
    }
    println!("{} task(s)", tasks.len());
    Ok(())
}

async fn contribute(
    config: &ContributorConfig,
    project_id: u64,
    mode: ContributionMode,
    preselected: &[u64],
    elevated: bool,
) -> Result<()> {
    let client = build_client(config, true)?;
    let username = client
        .session()
        .username()
        .context("session has no username")?;
    let editors =
        EditorDispatcher::with_remote_control_url(&config.josm_url, config.editor_timeout())
            .context("create editor dispatcher")?;

    let permission = if elevated {
        ValidationPermission::Elevated
    } else {
        config.validation_permission
    };
    let settings = ControllerSettings::new(project_id, mode, username)
        .with_permission(permission)
        .with_default_editor(config.default_editor.clone())
        .with_warning_lead(config.warning_lead());

    let controller = TaskActionController::new(
        settings,
        Arc::new(client),
        Arc::new(editors),
        Arc::new(ConsoleNavigator::from_api_base(&config.api_base_url)),
        Arc::new(ConsoleNotifier),
    );
    controller
        .load()
        .await
        .with_context(|| format!("load project {project_id}"))?;

    cli::interactive::run_contribute(&controller, preselected).await
}
