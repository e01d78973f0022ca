mod logging;
mod offline;
mod render;
mod session;
mod settings;

use std::fs;
use std::io;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use forge_core::actions::UserAction;
use forge_core::config::RUN_OUTPUT_LOG;
use forge_core::mutation::MutationRequest;
use forge_core::path_key;
use forge_core::pipeline::PipelineStatus;
use forge_core::state::WorkspaceState;
use forge_core::Config;
use forge_exec::backend::HttpBackend;
use forge_exec::backend::PersistenceBackend;
use forge_exec::backend::SimulatedBackend;
use forge_exec::transport::PipelineTransport;
use forge_exec::transport::ReplayTransport;
use forge_exec::transport::WebSocketTransport;

use session::Session;

#[derive(Parser)]
#[command(name = "forge")]
#[command(version, about = "Live workspace client for a multi-agent code generator")]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to <config dir>/forge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override backend.base_url
    #[arg(long, global = true)]
    backend_url: Option<String>,

    /// Use an in-memory backend instead of HTTP
    #[arg(long, global = true)]
    offline: bool,

    /// JSON workspace file loaded into the offline backend and saved back after each command
    #[arg(long, global = true, requires = "offline")]
    seed: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the workspace tree
    Tree,

    /// Run the agent pipeline for a prompt and stream its progress
    Generate {
        prompt: String,
        /// Ask the pipeline to use a hosted model instead of the local one
        #[arg(long)]
        remote_llm: bool,
        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Feed recorded pipeline frames (JSON lines) through the workspace
    Replay {
        file: PathBuf,
        #[arg(long, default_value = "replay")]
        prompt: String,
    },

    /// Create a file; content comes from --from or stdin
    NewFile {
        path: String,
        #[arg(long)]
        from: Option<PathBuf>,
        /// Create the file empty without reading stdin
        #[arg(long)]
        empty: bool,
    },

    /// Create a folder
    NewFolder { path: String },

    /// Overwrite an existing file
    Save {
        path: String,
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Rename a file or folder in place
    Rename { path: String, new_name: String },

    /// Move a file or folder into another folder ("." for the root)
    Mv { path: String, target_dir: String },

    /// Duplicate a file or folder next to itself
    Dup { path: String, new_name: String },

    /// Delete a file or folder
    Rm { path: String },

    /// Delete every workspace entry
    ClearAll {
        #[arg(long)]
        yes: bool,
    },

    /// Execute a python file on the backend
    Run { path: String },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
    }

    let simulated = match (cli.offline, cli.seed.as_deref()) {
        (false, _) => None,
        (true, Some(seed)) => Some(offline::load(seed)?),
        (true, None) => Some(SimulatedBackend::new()),
    };
    let http;
    let backend: &dyn PersistenceBackend = match &simulated {
        Some(simulated) => simulated,
        None => {
            http = HttpBackend::new(
                &config.backend.base_url,
                Duration::from_secs(config.backend.timeout_secs),
            )?;
            &http
        }
    };

    dispatch(&config, backend, cli.command)?;

    if let (Some(simulated), Some(seed)) = (&simulated, cli.seed.as_deref()) {
        offline::save(seed, simulated)?;
    }
    Ok(())
}

fn dispatch(config: &Config, backend: &dyn PersistenceBackend, command: Commands) -> Result<()> {
    match command {
        Commands::Replay { file, prompt } => {
            let transport = ReplayTransport::new(file);
            generate(config, backend, &transport, prompt, None, None)
        }
        Commands::Generate {
            prompt,
            remote_llm,
            timeout_secs,
        } => {
            let transport = WebSocketTransport::new(config.backend.pipeline_url.clone());
            let use_local_llm = config.pipeline.use_local_llm && !remote_llm;
            generate(
                config,
                backend,
                &transport,
                prompt,
                Some(use_local_llm),
                timeout_secs.map(Duration::from_secs),
            )
        }
        command => {
            let transport = WebSocketTransport::new(config.backend.pipeline_url.clone());
            let mut session = Session::new(config, backend, &transport);
            session.refresh();
            fail_on_errors(&mut session)?;
            workspace_command(&mut session, command)
        }
    }
}

fn generate(
    config: &Config,
    backend: &dyn PersistenceBackend,
    transport: &dyn PipelineTransport,
    prompt: String,
    use_local_llm: Option<bool>,
    timeout: Option<Duration>,
) -> Result<()> {
    let mut session = Session::new(config, backend, transport);
    session.refresh();
    for message in session.take_errors() {
        tracing::warn!(message = %message, "starting without the current workspace");
    }

    session.user(UserAction::StartGeneration {
        prompt,
        use_local_llm: use_local_llm.unwrap_or(config.pipeline.use_local_llm),
    });

    let mut printed_seq = 0;
    let mut last_line = String::new();
    let status = session.drive_pipeline(timeout, |state| {
        if let Some(entry) = state.timeline.last() {
            let line = render::timeline_line(entry);
            if line != last_line {
                println!("{line}");
                last_line = line;
            }
        }
        for chunk in state.terminal.since(printed_seq) {
            println!("{}", render::terminal_line(chunk));
            printed_seq = chunk.seq;
        }
    });
    if status == PipelineStatus::Streaming {
        session.user(UserAction::CancelGeneration);
        bail!("pipeline did not finish in time");
    }

    fail_on_errors(&mut session)?;
    print_workspace(session.state());
    Ok(())
}

fn workspace_command(session: &mut Session<'_>, command: Commands) -> Result<()> {
    let request = match command {
        Commands::Tree => {
            print_workspace(session.state());
            return Ok(());
        }
        Commands::Run { path } => {
            if !session.state().store.is_file(&path) || path_key::extension(&path) != Some("py") {
                bail!("'{path}' is not a python file in the workspace");
            }
            session.user(UserAction::RunFile { path });
            if let Some(output) = session.state().store.get(RUN_OUTPUT_LOG) {
                println!("{output}");
            }
            return Ok(());
        }
        Commands::NewFile { path, from, empty } => {
            let content = if empty {
                String::new()
            } else {
                read_content(from)?
            };
            MutationRequest::CreateFile {
                dir: path_key::parent(&path).to_string(),
                name: path_key::basename(&path).to_string(),
                content,
            }
        }
        Commands::NewFolder { path } => MutationRequest::CreateFolder {
            dir: path_key::parent(&path).to_string(),
            name: path_key::basename(&path).to_string(),
        },
        Commands::Save { path, from } => MutationRequest::SaveFile {
            content: read_content(from)?,
            path,
        },
        Commands::Rename { path, new_name } => MutationRequest::Rename { path, new_name },
        Commands::Mv { path, target_dir } => MutationRequest::Move {
            path,
            target_dir: normalize_dir(&target_dir),
        },
        Commands::Dup { path, new_name } => MutationRequest::Duplicate { path, new_name },
        Commands::Rm { path } => MutationRequest::Delete { path },
        Commands::ClearAll { yes } => {
            if !yes {
                bail!("refusing to delete every entry without --yes");
            }
            MutationRequest::DeleteAll
        }
        Commands::Generate { .. } | Commands::Replay { .. } => {
            bail!("pipeline commands do not run against a seeded session")
        }
    };

    let report = session
        .mutate(request)
        .context("mutation produced no report")?;
    println!("{}", render::report_line(&report));
    if let Some(err) = report.error {
        bail!(err);
    }
    print_workspace(session.state());
    Ok(())
}

fn normalize_dir(dir: &str) -> String {
    match dir.trim_matches('/') {
        "." => String::new(),
        other => other.to_string(),
    }
}

fn read_content(from: Option<PathBuf>) -> Result<String> {
    match from {
        Some(path) => {
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut content = String::new();
            io::stdin()
                .read_to_string(&mut content)
                .context("reading content from stdin")?;
            Ok(content)
        }
    }
}

fn fail_on_errors(session: &mut Session<'_>) -> Result<()> {
    let errors = session.take_errors();
    if errors.is_empty() {
        return Ok(());
    }
    bail!(errors.join("; "))
}

fn print_workspace(state: &WorkspaceState) {
    let projection = state.projection();
    for line in render::tree_lines(&projection) {
        println!("{line}");
    }
    if !state.tabs.is_empty() {
        println!("\nopen: {}", render::tabs_line(&state.tabs));
    }
}
