use anyhow::Context;
use clap::{CommandFactory, Parser};
use hostconverge::{
    read_config, read_globals, report_summary, ConvergeError, Engine, EngineConfig, Reporter,
    RunOptions, SystemRunner, SystemctlInspector,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const USAGE_EXIT: u8 = 2;

/// Hostconverge - converge packages, files and services toward a declared state
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Converges the local host toward the desired state declared by each module: \
packages first, then the module's file tree, then its services. Every change is printed.\n\n\
Runs are not locked against each other; never run two instances on one host at the same time."
)]
struct Args {
    /// Converge every module
    #[arg(long, conflicts_with = "module")]
    all: bool,

    /// Converge a single module
    #[arg(short, long, value_name = "NAME")]
    module: Option<String>,

    /// Do not restart services that are already running
    #[arg(long)]
    no_restart: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, env = "HOSTCONVERGE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing the modules
    #[arg(long, env = "HOSTCONVERGE_MODULES_DIR")]
    modules_dir: Option<PathBuf>,

    /// Root the module file trees are mirrored onto
    #[arg(long, env = "HOSTCONVERGE_DESTINATION_ROOT")]
    destination_root: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long)]
    no_color: bool,

    /// Verbose logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if !args.all && args.module.is_none() {
        let _ = Args::command().write_help(&mut std::io::stderr());
        return ExitCode::from(USAGE_EXIT);
    }

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<ConvergeError>()
                .map(ConvergeError::exit_code)
                .unwrap_or(1);
            error!("{e:#}");
            eprintln!("hostconverge: {e:#}");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => read_config(path).await.map_err(ConvergeError::from)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = args.modules_dir {
        config.modules_dir = dir;
    }
    if let Some(root) = args.destination_root {
        config.destination_root = root;
    }

    let color = !args.no_color
        && config
            .color
            .unwrap_or_else(|| std::io::stdout().is_terminal());

    let globals_path = config.globals_path();
    let globals = read_globals(&globals_path)
        .await
        .map_err(ConvergeError::from)?;

    let runner = SystemRunner::new();
    let inspector = SystemctlInspector::new(&runner);
    let options = RunOptions {
        no_restart: args.no_restart,
    };
    let engine = Engine::new(&config, &runner, &inspector, globals, options);
    let mut reporter = Reporter::stdout(color);

    let reports = match &args.module {
        Some(name) => vec![engine
            .converge_module(name, &mut reporter)
            .await
            .with_context(|| format!("module {}", name))?],
        None => engine.converge_all(&mut reporter).await?,
    };

    report_summary(&reports, &mut reporter);
    Ok(())
}
