//! Command-line entry point.
//!
//! Evaluation runs on a dedicated worker thread spawned with a large,
//! configurable stack: reduction depth is bounded only by the structure
//! of the loaded graph, so the default control stack is not enough for
//! real modules.

use std::path::PathBuf;
use std::process;
use std::thread;
use std::time::Instant;

use clap::{Parser, Subcommand};
use log::info;

use pegovka::ast;
use pegovka::evaluator::Evaluator;
use pegovka::parser::{load_module, parse_expression};
use pegovka::protocol::{self, HttpTransport, StdinInput};
use pegovka::render::ImageRenderer;
use pegovka::Error;

#[derive(Parser)]
#[command(name = "pegovka")]
#[command(about = "Lazy combinator-calculus evaluator with a remote interaction loop")]
struct Cli {
    /// Path to the module with definitions
    #[arg(long, default_value = "galaxy.txt")]
    module_path: PathBuf,

    /// Remote endpoint base URL
    #[arg(long, default_value = "https://icfpc2020-api.testkontur.ru")]
    proxy_url: String,

    /// Player key authenticating remote sends
    #[arg(long)]
    player_key: Option<String>,

    /// Directory receiving rendered PNG frames
    #[arg(long, default_value = "frames")]
    frame_dir: PathBuf,

    /// Stack size of the evaluation thread, in MiB
    #[arg(long, default_value_t = 512)]
    stack_mib: usize,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the unevaluated definition of a symbol
    DumpAst { symbol: String },
    /// Evaluate an expression and print the forced result
    Eval { expression: String },
    /// Run the interaction loop on a protocol symbol, reading clicks
    /// from stdin until `q` or end of input
    InteractLoop { protocol: String },
}

fn run(cli: Cli) -> Result<(), Error> {
    let env = load_module(&cli.module_path)?;
    let Cli {
        proxy_url,
        player_key,
        frame_dir,
        command,
        ..
    } = cli;
    let build = move |env| -> Result<Evaluator, Error> {
        Ok(Evaluator::new(env)
            .with_transport(Box::new(HttpTransport::new(&proxy_url, player_key)))
            .with_renderer(Box::new(ImageRenderer::new(&frame_dir)?)))
    };

    match command {
        Commands::DumpAst { symbol } => {
            let node = env
                .get(&symbol)
                .cloned()
                .ok_or_else(|| Error::UnboundSymbol(symbol))?;
            println!("{node}");
            Ok(())
        }
        Commands::Eval { expression } => {
            let expr = parse_expression(&expression)?;
            let ev = build(env)?;
            let started = Instant::now();
            let value = ev.force(&expr)?;
            info!("eval time {:?}", started.elapsed());
            println!("{value}");
            Ok(())
        }
        Commands::InteractLoop { protocol } => {
            let ev = build(env)?;
            protocol::interact_loop(&ev, &ast::sym(&protocol), &mut StdinInput)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level.clone()),
    )
    .init();

    let stack_bytes = cli.stack_mib.saturating_mul(1024 * 1024);
    let worker = thread::Builder::new()
        .name("eval".to_string())
        .stack_size(stack_bytes)
        .spawn(move || run(cli));

    let outcome = match worker {
        Ok(handle) => match handle.join() {
            Ok(result) => result,
            Err(_) => {
                eprintln!("error: evaluation thread panicked");
                process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("error: failed to spawn evaluation thread: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = outcome {
        eprintln!("error: {e}");
        let code = match e {
            Error::TransportFailure { .. } => 2,
            _ => 1,
        };
        process::exit(code);
    }
}
