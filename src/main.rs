use std::time::Duration;

use clap::Parser;
use tracing::debug;

use shellstream::{ProcessStreamer, ShellCommand};

/// Run a shell command and stream its cleaned output lines
#[derive(Parser)]
#[command(name = "shellstream")]
#[command(about = "Stream a command's stdout/stderr line by line", long_about = None)]
struct Cli {
    /// Idle timeout in seconds; no output for this long aborts the run
    #[arg(short = 't', long, default_value = "90")]
    timeout: u64,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Command line to run (joined and handed to the shell)
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let code = cli.command.join(" ");
    debug!("running `{}` with {}s idle timeout", code, cli.timeout);

    let mut shell = ProcessStreamer::spawn(
        ShellCommand::new(code).timeout(Duration::from_secs(cli.timeout)),
    )?;

    while let Some(line) = shell.next_line().await? {
        println!("{line}");
    }

    match shell.shutdown().await? {
        Some(code) => debug!("child exit code: {code}"),
        None => debug!("child killed before reporting an exit code"),
    }

    Ok(())
}
