//! `pfscli` — an interactive shell over any polyfs mount.

mod commands;
mod registry;
mod state;

use std::io::{BufRead, Write};

use anyhow::Context;
use clap::Parser;
use polyfs_vfs::Credential;

use crate::registry::CommandRegistry;
use crate::state::CliState;

#[derive(Parser)]
#[command(name = "pfscli", about = "polyfs filesystem shell")]
struct Args {
    /// Mount target, e.g. memfs: or nfs://server/export
    url: String,

    /// Run a single command instead of the interactive shell
    #[arg(short = 'c', long = "command")]
    command: Option<String>,

    /// Run commands as this uid
    #[arg(long, default_value_t = 0)]
    uid: u32,

    /// Run commands as this gid
    #[arg(long, default_value_t = 0)]
    gid: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cred = Credential::new(args.uid, args.gid, Vec::new(), args.uid == 0);

    let fs = polyfs::mount(&args.url, &cred)
        .await
        .with_context(|| format!("mounting {}", args.url))?;
    let registry = CommandRegistry::new();
    let mut state = CliState::new(fs, cred, registry.help_text()).await?;

    if let Some(line) = args.command {
        return run_line(&registry, &mut state, &line).await;
    }

    let stdin = std::io::stdin();
    let mut line = String::new();
    while !state.done {
        print!("pfs:{}> ", state.pwd);
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if let Err(err) = run_line(&registry, &mut state, &line).await {
            eprintln!("{err:#}");
        }
    }
    Ok(())
}

async fn run_line(
    registry: &CommandRegistry,
    state: &mut CliState,
    line: &str,
) -> anyhow::Result<()> {
    let words: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
    let Some((name, rest)) = words.split_first() else {
        return Ok(());
    };
    registry.run(state, name, rest).await
}
