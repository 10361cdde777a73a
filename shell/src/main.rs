//! pdd-shell: drive the r2dec decompiler bridge against a radare2 session.
//!
//! Lines typed at the prompt (or passed with `-c`) go to the `pdd` plugin
//! first and to radare2 otherwise. `e r2dec.*` is answered locally.

mod config;
mod r2pipe;
mod session;

use std::cell::RefCell;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use pdd::{PddPlugin, ScriptHost, ScriptHostConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::ShellConfig;
use crate::r2pipe::{R2Pipe, Transport};
use crate::session::{execute, Flow, ShellSession};

const PROMPT: &str = "[pdd]> ";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run the r2dec decompiler bridge against a radare2 session"
)]
struct Args {
    /// Binary to open in radare2
    file: PathBuf,

    /// radare2 executable
    #[arg(long, value_name = "PATH")]
    r2: Option<PathBuf>,

    /// Root of the r2dec-js package (overrides R2DEC_HOME)
    #[arg(long, value_name = "DIR")]
    home: Option<PathBuf>,

    /// Stop a decompilation after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// JSON config file
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Run a command and exit (repeatable)
    #[arg(short = 'c', long = "command", value_name = "CMD")]
    commands: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ShellConfig::load(path)?,
        None => ShellConfig::default(),
    };
    let settings = config.resolve(args.r2.clone(), args.home.clone(), args.timeout);
    match settings.resolver.base_dir() {
        Some(dir) => info!("r2dec package: {}", dir.display()),
        None => info!("r2dec package: no R2DEC_HOME and no user data directory"),
    }

    let pipe = R2Pipe::spawn(&settings.r2, &args.file)?;
    info!("opened {} with {}", args.file.display(), settings.r2.display());

    let session = Rc::new(RefCell::new(ShellSession::new(pipe, io::stdout())));
    let plugin = PddPlugin::with_script_host(ScriptHost::new(
        settings.resolver,
        ScriptHostConfig {
            timeout: settings.timeout,
            ..ScriptHostConfig::default()
        },
    ));
    {
        let mut session = session.borrow_mut();
        plugin
            .init(&mut *session)
            .context("failed to register r2dec preferences")?;
        session.apply_preferences(&settings.preferences);
    }

    if !args.commands.is_empty() {
        for command in &args.commands {
            debug!("-c {}", command);
            if execute(&plugin, &session, command) == Flow::Quit {
                break;
            }
        }
        return Ok(());
    }

    repl(&plugin, &session)
}

fn repl<T, W>(plugin: &PddPlugin, session: &Rc<RefCell<ShellSession<T, W>>>) -> Result<()>
where
    T: Transport + 'static,
    W: Write + 'static,
{
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut line = String::new();

    loop {
        if interactive {
            print!("{PROMPT}");
            io::stdout().flush().context("failed to flush stdout")?;
        }

        line.clear();
        if stdin.lock().read_line(&mut line).context("failed to read stdin")? == 0 {
            break;
        }
        if execute(plugin, session, &line) == Flow::Quit {
            break;
        }
    }

    info!("bye");
    Ok(())
}
