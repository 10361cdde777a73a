//! Minimal r2pipe client over a spawned `r2 -q0` process.
//!
//! Protocol: one command per line on stdin; every reply on stdout ends with a
//! NUL byte. radare2 also writes a NUL once the file is loaded.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

/// Anything that can run a radare2 command and return its output.
pub trait Transport {
    fn cmd(&mut self, command: &str) -> Result<String>;
}

pub struct R2Pipe {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl R2Pipe {
    pub fn spawn(r2: &Path, file: &Path) -> Result<Self> {
        let mut child = Command::new(r2)
            .arg("-q0")
            .arg(file)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to start {}", r2.display()))?;

        let stdin = child.stdin.take().context("radare2 stdin is not piped")?;
        let stdout = child.stdout.take().context("radare2 stdout is not piped")?;
        let mut pipe = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        read_reply(&mut pipe.stdout)
            .with_context(|| format!("radare2 failed to open {}", file.display()))?;
        debug!("r2pipe ready (pid {})", pipe.child.id());
        Ok(pipe)
    }
}

impl Transport for R2Pipe {
    fn cmd(&mut self, command: &str) -> Result<String> {
        writeln!(self.stdin, "{}", encode_command(command)).context("write to radare2")?;
        self.stdin.flush().context("flush radare2 stdin")?;
        read_reply(&mut self.stdout)
    }
}

impl Drop for R2Pipe {
    fn drop(&mut self) {
        let _ = writeln!(self.stdin, "q!");
        let _ = self.stdin.flush();
        if let Err(e) = self.child.wait() {
            warn!("radare2 did not exit cleanly: {}", e);
        }
    }
}

/// Commands travel as a single line.
pub(crate) fn encode_command(command: &str) -> String {
    command.trim_end_matches('\n').replace('\n', ";")
}

/// Reads up to the next NUL terminator.
pub(crate) fn read_reply(reader: &mut impl BufRead) -> Result<String> {
    let mut buf = Vec::new();
    if reader.read_until(0, &mut buf).context("read from radare2")? == 0 {
        bail!("radare2 closed the pipe");
    }
    if buf.last() == Some(&0) {
        buf.pop();
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
