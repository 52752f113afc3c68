//! aoc-worker - isolated execution context for solver modules.
//!
//! Reads length-prefixed requests from stdin and writes responses to stdout.
//! Stdout is re-pointed at stderr before any solver runs, so whatever a
//! solver prints ends up in the log instead of the response stream.

use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use aoc_dispatch_core::ipc::{Request, Response, read_message, write_message};
use aoc_dispatch_core::{ContextRuntime, DispatchConfig, DylibLoader};

#[derive(Parser)]
#[command(name = "aoc-worker")]
#[command(about = "Worker process for isolated solver execution")]
#[command(version)]
struct Args {
    /// Directory holding compiled solver modules
    #[arg(long)]
    modules_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries IPC.
    let filter = if args.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let modules_dir = match args.modules_dir {
        Some(dir) => dir,
        None => DispatchConfig::from_env()?.modules_dir,
    };
    tracing::debug!(
        "Worker {} serving modules from {}",
        std::process::id(),
        modules_dir.display()
    );

    let ipc_out = take_stdout()?;
    let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel::<Request>();
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel::<Response>();

    std::thread::Builder::new()
        .name("ipc-reader".to_string())
        .spawn(move || {
            let mut reader = BufReader::new(std::io::stdin().lock());
            loop {
                match read_message::<_, Request>(&mut reader) {
                    Ok(request) => {
                        if mailbox_tx.send(request).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Request stream closed: {}", e);
                        break;
                    }
                }
            }
        })?;

    std::thread::Builder::new()
        .name("ipc-writer".to_string())
        .spawn(move || {
            let mut writer = BufWriter::new(ipc_out);
            while let Some(response) = outbox_rx.blocking_recv() {
                if let Err(e) = write_message(&mut writer, &response) {
                    tracing::error!("Failed to send response: {}", e);
                    break;
                }
            }
        })?;

    let loader = Arc::new(DylibLoader::new(modules_dir));
    ContextRuntime::new(loader, outbox_tx).run(mailbox_rx).await;

    Ok(())
}

/// Keep the real stdout for IPC and send fd 1 to stderr.
#[cfg(unix)]
fn take_stdout() -> anyhow::Result<Box<dyn Write + Send>> {
    use std::os::fd::FromRawFd;

    std::io::stdout().flush()?;

    // SAFETY: plain fd syscalls on descriptors this process owns.
    let ipc_fd = unsafe { libc::dup(libc::STDOUT_FILENO) };
    if ipc_fd < 0 {
        anyhow::bail!(
            "failed to duplicate stdout: {}",
            std::io::Error::last_os_error()
        );
    }
    if unsafe { libc::dup2(libc::STDERR_FILENO, libc::STDOUT_FILENO) } < 0 {
        anyhow::bail!(
            "failed to redirect stdout: {}",
            std::io::Error::last_os_error()
        );
    }

    // SAFETY: `ipc_fd` was just returned by dup and nothing else owns it.
    let file = unsafe { std::fs::File::from_raw_fd(ipc_fd) };
    Ok(Box::new(file))
}

#[cfg(not(unix))]
fn take_stdout() -> anyhow::Result<Box<dyn Write + Send>> {
    Ok(Box::new(std::io::stdout()))
}
