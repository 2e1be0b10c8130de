use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kernelwire_client::{Client, OutputStream};
use kernelwire_message::{ExecuteReply, ExecuteRequest, IoPubContent};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cmd::{connect, parse_duration, ExecuteArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_json, print_output, OutputFormat};

#[derive(Serialize)]
struct ReplyOutput<'a> {
    msg_type: &'static str,
    content: &'a ExecuteReply,
}

pub fn run(args: ExecuteArgs, format: OutputFormat) -> CliResult<i32> {
    let code = resolve_code(&args.code)?;
    let output_timeout = args
        .output_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let client = Arc::new(connect(&args.connection)?);
    let interrupted = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&client), Arc::clone(&interrupted))?;

    let request = ExecuteRequest {
        silent: args.silent,
        store_history: !args.no_store_history,
        stop_on_error: !args.no_stop_on_error,
        ..ExecuteRequest::new(code)
    };
    let (reply, output) = client
        .execute(request)
        .map_err(|err| client_error("execute failed", err))?;

    let mut saw_error = false;
    let complete = drain_output(&output, output_timeout, |content| {
        saw_error |= matches!(content, IoPubContent::Error(_));
        print_output(content, format);
    });
    if !complete {
        warn!(msg_id = output.command_id(), "output timeout reached; kernel may still be running");
    }

    if interrupted.load(Ordering::SeqCst) {
        return Err(CliError::new(FAILURE, "interrupted"));
    }
    if let Some(err) = client.termination() {
        return Err(CliError::new(FAILURE, format!("output incomplete: {err}")));
    }

    print_reply(&reply, saw_error, format);
    if let Err(err) = client.close() {
        debug!(error = %err, "close failed");
    }

    Ok(if reply.is_ok() { SUCCESS } else { FAILURE })
}

fn resolve_code(code: &str) -> CliResult<String> {
    let code = if code == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|err| io_error("failed reading code from stdin", err))?;
        buf
    } else {
        code.to_string()
    };
    if code.trim().is_empty() {
        return Err(CliError::new(USAGE, "no code to execute"));
    }
    Ok(code)
}

/// Feed `emit` until the stream ends. Returns false if `timeout` ran out first.
fn drain_output(
    output: &OutputStream,
    timeout: Option<Duration>,
    mut emit: impl FnMut(&IoPubContent),
) -> bool {
    let Some(timeout) = timeout else {
        while let Some(content) = output.recv() {
            emit(&content);
        }
        return true;
    };

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match output.recv_timeout(remaining) {
            Ok(content) => emit(&content),
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
        }
    }
}

fn print_reply(reply: &ExecuteReply, error_shown: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ReplyOutput {
            msg_type: "execute_reply",
            content: reply,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            if let Some(error) = reply.error() {
                if !error_shown {
                    eprintln!("{}: {}", error.ename, error.evalue);
                }
            } else if !reply.is_ok() {
                eprintln!("execution {}", reply.status.as_str());
            }
        }
        OutputFormat::Raw => {}
    }
}

fn install_ctrlc_handler(client: Arc<Client>, interrupted: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        interrupted.store(true, Ordering::SeqCst);
        // Ends the pending output stream.
        let _ = client.close();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
