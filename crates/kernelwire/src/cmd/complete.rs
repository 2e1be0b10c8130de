use kernelwire_message::{CompleteReply, CompleteRequest, ReplyStatus};
use serde::Serialize;

use crate::cmd::{connect, cursor_or_end, CompleteArgs};
use crate::exit::{client_error, CliResult, FAILURE, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct CompleteOutput<'a> {
    msg_type: &'static str,
    content: &'a CompleteReply,
}

pub fn run(args: CompleteArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args.connection)?;
    let cursor = cursor_or_end(args.cursor, &args.code);
    let reply = client
        .complete(CompleteRequest::new(args.code.as_str(), cursor))
        .map_err(|err| client_error("complete failed", err))?;

    print_completions(&args.code, &reply, format);
    Ok(if reply.status == ReplyStatus::Ok {
        SUCCESS
    } else {
        FAILURE
    })
}

fn print_completions(code: &str, reply: &CompleteReply, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&CompleteOutput {
            msg_type: "complete_reply",
            content: reply,
        }),
        OutputFormat::Table => {
            let replaced = replaced_text(code, reply.cursor_start, reply.cursor_end);
            let mut table = new_table(vec!["MATCH", "REPLACES"]);
            for candidate in &reply.matches {
                table.add_row(vec![candidate.clone(), replaced.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for candidate in &reply.matches {
                println!("{candidate}");
            }
        }
    }
}

/// The slice of `code` a completion replaces; offsets count characters.
fn replaced_text(code: &str, start: usize, end: usize) -> String {
    code.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}
