use kernelwire_message::{InspectReply, InspectRequest, ReplyStatus};
use serde::Serialize;

use crate::cmd::{connect, cursor_or_end, InspectArgs};
use crate::exit::{client_error, CliResult, FAILURE, SUCCESS};
use crate::output::{plain_text, print_json, strip_ansi, OutputFormat};

#[derive(Serialize)]
struct InspectOutput<'a> {
    msg_type: &'static str,
    content: &'a InspectReply,
}

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args.connection)?;
    let request = InspectRequest {
        detail_level: args.detail_level,
        ..InspectRequest::new(args.code.as_str(), cursor_or_end(args.cursor, &args.code))
    };
    let reply = client
        .inspect(request)
        .map_err(|err| client_error("inspect failed", err))?;

    match format {
        OutputFormat::Json => print_json(&InspectOutput {
            msg_type: "inspect_reply",
            content: &reply,
        }),
        OutputFormat::Table | OutputFormat::Pretty | OutputFormat::Raw => {
            match plain_text(&reply.data).filter(|_| reply.found) {
                Some(text) => println!("{}", strip_ansi(&text)),
                None => eprintln!("no information found"),
            }
        }
    }

    Ok(match reply.status {
        ReplyStatus::Ok => SUCCESS,
        _ => FAILURE,
    })
}
