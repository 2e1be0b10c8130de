use kernelwire_message::{HistoryItem, HistoryReply, HistoryRequest, ReplyStatus};
use serde::Serialize;

use crate::cmd::{connect, HistoryArgs};
use crate::exit::{client_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct HistoryOutput<'a> {
    msg_type: &'static str,
    content: &'a HistoryReply,
}

pub fn run(args: HistoryArgs, format: OutputFormat) -> CliResult<i32> {
    let request = build_request(&args)?;
    let client = connect(&args.connection)?;
    let reply = client
        .history(request)
        .map_err(|err| client_error("history failed", err))?;

    print_history(&reply, args.output, format);
    Ok(if reply.status == ReplyStatus::Ok {
        SUCCESS
    } else {
        FAILURE
    })
}

fn build_request(args: &HistoryArgs) -> CliResult<HistoryRequest> {
    let request = if let Some(pattern) = &args.search {
        HistoryRequest::search(pattern.as_str(), args.limit, args.unique)
    } else if let Some(range) = &args.range {
        let (start, stop) = parse_range(range)?;
        HistoryRequest::range(args.session, start, stop)
    } else {
        HistoryRequest::tail(args.limit)
    };
    Ok(request.with_output(args.output))
}

fn parse_range(input: &str) -> CliResult<(i64, i64)> {
    let invalid = || CliError::new(USAGE, format!("invalid range '{input}' (expected START:STOP)"));
    let (start, stop) = input.split_once(':').ok_or_else(invalid)?;
    let start: i64 = start.trim().parse().map_err(|_| invalid())?;
    let stop: i64 = stop.trim().parse().map_err(|_| invalid())?;
    if stop < start {
        return Err(invalid());
    }
    Ok((start, stop))
}

fn print_history(reply: &HistoryReply, with_output: bool, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&HistoryOutput {
            msg_type: "history_reply",
            content: reply,
        }),
        OutputFormat::Table => {
            let mut header = vec!["SESSION", "LINE", "INPUT"];
            if with_output {
                header.push("OUTPUT");
            }
            let mut table = new_table(header);
            for item in &reply.history {
                let mut row = vec![
                    item.session.to_string(),
                    item.line_number.to_string(),
                    item.input.clone(),
                ];
                if with_output {
                    row.push(item.output.clone().unwrap_or_default());
                }
                table.add_row(row);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for item in &reply.history {
                println!("{}", pretty_line(item));
            }
        }
        OutputFormat::Raw => {
            for item in &reply.history {
                println!("{}", item.input);
            }
        }
    }
}

fn pretty_line(item: &HistoryItem) -> String {
    let mut line = format!("{}/{}: {}", item.session, item.line_number, item.input);
    if let Some(output) = &item.output {
        line.push_str(&format!("\n  -> {output}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kernelwire_message::HistAccessType;

    use super::*;
    use crate::cmd::ConnectionArgs;

    fn args() -> HistoryArgs {
        HistoryArgs {
            connection: ConnectionArgs {
                connection_file: PathBuf::from("kernel.json"),
                timeout: "5s".to_string(),
            },
            limit: 10,
            search: None,
            range: None,
            session: 0,
            unique: false,
            output: false,
        }
    }

    #[test]
    fn tail_by_default() {
        let request = build_request(&args()).unwrap();
        assert_eq!(request.hist_access_type, HistAccessType::Tail);
        assert_eq!(request.n, Some(10));
    }

    #[test]
    fn range_and_search_modes() {
        let request = build_request(&HistoryArgs {
            range: Some("2:7".to_string()),
            session: -1,
            ..args()
        })
        .unwrap();
        assert_eq!(request.hist_access_type, HistAccessType::Range);
        assert_eq!((request.session, request.start, request.stop), (Some(-1), Some(2), Some(7)));

        let request = build_request(&HistoryArgs {
            search: Some("import*".to_string()),
            unique: true,
            output: true,
            ..args()
        })
        .unwrap();
        assert_eq!(request.hist_access_type, HistAccessType::Search);
        assert_eq!(request.unique, Some(true));
        assert!(request.output);
    }

    #[test]
    fn bad_ranges_rejected() {
        assert!(parse_range("5").is_err());
        assert!(parse_range("a:b").is_err());
        assert!(parse_range("7:2").is_err());
        assert_eq!(parse_range(" 1 : 3 ").unwrap(), (1, 3));
    }

    #[test]
    fn pretty_line_includes_output() {
        let item = HistoryItem {
            session: 1,
            line_number: 2,
            input: "2+2".to_string(),
            output: Some("4".to_string()),
        };
        assert_eq!(pretty_line(&item), "1/2: 2+2\n  -> 4");
    }
}
