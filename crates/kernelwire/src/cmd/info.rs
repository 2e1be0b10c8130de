use kernelwire_client::ConnectionInfo;
use kernelwire_message::Request;
use serde::Serialize;
use serde_json::Value;

use crate::cmd::{connect_to, load_connection, InfoArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{new_table, print_json, OutputFormat};

/// `kernel_info_request`, answered with a free-form description of the kernel.
#[derive(Serialize)]
struct KernelInfoRequest {}

impl Request for KernelInfoRequest {
    const MSG_TYPE: &'static str = "kernel_info_request";
    const REPLY_TYPE: &'static str = "kernel_info_reply";
    type Reply = Value;
}

#[derive(Serialize)]
struct InfoOutput {
    kernel_name: Option<String>,
    transport: String,
    signature_scheme: String,
    key: String,
    shell: String,
    iopub: String,
    control_port: u16,
    hb_port: u16,
    stdin_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    kernel: Option<KernelSummary>,
}

#[derive(Serialize)]
struct KernelSummary {
    protocol_version: String,
    implementation: String,
    implementation_version: String,
    language: String,
    banner: String,
}

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let info = load_connection(&args.connection_file)?;
    let mut out = summarize(&info)?;

    if args.probe {
        let client = connect_to(&info, &args.timeout)?;
        let reply = client
            .request(KernelInfoRequest {})
            .map_err(|err| client_error("kernel info failed", err))?;
        out.kernel = Some(kernel_summary(&reply));
    }

    print_info(&out, format);
    Ok(SUCCESS)
}

fn summarize(info: &ConnectionInfo) -> CliResult<InfoOutput> {
    let shell = info
        .shell_endpoint()
        .map_err(|err| client_error("invalid connection file", err))?;
    let iopub = info
        .iopub_endpoint()
        .map_err(|err| client_error("invalid connection file", err))?;
    Ok(InfoOutput {
        kernel_name: info.kernel_name.clone(),
        transport: info.transport.clone(),
        signature_scheme: info.signature_scheme.clone(),
        key: format!("<redacted:{} bytes>", info.key.len()),
        shell: shell.to_string(),
        iopub: iopub.to_string(),
        control_port: info.control_port,
        hb_port: info.hb_port,
        stdin_port: info.stdin_port,
        kernel: None,
    })
}

fn kernel_summary(reply: &Value) -> KernelSummary {
    let text = |value: &Value| value.as_str().unwrap_or_default().to_string();
    KernelSummary {
        protocol_version: text(&reply["protocol_version"]),
        implementation: text(&reply["implementation"]),
        implementation_version: text(&reply["implementation_version"]),
        language: text(&reply["language_info"]["name"]),
        banner: text(&reply["banner"]),
    }
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (field, value) in rows(out) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Connection Info:");
            for (field, value) in rows(out) {
                println!("  {:<18}{value}", format!("{field}:"));
            }
        }
        OutputFormat::Raw => {
            println!("{}", out.shell);
        }
    }
}

fn rows(out: &InfoOutput) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        (
            "Kernel",
            out.kernel_name.clone().unwrap_or_else(|| "unknown".to_string()),
        ),
        ("Shell", out.shell.clone()),
        ("IOPub", out.iopub.clone()),
        ("Signature", out.signature_scheme.clone()),
        ("Key", out.key.clone()),
    ];
    if let Some(kernel) = &out.kernel {
        rows.push(("Protocol", kernel.protocol_version.clone()));
        rows.push((
            "Implementation",
            format!("{} {}", kernel.implementation, kernel.implementation_version),
        ));
        rows.push(("Language", kernel.language.clone()));
    }
    rows
}
