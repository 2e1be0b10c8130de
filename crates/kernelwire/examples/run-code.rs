//! Run code on a kernel and print everything it broadcasts.
//!
//! Run with:
//!   cargo run --example run-code -- /path/to/kernel-1234.json 'print("hi"); 2+2'

use kernelwire::client::{Client, ConnectionInfo};
use kernelwire::message::{ExecuteRequest, IoPubContent};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: run-code <connection-file> <code>")?;
    let code = args.next().unwrap_or_else(|| "2+2".to_string());

    let info = ConnectionInfo::from_file(&path)?;
    let client = Client::connect(&info)?;
    eprintln!("session {}", client.session());

    let (reply, output) = client.execute(ExecuteRequest::new(code))?;
    eprintln!(
        "reply: {} (execution_count {})",
        reply.status.as_str(),
        reply.execution_count
    );

    for content in output {
        match content {
            IoPubContent::Stream(stream) => print!("{}", stream.text),
            IoPubContent::ExecuteResult(result) => {
                let text = result.data.get("text/plain").cloned().unwrap_or_default();
                println!("Out[{}]: {text}", result.execution_count);
            }
            IoPubContent::Error(error) => eprintln!("{}: {}", error.ename, error.evalue),
            other => eprintln!("[{}]", other.msg_type()),
        }
    }

    client.close()?;
    Ok(())
}
