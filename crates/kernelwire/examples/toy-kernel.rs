//! A toy kernel that echoes code back as its result.
//!
//! Writes a connection file and serves clients one after another.
//!
//! Run with:
//!   cargo run --example toy-kernel
//!
//! In another terminal:
//!   cargo run --features cli -- execute -f <printed path> 'hello'

use bytes::Bytes;
use kernelwire::client::ConnectionInfo;
use kernelwire::message::{new_id, Header, Message, RawMessage, SigningKey};
use kernelwire::transport::Endpoint;
use kernelwire::zmtp::{PubSocket, ZmtpConfig, ZmtpListener};
use serde_json::{json, Value};

fn port(listener: &ZmtpListener) -> u16 {
    match listener.endpoint() {
        Endpoint::Tcp { port, .. } => *port,
        Endpoint::Ipc { .. } => 0,
    }
}

fn publish(
    publisher: &mut PubSocket,
    key: &SigningKey,
    msg_type: &str,
    content: Value,
    parent: &Header,
) -> Result<(), Box<dyn std::error::Error>> {
    let header = Header::new(msg_type, "toy-kernel", "kernel");
    let mut frames = vec![Bytes::from(format!("kernel.toy.{msg_type}"))];
    frames.extend(Message::new(header, content).with_parent(parent.clone()).to_frames(key)?);
    publisher.publish(&frames)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let shell = ZmtpListener::bind(&Endpoint::tcp("127.0.0.1", 0), ZmtpConfig::default())?;
    let iopub = ZmtpListener::bind(&Endpoint::tcp("127.0.0.1", 0), ZmtpConfig::default())?;

    let secret = new_id();
    let info = ConnectionInfo {
        signature_scheme: "hmac-sha256".to_string(),
        transport: "tcp".to_string(),
        ip: "127.0.0.1".to_string(),
        key: secret.clone(),
        shell_port: port(&shell),
        control_port: 0,
        iopub_port: port(&iopub),
        hb_port: 0,
        stdin_port: 0,
        kernel_name: Some("toy".to_string()),
    };
    let path = std::env::temp_dir().join(format!("kernel-toy-{}.json", std::process::id()));
    std::fs::write(&path, serde_json::to_string_pretty(&info)?)?;
    eprintln!("Connection file: {}", path.display());

    let key = SigningKey::new(secret);
    let mut execution_count = 0u64;
    loop {
        let mut publisher = PubSocket::new();
        publisher.add_subscriber(iopub.accept_pub()?);
        let mut rep = shell.accept_rep()?;
        eprintln!("Client connected");

        while let Ok(frames) = rep.recv() {
            let request = RawMessage::decode(&frames, &key)?;
            let parent = request.header.clone();
            let content = request.content_value()?;
            publish(&mut publisher, &key, "status", json!({"execution_state": "busy"}), &parent)?;

            let reply_type = request.msg_type().replace("_request", "_reply");
            let reply = if request.msg_type() == "execute_request" {
                execution_count += 1;
                let code = content["code"].as_str().unwrap_or_default();
                publish(
                    &mut publisher,
                    &key,
                    "execute_result",
                    json!({"execution_count": execution_count, "data": {"text/plain": code}, "metadata": {}}),
                    &parent,
                )?;
                json!({"status": "ok", "execution_count": execution_count})
            } else {
                json!({"status": "ok"})
            };

            let frames = Message::new(Header::new(reply_type, "toy-kernel", "kernel"), reply)
                .with_parent(parent.clone())
                .to_frames(&key)?;
            rep.send(&frames)?;
            publish(&mut publisher, &key, "status", json!({"execution_state": "idle"}), &parent)?;
        }
        eprintln!("Client disconnected");
    }
}
