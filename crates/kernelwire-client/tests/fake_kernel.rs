//! Client against an in-process kernel speaking ZMTP over loopback TCP.

use std::thread::{self, JoinHandle};

use bytes::Bytes;
use kernelwire_client::{Client, ClientConfig, ClientError, ConnectionInfo};
use kernelwire_message::{
    ExecuteRequest, Header, HistoryRequest, IoPubContent, Message, RawMessage, ReplyStatus,
    SigningKey,
};
use kernelwire_transport::Endpoint;
use kernelwire_zmtp::{PubSocket, ZmtpConfig, ZmtpListener};
use serde_json::{json, Value};

const KEY: &str = "6b1f7c4e-test-key";

fn port(listener: &ZmtpListener) -> u16 {
    match listener.endpoint() {
        Endpoint::Tcp { port, .. } => *port,
        other => panic!("expected tcp endpoint, got {other}"),
    }
}

fn publish(publisher: &mut PubSocket, key: &SigningKey, msg_type: &str, content: Value, parent: &Header) {
    let header = Header::new(msg_type, "kernel-session", "kernel");
    let mut frames = vec![Bytes::from(format!("kernel.fake.{msg_type}"))];
    frames.extend(
        Message::new(header, content)
            .with_parent(parent.clone())
            .to_frames(key)
            .expect("broadcast should encode"),
    );
    publisher.publish(&frames).expect("publish should succeed");
}

fn reply(key: &SigningKey, msg_type: &str, content: Value, parent: &Header) -> Vec<Bytes> {
    Message::new(Header::new(msg_type, "kernel-session", "kernel"), content)
        .with_parent(parent.clone())
        .to_frames(key)
        .expect("reply should encode")
}

/// Serve one client until it disconnects.
fn spawn_kernel() -> (ConnectionInfo, JoinHandle<usize>) {
    let shell = ZmtpListener::bind(&Endpoint::tcp("127.0.0.1", 0), ZmtpConfig::default())
        .expect("shell listener should bind");
    let iopub = ZmtpListener::bind(&Endpoint::tcp("127.0.0.1", 0), ZmtpConfig::default())
        .expect("iopub listener should bind");

    let info = ConnectionInfo {
        signature_scheme: "hmac-sha256".to_string(),
        transport: "tcp".to_string(),
        ip: "127.0.0.1".to_string(),
        key: KEY.to_string(),
        shell_port: port(&shell),
        control_port: 0,
        iopub_port: port(&iopub),
        hb_port: 0,
        stdin_port: 0,
        kernel_name: Some("fake".to_string()),
    };

    let handle = thread::spawn(move || {
        let key = SigningKey::new(KEY);
        let mut publisher = PubSocket::new();
        publisher.add_subscriber(iopub.accept_pub().expect("subscriber should connect"));
        let mut rep = shell.accept_rep().expect("client should connect");

        let mut execution_count = 0;
        while let Ok(frames) = rep.recv() {
            let request = RawMessage::decode(&frames, &key).expect("request should verify");
            let parent = request.header.clone();
            let content = request.content_value().expect("request content should parse");

            publish(&mut publisher, &key, "status", json!({"execution_state": "busy"}), &parent);
            let answer = match request.msg_type() {
                "execute_request" => {
                    execution_count += 1;
                    let code = content["code"].as_str().unwrap_or_default();
                    publish(
                        &mut publisher,
                        &key,
                        "execute_input",
                        json!({"code": code, "execution_count": execution_count}),
                        &parent,
                    );
                    if code == "1/0" {
                        let error = json!({
                            "ename": "ZeroDivisionError",
                            "evalue": "division by zero",
                            "traceback": ["ZeroDivisionError: division by zero"],
                        });
                        publish(&mut publisher, &key, "error", error.clone(), &parent);
                        let mut body = error;
                        body["status"] = json!("error");
                        body["execution_count"] = json!(execution_count);
                        reply(&key, "execute_reply", body, &parent)
                    } else {
                        publish(
                            &mut publisher,
                            &key,
                            "stream",
                            json!({"name": "stdout", "text": "computing\n"}),
                            &parent,
                        );
                        publish(
                            &mut publisher,
                            &key,
                            "execute_result",
                            json!({"execution_count": execution_count, "data": {"text/plain": "4"}, "metadata": {}}),
                            &parent,
                        );
                        reply(
                            &key,
                            "execute_reply",
                            json!({"status": "ok", "execution_count": execution_count}),
                            &parent,
                        )
                    }
                }
                "history_request" => reply(
                    &key,
                    "history_reply",
                    json!({"status": "ok", "history": [[1, 1, "2+2"]]}),
                    &parent,
                ),
                other => reply(&key, &other.replace("_request", "_reply"), json!({"status": "ok"}), &parent),
            };
            rep.send(&answer).expect("reply should send");
            publish(&mut publisher, &key, "status", json!({"execution_state": "idle"}), &parent);
        }
        execution_count
    });

    (info, handle)
}

#[test]
fn execute_over_zmtp() {
    let (info, kernel) = spawn_kernel();
    let client = Client::connect(&info).expect("client should connect");

    let (reply, output) = client
        .execute(ExecuteRequest::new("2+2"))
        .expect("execute should succeed");
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(reply.execution_count, 1);

    let types: Vec<String> = output.map(|c| c.msg_type().to_string()).collect();
    assert_eq!(types, vec!["execute_input", "stream", "execute_result"]);

    let history = client
        .history(HistoryRequest::tail(1))
        .expect("history should succeed");
    assert_eq!(history.history.len(), 1);
    assert_eq!(history.history[0].input, "2+2");

    client.close().expect("close should succeed");
    assert_eq!(kernel.join().expect("kernel thread should finish"), 1);
}

#[test]
fn error_reply_and_error_output() {
    let (info, kernel) = spawn_kernel();
    let client = Client::connect_with_config(&info, ClientConfig::default())
        .expect("client should connect");

    let (reply, output) = client.execute(ExecuteRequest::new("1/0")).unwrap();
    assert_eq!(reply.status, ReplyStatus::Error);
    assert_eq!(
        reply.error().map(|e| e.ename),
        Some("ZeroDivisionError".to_string())
    );

    let last = output.last().expect("error output should arrive");
    assert!(matches!(last, IoPubContent::Error(ref e) if e.evalue == "division by zero"));

    drop(client);
    kernel.join().expect("kernel thread should finish");
}

#[test]
fn unsupported_scheme_fails_before_connecting() {
    let info = ConnectionInfo::from_json(
        r#"{"ip": "127.0.0.1", "shell_port": 1, "iopub_port": 2, "key": "k", "signature_scheme": "hmac-sha512"}"#,
    )
    .unwrap();
    assert!(matches!(
        Client::connect(&info),
        Err(ClientError::UnsupportedSignatureScheme(ref scheme)) if scheme == "hmac-sha512"
    ));
}
