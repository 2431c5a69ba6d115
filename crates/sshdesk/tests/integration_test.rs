//! Integration tests for the headless driver over the simulated transport.

use std::time::Duration;

use serde_json::Value;

use sshdesk::Driver;
use sshdesk_core::{ClientConfig, SessionStatus};

const CONFIG: &str = r#"
client:
  log_level: debug
connections:
  - id: prod
    name: prod
    host: 10.0.0.1
  - id: vault
    host: 10.0.0.9
    username: admin
    auth:
      type: password
  - id: ghost
    host: ghost.invalid
"#;

fn driver() -> (Driver<Vec<u8>>, std::sync::Arc<sshdesk::SimulatedTransport>) {
    let config = ClientConfig::from_yaml(CONFIG).unwrap();
    Driver::with_simulation(&config, Duration::from_millis(1), Vec::new())
}

fn lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8(output.to_vec())
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_connect_reports_session_and_snapshot() {
    let (mut driver, transport) = driver();
    driver
        .handle_line(r#"{"cmd":"connect","connection_id":"prod"}"#)
        .await
        .unwrap();

    let events = lines(driver.output());
    assert_eq!(events.len(), 1);
    let response = &events[0];
    assert_eq!(response["event"], "response");
    assert_eq!(response["cmd"], "connect");
    assert_eq!(response["ok"], true);
    assert_eq!(response["result"]["title"], "prod@10.0.0.1 #1");
    assert_eq!(response["result"]["status"], "connected");
    assert_eq!(response["snapshot"]["sessions"].as_array().unwrap().len(), 1);
    assert_eq!(response["snapshot"]["active_connection_id"], "prod");

    let id = driver.controller().sessions()[0].id;
    assert!(transport.is_open(&id));
}

#[tokio::test]
async fn test_password_connection_auth_loop() {
    let (mut driver, _transport) = driver();
    driver
        .handle_line(r#"{"cmd":"connect","connection_id":"vault"}"#)
        .await
        .unwrap();

    let events = lines(driver.output());
    // Auth-required is not announced as a notice
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["ok"], false);
    let session = &events[0]["snapshot"]["sessions"][0];
    assert_eq!(session["status"], "failed");
    assert_eq!(session["reason"]["kind"], "auth_required");
    assert_eq!(session["reason"]["detail"], "Password for admin@10.0.0.9");

    let id = session["id"].as_str().unwrap().to_string();
    let auth = r#"{"username":"admin","password":"s3cret"}"#;
    driver
        .handle_line(&format!(r#"{{"cmd":"retry","session_id":"{id}","auth":{auth}}}"#))
        .await
        .unwrap();

    let events = lines(driver.output());
    let retry = &events[1];
    assert_eq!(retry["cmd"], "retry");
    assert_eq!(retry["ok"], true);
    assert_eq!(retry["result"]["result"], "connected");
    let session = &retry["snapshot"]["sessions"][0];
    assert_eq!(session["id"], id.as_str());
    assert_eq!(session["status"], "connected");
    assert_eq!(session["title"], "admin@10.0.0.9 #1");
}

#[tokio::test]
async fn test_unreachable_host_emits_notice() {
    let (mut driver, _transport) = driver();
    driver
        .handle_line(r#"{"cmd":"connect","connection_id":"ghost"}"#)
        .await
        .unwrap();

    let events = lines(driver.output());
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["ok"], false);
    assert_eq!(events[1]["event"], "notice");
    assert_eq!(events[1]["level"], "error");
    assert_eq!(events[1]["message"], "ghost.invalid: no route to host");
}

#[tokio::test]
async fn test_invalid_input_reports_error() {
    let (mut driver, _transport) = driver();
    driver.handle_line("not json").await.unwrap();
    driver.handle_line("   ").await.unwrap();
    driver.handle_line(r#"{"cmd":"teleport"}"#).await.unwrap();

    let events = lines(driver.output());
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|event| event["event"] == "error"));
}

#[tokio::test]
async fn test_remote_disconnect_surfaces_as_notice() {
    let (mut driver, transport) = driver();
    driver
        .handle_line(r#"{"cmd":"connect","connection_id":"prod"}"#)
        .await
        .unwrap();
    let id = driver.controller().sessions()[0].id;

    transport.disconnect(id, "connection reset by peer");
    for _ in 0..200 {
        let status = driver.controller().session(&id).map(|s| s.status);
        if status == Some(SessionStatus::Disconnected) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    driver.flush_notices().await.unwrap();

    let events = lines(driver.output());
    let notice = events.last().unwrap();
    assert_eq!(notice["event"], "notice");
    assert_eq!(notice["level"], "info");
    assert_eq!(notice["message"], "disconnected: connection reset by peer");
}

#[tokio::test]
async fn test_scripted_run_and_shutdown() {
    let (mut driver, _transport) = driver();
    let script = concat!(
        r#"{"cmd":"connect","connection_id":"prod"}"#,
        "\n",
        r#"{"cmd":"connect","connection_id":"prod"}"#,
        "\n",
        r#"{"cmd":"monitor","connection_id":"prod"}"#,
        "\n",
        r#"{"cmd":"activate","connection_id":"vault"}"#,
        "\n",
        r#"{"cmd":"list"}"#,
        "\n",
    );

    driver.run(script.as_bytes()).await.unwrap();

    let events = lines(driver.output());
    let commands: Vec<&str> = events
        .iter()
        .map(|event| event["cmd"].as_str().unwrap())
        .collect();
    assert_eq!(commands, vec!["connect", "connect", "monitor", "activate", "list"]);

    let list = &events[4];
    let titles: Vec<&str> = list["snapshot"]["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|session| session["title"].as_str().unwrap())
        .collect();
    assert_eq!(
        titles,
        vec!["prod@10.0.0.1 #1", "prod@10.0.0.1 #2", "prod@10.0.0.1 monitor"]
    );
    assert_eq!(list["snapshot"]["active_connection_id"], "vault");
    assert!(list["snapshot"]["active_session_id"].is_null());

    // End of input closes everything
    assert!(driver.controller().sessions().is_empty());
}

#[tokio::test]
async fn test_close_reconnect_and_close_connection() {
    let (mut driver, transport) = driver();
    driver
        .handle_line(r#"{"cmd":"connect","connection_id":"prod"}"#)
        .await
        .unwrap();
    let first = driver.controller().sessions()[0].id;

    driver
        .handle_line(&format!(r#"{{"cmd":"reconnect","session_id":"{first}"}}"#))
        .await
        .unwrap();
    let second = driver.controller().sessions()[0].id;
    assert_ne!(first, second);

    driver
        .handle_line(&format!(
            r#"{{"cmd":"rename","session_id":"{second}","title":"primary"}}"#
        ))
        .await
        .unwrap();
    driver
        .handle_line(r#"{"cmd":"close_connection","connection_id":"prod"}"#)
        .await
        .unwrap();
    driver
        .handle_line(&format!(r#"{{"cmd":"close","session_id":"{second}"}}"#))
        .await
        .unwrap();

    let events = lines(driver.output());
    assert_eq!(events[1]["cmd"], "reconnect");
    assert_eq!(events[1]["result"]["title"], "prod@10.0.0.1 #2");
    assert_eq!(events[2]["snapshot"]["sessions"][0]["title"], "primary");
    assert_eq!(events[3]["result"]["closed"], 1);
    // Already gone: close is a no-op
    assert_eq!(events[4]["ok"], false);
    assert!(driver.controller().sessions().is_empty());

    for _ in 0..200 {
        if !transport.is_open(&second) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!transport.is_open(&first));
    assert!(!transport.is_open(&second));
}
