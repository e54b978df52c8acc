mod common;
use common::*;

use anern_monitor::anern::packet::Command;
use anern_monitor::config::{Output, Poll};
use anern_monitor::scheduler::Scheduler;

use std::sync::Arc;

fn poll(commands: Vec<Command>) -> Poll {
    Poll {
        interval_secs: 1,
        commands,
    }
}

#[tokio::test]
async fn poll_once_writes_text() {
    let transport = ScriptedTransport::new();
    transport
        .reply(Some(Factory::status_response()))
        .reply(Some(Factory::ratings_response()));
    let inverter = Arc::new(Factory::inverter(&transport));

    let scheduler = Scheduler::new(inverter, poll(vec![Command::Qpigs, Command::Qpiri]), Output::Text);
    let mut out = Vec::new();
    scheduler.poll_once(&mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 22);
    assert_eq!(lines[0], "grid_voltage 230.0");
    assert_eq!(lines[21], RATINGS_BODY);
}

#[tokio::test]
async fn poll_once_writes_json() {
    let transport = ScriptedTransport::new();
    transport.reply(Some(Factory::status_response()));
    let inverter = Arc::new(Factory::inverter(&transport));

    let scheduler = Scheduler::new(inverter, poll(vec![Command::Qpigs]), Output::Json);
    let mut out = Vec::new();
    scheduler.poll_once(&mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    let json: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
    assert_eq!(json["command"], "QPIGS");
    assert_eq!(json["response"]["battery_percent"], 100);
    assert!(json["time"].is_string());
}

#[tokio::test]
async fn failed_exchange_is_skipped() {
    let transport = ScriptedTransport::new();
    transport
        .reply(None)
        .reply(Some(Factory::ratings_response()));
    let inverter = Arc::new(Factory::inverter(&transport));

    let scheduler = Scheduler::new(inverter, poll(vec![Command::Qpigs, Command::Qpiri]), Output::Text);
    let mut out = Vec::new();
    scheduler.poll_once(&mut out).await.unwrap();

    assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", RATINGS_BODY));
}

#[tokio::test]
async fn start_stops_on_shutdown() {
    let transport = ScriptedTransport::new();
    transport.reply(Some(Factory::status_response()));
    let inverter = Arc::new(Factory::inverter(&transport));

    let scheduler = Scheduler::new(inverter, poll(vec![Command::Qpigs]), Output::Text);
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    shutdown_tx.send(()).unwrap();

    let mut out = Vec::new();
    scheduler.start(&mut out, shutdown_rx).await.unwrap();
}
