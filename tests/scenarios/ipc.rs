/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use opensphere_shell::services::update::{UpdateCoordinator, UpdateSettings, Updater};
use opensphere_shell::services::user_certs::{Certificate, CertificateBroker};
use opensphere_shell::shell::desktop::runtime::ipc::{
    EventCertificatePrompt, EventUpdater, IpcEvent, IpcReply, IpcRouter, SharedUpdates, channel, serve,
};
use opensphere_shell::test_utils::{coordinator, shell_config};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

fn certificate(name: &str) -> Certificate {
    Certificate {
        subject_name: name.to_string(),
        issuer_name: "Test CA".to_string(),
        serial_number: format!("{name}-serial"),
        fingerprint: format!("sha256/{name}"),
    }
}

#[tokio::test]
async fn concurrent_certificate_requests_share_one_prompt() {
    let dir = TempDir::new().unwrap();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let broker = Arc::new(CertificateBroker::new(Arc::new(EventCertificatePrompt::new(
        events_tx.clone(),
    ))));
    let updater: Box<dyn Updater> = Box::new(EventUpdater::new(events_tx));
    let updates: SharedUpdates = Arc::new(Mutex::new(UpdateCoordinator::new(
        updater,
        UpdateSettings::new("OpenSphere", false, dir.path(), dir.path()),
    )));
    let (windows, _) = coordinator(&shell_config(&[]));
    let router = Arc::new(IpcRouter::new(
        "OpenSphere",
        None,
        broker.clone(),
        updates,
        Arc::new(Mutex::new(windows)),
    ));

    let (client, server) = tokio::io::duplex(16 * 1024);
    let (server_read, server_write) = tokio::io::split(server);
    let served = tokio::spawn(serve(router, BufReader::new(server_read), server_write, events_rx));
    let (client_read, mut client_write) = tokio::io::split(client);
    let mut lines = BufReader::new(client_read).lines();

    let url = "https://secure.example.com";
    let candidates = vec![certificate("alice"), certificate("bob")];
    for id in [1, 2] {
        let request = json!({
            "id": id,
            "channel": channel::SELECT_CLIENT_CERTIFICATE,
            "args": {"url": url, "certificates": candidates},
        });
        client_write
            .write_all(format!("{request}\n").as_bytes())
            .await
            .unwrap();
    }

    let prompt: IpcEvent = serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
    assert_eq!(prompt.event, channel::SELECT_CLIENT_CERTIFICATE);
    assert_eq!(prompt.args["url"], json!(url));
    assert_eq!(prompt.args["certificates"].as_array().map(Vec::len), Some(2));

    while broker.waiting_requests(url) < 2 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let selected = json!({
        "id": 3,
        "channel": channel::CLIENT_CERTIFICATE_SELECTED,
        "args": {"url": url, "certificate": certificate("bob")},
    });
    client_write
        .write_all(format!("{selected}\n").as_bytes())
        .await
        .unwrap();

    let mut replies = HashMap::new();
    while replies.len() < 3 {
        let line = lines.next_line().await.unwrap().unwrap();
        let reply: IpcReply = serde_json::from_str(&line).unwrap();
        replies.insert(reply.id.unwrap(), reply);
    }

    let bob = serde_json::to_value(certificate("bob")).unwrap();
    assert_eq!(replies[&1].value.as_ref(), Some(&bob));
    assert_eq!(replies[&2].value.as_ref(), Some(&bob));
    assert_eq!(replies[&3].value, Some(Value::from(2)));

    client_write.shutdown().await.unwrap();
    served.await.unwrap().unwrap();
}
