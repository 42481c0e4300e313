//! Integration tests for the chat backend behind the Tauri commands.
//! Runs real `sh` scripts as the bridge and collects window events. No mocks.
#![cfg(unix)]

use std::sync::mpsc;
use std::time::Duration;

use knecht_client::config::Config;
use knecht_client::WindowEvent;
use knecht_gui_lib::commands::{
    do_cancel, do_render, do_submit, ui_event, GuiState, HISTORY_RENDERED, REPLY_ANSWERED,
    REPLY_CANCELLED, REPLY_FAILED,
};

/// GUI state whose bridge runs `body` with `sh`; events go to the returned channel.
fn gui_with_script(dir: &tempfile::TempDir, body: &str) -> (GuiState, mpsc::Receiver<WindowEvent>) {
    let script = dir.path().join("caller.sh");
    std::fs::write(&script, body).unwrap();
    let mut cfg = Config::default();
    cfg.bridge.interpreter = Some("sh".into());
    cfg.bridge.script = Some(script.to_str().unwrap().into());

    let (tx, rx) = mpsc::channel();
    let tx = std::sync::Mutex::new(tx);
    let state = GuiState::new(&cfg, dir.path().join("config.yaml"), move |event| {
        let _ = tx.lock().unwrap().send(event);
    })
    .expect("state should build");
    (state, rx)
}

/// Wait for the first event matching `pred`.
fn wait_for(rx: &mpsc::Receiver<WindowEvent>, pred: impl Fn(&WindowEvent) -> bool) -> WindowEvent {
    loop {
        let event = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("event should arrive");
        if pred(&event) {
            return event;
        }
    }
}

#[test]
fn submit_markup_arrives_only_as_ordered_events() {
    let dir = tempfile::tempdir().unwrap();
    let (state, rx) = gui_with_script(&dir, "echo \"Hallo zurück: $1\"\n");

    let reply = do_submit(&state, "Hello").expect("submit should succeed");
    assert!(reply.accepted);
    assert_eq!(reply.entry, Some(0));

    let mut events = Vec::new();
    while !matches!(events.last(), Some(WindowEvent::Answered { .. })) {
        events.push(
            rx.recv_timeout(Duration::from_secs(10))
                .expect("event should arrive"),
        );
    }

    match events.as_slice() {
        [WindowEvent::Rendered(pending), WindowEvent::Rendered(answered), WindowEvent::Answered { entry: 0 }] =>
        {
            assert!(pending.contains("&gt;&gt;&gt; Hello"));
            assert!(!pending.contains("Hallo zurück"));
            assert!(answered.contains("Hallo zurück: Hello"));
            assert_eq!(&do_render(&state), answered);
        }
        other => panic!("unexpected events {other:?}"),
    }
}

/// The reply can finish before the submit call returns; the last rendered
/// markup must still be the answered history.
#[test]
fn fast_reply_leaves_answered_markup_last() {
    let dir = tempfile::tempdir().unwrap();
    let (state, rx) = gui_with_script(&dir, "echo quick\n");

    for (i, question) in ["one", "two", "three"].into_iter().enumerate() {
        do_submit(&state, question).expect("submit should succeed");
        let mut last_html = None;
        loop {
            match rx.recv_timeout(Duration::from_secs(10)).expect("event should arrive") {
                WindowEvent::Rendered(html) => last_html = Some(html),
                WindowEvent::Answered { entry } => {
                    assert_eq!(entry, i);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        let html = last_html.expect("answer should be rendered");
        assert_eq!(html.matches("quick").count(), i + 1);
        assert_eq!(html, do_render(&state));
    }
}

#[test]
fn blank_submit_is_not_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let (state, rx) = gui_with_script(&dir, "echo unused\n");

    let reply = do_submit(&state, "  ").expect("submit should succeed");

    assert!(!reply.accepted);
    assert_eq!(reply.entry, None);
    assert_eq!(do_render(&state), "<html></html>");
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn submit_while_pending_is_rejected_and_cancel_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let (state, rx) = gui_with_script(&dir, "exec sleep 10\n");

    do_submit(&state, "slow").expect("first submit");
    let err = do_submit(&state, "second").unwrap_err();
    assert!(err.contains("wait"), "{err}");

    assert!(do_cancel(&state));
    wait_for(&rx, |e| matches!(e, WindowEvent::Cancelled { entry: 0 }));
    assert!(!do_cancel(&state));

    let reply = do_submit(&state, "again").expect("submit after cancel");
    assert_eq!(reply.entry, Some(1));
    do_cancel(&state);
}

#[test]
fn bridge_failure_is_reported_as_event() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = Config::default();
    cfg.bridge.interpreter = Some("knecht-no-such-interpreter".into());
    let (tx, rx) = mpsc::channel();
    let tx = std::sync::Mutex::new(tx);
    let state = GuiState::new(&cfg, dir.path().join("config.yaml"), move |event| {
        let _ = tx.lock().unwrap().send(event);
    })
    .unwrap();

    do_submit(&state, "Hello").unwrap();

    match wait_for(&rx, |e| matches!(e, WindowEvent::Failed { .. })) {
        WindowEvent::Failed { entry, reason } => {
            assert_eq!(entry, 0);
            assert!(reason.contains("knecht-no-such-interpreter"), "{reason}");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(do_render(&state).contains("Fehler"));
}

#[test]
fn window_events_map_to_frontend_events() {
    let (name, payload) = ui_event(&WindowEvent::Rendered("<html></html>".into()));
    assert_eq!(name, HISTORY_RENDERED);
    assert_eq!(payload, serde_json::json!("<html></html>"));

    let (name, payload) = ui_event(&WindowEvent::Answered { entry: 2 });
    assert_eq!(name, REPLY_ANSWERED);
    assert_eq!(payload["entry"], 2);

    let (name, payload) = ui_event(&WindowEvent::Failed {
        entry: 1,
        reason: "boom".into(),
    });
    assert_eq!(name, REPLY_FAILED);
    assert_eq!(payload["reason"], "boom");

    let (name, _) = ui_event(&WindowEvent::Cancelled { entry: 0 });
    assert_eq!(name, REPLY_CANCELLED);
}
