//! End-to-end hub scenarios driven through the handler layer.
//!
//! These tests exercise the same code paths the WebSocket adapter does,
//! with mpsc receivers standing in for sockets and explicit `Instant`s
//! standing in for wall-clock time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use shoutwall_server::config::ServerConfig;
use shoutwall_server::connection::{self, Admitted, MessageOutcome};
use shoutwall_server::fanout::ServerEvent;
use shoutwall_server::server::SharedState;
use shoutwall_server::topics::{StaticTopics, Topic};

fn test_state() -> Arc<SharedState> {
    let source = StaticTopics::new(vec![
        Topic {
            title: "first".into(),
            url: None,
        },
        Topic {
            title: "second".into(),
            url: Some("https://example.com".into()),
        },
    ]);
    SharedState::new(ServerConfig::default(), Box::new(source))
}

/// Drain every event currently queued for a connection.
fn drain(rx: &mut tokio::sync::mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn fourth_connection_from_same_address_is_rejected() {
    let state = test_state();
    let admitted: Vec<_> = (0..3)
        .map(|_| connection::handle_connect(&state, "1.2.3.4").expect("under the cap"))
        .collect();
    assert_eq!(state.registry.lock().presence(), 3);

    assert!(connection::handle_connect(&state, "1.2.3.4").is_none());
    // The rejection allocates nothing and leaves presence untouched.
    assert_eq!(state.registry.lock().presence(), 3);
    assert_eq!(state.registry.lock().connections_from("1.2.3.4"), 3);
    assert_eq!(state.peers.lock().len(), 3);

    // A different address is still welcome.
    assert!(connection::handle_connect(&state, "5.6.7.8").is_some());
    drop(admitted);
}

#[test]
fn presence_counts_admits_minus_releases() {
    let state = test_state();
    let admitted: Vec<_> = (0..5)
        .map(|i| connection::handle_connect(&state, &format!("10.0.0.{i}")).unwrap())
        .collect();
    assert_eq!(state.registry.lock().presence(), 5);

    for conn in admitted.iter().take(2) {
        connection::handle_disconnect(&state, conn.id);
    }
    assert_eq!(state.registry.lock().presence(), 3);

    // Disconnecting an already-gone connection changes nothing.
    connection::handle_disconnect(&state, admitted[0].id);
    assert_eq!(state.registry.lock().presence(), 3);
}

#[test]
fn late_joiner_is_told_current_topic_then_presence() {
    let state = test_state();
    state.rotate_topic();
    state.rotate_topic();

    let Admitted { mut rx, .. } = connection::handle_connect(&state, "1.2.3.4").unwrap();
    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    match &events[0] {
        ServerEvent::NewTopic(topic) => {
            // Two overlapping rotations: the last fetch wins.
            assert_eq!(topic.title, "second");
            assert_eq!(topic.url.as_deref(), Some("https://example.com"));
        }
        other => panic!("expected topic catch-up first, got {other:?}"),
    }
    assert_eq!(events[1], ServerEvent::UserCount(1));
}

#[test]
fn eleventh_message_in_ten_seconds_is_throttled() {
    let state = test_state();
    let Admitted { id, mut rx } = connection::handle_connect(&state, "1.2.3.4").unwrap();
    drain(&mut rx);

    let t0 = Instant::now();
    for i in 0..10 {
        let outcome =
            connection::handle_message(&state, id, "hello", t0 + Duration::from_secs(i));
        assert_eq!(outcome, MessageOutcome::Broadcast);
    }
    assert_eq!(drain(&mut rx).len(), 10);

    // Window is full and its oldest entry (t=0) is within 10s of t=9.5s.
    let outcome =
        connection::handle_message(&state, id, "hello", t0 + Duration::from_secs_f64(9.5));
    assert_eq!(outcome, MessageOutcome::Throttled);
    assert!(drain(&mut rx).is_empty());

    // Once the oldest accepted message ages past 10s, acceptance resumes.
    let outcome =
        connection::handle_message(&state, id, "hello", t0 + Duration::from_secs(11));
    assert_eq!(outcome, MessageOutcome::Broadcast);
}

#[test]
fn ten_throttles_in_thirty_seconds_ban_and_tear_down() {
    let state = test_state();
    let Admitted { id, mut rx } = connection::handle_connect(&state, "1.2.3.4").unwrap();

    let t0 = Instant::now();
    // Saturate: 10 accepted messages in one burst.
    for i in 0..10 {
        connection::handle_message(&state, id, "spam", t0 + Duration::from_millis(i * 100));
    }
    // 10 rejected attempts fill the grey window.
    for i in 0..10 {
        let at = t0 + Duration::from_secs(1) + Duration::from_millis(i * 100);
        assert_eq!(
            connection::handle_message(&state, id, "spam", at),
            MessageOutcome::Throttled
        );
    }
    // The next rejected attempt crosses the grey-list threshold.
    let outcome =
        connection::handle_message(&state, id, "spam", t0 + Duration::from_secs(3));
    assert_eq!(outcome, MessageOutcome::Banned);

    // Teardown is synchronous: registry entry gone, presence announced,
    // outbound channel closed.
    assert_eq!(state.registry.lock().presence(), 0);
    assert!(!state.registry.lock().contains(id));
    drain(&mut rx);
    assert!(matches!(
        rx.try_recv(),
        Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
    ));

    // Stray events for the banned id are safe no-ops.
    assert_eq!(
        connection::handle_message(&state, id, "spam", t0 + Duration::from_secs(4)),
        MessageOutcome::UnknownConnection
    );
    connection::handle_disconnect(&state, id);
    assert_eq!(state.registry.lock().presence(), 0);
}

#[test]
fn grey_window_spread_beyond_thirty_seconds_does_not_ban() {
    let state = test_state();
    let Admitted { id, .. } = connection::handle_connect(&state, "1.2.3.4").unwrap();

    let t0 = Instant::now();
    let burst = |start_secs: u64| -> Vec<Instant> {
        (0..10)
            .map(|i| t0 + Duration::from_secs(start_secs) + Duration::from_millis(i * 100))
            .collect()
    };

    // First saturation episode: burst of 10 accepts, then 8 throttles.
    for at in burst(0) {
        assert_eq!(
            connection::handle_message(&state, id, "spam", at),
            MessageOutcome::Broadcast
        );
    }
    for i in 1..=8 {
        assert_eq!(
            connection::handle_message(&state, id, "spam", t0 + Duration::from_secs(i)),
            MessageOutcome::Throttled
        );
    }

    // Second episode at t=20 re-saturates and adds 2 more throttles,
    // filling the grey window (oldest trigger: t=1).
    for at in burst(20) {
        connection::handle_message(&state, id, "spam", at);
    }
    for i in [21, 22] {
        assert_eq!(
            connection::handle_message(&state, id, "spam", t0 + Duration::from_secs(i)),
            MessageOutcome::Throttled
        );
    }

    // Third episode at t=35: the grey window is full, but its oldest
    // trigger is 34s old — beyond the 30s ban span. Merely throttled.
    for at in burst(35) {
        connection::handle_message(&state, id, "spam", at);
    }
    assert_eq!(
        connection::handle_message(&state, id, "spam", t0 + Duration::from_secs(36)),
        MessageOutcome::Throttled
    );
    assert!(state.registry.lock().contains(id));
}

#[test]
fn invalid_payloads_never_broadcast_and_never_touch_windows() {
    let state = test_state();
    let Admitted { id, mut rx } = connection::handle_connect(&state, "1.2.3.4").unwrap();
    drain(&mut rx);

    let t0 = Instant::now();
    let long = "x".repeat(100);
    for i in 0..20 {
        let at = t0 + Duration::from_millis(i * 50);
        assert_eq!(
            connection::handle_message(&state, id, "", at),
            MessageOutcome::InvalidPayload
        );
        assert_eq!(
            connection::handle_message(&state, id, &long, at),
            MessageOutcome::InvalidPayload
        );
    }
    assert!(drain(&mut rx).is_empty());

    // The recent window is still empty: a burst of valid messages is
    // accepted in full, proving the invalid ones were never recorded.
    for i in 0..10 {
        let at = t0 + Duration::from_secs(1) + Duration::from_millis(i * 10);
        assert_eq!(
            connection::handle_message(&state, id, "hello", at),
            MessageOutcome::Broadcast
        );
    }
    // A 99-character message is still valid.
    let just_under = "x".repeat(99);
    assert_eq!(
        connection::handle_message(&state, id, &just_under, t0 + Duration::from_secs(30)),
        MessageOutcome::Broadcast
    );
}

#[test]
fn accepted_messages_fan_out_to_every_connection() {
    let state = test_state();
    let Admitted { id, rx: mut rx_a } = connection::handle_connect(&state, "1.2.3.4").unwrap();
    let Admitted { rx: mut rx_b, .. } = connection::handle_connect(&state, "5.6.7.8").unwrap();
    drain(&mut rx_a);
    drain(&mut rx_b);

    connection::handle_message(&state, id, "hello everyone", Instant::now());

    for rx in [&mut rx_a, &mut rx_b] {
        let events = drain(rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::NewMessage(styled) => {
                assert_eq!(styled.msg, "hello everyone");
                assert!((10..=85).contains(&styled.css_top));
                assert!((2..=90).contains(&styled.css_left));
            }
            other => panic!("expected a styled message, got {other:?}"),
        }
    }
}

#[test]
fn rotation_overwrites_topic_and_fans_out() {
    let state = test_state();
    let Admitted { mut rx, .. } = connection::handle_connect(&state, "1.2.3.4").unwrap();
    drain(&mut rx);

    state.rotate_topic();
    assert_eq!(state.current_topic.lock().title, "first");
    state.rotate_topic();
    assert_eq!(state.current_topic.lock().title, "second");

    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            ServerEvent::NewTopic(Topic {
                title: "first".into(),
                url: None,
            }),
            ServerEvent::NewTopic(Topic {
                title: "second".into(),
                url: Some("https://example.com".into()),
            }),
        ]
    );
}
