use onair::audio::{resample, PlaybackBuffer, PlaybackReader, UnderrunPolicy};
use onair::protocol::messages::ServerReply;
use onair::server::{
    AdmissionPolicy, RelayServer, ServerConfig, SessionRegistry, MAX_CHUNK_BYTES,
};
use onair::SpeakerClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

struct TestRelay {
    url: String,
    registry: Arc<SessionRegistry>,
    buffer: Arc<PlaybackBuffer>,
    reader: PlaybackReader,
    shutdown: tokio::sync::oneshot::Sender<()>,
}

async fn start_relay(admission: AdmissionPolicy, underrun: UnderrunPolicy) -> TestRelay {
    let _ = env_logger::builder().is_test(true).try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig::new()
        .bind_addr(addr)
        .admission(admission)
        .underrun(underrun);
    let (buffer, reader) = PlaybackBuffer::with_limit(None, underrun);

    let server = RelayServer::new(config, Arc::clone(&buffer));
    let registry = server.registry();

    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(server.serve(listener, async move {
        let _ = shutdown_rx.await;
    }));

    TestRelay {
        url: format!("ws://{}/", addr),
        registry,
        buffer,
        reader,
        shutdown,
    }
}

/// Poll until `condition` holds or two seconds pass
async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Whether the server has closed this connection
async fn is_closed(client: &mut SpeakerClient) -> bool {
    !matches!(
        tokio::time::timeout(Duration::from_secs(2), client.next_reply()).await,
        Ok(Ok(Some(_)))
    )
}

fn ramp(len: usize) -> Vec<i16> {
    (0..len).map(|i| ((i % 48) as i16 - 24) * 500).collect()
}

#[tokio::test]
async fn test_speaker_scenario() {
    let mut relay = start_relay(AdmissionPolicy::SingleSpeaker, UnderrunPolicy::Drain).await;

    let mut a = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(a.request_speaker().await.unwrap(), ServerReply::Granted);

    let mut b = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(b.request_speaker().await.unwrap(), ServerReply::Rejected);
    assert!(is_closed(&mut b).await);

    let input = ramp(240);
    a.announce_rate(24000).await.unwrap();
    a.send_audio(&input).await.unwrap();

    let buffer = Arc::clone(&relay.buffer);
    wait_for(|| buffer.len() == 480).await;

    let expected = resample(&input, 24000, 48000);
    assert_eq!(expected.len(), 480);

    let first = relay.reader.pop_fixed(256);
    assert_eq!(first, expected[..256].to_vec());

    let second = relay.reader.pop_fixed(256);
    assert_eq!(second[..224].to_vec(), expected[256..].to_vec());
    assert!(second[224..].iter().all(|&s| s == 0));
    assert_eq!(second.len(), 256);

    a.close().await.unwrap();
    let _ = relay.shutdown.send(());
}

#[tokio::test]
async fn test_short_queue_plays_silence_by_default() {
    let mut relay = start_relay(AdmissionPolicy::SingleSpeaker, UnderrunPolicy::Silence).await;

    let mut a = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(a.request_speaker().await.unwrap(), ServerReply::Granted);
    a.send_audio(&ramp(300)).await.unwrap();

    let buffer = Arc::clone(&relay.buffer);
    wait_for(|| buffer.len() == 300).await;

    assert_eq!(relay.reader.pop_fixed(256), ramp(300)[..256].to_vec());
    assert_eq!(relay.reader.pop_fixed(256), vec![0; 256]);
    assert_eq!(relay.buffer.len(), 44);

    let _ = relay.shutdown.send(());
}

#[tokio::test]
async fn test_speaker_disconnect_frees_the_floor() {
    let mut relay = start_relay(AdmissionPolicy::SingleSpeaker, UnderrunPolicy::Silence).await;

    let mut a = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(a.request_speaker().await.unwrap(), ServerReply::Granted);
    a.send_audio(&ramp(256)).await.unwrap();

    let buffer = Arc::clone(&relay.buffer);
    wait_for(|| buffer.len() == 256).await;

    // Drop without a close handshake, as a crashed client would
    drop(a);

    let registry = Arc::clone(&relay.registry);
    wait_for(|| registry.active_speaker().is_none()).await;
    assert_eq!(relay.registry.active_client(), None);

    // What was already queued still plays, then silence
    assert_eq!(relay.reader.pop_fixed(256), ramp(256));
    assert_eq!(relay.reader.pop_fixed(256), vec![0; 256]);

    let mut c = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(c.request_speaker().await.unwrap(), ServerReply::Granted);

    let _ = relay.shutdown.send(());
}

#[tokio::test]
async fn test_concurrent_requests_grant_once() {
    let relay = start_relay(AdmissionPolicy::SingleSpeaker, UnderrunPolicy::Silence).await;

    let mut clients = Vec::new();
    for _ in 0..6 {
        clients.push(SpeakerClient::connect(&relay.url).await.unwrap());
    }

    let tasks: Vec<_> = clients
        .into_iter()
        .map(|mut client| {
            tokio::spawn(async move {
                let reply = client.request_speaker().await.unwrap();
                (reply, client)
            })
        })
        .collect();

    let mut granted = 0;
    let mut survivors = Vec::new();
    for task in tasks {
        let (reply, client) = task.await.unwrap();
        if reply == ServerReply::Granted {
            granted += 1;
        }
        survivors.push(client);
    }

    assert_eq!(granted, 1);
    assert!(relay.registry.active_speaker().is_some());

    let _ = relay.shutdown.send(());
}

#[tokio::test]
async fn test_listener_audio_is_dropped() {
    let relay = start_relay(AdmissionPolicy::SingleSpeaker, UnderrunPolicy::Silence).await;

    let mut a = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(a.request_speaker().await.unwrap(), ServerReply::Granted);

    let mut b = SpeakerClient::connect(&relay.url).await.unwrap();
    b.send_audio(&ramp(100)).await.unwrap();
    // The reply proves the audio before it was processed
    assert_eq!(b.request_speaker().await.unwrap(), ServerReply::Rejected);

    assert!(relay.buffer.is_empty());

    let _ = relay.shutdown.send(());
}

#[tokio::test]
async fn test_malformed_control_is_ignored() {
    let mut relay = start_relay(AdmissionPolicy::SingleSpeaker, UnderrunPolicy::Silence).await;

    let mut a = SpeakerClient::connect(&relay.url).await.unwrap();
    a.send_text("{not json").await.unwrap();
    a.send_text(r#"{"rate": 0}"#).await.unwrap();
    a.send_text(r#"{"rate": 1}"#).await.unwrap();
    a.send_text(r#"{"channels": 2}"#).await.unwrap();

    // Still connected, still at the default rate
    assert_eq!(a.request_speaker().await.unwrap(), ServerReply::Granted);
    a.send_audio(&ramp(256)).await.unwrap();

    let buffer = Arc::clone(&relay.buffer);
    wait_for(|| buffer.len() == 256).await;
    assert_eq!(relay.reader.pop_fixed(256), ramp(256));

    let _ = relay.shutdown.send(());
}

#[tokio::test]
async fn test_oversized_frame_ends_the_session() {
    let relay = start_relay(AdmissionPolicy::SingleSpeaker, UnderrunPolicy::Silence).await;

    let mut a = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(a.request_speaker().await.unwrap(), ServerReply::Granted);

    // The server may hang up while the frame is still in flight
    let _ = a.send_audio(&vec![0; MAX_CHUNK_BYTES / 2 + 1]).await;

    let registry = Arc::clone(&relay.registry);
    wait_for(|| registry.active_speaker().is_none()).await;
    assert!(relay.buffer.is_empty());

    let mut b = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(b.request_speaker().await.unwrap(), ServerReply::Granted);

    let _ = relay.shutdown.send(());
}

#[tokio::test]
async fn test_single_client_policy_rejects_at_handshake() {
    let relay = start_relay(AdmissionPolicy::SingleClient, UnderrunPolicy::Silence).await;

    let mut a = SpeakerClient::connect(&relay.url).await.unwrap();
    let registry = Arc::clone(&relay.registry);
    wait_for(|| registry.active_client().is_some()).await;

    let mut b = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(
        tokio::time::timeout(Duration::from_secs(2), b.next_reply())
            .await
            .unwrap()
            .unwrap(),
        Some(ServerReply::Rejected)
    );
    assert!(is_closed(&mut b).await);

    assert_eq!(a.request_speaker().await.unwrap(), ServerReply::Granted);
    assert_eq!(relay.registry.active_speaker(), relay.registry.active_client());

    a.close().await.unwrap();
    wait_for(|| registry.active_client().is_none()).await;

    let mut c = SpeakerClient::connect(&relay.url).await.unwrap();
    assert_eq!(c.request_speaker().await.unwrap(), ServerReply::Granted);

    let _ = relay.shutdown.send(());
}
