// tests/voice_session_tests.rs
use std::sync::Arc;
use std::time::Duration;

use tunebot_core::Error;
use tunebot_core::test_utils::fakes::FakeVoiceTransport;
use tunebot_core::test_utils::helpers::*;
use tunebot_core::voice::VoiceSessionManager;

fn manager(transport: FakeVoiceTransport) -> (Arc<FakeVoiceTransport>, Arc<VoiceSessionManager>) {
    let transport = Arc::new(transport);
    let manager = Arc::new(VoiceSessionManager::new(transport.clone()));
    (transport, manager)
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_ensure_connected_shares_one_session() {
    let (transport, manager) = manager(FakeVoiceTransport::with_delay(Duration::from_millis(50)));

    let (a, b) = tokio::join!(
        manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)),
        manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.same_session(&b));
    assert_eq!(transport.connects(), 1);
    assert_eq!(transport.disconnects(), 0);
}

#[tokio::test]
async fn test_same_channel_is_reused() -> Result<(), Error> {
    let (transport, manager) = manager(FakeVoiceTransport::new());

    let first = manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await?;
    let second = manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await?;

    assert!(first.same_session(&second));
    assert_eq!(transport.connects(), 1);
    Ok(())
}

#[tokio::test]
async fn test_other_channel_migrates() -> Result<(), Error> {
    let (transport, manager) = manager(FakeVoiceTransport::new());

    let first = manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await?;
    let moved = manager
        .ensure_connected(guild(GUILD), channel(OTHER_VOICE_CHANNEL))
        .await?;

    assert!(!first.same_session(&moved));
    assert!(!first.is_connected(), "old connection is torn down");
    assert_eq!(moved.channel_id(), channel(OTHER_VOICE_CHANNEL));
    assert_eq!(transport.connects(), 2);
    assert_eq!(transport.disconnects(), 1);

    let stored = manager.get(guild(GUILD)).await.expect("session stored");
    assert!(stored.same_session(&moved));
    Ok(())
}

#[tokio::test]
async fn test_guilds_are_independent() -> Result<(), Error> {
    let (transport, manager) = manager(FakeVoiceTransport::new());

    let a = manager.ensure_connected(guild(1), channel(10)).await?;
    let b = manager.ensure_connected(guild(2), channel(20)).await?;
    manager.release(guild(1)).await?;

    assert!(!a.is_connected());
    assert!(b.is_connected());
    assert_eq!(transport.connects(), 2);
    Ok(())
}

#[tokio::test]
async fn test_rejected_connect_surfaces_without_retry() {
    let (transport, manager) = manager(FakeVoiceTransport::new());
    transport.reject_connects(true);

    let outcome = manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await;

    assert!(matches!(outcome, Err(Error::VoiceConnect(_))));
    assert_eq!(transport.connects(), 1);
    assert!(manager.get(guild(GUILD)).await.is_none());
}

#[tokio::test]
async fn test_release_is_idempotent() -> Result<(), Error> {
    let (transport, manager) = manager(FakeVoiceTransport::new());

    manager.release(guild(GUILD)).await?;
    assert_eq!(transport.disconnects(), 0);

    let session = manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await?;
    manager.release(guild(GUILD)).await?;
    manager.release(guild(GUILD)).await?;

    assert!(!session.is_connected());
    assert_eq!(transport.disconnects(), 1);
    assert!(manager.get(guild(GUILD)).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_transport_drop_forgets_only_dead_sessions() -> Result<(), Error> {
    let (transport, manager) = manager(FakeVoiceTransport::new());
    manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await?;

    // A stale report while the session is still live changes nothing.
    assert!(!manager.handle_transport_disconnect(guild(GUILD)).await);
    assert!(manager.get(guild(GUILD)).await.is_some());

    transport.live(guild(GUILD)).unwrap().set_connected(false);
    assert!(manager.handle_transport_disconnect(guild(GUILD)).await);
    assert!(manager.get(guild(GUILD)).await.is_none());
    assert!(!manager.handle_transport_disconnect(guild(GUILD)).await);
    Ok(())
}

#[tokio::test]
async fn test_dead_session_is_replaced_on_next_ensure() -> Result<(), Error> {
    let (transport, manager) = manager(FakeVoiceTransport::new());
    let first = manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await?;
    transport.live(guild(GUILD)).unwrap().set_connected(false);

    let second = manager.ensure_connected(guild(GUILD), channel(VOICE_CHANNEL)).await?;

    assert!(!first.same_session(&second));
    assert!(second.is_connected());
    assert_eq!(transport.connects(), 2);
    Ok(())
}

#[tokio::test]
async fn test_release_all_leaves_every_guild() -> Result<(), Error> {
    let (transport, manager) = manager(FakeVoiceTransport::new());
    let a = manager.ensure_connected(guild(1), channel(10)).await?;
    let b = manager.ensure_connected(guild(2), channel(20)).await?;
    manager.release(guild(2)).await?;
    let c = manager.ensure_connected(guild(3), channel(30)).await?;

    assert_eq!(manager.release_all().await, 2);
    assert!(!a.is_connected() && !b.is_connected() && !c.is_connected());
    assert_eq!(transport.disconnects(), 3);
    assert_eq!(manager.release_all().await, 0);
    Ok(())
}
