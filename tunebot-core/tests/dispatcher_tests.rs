// tests/dispatcher_tests.rs
use std::time::Duration;

use tunebot_common::models::TrackSignal;
use tunebot_core::eventbus::{BotEvent, EventBus};
use tunebot_core::test_utils::helpers::*;

#[tokio::test]
async fn test_play_command_flows_through_reactions() {
    let bot = TestBot::new();

    let task = bot
        .dispatcher
        .handle_event(command(10, ALICE, "@play lofi beats"))
        .await
        .expect("play commands run in their own task");
    let presentation = bot.notifier.wait_for_presentation(1).await;
    wait_for_gate(&bot.router).await;
    assert_eq!(bot.search.queries()[0].0, "lofi beats");

    let reaction = pick(&presentation, ALICE, 4);
    assert!(bot.dispatcher.handle_event(BotEvent::Reaction(reaction)).await.is_none());
    task.await.unwrap();

    assert_eq!(bot.media.opened(), vec!["vid4".to_string()]);
    assert!(bot.playback.is_active(guild(GUILD)).await);
}

#[tokio::test]
async fn test_stub_commands_reply_with_their_name() {
    let bot = TestBot::new();

    let list = bot.dispatcher.handle_event(command(10, ALICE, "@list")).await.unwrap();
    list.await.unwrap();
    let delete = bot.dispatcher.handle_event(command(11, ALICE, "@delete")).await.unwrap();
    delete.await.unwrap();

    assert_eq!(bot.notifier.notice_texts(), vec!["list".to_string(), "delete".to_string()]);
}

#[tokio::test]
async fn test_chatter_is_ignored() {
    let bot = TestBot::new();

    assert!(bot.dispatcher.handle_event(command(10, ALICE, "hello there")).await.is_none());
    assert!(bot.dispatcher.handle_event(command(11, ALICE, "@playlist")).await.is_none());

    assert!(bot.notifier.notices().is_empty());
    assert_eq!(bot.search.calls(), 0);
}

#[tokio::test]
async fn test_voice_drop_faults_playback_and_forgets_session() {
    let bot = TestBot::new();
    let task = bot
        .dispatcher
        .handle_event(command(10, ALICE, "@play lofi"))
        .await
        .unwrap();
    let presentation = bot.notifier.wait_for_presentation(1).await;
    wait_for_gate(&bot.router).await;
    bot.router.dispatch(&pick(&presentation, ALICE, 1));
    task.await.unwrap();

    let connection = bot.transport.live(guild(GUILD)).unwrap();
    let track = connection.last_played().unwrap();
    track.send(TrackSignal::Playing);
    bot.notifier.wait_for_notices(1).await;

    connection.set_connected(false);
    bot.dispatcher
        .handle_event(BotEvent::VoiceDisconnected { guild_id: guild(GUILD) })
        .await;

    assert!(!bot.playback.is_active(guild(GUILD)).await);
    assert!(bot.voice.get(guild(GUILD)).await.is_none());
    let notices = bot.notifier.wait_for_notices(2).await;
    assert_eq!(notices[1], "An error occurred during playback.");
    assert_eq!(track.control.stops(), 1);
}

#[tokio::test]
async fn test_run_loop_stops_on_shutdown() {
    let bot = TestBot::new();
    let (bus, rx) = EventBus::new();
    let runner = tokio::spawn(std::sync::Arc::clone(&bot.dispatcher).run(rx, bus.shutdown_rx.clone()));

    bus.publish(command(10, ALICE, "@list"));
    bot.notifier.wait_for_notices(1).await;

    bus.shutdown();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("dispatcher exits after shutdown")
        .unwrap();
    assert_eq!(bot.notifier.notice_texts(), vec!["list".to_string()]);
}

#[tokio::test]
async fn test_prefix_is_case_insensitive_and_end_is_relayed() {
    let bot = TestBot::new();
    let task = bot
        .dispatcher
        .handle_event(command(10, ALICE, "@PLAY   lofi"))
        .await
        .unwrap();
    let presentation = bot.notifier.wait_for_presentation(1).await;
    wait_for_gate(&bot.router).await;
    bot.router.dispatch(&pick(&presentation, ALICE, 2));
    task.await.unwrap();

    let handle_session = bot.voice.get(guild(GUILD)).await.unwrap();
    assert_eq!(handle_session.channel_id(), channel(VOICE_CHANNEL));
    assert!(bot.playback.is_active(guild(GUILD)).await);

    bot.transport
        .live(guild(GUILD))
        .unwrap()
        .last_played()
        .unwrap()
        .send(TrackSignal::Ended);
    let notices = bot.notifier.wait_for_notices(1).await;
    assert_eq!(notices, vec!["🎵 stop!".to_string()]);
    assert!(!bot.playback.is_active(guild(GUILD)).await);
}

#[tokio::test]
async fn test_slow_reply_does_not_hold_up_reactions() {
    let bot = TestBot::new();
    let task = bot
        .dispatcher
        .handle_event(command(10, ALICE, "@play lofi"))
        .await
        .unwrap();
    let presentation = bot.notifier.wait_for_presentation(1).await;
    wait_for_gate(&bot.router).await;

    bot.notifier.hold_notices();
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        bot.dispatcher.handle_event(command(11, BOB, "@list")),
    )
    .await
    .expect("dispatcher does not wait on the reply")
    .expect("replies run in their own task");

    bot.dispatcher
        .handle_event(BotEvent::Reaction(pick(&presentation, ALICE, 2)))
        .await;
    task.await.unwrap();
    assert_eq!(bot.media.opened(), vec!["vid2".to_string()]);
    assert!(bot.notifier.notice_texts().is_empty());

    bot.notifier.release_notices();
    reply.await.unwrap();
    assert_eq!(bot.notifier.notice_texts(), vec!["list".to_string()]);
}
