//! Integration tests for the session state machine.

use std::time::Duration;

use action_replay::{
    ActionLog, CallbackHooks, CollectingSink, ControlRequest, Event, EventSource, ExitReason,
    LifecycleEvent, RecordingEnd, RecordingLimits, ReplayConfig, ReplayError, ScriptedSource,
    SessionController, SessionHooks, SessionMode, SourceProvider, Timestamp,
};
use tokio::sync::mpsc;
use tokio::time::Instant;

type Lifecycle = mpsc::UnboundedReceiver<LifecycleEvent>;

fn events_at(times: &[Timestamp]) -> Vec<Event> {
    times
        .iter()
        .map(|&t| Event::pointer_move(t, t as f64, 0.0))
        .collect()
}

fn scripted(times: &[Timestamp]) -> impl SourceProvider + 'static {
    let events = events_at(times);
    move || -> Vec<Box<dyn EventSource>> {
        vec![Box::new(
            ScriptedSource::from_events("script", events.clone()).hold_open(),
        )]
    }
}

fn harness(
    config: &ReplayConfig,
    provider: impl SourceProvider + 'static,
    sink: CollectingSink,
) -> (
    SessionController<impl SessionHooks + 'static, CollectingSink>,
    Lifecycle,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let hooks = CallbackHooks::new(move |event: LifecycleEvent| {
        let _ = tx.send(event);
    });
    let controller = SessionController::new(config, provider, hooks, sink).unwrap();
    (controller, rx)
}

fn drain(lifecycle: &mut Lifecycle) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    while let Ok(event) = lifecycle.try_recv() {
        out.push(event);
    }
    out
}

async fn settle<H: SessionHooks>(
    controller: &mut SessionController<H, CollectingSink>,
) -> Result<(), ReplayError> {
    while controller.mode() != SessionMode::Idle {
        controller.advance().await?;
    }
    Ok(())
}

async fn wait_for_len(log: &ActionLog, len: usize) {
    let mut reader = log.reader();
    let mut seen = 0;
    while seen < len {
        seen += reader.next_batch().await.map_or(0, |events| events.len());
    }
}

/// Record `times` with live echo and stop, leaving a clean sink.
async fn record<H: SessionHooks>(
    controller: &mut SessionController<H, CollectingSink>,
    sink: &CollectingSink,
    count: usize,
) {
    controller.request_record().await.unwrap();
    while sink.events().len() < count {
        controller.advance().await.unwrap();
    }
    assert_eq!(controller.request_record().await.unwrap(), SessionMode::Idle);
    sink.clear();
}

#[tokio::test(start_paused = true)]
async fn play_without_recording_does_nothing() {
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[]), sink.clone());

    assert_eq!(controller.handle(ControlRequest::Play).await.unwrap(), SessionMode::Idle);
    assert!(drain(&mut lifecycle).is_empty());
    assert_eq!(sink.resets(), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_recording_cannot_be_played() {
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[]), sink.clone());

    controller.handle(ControlRequest::Record).await.unwrap();
    controller.handle(ControlRequest::Record).await.unwrap();
    assert!(controller.last_recording().unwrap().is_empty());
    drain(&mut lifecycle);

    assert_eq!(controller.handle(ControlRequest::Play).await.unwrap(), SessionMode::Idle);
    assert!(drain(&mut lifecycle).is_empty());
}

#[tokio::test(start_paused = true)]
async fn recording_echoes_and_freezes_on_stop() {
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 10, 25]), sink.clone());

    assert_eq!(
        controller.handle(ControlRequest::Record).await.unwrap(),
        SessionMode::Recording
    );
    while sink.events().len() < 3 {
        controller.advance().await.unwrap();
    }
    assert_eq!(sink.events(), events_at(&[0, 10, 25]));

    // Play while recording only stops the recording.
    assert_eq!(controller.handle(ControlRequest::Play).await.unwrap(), SessionMode::Idle);
    let log = controller.last_recording().unwrap();
    assert!(log.is_frozen());
    assert_eq!(log.len(), 3);
    assert!(log.append(Event::click(30, 0.0, 0.0)).is_err());

    assert_eq!(sink.resets(), 1);
    assert_eq!(
        drain(&mut lifecycle),
        vec![
            LifecycleEvent::SurfaceCleared,
            LifecycleEvent::Entered(SessionMode::Recording),
            LifecycleEvent::Exited(SessionMode::Recording, ExitReason::Stopped),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn playback_completes_and_resets_render_state() {
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 40, 40, 90]), sink.clone());
    record(&mut controller, &sink, 4).await;
    drain(&mut lifecycle);
    let resets = sink.resets();

    assert_eq!(controller.request_play().await.unwrap(), SessionMode::Playing);
    settle(&mut controller).await.unwrap();

    assert_eq!(sink.events(), events_at(&[0, 40, 40, 90]));
    // One reset on start, one after completion.
    assert_eq!(sink.resets(), resets + 2);
    assert_eq!(
        drain(&mut lifecycle),
        vec![
            LifecycleEvent::SurfaceCleared,
            LifecycleEvent::Entered(SessionMode::Playing),
            LifecycleEvent::Exited(SessionMode::Playing, ExitReason::Completed),
        ]
    );

    // The recording is still there for another run.
    assert_eq!(controller.last_recording().unwrap().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn replaying_twice_delivers_the_same_events() {
    let sink = CollectingSink::new();
    let (mut controller, _lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 5, 5, 60]), sink.clone());
    record(&mut controller, &sink, 4).await;

    controller.request_play().await.unwrap();
    settle(&mut controller).await.unwrap();
    let first = sink.events();
    sink.clear();

    controller.request_play().await.unwrap();
    settle(&mut controller).await.unwrap();
    assert_eq!(sink.events(), first);
}

#[tokio::test(start_paused = true)]
async fn record_interrupts_playback() {
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 1000, 2000]), sink.clone());
    record(&mut controller, &sink, 3).await;
    drain(&mut lifecycle);

    controller.request_play().await.unwrap();
    controller.advance().await.unwrap();
    assert_eq!(sink.events().len(), 1);

    assert_eq!(controller.request_record().await.unwrap(), SessionMode::Idle);
    assert_eq!(
        drain(&mut lifecycle).last(),
        Some(&LifecycleEvent::Exited(
            SessionMode::Playing,
            ExitReason::Interrupted
        ))
    );

    // Nothing else arrives after the interrupt.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(sink.events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn play_interrupts_playback() {
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 1000, 2000]), sink.clone());
    record(&mut controller, &sink, 3).await;
    drain(&mut lifecycle);

    controller.request_play().await.unwrap();
    controller.advance().await.unwrap();
    assert_eq!(sink.events().len(), 1);

    assert_eq!(controller.request_play().await.unwrap(), SessionMode::Idle);
    assert_eq!(
        drain(&mut lifecycle).last(),
        Some(&LifecycleEvent::Exited(
            SessionMode::Playing,
            ExitReason::Interrupted
        ))
    );

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(sink.events().len(), 1);
    assert_eq!(controller.mode(), SessionMode::Idle);
}

#[tokio::test(start_paused = true)]
async fn selected_speed_applies_to_next_playback() {
    let sink = CollectingSink::new();
    let (mut controller, _lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 400]), sink.clone());
    record(&mut controller, &sink, 2).await;

    assert!(
        controller
            .handle(ControlRequest::SpeedChanged(-2.0))
            .await
            .unwrap_err()
            .is_invalid_speed()
    );
    controller
        .handle(ControlRequest::SpeedChanged(4.0))
        .await
        .unwrap();
    assert_eq!(controller.speed(), 4.0);

    let started = Instant::now();
    controller.request_play().await.unwrap();
    settle(&mut controller).await.unwrap();

    assert_eq!(sink.events().len(), 2);
    assert!(started.elapsed() <= Duration::from_millis(130));
}

#[tokio::test(start_paused = true)]
async fn sink_failure_returns_to_idle() {
    let config = ReplayConfig::default().live_echo(false);
    let sink = CollectingSink::new().failing_after(1);
    let (mut controller, mut lifecycle) = harness(&config, scripted(&[0, 100, 200]), sink.clone());

    controller.request_record().await.unwrap();
    let log = controller.live_log().unwrap().clone();
    wait_for_len(&log, 3).await;
    controller.request_record().await.unwrap();
    drain(&mut lifecycle);

    controller.request_play().await.unwrap();
    assert_eq!(controller.advance().await.unwrap(), SessionMode::Playing);
    let err = controller.advance().await.unwrap_err();
    assert!(err.is_sink_failure());
    assert_eq!(controller.mode(), SessionMode::Idle);

    let exit = drain(&mut lifecycle).pop().unwrap();
    assert!(matches!(
        exit,
        LifecycleEvent::Exited(SessionMode::Playing, ExitReason::Failed(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn echo_sink_failure_stops_recording() {
    let sink = CollectingSink::new().failing_after(0);
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 10]), sink.clone());

    controller.request_record().await.unwrap();
    let err = loop {
        match controller.advance().await {
            Ok(_) => {}
            Err(e) => break e,
        }
    };
    assert!(err.is_sink_failure());
    assert_eq!(controller.mode(), SessionMode::Idle);

    let events = drain(&mut lifecycle);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], LifecycleEvent::SurfaceCleared);
    assert_eq!(events[1], LifecycleEvent::Entered(SessionMode::Recording));
    assert!(matches!(
        events[2],
        LifecycleEvent::Exited(SessionMode::Recording, ExitReason::Failed(_))
    ));

    // The recording is kept and frozen even though nothing was rendered.
    let recording = controller.last_recording().unwrap();
    assert!(recording.is_frozen());
    assert!(!recording.is_empty());
    assert!(sink.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn source_failure_keeps_events_and_goes_idle() {
    let provider = || -> Vec<Box<dyn EventSource>> {
        vec![Box::new(
            ScriptedSource::from_events("pen", events_at(&[0, 7]))
                .fail_after(Duration::from_millis(5), "pen lifted off tablet"),
        )]
    };
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) = harness(&ReplayConfig::default(), provider, sink.clone());

    controller.request_record().await.unwrap();
    let err = loop {
        match controller.advance().await {
            Ok(_) => {}
            Err(e) => break e,
        }
    };

    assert!(err.is_source_failure());
    assert_eq!(controller.mode(), SessionMode::Idle);
    assert_eq!(controller.last_recording().unwrap().len(), 2);
    assert_eq!(sink.events().len(), 2);
    assert!(matches!(
        drain(&mut lifecycle).pop(),
        Some(LifecycleEvent::Exited(SessionMode::Recording, ExitReason::Failed(_)))
    ));

    // What was captured can still be played.
    assert_eq!(controller.request_play().await.unwrap(), SessionMode::Playing);
}

#[tokio::test(start_paused = true)]
async fn recording_limit_ends_session() {
    let config = ReplayConfig::default().recording(RecordingLimits::default().max_events(2));
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) = harness(&config, scripted(&[0, 1, 2, 3]), sink.clone());

    controller.request_record().await.unwrap();
    settle(&mut controller).await.unwrap();

    assert_eq!(controller.last_recording().unwrap().len(), 2);
    assert_eq!(
        drain(&mut lifecycle).pop(),
        Some(LifecycleEvent::Exited(
            SessionMode::Recording,
            ExitReason::Ended(RecordingEnd::LimitReached)
        ))
    );
}

#[tokio::test(start_paused = true)]
async fn run_loop_drives_session_from_requests() {
    let sink = CollectingSink::new();
    let (mut controller, mut lifecycle) =
        harness(&ReplayConfig::default(), scripted(&[0, 20, 50]), sink.clone());
    let (tx, rx) = mpsc::channel(8);
    let task = tokio::spawn(async move {
        controller.run(rx).await;
        controller
    });

    tx.send(ControlRequest::Record).await.unwrap();
    assert_eq!(lifecycle.recv().await, Some(LifecycleEvent::SurfaceCleared));
    assert_eq!(
        lifecycle.recv().await,
        Some(LifecycleEvent::Entered(SessionMode::Recording))
    );
    while sink.events().len() < 3 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    tx.send(ControlRequest::Record).await.unwrap();
    assert_eq!(
        lifecycle.recv().await,
        Some(LifecycleEvent::Exited(
            SessionMode::Recording,
            ExitReason::Stopped
        ))
    );

    tx.send(ControlRequest::SpeedChanged(2.0)).await.unwrap();
    tx.send(ControlRequest::Play).await.unwrap();
    assert_eq!(lifecycle.recv().await, Some(LifecycleEvent::SurfaceCleared));
    assert_eq!(
        lifecycle.recv().await,
        Some(LifecycleEvent::Entered(SessionMode::Playing))
    );
    assert_eq!(
        lifecycle.recv().await,
        Some(LifecycleEvent::Exited(
            SessionMode::Playing,
            ExitReason::Completed
        ))
    );

    drop(tx);
    let controller = task.await.unwrap();
    assert_eq!(controller.mode(), SessionMode::Idle);
    assert_eq!(controller.speed(), 2.0);
    assert_eq!(sink.events().len(), 6);
}
