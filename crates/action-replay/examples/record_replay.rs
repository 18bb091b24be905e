//! Record and replay example.
//!
//! Records a short synthetic pointer walk, then replays it at four times the
//! recorded speed. Strokes are "drawn" as text.
//!
//! Run with: `cargo run --example record_replay`
//! Set `ACTION_REPLAY_LOG=debug` for engine traces.

use std::time::Duration;

use action_replay::config::env::EnvConfig;
use action_replay::config::file::load_layered;
use action_replay::prelude::*;
use action_replay::{CallbackHooks, LifecycleEvent, logging};
use tokio::sync::mpsc;

/// Draws pointer strokes as text, joining each move to the last position.
#[derive(Debug, Default)]
struct StrokeRenderer {
    last: Option<Point>,
    strokes: usize,
}

impl BatchSink for StrokeRenderer {
    fn deliver(&mut self, batch: &Batch) -> std::result::Result<(), SinkError> {
        for event in batch {
            let Some(point) = event.point() else {
                continue;
            };
            match &event.kind {
                EventKind::Click => {
                    println!("   [{:>5}ms] click at ({:.0}, {:.0})", event.time, point.x, point.y);
                }
                EventKind::Move => {
                    if let Some(from) = self.last {
                        self.strokes += 1;
                        println!(
                            "   [{:>5}ms] line ({:.0}, {:.0}) -> ({:.0}, {:.0})",
                            event.time, from.x, from.y, point.x, point.y
                        );
                    }
                    self.last = Some(point);
                }
                // Scroll payloads are offsets, not positions.
                _ => {}
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        if self.strokes > 0 {
            println!("   ({} strokes drawn)", self.strokes);
        }
        self.last = None;
        self.strokes = 0;
    }
}

fn walk() -> Vec<Box<dyn EventSource>> {
    vec![Box::new(
        WanderSource::new("wander", 7, Duration::from_millis(40), 25).with_click_chance(0.1),
    )]
}

async fn wait_for(lifecycle: &mut mpsc::UnboundedReceiver<LifecycleEvent>, wanted: &LifecycleEvent) {
    while let Some(event) = lifecycle.recv().await {
        if &event == wanted {
            return;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = load_layered(None, &EnvConfig::default())?;
    logging::init(&config.logging)?;

    println!("action-replay Record and Replay Example");
    println!("=======================================\n");

    let (events_tx, mut lifecycle) = mpsc::unbounded_channel();
    let hooks = CallbackHooks::new(move |event: LifecycleEvent| {
        match &event {
            LifecycleEvent::SurfaceCleared => println!("   [surface cleared]"),
            LifecycleEvent::Entered(mode) => println!("   [{mode}: buttons show Stop]"),
            LifecycleEvent::Exited(mode, reason) => {
                println!("   [{mode} ended: {reason:?}; buttons restored]");
            }
        }
        let _ = events_tx.send(event);
    });

    let mut controller =
        SessionController::new(&config, walk, hooks, StrokeRenderer::default())?;
    let (requests, rx) = mpsc::channel(8);
    let session = tokio::spawn(async move {
        controller.run(rx).await;
        controller
    });

    println!("1. Recording...");
    let _ = requests.send(ControlRequest::Record).await;
    wait_for(
        &mut lifecycle,
        &LifecycleEvent::Exited(
            SessionMode::Recording,
            ExitReason::Ended(RecordingEnd::SourcesExhausted),
        ),
    )
    .await;

    println!("\n2. Replaying at 4x...");
    let _ = requests.send(ControlRequest::SpeedChanged(4.0)).await;
    let _ = requests.send(ControlRequest::Play).await;
    wait_for(
        &mut lifecycle,
        &LifecycleEvent::Exited(SessionMode::Playing, ExitReason::Completed),
    )
    .await;

    drop(requests);
    let controller = session
        .await
        .map_err(|e| ReplayError::RecordingTaskFailed {
            message: e.to_string(),
        })?;

    let recorded = controller.last_recording().map_or(0, ActionLog::len);
    println!("\nRecorded {recorded} events; session is {}.", controller.mode());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_update_the_stroke_start() {
        let mut renderer = StrokeRenderer::default();
        let batch = Batch::new(
            vec![
                Event::pointer_move(0, 10.0, 10.0),
                Event::scroll(5, 0.0, -120.0),
                Event::click(8, 40.0, 40.0),
            ],
            8.0,
            0,
        );
        renderer.deliver(&batch).unwrap();
        assert_eq!(renderer.last, Some(Point::new(10.0, 10.0)));

        let batch = Batch::new(vec![Event::pointer_move(12, 20.0, 10.0)], 12.0, 3);
        renderer.deliver(&batch).unwrap();
        assert_eq!(renderer.strokes, 1);
        assert_eq!(renderer.last, Some(Point::new(20.0, 10.0)));
    }
}
