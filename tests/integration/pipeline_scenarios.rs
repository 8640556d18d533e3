//! End-to-end pipeline runs against the scripted port.

use crate::integration::{Call, MockPort};
use reelgen::error::PipelineError;
use reelgen::pipeline::{
    FanOutOptions, FanOutPolicy, GenerationOrchestrator, OrchestratorOptions, PipelineState,
    PollPolicy, RunResult, Stage, StageStatus, StageTransition,
};
use std::sync::Arc;
use std::time::Duration;

fn orchestrator(port: &Arc<MockPort>) -> GenerationOrchestrator {
    GenerationOrchestrator::new(port.clone())
}

fn position(transitions: &[StageTransition], stage: Stage, to: StageStatus) -> Option<usize> {
    transitions
        .iter()
        .position(|t| t.stage == stage && t.to == to)
}

fn assert_later_stages_idle(result: &RunResult, failed: Stage) {
    let mut stage = failed.next();
    while let Some(later) = stage {
        assert_eq!(result.state.get(later), StageStatus::Idle, "{} should stay idle", later);
        assert!(
            result.transitions.iter().all(|t| t.stage != later),
            "{} should never transition",
            later
        );
        stage = later.next();
    }
}

#[tokio::test]
async fn cats_topic_completes_every_stage() {
    let port = Arc::new(MockPort::new(&["Cats nap a lot.", "Cats chase string."]));
    let result = orchestrator(&port).run("cats").await;

    assert!(result.is_completed(), "run failed: {:?}", result.error());
    assert_eq!(
        result.state,
        PipelineState {
            script: StageStatus::Done,
            images: StageStatus::Done,
            audio: StageStatus::Done,
            video: StageStatus::Done,
        }
    );

    let artifacts = result.artifacts().unwrap();
    assert_eq!(artifacts.script.len(), 2);
    assert_eq!(artifacts.image_sets.len(), 2);
    for (i, set) in artifacts.image_sets.iter().enumerate() {
        assert_eq!(set.paragraph_index, i);
        assert_eq!(set.images.len(), 3);
        assert_eq!(set.images[0], MockPort::image_for(&set.paragraph, 0));
    }
    assert_eq!(artifacts.image_sets[0].paragraph, "Cats nap a lot.");
    assert_eq!(artifacts.audio, MockPort::audio());
    assert_eq!(artifacts.video, MockPort::ready_video());
    assert_eq!(port.poll_calls(), 0);
    assert_eq!(port.calls()[0], Call::Script("cats".to_string()));
    assert!(port.calls().contains(&Call::Video { image_count: 6 }));

    let narrated: Vec<Call> = port
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Audio(_)))
        .collect();
    assert_eq!(
        narrated,
        vec![Call::Audio("Cats nap a lot.\nCats chase string.".to_string())]
    );
}

#[tokio::test]
async fn stages_start_only_after_their_dependency_is_done() {
    let port = Arc::new(
        MockPort::new(&["one", "two", "three"]).with_image_delay("two", Duration::from_millis(20)),
    );
    let result = orchestrator(&port).run("ordering").await;
    assert!(result.is_completed());

    let t = &result.transitions;
    let pairs = [
        (Stage::Script, Stage::Images),
        (Stage::Images, Stage::Audio),
        (Stage::Audio, Stage::Video),
    ];
    for (before, after) in pairs {
        let done = position(t, before, StageStatus::Done).unwrap();
        let started = position(t, after, StageStatus::Running).unwrap();
        assert!(done < started, "{} started before {} was done", after, before);
    }
    assert!(t.windows(2).all(|w| w[0].seq < w[1].seq));
}

#[tokio::test]
async fn one_failed_paragraph_fails_the_image_stage() {
    let port = Arc::new(
        MockPort::new(&["first", "second"]).failing_images("second", "rate limited"),
    );
    let result = orchestrator(&port).run("cats").await;

    match result.error() {
        Some(PipelineError::ImageGenerationFailed {
            paragraph_index,
            cause,
        }) => {
            assert_eq!(*paragraph_index, 1);
            assert_eq!(cause, "rate limited");
        }
        other => panic!("expected ImageGenerationFailed, got {:?}", other),
    }
    assert_eq!(result.state.script, StageStatus::Done);
    assert_eq!(result.state.images, StageStatus::Error);
    assert_eq!(result.state.audio, StageStatus::Idle);
    assert_eq!(result.state.video, StageStatus::Idle);
    assert_eq!(port.audio_calls(), 0);
    assert_eq!(port.video_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn fail_fast_does_not_wait_for_slow_paragraphs() {
    let port = Arc::new(
        MockPort::new(&["slow", "broken", "slower"])
            .with_image_delay("slow", Duration::from_secs(30))
            .with_image_delay("slower", Duration::from_secs(60))
            .with_image_delay("broken", Duration::from_secs(1))
            .failing_images("broken", "content policy"),
    );
    let started = tokio::time::Instant::now();
    let result = orchestrator(&port).run("fan out").await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::ImageGenerationFailed { paragraph_index: 1, .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(port.audio_calls(), 0);
    assert_eq!(port.video_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn video_job_is_polled_until_done() {
    let port = Arc::new(MockPort::new(&["only paragraph"]).with_video_job(2));
    let result = orchestrator(&port).run("volcanoes").await;

    let artifacts = result.artifacts().expect("run should complete");
    assert_eq!(artifacts.video, MockPort::final_video());
    assert_eq!(port.poll_calls(), 3);

    let submitted = port.submitted_at().unwrap();
    let polls = port.poll_times();
    assert!(polls[0] - submitted >= PollPolicy::DEFAULT_INTERVAL);
    for pair in polls.windows(2) {
        assert!(pair[1] - pair[0] >= PollPolicy::DEFAULT_INTERVAL);
    }
}

#[tokio::test(start_paused = true)]
async fn failed_video_job_is_a_video_failure() {
    let port = Arc::new(MockPort::new(&["p"]).with_failing_video_job(1, "render crashed"));
    let result = orchestrator(&port).run("volcanoes").await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::VideoGenerationFailed { cause }) if cause == "render crashed"
    ));
    assert_eq!(result.state.video, StageStatus::Error);
    assert_eq!(port.poll_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stuck_video_job_exhausts_poll_attempts() {
    let port = Arc::new(MockPort::new(&["p"]).with_stuck_video_job());
    let options = OrchestratorOptions {
        poll: PollPolicy {
            interval: Duration::from_secs(5),
            max_attempts: 4,
            max_duration: Duration::from_secs(600),
        },
        ..OrchestratorOptions::default()
    };
    let result = orchestrator(&port).with_options(options).run("volcanoes").await;

    assert!(matches!(result.error(), Some(PipelineError::PollingFailed { .. })));
    assert_eq!(port.poll_calls(), 4);
    assert_eq!(result.state.video, StageStatus::Error);
}

#[tokio::test]
async fn each_failing_stage_leaves_later_stages_idle() {
    let cases: Vec<(Stage, MockPort)> = vec![
        (Stage::Script, MockPort::new(&["p"]).failing_script("quota exceeded")),
        (Stage::Images, MockPort::new(&["p"]).failing_images("p", "nsfw filter")),
        (Stage::Audio, MockPort::new(&["p"]).failing_audio("voice unavailable")),
        (Stage::Video, MockPort::new(&["p"]).failing_video_submit("model overloaded")),
    ];

    for (stage, port) in cases {
        let port = Arc::new(port);
        let result = orchestrator(&port).run("failure").await;

        let error = result.error().expect("run should abort");
        assert_eq!(error.stage(), Some(stage));
        assert_eq!(result.state.get(stage), StageStatus::Error);
        assert_eq!(result.state.failed_stage(), Some(stage));
        assert_later_stages_idle(&result, stage);
    }
}

#[tokio::test]
async fn blank_script_fails_the_script_stage() {
    let port = Arc::new(MockPort::new(&[]).with_raw_script("\n   \n\n"));
    let result = orchestrator(&port).run("nothing").await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::ScriptGenerationFailed { .. })
    ));
    assert_eq!(result.state.script, StageStatus::Error);
    assert_eq!(port.count(|c| matches!(c, Call::Images(_))), 0);
}

#[tokio::test]
async fn empty_topic_is_rejected_without_calls() {
    let port = Arc::new(MockPort::new(&["p"]));
    let result = orchestrator(&port).run("   ").await;

    assert!(matches!(result.error(), Some(PipelineError::InvalidTopic(_))));
    assert_eq!(result.state, PipelineState::new());
    assert!(port.calls().is_empty());
}

#[tokio::test]
async fn aborted_run_keeps_partial_artifacts() {
    let port = Arc::new(MockPort::new(&["a", "b"]).failing_audio("voice unavailable"));
    let result = orchestrator(&port).run("partial").await;

    match result.outcome {
        reelgen::pipeline::RunOutcome::Aborted { partial, error } => {
            assert_eq!(partial.script.unwrap().len(), 2);
            assert_eq!(partial.image_sets.unwrap().len(), 2);
            assert!(partial.audio.is_none());
            assert_eq!(error.cause(), "voice unavailable");
        }
        other => panic!("expected aborted run, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_spawned_run_stops_the_running_stage() {
    let port = Arc::new(MockPort::new(&["p"]).with_audio_delay(Duration::from_secs(120)));
    let handle = orchestrator(&port).spawn("cancel me");
    let mut updates = handle.subscribe();

    updates
        .wait_for(|state| state.audio == StageStatus::Running)
        .await
        .unwrap();
    handle.cancel();
    let result = handle.join().await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::Cancelled {
            stage: Stage::Audio
        })
    ));
    assert_eq!(result.state.audio, StageStatus::Error);
    assert_eq!(result.state.video, StageStatus::Idle);
    assert_eq!(port.video_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn stage_timeout_fails_a_slow_stage() {
    let port = Arc::new(MockPort::new(&["p"]).with_script_delay(Duration::from_secs(30)));
    let options = OrchestratorOptions {
        stage_timeout: Some(Duration::from_secs(10)),
        ..OrchestratorOptions::default()
    };
    let result = orchestrator(&port).with_options(options).run("slow").await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::StageTimedOut {
            stage: Stage::Script,
            timeout
        }) if *timeout == Duration::from_secs(10)
    ));
    assert_eq!(result.state.script, StageStatus::Error);
    assert_eq!(result.state.images, StageStatus::Idle);
}

#[tokio::test]
async fn continue_on_failure_keeps_successful_paragraphs() {
    let port = Arc::new(
        MockPort::new(&["good", "bad", "also good"]).failing_images("bad", "nsfw filter"),
    );
    let options = OrchestratorOptions {
        fan_out: FanOutOptions {
            policy: FanOutPolicy::ContinueOnFailure,
            max_concurrent: None,
        },
        ..OrchestratorOptions::default()
    };
    let result = orchestrator(&port).with_options(options).run("mixed").await;

    let artifacts = result.artifacts().expect("run should complete");
    assert_eq!(artifacts.image_sets.len(), 3);
    assert!(artifacts.image_sets[1].images.is_empty());
    assert_eq!(artifacts.image_sets[2].paragraph, "also good");
    assert!(port.calls().contains(&Call::Video { image_count: 6 }));
}

#[tokio::test]
async fn continue_on_failure_still_fails_when_every_paragraph_fails() {
    let port = Arc::new(
        MockPort::new(&["x", "y"])
            .failing_images("x", "down")
            .failing_images("y", "down"),
    );
    let options = OrchestratorOptions {
        fan_out: FanOutOptions {
            policy: FanOutPolicy::ContinueOnFailure,
            max_concurrent: None,
        },
        ..OrchestratorOptions::default()
    };
    let result = orchestrator(&port).with_options(options).run("outage").await;

    assert!(matches!(
        result.error(),
        Some(PipelineError::ImageGenerationFailed { .. })
    ));
    assert_eq!(port.audio_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrency_cap_limits_in_flight_image_calls() {
    let paragraphs = ["p1", "p2", "p3", "p4", "p5"];
    let mut port = MockPort::new(&paragraphs);
    for p in paragraphs {
        port = port.with_image_delay(p, Duration::from_secs(1));
    }
    let port = Arc::new(port);
    let options = OrchestratorOptions {
        fan_out: FanOutOptions {
            policy: FanOutPolicy::FailFast,
            max_concurrent: Some(2),
        },
        ..OrchestratorOptions::default()
    };
    let result = orchestrator(&port).with_options(options).run("capped").await;

    assert!(result.is_completed());
    assert_eq!(port.max_in_flight(), 2);
}

#[tokio::test(start_paused = true)]
async fn uncapped_fan_out_issues_every_paragraph_at_once() {
    let paragraphs = ["p1", "p2", "p3", "p4"];
    let mut port = MockPort::new(&paragraphs);
    for p in paragraphs {
        port = port.with_image_delay(p, Duration::from_secs(1));
    }
    let port = Arc::new(port);
    let result = orchestrator(&port).run("uncapped").await;

    assert!(result.is_completed());
    assert_eq!(port.max_in_flight(), 4);
}
