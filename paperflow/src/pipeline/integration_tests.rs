//! End-to-end tests across pipelines, ingest and playback.

#[cfg(test)]
mod tests {
    use crate::api::{Ingestor, PaperApi, PaperSource};
    use crate::config::PaperflowConfig;
    use crate::core::{ArtifactId, RunStatus};
    use crate::download::Downloader;
    use crate::errors::PaperflowError;
    use crate::events::{self, CollectingEventSink};
    use crate::notify::{NoticeLevel, NotificationLog};
    use crate::pipeline::{PipelineBuilder, PipelineOrchestrator, StageSpec};
    use crate::pipelines::media::{self, MediaConfig};
    use crate::pipelines::podcast::{self, PodcastView};
    use crate::pipelines::{media_pipeline, podcast_pipeline};
    use crate::playback::PlaybackSequencer;
    use crate::testing::{FakeAudioBackend, GatedStage, MockStage, ScriptedApi};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn p1() -> ArtifactId {
        ArtifactId::new("p1").unwrap()
    }

    #[tokio::test]
    async fn test_start_while_running_issues_no_second_call() {
        let gate = Arc::new(GatedStage::new("audio"));
        let spec = PipelineBuilder::new("media")
            .stage(StageSpec::required("audio", gate.clone()))
            .unwrap()
            .build()
            .unwrap();
        let orch = PipelineOrchestrator::new(spec);

        let running = tokio::spawn({
            let orch = orch.clone();
            async move { orch.start(p1(), Value::Null).await }
        });
        gate.wait_started().await;
        assert_eq!(orch.status(), RunStatus::Running("audio".into()));

        for _ in 0..3 {
            let err = assert_err!(orch.start(p1(), Value::Null).await);
            assert!(matches!(err, PaperflowError::AlreadyRunning { .. }));
        }
        assert!(orch.is_idempotent_reentry("audio"));

        gate.release(Ok(crate::core::StageOutput::ok(json!(["a.mp3"]))));
        let status = assert_ok!(running.await.unwrap());
        assert_eq!(status, RunStatus::Complete);
        assert_eq!(gate.started_count(), 1);
    }

    #[tokio::test]
    async fn test_each_stage_sees_its_predecessor_result() {
        let script = Arc::new(MockStage::new("script").returning(json!({"Intro": "Hello"})));
        let dialogue = Arc::new(MockStage::new("dialogue").returning(json!([{"speaker": "Host", "text": "Hi"}])));
        let audio = Arc::new(MockStage::new("audio").returning(json!(["0.mp3"])));
        let spec = PipelineBuilder::new("podcast")
            .stage(StageSpec::required("script", script.clone()))
            .unwrap()
            .stage(StageSpec::required("dialogue", dialogue.clone()))
            .unwrap()
            .stage(StageSpec::required("audio", audio.clone()))
            .unwrap()
            .build()
            .unwrap();

        let status = PipelineOrchestrator::new(spec).start(p1(), Value::Null).await.unwrap();
        assert_eq!(status, RunStatus::Complete);

        let ctx = &dialogue.recorded_contexts()[0];
        assert_eq!(ctx.prior_as::<Value>("script").unwrap(), json!({"Intro": "Hello"}));
        assert!(ctx.prior_as::<Value>("audio").is_err());
        let ctx = &audio.recorded_contexts()[0];
        assert_eq!(ctx.prior_as::<Value>("dialogue").unwrap()[0]["speaker"], "Host");
    }

    #[tokio::test]
    async fn test_optional_failure_keeps_run_going() {
        let extras = Arc::new(MockStage::new("extras").failing_with(PaperflowError::Transport("reset by peer".into())));
        let video = Arc::new(MockStage::new("video").returning(json!("/v/p1.mp4")));
        let log = Arc::new(NotificationLog::new());
        let spec = PipelineBuilder::new("media")
            .stage(StageSpec::required("audio", Arc::new(MockStage::new("audio").returning(json!(["a.mp3"])))))
            .unwrap()
            .stage(StageSpec::optional("extras", extras.clone()).with_failure_message("Extras unavailable"))
            .unwrap()
            .stage(StageSpec::required("video", video.clone()))
            .unwrap()
            .build()
            .unwrap();
        let orch = PipelineOrchestrator::builder(spec).with_notifier(log.clone()).build();

        let status = orch.start(p1(), Value::Null).await.unwrap();

        assert_eq!(status, RunStatus::Complete);
        assert_eq!(video.call_count(), 1);
        assert!(orch.has_result("audio"));
        assert!(!orch.has_result("extras"));
        assert_eq!(orch.snapshot().failures.len(), 1);
        assert_eq!(log.errors().len(), 1);
        assert_eq!(log.errors()[0].message, "Extras unavailable");
    }

    #[tokio::test(start_paused = true)]
    async fn test_voiced_podcast_plays_through() {
        let api = Arc::new(
            ScriptedApi::new()
                .respond("generate_script", json!({}))
                .respond(
                    "generate_podcast_dialogue",
                    json!({"dialogue": [{"speaker": "Host", "text": "Hi"}, {"speaker": "Guest", "text": "Hello"}]}),
                )
                .respond(
                    "generate_podcast_audio",
                    json!({"audio_files": [
                        {"speaker": "Host", "text": "Hi", "url": "/static/p1/0.mp3"},
                        {"speaker": "Guest", "text": "Hello", "url": "/static/p1/1.mp3"}
                    ]}),
                ),
        );
        let orch = PipelineOrchestrator::new(podcast_pipeline(api.clone()).unwrap());
        orch.start(p1(), Value::Null).await.unwrap();
        orch.wait_for_background().await;

        let view = PodcastView::from_snapshot(&orch.snapshot()).unwrap();
        let backend = Arc::new(FakeAudioBackend::new());
        let player = PlaybackSequencer::new(view.segments(|p| api.resolve_url(p)), backend.clone());

        player.play(0).unwrap();
        player.play(1).unwrap();
        assert_eq!(backend.active_urls(), vec!["http://localhost:8000/static/p1/1.mp3"]);

        player.play(0).unwrap();
        backend.finish_current();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(player.playing_index(), Some(1));
        assert_eq!(player.position_label().as_deref(), Some("#2 of 2"));

        backend.finish_current();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(player.playing_index(), None);
        assert_eq!(backend.active_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_then_fresh_run() {
        let api = Arc::new(
            ScriptedApi::new()
                .respond("generate_audio", json!({"audio_files": ["a.mp3"]}))
                .respond("generate_audio", json!({"audio_files": ["b.mp3"]}))
                .respond("generate_video", json!({"video_path": "/v/p1.mp4"})),
        );
        let orch = PipelineOrchestrator::new(media_pipeline(api.clone()).unwrap());

        orch.start(p1(), Value::Null).await.unwrap();
        let first_run = orch.run_id();
        orch.reset();

        let snapshot = orch.snapshot();
        assert_eq!(snapshot.status, RunStatus::Idle);
        assert!(snapshot.results.is_empty());
        assert_ne!(snapshot.run_id, first_run);

        assert_eq!(orch.start(p1(), Value::Null).await.unwrap(), RunStatus::Complete);
        assert_eq!(orch.result(media::AUDIO), Some(json!(["b.mp3"])));
        assert_eq!(api.call_count("generate_audio"), 2);
    }

    #[tokio::test]
    async fn test_media_end_to_end() {
        let api = Arc::new(
            ScriptedApi::new()
                .respond("generate_audio", json!({"audio_files": ["a", "b"]}))
                .respond("generate_video", json!({"video_path": "/v/p1.mp4"})),
        );
        let sink = Arc::new(CollectingEventSink::new());
        let orch = PipelineOrchestrator::builder(media_pipeline(api.clone()).unwrap())
            .with_events(sink.clone())
            .build();

        let status = orch.start_with(p1(), &MediaConfig::default()).await.unwrap();

        assert_eq!(status, RunStatus::Complete);
        assert_eq!(orch.result(media::AUDIO), Some(json!(["a", "b"])));
        assert_eq!(orch.result(media::VIDEO), Some(json!("/v/p1.mp4")));
        assert_eq!(sink.events_of_type(events::RUN_NAVIGATE).len(), 1);

        orch.reset();
        orch.start_with(p1(), &MediaConfig::default()).await.unwrap();
        assert_eq!(orch.completion_count(), 2);
        assert_eq!(sink.events_of_type(events::RUN_NAVIGATE).len(), 1);
    }

    #[tokio::test]
    async fn test_podcast_audio_rejection_keeps_script() {
        let lines: Vec<Value> = (0..8)
            .map(|i| json!({"speaker": if i % 2 == 0 { "Host" } else { "Guest" }, "text": format!("line {i}")}))
            .collect();
        let api = Arc::new(
            ScriptedApi::new()
                .respond("generate_script", json!({"sections_scripts": {"Intro": "Hello"}}))
                .respond("generate_podcast_dialogue", json!({ "dialogue": lines }))
                .reject("generate_podcast_audio", 503, "tts unavailable"),
        );
        let log = Arc::new(NotificationLog::new());
        let orch = PipelineOrchestrator::builder(podcast_pipeline(api.clone()).unwrap())
            .with_notifier(log.clone())
            .build();

        let status = orch.start(p1(), Value::Null).await.unwrap();
        orch.wait_for_background().await;

        assert_eq!(status, RunStatus::Complete);
        assert_eq!(orch.status(), RunStatus::Complete);
        assert_eq!(orch.result_as::<Vec<Value>>(podcast::DIALOGUE).unwrap().unwrap().len(), 8);
        assert!(!orch.has_result(podcast::AUDIO));

        let audio_notices: Vec<_> = log
            .outcomes()
            .into_iter()
            .filter(|n| n.stage.as_deref() == Some(podcast::AUDIO))
            .collect();
        assert_eq!(audio_notices.len(), 1);
        assert_eq!(audio_notices[0].level, NoticeLevel::Error);
        assert_eq!(audio_notices[0].message, "tts unavailable");
    }

    #[tokio::test]
    async fn test_invalid_arxiv_never_reaches_a_stage() {
        let api = Arc::new(ScriptedApi::new());
        let log = Arc::new(NotificationLog::new());
        let dyn_api: Arc<dyn PaperApi> = api.clone();
        let ingestor = Ingestor::new(dyn_api, log.clone());

        let err = ingestor
            .ingest(&PaperSource::Arxiv("not-a-paper".into()))
            .await
            .unwrap_err();

        assert!(matches!(err, PaperflowError::Validation(_)));
        assert!(api.calls().is_empty());
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].level, NoticeLevel::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_voiced_podcast_downloads_every_segment() {
        let api = Arc::new(
            ScriptedApi::new()
                .respond("generate_script", json!({}))
                .respond(
                    "generate_podcast_dialogue",
                    json!({"dialogue": [{"speaker": "Host", "text": "Hi"}, {"speaker": "Guest", "text": "Hello"}]}),
                )
                .respond(
                    "generate_podcast_audio",
                    json!({"audio_files": [
                        {"speaker": "Host", "text": "Hi", "url": "/static/p1/0.mp3"},
                        {"speaker": "Guest", "text": "Hello", "url": "/static/p1/1.mp3"}
                    ]}),
                )
                .respond("download", json!("mp3 bytes")),
        );
        let orch = PipelineOrchestrator::new(podcast_pipeline(api.clone()).unwrap());
        orch.start(p1(), Value::Null).await.unwrap();
        orch.wait_for_background().await;
        let segments = PodcastView::from_snapshot(&orch.snapshot())
            .unwrap()
            .segments(|p| api.resolve_url(p));

        let dir = tempfile::tempdir().unwrap();
        let mut config = PaperflowConfig::default();
        config.downloads.directory = dir.path().to_path_buf();
        config.playback.advance_delay_ms = 200;
        let log = Arc::new(NotificationLog::new());
        let downloader = Downloader::from_config(api.clone(), log.clone(), &config);

        let started = tokio::time::Instant::now();
        let report = downloader.download_all(&segments).await;

        assert!(report.is_complete());
        assert_eq!(report.saved, vec![dir.path().join("0.mp3"), dir.path().join("1.mp3")]);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(api.calls().last().unwrap().body["path"], "http://localhost:8000/static/p1/1.mp3");
        assert_eq!(log.outcomes().len(), 2);
    }
}
