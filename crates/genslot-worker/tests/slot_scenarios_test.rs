#[path = "helpers/mod.rs"]
mod helpers;

use anyhow::Context;
use genslot_core::models::{
    Asset, EncodedImage, GenerationMode, GenerationRequest, SlotInputs, SlotPatch, SlotStatus,
    TaskStatusReport, VideoProfile, VideoQuality,
};
use genslot_core::AppError;
use genslot_providers::{ProviderSet, Submission};
use genslot_storage::{HistorySink, LocalRecordStore, RecordStore};
use helpers::fixtures::{png_image, small_png};
use helpers::providers::FakeProvider;
use helpers::{setup_harness, setup_harness_with_store, POLL_INTERVAL};
use std::sync::Arc;
use std::time::Duration;

fn edited_image() -> Submission {
    Submission::Completed(vec![Asset::Image(EncodedImage::new("image/png", "RURJVA=="))])
}

#[tokio::test]
async fn test_edit_slot_succeeds_and_writes_history() -> anyhow::Result<()> {
    let provider = FakeProvider::replying(Ok(edited_image())).into_arc();
    let mut harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();
    let id = orch.store().slots().await[0].id;
    orch.update_slot(
        id,
        SlotPatch::new().inputs(
            SlotInputs::new(GenerationMode::Edit, "make it snow")
                .with_images(vec![small_png("cabin.png")]),
        ),
    )
    .await?;

    let slot = orch.run_slot(id).await?;

    assert_eq!(slot.status, SlotStatus::Succeeded);
    assert_eq!(slot.results.len(), 1);
    assert!(slot.error.is_none());
    assert_eq!(harness.next_event().await, (id, SlotStatus::Succeeded));

    let history = orch.history().list().await.context("list history")?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mode, GenerationMode::Edit);
    assert_eq!(history[0].prompt, "make it snow");
    assert_eq!(history[0].source_images.len(), 1);
    assert_eq!(provider.submit_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_video_slot_polls_until_completed() -> anyhow::Result<()> {
    let provider = FakeProvider::accepting(
        "abc123",
        vec![
            Ok(TaskStatusReport::processing()),
            Ok(TaskStatusReport::processing()),
            Ok(TaskStatusReport::completed(Asset::Video {
                url: "https://cdn.example.com/abc123.mp4".to_string(),
            })),
        ],
    )
    .into_arc();
    let mut harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();
    let id = orch
        .add_slot(SlotInputs::new(GenerationMode::Video, "waves at dusk"))
        .await?
        .id;

    let slot = orch.run_slot(id).await?;
    assert_eq!(slot.status, SlotStatus::Polling);
    assert_eq!(slot.task_id.as_deref(), Some("abc123"));

    assert_eq!(harness.next_event().await, (id, SlotStatus::Succeeded));
    let slot = orch.store().get(id).await.context("slot exists")?;
    assert_eq!(slot.status, SlotStatus::Succeeded);
    assert_eq!(
        slot.results,
        vec![Asset::Video {
            url: "https://cdn.example.com/abc123.mp4".to_string()
        }]
    );

    let history = orch.history().list().await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].mode, GenerationMode::Video);

    // The scheduler stops after the terminal answer
    tokio::time::sleep(POLL_INTERVAL * 10).await;
    assert_eq!(provider.poll_calls(), 3);
    assert_eq!(orch.scheduler().active_jobs(), 0);
    Ok(())
}

#[tokio::test]
async fn test_video_auth_error_fails_before_polling() -> anyhow::Result<()> {
    let provider = FakeProvider::replying(Err(AppError::Auth(
        "VIDEO_API_KEY is not set".to_string(),
    )))
    .into_arc();
    let mut harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();
    let id = orch
        .add_slot(SlotInputs::new(GenerationMode::Video, "waves"))
        .await?
        .id;

    let slot = orch.run_slot(id).await?;

    assert_eq!(slot.status, SlotStatus::Failed);
    assert_eq!(slot.error.as_deref(), Some("VIDEO_API_KEY is not set"));
    assert!(slot.task_id.is_none());
    assert_eq!(harness.next_event().await, (id, SlotStatus::Failed));
    assert_eq!(provider.submit_calls(), 1);
    assert_eq!(provider.poll_calls(), 0);
    assert_eq!(orch.scheduler().active_jobs(), 0);
    assert!(orch.history().list().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_removing_slot_mid_poll_discards_late_response() -> anyhow::Result<()> {
    // The first tick is still in transit when the slot is removed
    let provider = FakeProvider::accepting(
        "late",
        vec![Ok(TaskStatusReport::completed(Asset::Video {
            url: "https://cdn.example.com/late.mp4".to_string(),
        }))],
    )
    .with_poll_delay(Duration::from_millis(150))
    .into_arc();
    let mut harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();
    let id = orch
        .add_slot(SlotInputs::new(GenerationMode::Video, "waves"))
        .await?
        .id;

    orch.run_slot(id).await?;
    while provider.poll_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    orch.remove_slot(id).await?;

    harness.expect_no_event(Duration::from_millis(300)).await;
    assert!(orch.store().get(id).await.is_none());
    assert_eq!(orch.store().len().await, 1);
    assert!(orch.history().list().await?.is_empty());
    assert_eq!(provider.poll_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_clearing_slot_mid_poll_keeps_it_idle() -> anyhow::Result<()> {
    let provider = FakeProvider::accepting(
        "t-clear",
        vec![Ok(TaskStatusReport::completed(Asset::Video {
            url: "https://cdn.example.com/c.mp4".to_string(),
        }))],
    )
    .with_poll_delay(Duration::from_millis(150))
    .into_arc();
    let mut harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();
    let id = orch.store().slots().await[0].id;
    orch.update_slot(
        id,
        SlotPatch::new().inputs(SlotInputs::new(GenerationMode::Video, "waves")),
    )
    .await?;

    orch.run_slot(id).await?;
    while provider.poll_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    orch.clear_slot(id, false).await?;

    harness.expect_no_event(Duration::from_millis(300)).await;
    let slot = orch.store().get(id).await.context("slot exists")?;
    assert_eq!(slot.status, SlotStatus::Idle);
    assert!(slot.results.is_empty());
    assert!(slot.task_id.is_none());
    assert_eq!(slot.inputs.prompt, "waves");
    Ok(())
}

#[tokio::test]
async fn test_polling_slot_cannot_be_edited_back_to_idle() -> anyhow::Result<()> {
    let provider = FakeProvider::accepting("t-edit", Vec::new()).into_arc();
    let harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();
    let id = orch.store().slots().await[0].id;
    orch.update_slot(
        id,
        SlotPatch::new().inputs(SlotInputs::new(GenerationMode::Video, "tides")),
    )
    .await?;

    let polling = orch.run_slot(id).await?;
    assert_eq!(polling.status, SlotStatus::Polling);

    let err = orch
        .update_slot(id, SlotPatch::new().status(SlotStatus::Idle))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SlotBusy(_)));
    let err = orch
        .update_slot(id, SlotPatch::new().task_id(None).job_id(None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let slot = orch.store().get(id).await.context("slot exists")?;
    assert_eq!(slot.status, SlotStatus::Polling);
    assert_eq!(slot.job_id, polling.job_id);
    assert_eq!(slot.task_id.as_deref(), Some("t-edit"));

    // Still one job, and a second run is refused
    let err = orch.run_slot(id).await.unwrap_err();
    assert!(matches!(err, AppError::SlotBusy(_)));
    assert_eq!(orch.scheduler().active_jobs(), 1);

    orch.clear_slot(id, false).await?;
    assert_eq!(orch.scheduler().active_jobs(), 0);
    let polls_after_clear = provider.poll_calls();
    tokio::time::sleep(POLL_INTERVAL * 10).await;
    assert_eq!(provider.poll_calls(), polls_after_clear);
    Ok(())
}

#[tokio::test]
async fn test_one_failing_slot_does_not_hold_back_others() -> anyhow::Result<()> {
    // The "broken" prompt fails, slowly; everything else succeeds at once
    let provider = FakeProvider::new(|request: &GenerationRequest| {
        if request.prompt() == "broken" {
            (
                Duration::from_millis(400),
                Err(AppError::Provider("Model overloaded".to_string())),
            )
        } else {
            (Duration::from_millis(5), Ok(edited_image()))
        }
    })
    .into_arc();
    let mut harness = setup_harness(ProviderSet::single(provider.clone()), 1, 6);
    let orch = harness.orchestrator.clone();

    let mut ids = Vec::new();
    for prompt in ["one", "two", "broken", "four", "five"] {
        let slot = orch
            .add_slot(SlotInputs::new(GenerationMode::Generate, prompt))
            .await?;
        ids.push(slot.id);
    }
    let broken = ids[2];

    let runner = {
        let orch = orch.clone();
        let ids = ids.clone();
        tokio::spawn(async move { orch.run_all(&ids).await })
    };

    // The four healthy slots report before the slow failure does
    for _ in 0..4 {
        let (slot_id, status) = harness.next_event().await;
        assert_ne!(slot_id, broken);
        assert_eq!(status, SlotStatus::Succeeded);
    }
    assert_eq!(harness.next_event().await, (broken, SlotStatus::Failed));

    let results = runner.await?;
    assert_eq!(results.len(), 5);
    let failed = orch.store().get(broken).await.context("broken slot exists")?;
    assert_eq!(failed.error.as_deref(), Some("Model overloaded"));
    assert_eq!(failed.inputs.prompt, "broken");
    assert_eq!(orch.history().list().await?.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_bulk_fill_never_overwrites_and_reports_drops() -> anyhow::Result<()> {
    let provider = FakeProvider::replying(Ok(edited_image())).into_arc();
    let harness = setup_harness(ProviderSet::single(provider), 2, 3);
    let orch = harness.orchestrator.clone();
    let slots = orch.store().slots().await;
    orch.update_slot(slots[0].id, SlotPatch::new().images(vec![small_png("mine.png")]))
        .await?;

    let report = orch
        .bulk_fill(vec![
            small_png("a.png"),
            small_png("b.png"),
            small_png("c.png"),
        ])
        .await;

    assert_eq!(report.filled, vec![slots[1].id]);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.dropped, 1);

    let slots = orch.store().slots().await;
    let names: Vec<Option<&str>> = slots
        .iter()
        .map(|s| s.inputs.images[0].file_name.as_deref())
        .collect();
    assert_eq!(names, vec![Some("mine.png"), Some("a.png"), Some("b.png")]);
    Ok(())
}

#[tokio::test]
async fn test_video_frames_are_recompressed_before_submit() -> anyhow::Result<()> {
    let provider = FakeProvider::accepting("frames", Vec::new()).into_arc();
    let harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();

    let start = png_image(2000, 1000, "start.png");
    let end = png_image(640, 360, "end.png");
    let mut inputs = SlotInputs::new(GenerationMode::Video, "sunrise timelapse")
        .with_images(vec![start.clone()]);
    inputs.video_profile = Some(VideoProfile::Keyframe {
        aspect_ratio: "16:9".to_string(),
        duration_secs: 5,
        resolution: "1080p".to_string(),
        end_frame: Some(end),
        quality: VideoQuality::Standard,
    });
    let id = orch.add_slot(inputs).await?.id;

    orch.run_slot(id).await?;
    orch.clear_slot(id, false).await?;

    let submitted = provider.submitted();
    let GenerationRequest::Video {
        start_frame: Some(sent_start),
        profile,
        ..
    } = &submitted[0]
    else {
        panic!("expected a video request with a start frame");
    };
    assert_eq!(sent_start.mime_type, "image/jpeg");
    assert_eq!(sent_start.file_name.as_deref(), Some("start.jpg"));
    assert_eq!(genslot_codec::image_dimensions(sent_start)?, (1280, 640));
    let sent_end = profile.end_frame().context("end frame kept")?;
    assert_eq!(genslot_codec::image_dimensions(sent_end)?, (640, 360));

    // The slot keeps the original upload
    let slot = orch.store().get(id).await.context("slot exists")?;
    assert_eq!(slot.inputs.images[0], start);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_video_frame_aborts_without_submit() -> anyhow::Result<()> {
    let provider = FakeProvider::accepting("never", Vec::new()).into_arc();
    let harness = setup_harness(ProviderSet::single(provider.clone()), 1, 4);
    let orch = harness.orchestrator.clone();
    let inputs = SlotInputs::new(GenerationMode::Video, "waves")
        .with_images(vec![EncodedImage::new("image/png", "bm90IGFuIGltYWdl")]);
    let id = orch.add_slot(inputs).await?.id;

    let slot = orch.run_slot(id).await?;

    assert_eq!(slot.status, SlotStatus::Failed);
    assert!(slot
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Could not prepare image")));
    assert_eq!(provider.submit_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_statuses_only_move_along_legal_paths() -> anyhow::Result<()> {
    let provider = FakeProvider::replying(Ok(edited_image())).into_arc();
    let harness = setup_harness(ProviderSet::single(provider), 1, 4);
    let orch = harness.orchestrator.clone();
    let id = orch
        .add_slot(SlotInputs::new(GenerationMode::Generate, "a lighthouse"))
        .await?
        .id;

    for illegal in [SlotStatus::Polling, SlotStatus::Succeeded, SlotStatus::Failed] {
        let err = orch
            .update_slot(id, SlotPatch::new().status(illegal))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    let slot = orch.run_slot(id).await?;
    assert_eq!(slot.status, SlotStatus::Succeeded);
    let err = orch
        .update_slot(id, SlotPatch::new().status(SlotStatus::Polling))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::InvalidTransition {
            from: SlotStatus::Succeeded,
            to: SlotStatus::Polling
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_history_survives_reopening_local_store() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let record_store: Arc<dyn RecordStore> = Arc::new(LocalRecordStore::new(dir.path()).await?);
    let provider = FakeProvider::replying(Ok(edited_image())).into_arc();
    let harness = setup_harness_with_store(ProviderSet::single(provider), 1, 4, record_store);
    let orch = harness.orchestrator.clone();
    let id = orch
        .add_slot(SlotInputs::new(GenerationMode::Generate, "a red barn"))
        .await?
        .id;

    orch.run_slot(id).await?;

    let reopened: Arc<dyn RecordStore> = Arc::new(LocalRecordStore::new(dir.path()).await?);
    let entries = HistorySink::new(reopened).list().await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].prompt, "a red barn");
    Ok(())
}
