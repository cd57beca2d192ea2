mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{text, ScriptedGenerator};
use genrelay::segment::MOCK_MESSAGE;
use genrelay::{RelayConfig, RelayContext, RelayError};

fn context(generator: Arc<ScriptedGenerator>) -> RelayContext {
    let config = RelayConfig::default()
        .with_cache_capacity(8)
        .with_workers(2);
    RelayContext::with_generator(config, generator).unwrap()
}

#[tokio::test(start_paused = true)]
async fn translation_runs_on_worker_pool() {
    let generator = Arc::new(ScriptedGenerator::always(|| text("Bonjour")));
    let ctx = context(Arc::clone(&generator));
    assert!(ctx.is_configured());

    let first = ctx.translate("Hello", "english", "french").await.unwrap();
    assert_eq!(first.translated_text, "Bonjour");
    assert!(!first.cached);

    let second = ctx.translate("Hello", "english", "french").await.unwrap();
    assert!(second.cached);
    assert_eq!(generator.calls(), 1);
    assert_eq!(ctx.cache_stats().cache_size, 1);
    assert_eq!(ctx.cache_stats().max_size, 8);

    ctx.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_rate_window() {
    let generator = Arc::new(
        ScriptedGenerator::always(|| text("ok")).with_delay(Duration::from_millis(50)),
    );
    let ctx = Arc::new(context(Arc::clone(&generator)));

    let start = tokio::time::Instant::now();
    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                ctx.translate(&format!("line {i}"), "english", "french")
                    .await
                    .unwrap()
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().translated_text, "ok");
    }
    // Default window: 2 calls per second.
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(generator.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn segmentation_through_context() {
    let generator = Arc::new(ScriptedGenerator::new(vec![text(
        r#"{"jobTitle": "Line Cook", "companyName": "blue fin bistro", "salaryRange": 22}"#,
    )]));
    let ctx = context(Arc::clone(&generator));

    let seg = ctx.segment("Line cook at Blue Fin Bistro").await.unwrap();
    assert!(!seg.placeholder);
    assert_eq!(seg.data.company_name.as_deref(), Some("Blue Fin Bistro"));
    assert_eq!(seg.data.salary_range.as_deref(), Some("22"));

    let err = ctx.segment("  ").await.unwrap_err();
    assert!(matches!(err, RelayError::Validation(_)));
    assert_eq!(generator.calls(), 1);

    ctx.shutdown().await;
}

#[tokio::test]
async fn unconfigured_context_refuses_translation() {
    let ctx = RelayContext::from_config(RelayConfig::default()).unwrap();
    assert!(!ctx.is_configured());

    let err = ctx.translate("Hello", "english", "french").await.unwrap_err();
    assert!(matches!(err, RelayError::NotConfigured(_)));

    let health = ctx.health();
    assert_eq!(health.status, "healthy");
    assert!(!health.translation_service);
    assert!(health.model.is_none());
}

#[tokio::test]
async fn unconfigured_context_returns_mock_segmentation() {
    let ctx = RelayContext::from_config(RelayConfig::default()).unwrap();

    let seg = ctx.segment("Dishwasher, weekends").await.unwrap();
    assert!(seg.placeholder);
    assert_eq!(seg.message.as_deref(), Some(MOCK_MESSAGE));
    assert_eq!(seg.data.job_title.as_deref(), Some("Sample Job"));

    // Validation still applies without a model.
    assert!(ctx.segment("").await.is_err());
}

#[tokio::test(start_paused = true)]
async fn health_reports_model_and_cache() {
    let ctx = context(Arc::new(ScriptedGenerator::always(|| text("Hola"))));
    ctx.translate("Hello", "english", "spanish").await.unwrap();

    let health = ctx.health();
    assert!(health.translation_service);
    assert!(health.segmentation_service);
    assert_eq!(health.model.as_deref(), Some("scripted"));
    assert_eq!(health.cache_size, 1);

    ctx.clear_cache();
    assert_eq!(ctx.cache_stats().cache_size, 0);

    let summary = ctx.metrics_summary();
    assert_eq!(summary.counters.get("cache_miss"), Some(&1));

    ctx.shutdown().await;
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = RelayConfig::default().with_cache_capacity(0);
    assert!(matches!(
        RelayContext::from_config(config),
        Err(RelayError::Config(_))
    ));
}
