use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use reply_relay::client::{HttpResponseClient, ResponseService};
use reply_relay::config::{AppConfig, SourceKind};
use reply_relay::injector::{HttpTriggerInjector, ReplyInjector};
use reply_relay::pipeline::InterceptionPipeline;
use reply_relay::source::{JsonLinesSource, NotificationSource, WebhookSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    // Keep the file writer's guard alive until exit so buffered logs flush.
    let _log_guard = init_tracing(&config);

    eprintln!("📨 Reply Relay v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Source app: {}", config.pipeline.source_app);
    eprintln!("   Backend: {}/chat", config.client.base_url);
    eprintln!(
        "   Auto-reply: {}",
        if config.pipeline.auto_reply_enabled {
            "enabled"
        } else {
            "disabled (dry run)"
        }
    );
    if config.pipeline.dismiss_after_reply {
        eprintln!("   Dismiss after reply: on");
    }
    if let Some(ref guard) = config.pipeline.guard {
        eprintln!("   Feedback guard: on (cooldown {}s)", guard.cooldown.as_secs());
    }

    let service: Arc<dyn ResponseService> = Arc::new(HttpResponseClient::new(config.client.clone()));
    let injector: Arc<dyn ReplyInjector> = Arc::new(HttpTriggerInjector::new());
    let pipeline = InterceptionPipeline::new(config.pipeline.clone(), service, injector);

    let source: Box<dyn NotificationSource> = match config.source {
        SourceKind::Stdin => {
            eprintln!("   Events: newline-delimited JSON on stdin\n");
            Box::new(JsonLinesSource::stdin())
        }
        SourceKind::Webhook { port } => {
            let webhook = WebhookSource::new();
            let app = webhook.router();
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
                .await
                .with_context(|| format!("failed to bind webhook port {port}"))?;
            eprintln!("   Events: POST http://0.0.0.0:{port}/notifications\n");
            tokio::spawn(async move {
                tracing::info!(port, "Webhook server started");
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "Webhook server stopped");
                }
            });
            Box::new(webhook)
        }
    };

    // Ctrl-C stops intake; replies already in flight still complete.
    pipeline
        .run_until(source.as_ref(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Interrupted, shutting down");
        })
        .await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "reply-relay.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}
