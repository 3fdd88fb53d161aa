#![recursion_limit = "128"]

pub use anyhow::Result;
use clap::Parser;
use metrics::describe_counter;
use opinionated_metrics::Mode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::{
    fmt::{format::FmtSpan, Subscriber},
    prelude::*,
    EnvFilter,
};

use mowas_beacon::cache::BroadcastCache;
use mowas_beacon::config::{Opt, Settings};
use mowas_beacon::dispatch::email::{EmailConfig, EmailDispatcher};
use mowas_beacon::dispatch::notifier::{LoggingSink, NotifierSink, WebhookSink};
use mowas_beacon::dispatch::Dispatcher;
use mowas_beacon::enrich::traits::{
    AprsFiPositionProvider, DeepLTranslator, HttpReverseGeocoder, NoopMapRenderer,
    NoopPositionProvider, NoopReverseGeocoder, NoopTranslator, PositionProvider, ReverseGeocoder,
    Translator,
};
use mowas_beacon::enrich::{self, Enricher};
use mowas_beacon::errors::display_causes_and_backtrace;
use mowas_beacon::feed::FeedClient;
use mowas_beacon::model::WatchPoint;
use mowas_beacon::scheduler::{run_retention_job, Scheduler};
use mowas_beacon::warncell::WarncellTable;

#[cfg(all(feature = "jemallocator", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// Reference URL for the DWD Warncell document; not part of the six
/// category feed endpoints (spec.md §6's "Warncell CSV (startup)").
const WARNCELL_URL: &str =
    "https://www.dwd.de/DE/leistungen/opendata/help/warnungen/cap_warncellids_csv.csv";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::from_default_env();
    Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_env_filter(filter)
        .finish()
        .init();
    let _span = info_span!("mowas-beacon").entered();
    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let opt = Opt::parse();
    let settings = match Settings::resolve(&opt) {
        Ok(settings) => Arc::new(settings),
        Err(err) => {
            display_causes_and_backtrace(&err);
            std::process::exit(1);
        }
    };

    let metrics_builder = opinionated_metrics::Builder::new(Mode::Cli);
    let metrics_handle = metrics_builder.install()?;
    describe_counter!(
        "mowasbeacon.selected_errors.count",
        "Particularly interesting errors, by component and cause"
    );

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let warncell_table = if settings.local_file.is_some() {
        WarncellTable::default()
    } else {
        WarncellTable::fetch(&http, WARNCELL_URL).await?
    };
    info!(entries = warncell_table.len(), "loaded Warncell table");

    let feed = FeedClient::new(http.clone());

    let reverse_geocoder: Box<dyn ReverseGeocoder> = match &settings.aprsdotfi_api_key {
        Some(_) => Box::new(HttpReverseGeocoder::new(http.clone(), "en")),
        None => Box::new(NoopReverseGeocoder),
    };
    let translator: Box<dyn Translator> = match &settings.deepldotcom_api_key {
        Some(key) => Box::new(DeepLTranslator::new(http.clone(), key.clone())),
        None => Box::new(NoopTranslator),
    };
    let summarizer = enrich::traits::summarizer_for(&settings.text_summarizer.to_string(), 500);
    let position_provider: Box<dyn PositionProvider> = match &settings.aprsdotfi_api_key {
        Some(key) => Box::new(AprsFiPositionProvider::new(http.clone(), key.clone())),
        None => Box::new(NoopPositionProvider),
    };

    let enricher = Enricher {
        reverse_geocoder,
        translator,
        summarizer,
        map_renderer: Box::new(NoopMapRenderer),
        warncell_table,
        high_prio_level: settings.high_prio_level,
        target_language: settings.translate_to.clone(),
    };

    let email = match (&settings.smtp_server, &settings.email_recipient) {
        (Some(server), Some(recipient)) => Some(EmailDispatcher::new(EmailConfig {
            smtp_server: server.clone(),
            smtp_port: settings.smtp_port,
            username: settings.smtp_username.clone().unwrap_or_default(),
            password: settings.smtp_password.clone().unwrap_or_default(),
            from_address: settings
                .smtp_from_address
                .clone()
                .unwrap_or_else(|| recipient.clone()),
            recipient: recipient.clone(),
        })?),
        _ => None,
    };

    let full_content_sink: Box<dyn NotifierSink> = match &settings.messenger_webhook_url {
        Some(url) => Box::new(WebhookSink::new("full_content", http.clone(), url.clone())),
        None => Box::new(LoggingSink::new("full_content")),
    };
    let sms_sink: Box<dyn NotifierSink> = match &settings.sms_messenger_webhook_url {
        Some(url) => Box::new(WebhookSink::new("sms", http.clone(), url.clone())),
        None => Box::new(LoggingSink::new("sms")),
    };

    let dispatcher = Dispatcher::new(
        email,
        Some(full_content_sink),
        Some(sms_sink),
        settings.sms_message_length,
        settings.sms_message_split,
    );

    let cache = BroadcastCache::new(std::time::Duration::from_secs(settings.ttl_minutes * 60));

    let mut scheduler = Scheduler {
        settings: settings.clone(),
        feed,
        cache,
        enricher,
        dispatcher,
        position_provider,
        static_watch_points: settings
            .watch_areas
            .iter()
            .map(|a| WatchPoint::new(a.latitude, a.longitude))
            .collect(),
        local_file: settings.local_file.clone(),
    };

    if settings.generate_test_message {
        scheduler.generate_test_message().await;
        if let Err(err) = metrics_handle.report().await {
            warn!("could not report metrics: {:?}", err);
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let shutdown_signal = {
        let cancel = cancel.clone();
        async move {
            wait_for_shutdown_signal().await;
            info!("shutdown signal received");
            cancel.cancel();
        }
    };

    let retention_cancel = cancel.clone();
    let retention_task = tokio::spawn(run_retention_job(
        settings.imap_mail_retention_max_days,
        retention_cancel,
    ));

    tokio::select! {
        _ = shutdown_signal => {}
        _ = scheduler.run(cancel.clone()) => {}
    }

    retention_task.abort();

    if let Err(err) = metrics_handle.report().await {
        warn!("could not report metrics: {:?}", err);
    }

    Ok(())
}

/// Waits for either a Ctrl-C or (on Unix) a SIGTERM, whichever comes first.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("could not install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
