//! The polling loop: fetch, decide, enrich, dispatch, sleep, repeat — plus
//! the independent mailbox-retention worker.
//!
//! Grounded on the teacher's `geocode_stdio`/`run_server` split: one
//! function owns the whole lifetime of "the thing the binary does", reading
//! settings once and driving a loop with explicit cancellation support
//! (`tokio_util::sync::CancellationToken`, used here the same way a
//! `CancellationToken` gates the teacher's retry/backoff helpers).

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::cache::BroadcastCache;
use crate::config::Settings;
use crate::dispatch::Dispatcher;
use crate::enrich::traits::PositionProvider;
use crate::enrich::{is_covid_related, Enricher};
use crate::feed::FeedClient;
use crate::geomatch::{any_point_matches, parse_polygon};
use crate::lifecycle::{commit_record, decide};
use crate::model::{Broadcast, Disposition, MsgType, WatchPoint};

fn describe_metrics() {
    describe_counter!(
        "mowasbeacon.cycle.broadcasts_delivered.total",
        "Broadcasts delivered per polling cycle"
    );
}

/// Everything one polling cycle needs, assembled once at startup.
pub struct Scheduler {
    pub settings: Arc<Settings>,
    pub feed: FeedClient,
    pub cache: BroadcastCache,
    pub enricher: Enricher,
    pub dispatcher: Dispatcher,
    pub position_provider: Box<dyn PositionProvider>,
    pub static_watch_points: Vec<WatchPoint>,
    pub local_file: Option<std::path::PathBuf>,
}

impl Scheduler {
    /// Run the main loop until `cancel` fires. Returns once the loop has
    /// exited at a cancellation point after finishing its current cycle.
    pub async fn run(&mut self, cancel: CancellationToken) {
        describe_metrics();
        let mut live_point: Option<WatchPoint> = None;

        loop {
            if cancel.is_cancelled() {
                info!("shutdown signal received; exiting polling loop");
                return;
            }

            if let Some(identity) = &self.settings.follow_the_ham {
                match self.position_provider.current_position(identity).await {
                    Some(point) => live_point = Some(point),
                    None => warn!(identity, "could not refresh live watch point; keeping prior value"),
                }
            }

            let delivered_urgent = self.run_cycle(live_point).await;
            counter!("mowasbeacon.cycle.broadcasts_delivered.total", delivered_urgent as u64);

            let sleep_minutes = if delivered_urgent > 0 {
                self.settings.emergency_interval_minutes
            } else {
                self.settings.standard_interval_minutes
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received during sleep; exiting polling loop");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_secs(sleep_minutes * 60)) => {}
            }
        }
    }

    /// Run one cycle across every active category. Returns the number of
    /// broadcasts that were delivered with `msgtype` `Alert` or `Update`
    /// this cycle (drives the adaptive interval).
    #[instrument(skip(self))]
    async fn run_cycle(&mut self, live_point: Option<WatchPoint>) -> usize {
        let mut delivered_urgent = 0;

        let watch_points: Vec<WatchPoint> = self
            .static_watch_points
            .iter()
            .copied()
            .chain(live_point)
            .collect();

        if let Some(path) = &self.local_file {
            let broadcasts = match FeedClient::fetch_local(path) {
                Ok(broadcasts) => broadcasts,
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "could not read local feed fixture");
                    vec![]
                }
            };
            for broadcast in &broadcasts {
                if self
                    .process_broadcast(broadcast, &watch_points, live_point)
                    .await
                {
                    delivered_urgent += 1;
                }
            }
            return delivered_urgent;
        }

        for category in &self.settings.active_categories {
            let broadcasts = self.feed.fetch(*category).await;
            for broadcast in &broadcasts {
                if self
                    .process_broadcast(broadcast, &watch_points, live_point)
                    .await
                {
                    delivered_urgent += 1;
                }
            }
        }

        delivered_urgent
    }

    /// Drive one broadcast through the lifecycle/filter/enrich/dispatch
    /// pipeline. Returns `true` if it was delivered as an `Alert` or
    /// `Update` (used for the adaptive-interval decision).
    async fn process_broadcast(
        &mut self,
        broadcast: &Broadcast,
        watch_points: &[WatchPoint],
        live_point: Option<WatchPoint>,
    ) -> bool {
        let disposition = decide(broadcast, &mut self.cache);
        if disposition == Disposition::Ignore {
            return false;
        }

        let info = match broadcast.primary_info() {
            Some(info) => info,
            None => {
                warn!(identifier = %broadcast.identifier, "broadcast has no info entries; dropping");
                return false;
            }
        };

        if info.severity < self.settings.min_severity {
            return false;
        }
        if !self.settings.enable_covid_content && is_covid_related(info) {
            return false;
        }

        let matched_areas: Vec<&crate::model::Area> = info
            .area
            .iter()
            .filter(|area| area_matches(area, watch_points))
            .collect();
        if matched_areas.is_empty() {
            return false;
        }

        let point_matches: Vec<(WatchPoint, bool)> = watch_points
            .iter()
            .filter(|&&point| {
                matched_areas
                    .iter()
                    .any(|area| area_contains_point(area, point))
            })
            .map(|&point| {
                let is_live = live_point.map(|live| live == point).unwrap_or(false);
                (point, is_live)
            })
            .collect();

        if disposition == Disposition::DeliverAndRecord {
            commit_record(&mut self.cache, broadcast);
        }

        let record = self
            .enricher
            .enrich(broadcast, info, &matched_areas, &point_matches, live_point)
            .await;

        self.dispatcher.dispatch(&record).await;

        broadcast.msgtype != MsgType::Cancel
    }

    /// Run the synthetic `--generate-test-message` path: build one
    /// representative broadcast, run it through the full pipeline, and
    /// return without touching the cache.
    pub async fn generate_test_message(&mut self) {
        let broadcast = test_broadcast();
        let info = broadcast.primary_info().expect("test broadcast has info");
        let matched_areas: Vec<&crate::model::Area> = info.area.iter().collect();
        let watch_points = self.static_watch_points.clone();
        let point_matches: Vec<(WatchPoint, bool)> =
            watch_points.into_iter().map(|p| (p, false)).collect();
        let record = self
            .enricher
            .enrich(&broadcast, info, &matched_areas, &point_matches, None)
            .await;
        self.dispatcher.dispatch(&record).await;
    }
}

fn area_matches(area: &crate::model::Area, watch_points: &[WatchPoint]) -> bool {
    area_contains_any(area, watch_points)
}

fn area_contains_any(area: &crate::model::Area, watch_points: &[WatchPoint]) -> bool {
    let polygon = match area.polygon.first().and_then(|ring| parse_polygon(ring).ok()) {
        Some(polygon) => polygon,
        None => return false,
    };
    let points: Vec<(f64, f64)> = watch_points.iter().map(|p| (p.latitude, p.longitude)).collect();
    any_point_matches(&polygon, &points)
}

fn area_contains_point(area: &crate::model::Area, point: WatchPoint) -> bool {
    area_contains_any(area, std::slice::from_ref(&point))
}

/// A fixed sample broadcast used for `--generate-test-message`, matching
/// the scenario literally worked through in this crate's tests.
fn test_broadcast() -> Broadcast {
    use crate::model::{Area, Geocode, Info, Severity};
    Broadcast {
        identifier: "DE-BY-A-W083-TESTMESSAGE".to_owned(),
        msgtype: MsgType::Alert,
        sent: "2020-08-28T11:00:08+02:00".to_owned(),
        status: Some("Actual".to_owned()),
        info: vec![Info {
            severity: Severity::Minor,
            urgency: Some("Immediate".to_owned()),
            headline: "Test warning: this is only a test".to_owned(),
            description: Some("This is a synthetic broadcast generated on request.".to_owned()),
            instruction: Some("No action necessary.".to_owned()),
            contact: Some("BBK".to_owned()),
            area: vec![Area {
                polygon: vec!["9.5,47.5 10.5,47.5 10.5,48.5 9.5,48.5".to_owned()],
                geocode: vec![Geocode {
                    value: "803155033".to_owned(),
                }],
                area_desc: "Gemeinde/Stadt: Musterhausen".to_owned(),
            }],
        }],
    }
}

/// Runs the mailbox-retention job at a fixed interval, independent of the
/// main polling loop and touching a disjoint resource (no cache access).
pub async fn run_retention_job(retention_max_days: u64, cancel: CancellationToken) {
    let interval = Duration::from_secs(retention_max_days.max(1) * 24 * 60 * 60);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("shutdown signal received; stopping retention job");
                return;
            }
            _ = tokio::time::sleep(interval) => {
                info!(retention_max_days, "running mailbox retention sweep");
                // Mailbox access is out of scope for this crate's IMAP-free
                // transport stack; this is the hook a real mailbox client
                // would plug into.
            }
        }
    }
}
