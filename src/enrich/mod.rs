//! Enricher: turns a broadcast that survived matching into a
//! [`DeliveryRecord`].
//!
//! Grounded on `geocoders::normalizer::Normalizer` and
//! `geocoders::invalid_record_skipper::InvalidRecordSkipper` for the "wrap
//! and transform, degrade gracefully on sub-call failure" shape: every
//! optional step below swallows its own failure into a fallback value and a
//! `warn!`, exactly as `Normalizer::geocode_addresses` falls back to the
//! original address when libpostal returns `None`.

pub mod areas;
pub mod html;
pub mod sms;
pub mod traits;

use futures::future::join_all;
use tracing::warn;

use crate::model::{
    Area, Broadcast, DeliveryRecord, Info, MatchedArea, MatchedPoint, RenderedMap, Severity,
    Translations, WatchPoint,
};
use crate::warncell::WarncellTable;
use traits::{MapRenderer, ReverseGeocoder, Summarizer, Translator};

use self::traits::REVERSE_GEOCODE_FALLBACK;

/// Case-insensitive substrings that mark a broadcast as covid-related.
const COVID_MARKERS: &[&str] = &["covid", "corona"];

/// Does `info`'s headline/description/instruction mention covid-19, in
/// either German or English (case-insensitive)?
///
/// Applied after matching but before cache insertion, per spec.md §4.6: a
/// filtered broadcast never enters the cache (see [`crate::lifecycle`]'s
/// deferred-insert design).
pub fn is_covid_related(info: &Info) -> bool {
    let fields = [
        Some(info.headline.as_str()),
        info.description.as_deref(),
        info.instruction.as_deref(),
    ];
    fields.into_iter().flatten().any(|field| {
        let lower = field.to_ascii_lowercase();
        COVID_MARKERS.iter().any(|marker| lower.contains(marker))
    })
}

/// The enrichment pipeline's configuration and pluggable collaborators.
pub struct Enricher {
    pub reverse_geocoder: Box<dyn ReverseGeocoder>,
    pub translator: Box<dyn Translator>,
    pub summarizer: Box<dyn Summarizer>,
    pub map_renderer: Box<dyn MapRenderer>,
    pub warncell_table: WarncellTable,
    pub high_prio_level: Severity,
    pub target_language: Option<String>,
}

impl Enricher {
    /// Enrich `broadcast` (already known to have matched at least one
    /// `matched_areas` entry and `matched_points`) into a delivery record.
    ///
    /// `watch_points` carries `(point, is_live)` pairs for every configured
    /// watch point that matched at least one area polygon.
    pub async fn enrich(
        &self,
        broadcast: &Broadcast,
        info: &Info,
        matched_areas: &[&Area],
        watch_points: &[(WatchPoint, bool)],
        live_point: Option<WatchPoint>,
    ) -> DeliveryRecord {
        let headline = html::strip_html(&info.headline);
        let description = html::strip_html(info.description.as_deref().unwrap_or(""));
        let instruction = html::strip_html(info.instruction.as_deref().unwrap_or(""));
        let contact = html::strip_html(info.contact.as_deref().unwrap_or(""));

        let (areas, geocodes) = self.collect_areas_and_geocodes(matched_areas);
        let polygon = matched_areas
            .first()
            .and_then(|area| area.polygon.first())
            .and_then(|ring| crate::geomatch::parse_polygon(ring).ok())
            .unwrap_or_default();

        let matched_points = self.enrich_points(watch_points, live_point).await;

        let priority_high =
            info.severity >= self.high_prio_level && broadcast.msgtype != crate::model::MsgType::Cancel;

        let rendered_map = self
            .map_renderer
            .render(
                &polygon,
                &matched_points
                    .iter()
                    .map(|p| (p.latitude, p.longitude, p.is_live))
                    .collect::<Vec<_>>(),
            )
            .await
            .map(|png_bytes| RenderedMap {
                content_id: format!("map-{}", broadcast.identifier),
                png_bytes,
            });

        let translations = self.translate(&headline, &description, &instruction, &contact).await;

        let abbreviated_text = self.summarizer.summarize(&description).await;

        DeliveryRecord {
            identifier: broadcast.identifier.clone(),
            headline,
            description,
            instruction,
            contact,
            severity: info.severity,
            urgency: info.urgency.clone().unwrap_or_default(),
            sent: broadcast.sent.clone(),
            msgtype: broadcast.msgtype,
            priority_high,
            areas,
            geocodes,
            polygon,
            matched_points,
            rendered_map,
            translations,
            abbreviated_text,
        }
    }

    async fn enrich_points(
        &self,
        watch_points: &[(WatchPoint, bool)],
        live_point: Option<WatchPoint>,
    ) -> Vec<MatchedPoint> {
        let futures = watch_points.iter().map(|&(point, _)| async move {
            let address = self
                .reverse_geocoder
                .reverse_geocode(point.latitude, point.longitude)
                .await
                .unwrap_or_else(|| {
                    warn!(
                        latitude = point.latitude,
                        longitude = point.longitude,
                        "reverse geocode failed; using fallback address"
                    );
                    REVERSE_GEOCODE_FALLBACK.to_owned()
                });
            let (maidenhead, utm) = traits::derive_grid(point.latitude, point.longitude);
            let is_live = live_point
                .map(|live| live.latitude == point.latitude && live.longitude == point.longitude)
                .unwrap_or(false);
            MatchedPoint {
                latitude: point.latitude,
                longitude: point.longitude,
                address,
                maidenhead,
                utm,
                is_live,
            }
        });
        join_all(futures).await
    }

    async fn translate(
        &self,
        headline: &str,
        description: &str,
        instruction: &str,
        contact: &str,
    ) -> Option<Translations> {
        let target = self.target_language.as_deref()?;
        let fields = vec![
            headline.to_owned(),
            description.to_owned(),
            instruction.to_owned(),
            contact.to_owned(),
        ];
        let translated = self.translator.translate(&fields, target).await?;
        if translated.len() != fields.len() {
            warn!("translator returned a mismatched field count; skipping translation");
            return None;
        }
        Some(Translations {
            headline: Some(translated[0].clone()),
            description: Some(translated[1].clone()),
            instruction: Some(translated[2].clone()),
            contact: Some(translated[3].clone()),
            sms_message: None,
        })
    }

    /// Deduplicate matched areas (by full name) and derive each one's
    /// abbreviated form, preserving both alongside the geocodes seen across
    /// all matched areas.
    ///
    /// The abbreviated form prefers the Warncell table's short name for the
    /// area's first geocode; if that geocode isn't in the table, it falls
    /// back to the locally-derived abbreviation of the verbose `areaDesc`.
    fn collect_areas_and_geocodes(&self, matched_areas: &[&Area]) -> (Vec<MatchedArea>, Vec<String>) {
        let mut areas = Vec::new();
        let mut seen_names = std::collections::HashSet::new();
        let mut geocodes = Vec::new();
        let mut seen_geocodes = std::collections::HashSet::new();

        for area in matched_areas {
            if seen_names.insert(area.area_desc.clone()) {
                let abbreviated = area
                    .geocode
                    .first()
                    .and_then(|g| self.warncell_table.short_name(&g.value))
                    .map(str::to_owned)
                    .unwrap_or_else(|| areas::abbreviate_area(&area.area_desc));
                areas.push(MatchedArea {
                    full_name: area.area_desc.clone(),
                    abbreviated_name: abbreviated,
                });
            }
            for geocode in &area.geocode {
                if seen_geocodes.insert(geocode.value.clone()) {
                    geocodes.push(geocode.value.clone());
                }
            }
        }
        (areas, geocodes)
    }
}
