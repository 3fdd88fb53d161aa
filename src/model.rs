//! Core data types shared across the ingestion-and-dispatch pipeline.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::{format_err, Error};
use clap::ValueEnum;
use serde::Deserialize;

use crate::Result;

/// One of the six MOWAS feed categories.
///
/// Each variant maps to a fixed path under `https://warnung.bund.de`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum Category {
    Tempest,
    Flood,
    FloodOld,
    Wildfire,
    Earthquake,
    Disasters,
}

impl Category {
    /// All categories, in a fixed, stable order.
    pub const ALL: [Category; 6] = [
        Category::Tempest,
        Category::Flood,
        Category::FloodOld,
        Category::Wildfire,
        Category::Earthquake,
        Category::Disasters,
    ];

    /// The URL path for this category, relative to the feed base URL.
    pub fn url_path(self) -> &'static str {
        match self {
            Category::Tempest => "/bbk.dwd/unwetter.json",
            Category::Flood => "/bbk.wsv/hochwasser.json",
            Category::FloodOld => "/bbk.lhp/hochwassermeldungen.json",
            Category::Wildfire => "/bbk.dwd/waldbrand.json",
            Category::Earthquake => "/bbk.bgr/erdbeben.json",
            Category::Disasters => "/bbk.mowas/gefahrendurchsagen.json",
        }
    }

    /// The config-file / CLI name for this category, e.g. `"TEMPEST"`.
    pub fn name(self) -> &'static str {
        match self {
            Category::Tempest => "TEMPEST",
            Category::Flood => "FLOOD",
            Category::FloodOld => "FLOOD_OLD",
            Category::Wildfire => "WILDFIRE",
            Category::Earthquake => "EARTHQUAKE",
            Category::Disasters => "DISASTERS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEMPEST" => Ok(Category::Tempest),
            "FLOOD" => Ok(Category::Flood),
            "FLOOD_OLD" => Ok(Category::FloodOld),
            "WILDFIRE" => Ok(Category::Wildfire),
            "EARTHQUAKE" => Ok(Category::Earthquake),
            "DISASTERS" => Ok(Category::Disasters),
            _ => Err(format_err!("unknown MOWAS category {:?}", s)),
        }
    }
}

/// Totally ordered warning severity.
///
/// Ordering matters: it's used both to filter (drop below `min_severity`)
/// and to promote (at/above `high_prio_level` sets `priority_high`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, Deserialize, ValueEnum)]
#[serde(rename_all = "PascalCase")]
#[value(rename_all = "UPPER")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
    Extreme,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Minor => "Minor",
            Severity::Moderate => "Moderate",
            Severity::Severe => "Severe",
            Severity::Extreme => "Extreme",
        };
        s.fmt(f)
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MINOR" => Ok(Severity::Minor),
            "MODERATE" => Ok(Severity::Moderate),
            "SEVERE" => Ok(Severity::Severe),
            "EXTREME" => Ok(Severity::Extreme),
            _ => Err(format_err!("unknown severity level {:?}", s)),
        }
    }
}

/// The MOWAS message type, which drives the broadcast lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
pub enum MsgType {
    Alert,
    Update,
    Cancel,
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MsgType::Alert => "Alert",
            MsgType::Update => "Update",
            MsgType::Cancel => "Cancel",
        };
        s.fmt(f)
    }
}

impl FromStr for MsgType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Alert" => Ok(MsgType::Alert),
            "Update" => Ok(MsgType::Update),
            "Cancel" => Ok(MsgType::Cancel),
            _ => Err(format_err!("unknown msgType {:?}", s)),
        }
    }
}

/// A user-configured (or dynamically-resolved) watch point.
///
/// Equality is by coordinate pair; order only matters for display.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WatchPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl WatchPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        WatchPoint {
            latitude,
            longitude,
        }
    }
}

/// A single `"geocode"` entry attached to an [`Area`].
#[derive(Clone, Debug, Deserialize)]
pub struct Geocode {
    pub value: String,
}

/// One area entry within a broadcast's `info.area` list.
#[derive(Clone, Debug, Deserialize)]
pub struct Area {
    /// A single-element list containing the whitespace-separated
    /// `"lon,lat"` ring.
    pub polygon: Vec<String>,
    #[serde(default)]
    pub geocode: Vec<Geocode>,
    #[serde(rename = "areaDesc")]
    pub area_desc: String,
}

/// The first (and, in practice, only) element of a broadcast's `info` list.
#[derive(Clone, Debug, Deserialize)]
pub struct Info {
    pub severity: Severity,
    #[serde(default)]
    pub urgency: Option<String>,
    pub headline: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    pub area: Vec<Area>,
}

/// A single warning document returned by the feed.
#[derive(Clone, Debug, Deserialize)]
pub struct Broadcast {
    pub identifier: String,
    #[serde(rename = "msgType")]
    pub msgtype: MsgType,
    pub sent: String,
    #[serde(default)]
    pub status: Option<String>,
    pub info: Vec<Info>,
}

impl Broadcast {
    /// The first (primary) `info` element. Feeds always carry at least one;
    /// callers should treat an empty list as a malformed broadcast.
    pub fn primary_info(&self) -> Option<&Info> {
        self.info.first()
    }
}

/// A cached entry for one broadcast identifier.
///
/// `Cancel` is never stored; see [`crate::lifecycle`].
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub msgtype: StoredMsgType,
    pub sent: String,
}

/// The subset of [`MsgType`] that may live in the cache.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoredMsgType {
    Alert,
    Update,
}

impl StoredMsgType {
    /// Convert a live `MsgType` into its cacheable form, if any.
    ///
    /// `Cancel` has no cacheable form: it is a one-shot transition and is
    /// never stored (see [`crate::lifecycle`]).
    pub fn from_msgtype(msgtype: MsgType) -> Option<StoredMsgType> {
        match msgtype {
            MsgType::Alert => Some(StoredMsgType::Alert),
            MsgType::Update => Some(StoredMsgType::Update),
            MsgType::Cancel => None,
        }
    }

    /// Does this stored type match a freshly-seen `MsgType`?
    pub fn matches(self, msgtype: MsgType) -> bool {
        matches!(
            (self, msgtype),
            (StoredMsgType::Alert, MsgType::Alert) | (StoredMsgType::Update, MsgType::Update)
        )
    }
}

impl fmt::Display for StoredMsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredMsgType::Alert => "Alert".fmt(f),
            StoredMsgType::Update => "Update".fmt(f),
        }
    }
}

/// What the lifecycle decider wants the caller to do with a broadcast.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Drop the broadcast; we've already notified for this revision.
    Ignore,
    /// Deliver it, and record (or re-record) it in the cache.
    DeliverAndRecord,
    /// Deliver it, and make sure it's not in the cache afterwards.
    DeliverAndEvict,
}

/// One watch point matched against a broadcast, enriched with derived fields.
#[derive(Clone, Debug)]
pub struct MatchedPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub maidenhead: String,
    pub utm: String,
    pub is_live: bool,
}

/// A matched area, carrying both the verbose and abbreviated name forms.
#[derive(Clone, Debug)]
pub struct MatchedArea {
    pub full_name: String,
    pub abbreviated_name: String,
}

/// Optional translated mirrors of the user-visible text fields.
#[derive(Clone, Debug, Default)]
pub struct Translations {
    pub headline: Option<String>,
    pub description: Option<String>,
    pub instruction: Option<String>,
    pub contact: Option<String>,
    pub sms_message: Option<String>,
}

/// A rendered static-map artifact, as PNG bytes plus a content-id for
/// embedding it into multipart email.
#[derive(Clone)]
pub struct RenderedMap {
    pub content_id: String,
    pub png_bytes: Vec<u8>,
}

impl fmt::Debug for RenderedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedMap")
            .field("content_id", &self.content_id)
            .field("png_bytes.len", &self.png_bytes.len())
            .finish()
    }
}

/// A delivery-ready record, produced by the enricher and consumed by the
/// dispatcher. Nothing retains this after fan-out.
#[derive(Clone, Debug)]
pub struct DeliveryRecord {
    pub identifier: String,
    pub headline: String,
    pub description: String,
    pub instruction: String,
    pub contact: String,
    pub severity: Severity,
    pub urgency: String,
    pub sent: String,
    pub msgtype: MsgType,
    pub priority_high: bool,
    pub areas: Vec<MatchedArea>,
    pub geocodes: Vec<String>,
    pub polygon: Vec<(f64, f64)>,
    pub matched_points: Vec<MatchedPoint>,
    pub rendered_map: Option<RenderedMap>,
    pub translations: Option<Translations>,
    pub abbreviated_text: Option<String>,
}
