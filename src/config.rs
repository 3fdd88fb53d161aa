//! Configuration surface: an INI-style config file layered with CLI
//! overrides, resolved once at startup into an immutable [`Settings`].
//!
//! Grounded on the teacher's `Opt` (`main.rs`) for the CLI half and on
//! `examples/original_source/mowas-pwb.conf`/`configreader.py` for the
//! `mowas_config` INI section and its `NOT_CONFIGURED` sentinel.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, format_err, Context, Error};
use clap::{Parser, ValueEnum};
use thiserror::Error;

use crate::model::{Category, Severity};
use crate::Result;

/// Marks a config-file value as deliberately unset.
const NOT_CONFIGURED: &str = "NOT_CONFIGURED";

/// Structured validation failures for a fully-assembled [`Settings`], in the
/// style of `metrics_exporter_newrelic::errors::BuildError`: one
/// `#[non_exhaustive]` enum naming each distinct way the settings can be
/// invalid, rather than ad-hoc `anyhow!` strings. These are all fatal at
/// startup (spec.md §7's "configuration errors... fatal at startup").
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("--standard-run-interval must be at least 60 minutes, got {0}")]
    StandardIntervalTooShort(u64),

    #[error("--emergency-run-interval must be at least 15 minutes, got {0}")]
    EmergencyIntervalTooShort(u64),

    #[error("--emergency-run-interval ({emergency}) must not exceed --standard-run-interval ({standard})")]
    EmergencyIntervalExceedsStandard { emergency: u64, standard: u64 },

    #[error("--sms-message-length must be at least {minimum}, got {actual}")]
    SmsMessageTooShort { actual: usize, minimum: usize },

    #[error("at least one category must be active")]
    NoActiveCategories,

    #[error("unsupported --translate-to language: {0:?}")]
    UnsupportedLanguage(String),
}

/// Which built-in summarizer backend to use for `--text-summarizer`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum SummarizerChoice {
    Internal,
    Generic,
    Openai,
    Palm,
}

impl fmt::Display for SummarizerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SummarizerChoice::Internal => "internal",
            SummarizerChoice::Generic => "generic",
            SummarizerChoice::Openai => "openai",
            SummarizerChoice::Palm => "palm",
        };
        f.write_str(s)
    }
}

/// A `lat,lon` pair, as accepted on the command line and in
/// `mowas_watch_areas`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WatchAreaArg {
    pub latitude: f64,
    pub longitude: f64,
}

impl FromStr for WatchAreaArg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format_err!("expected \"lat,lon\", found {:?}", s))?;
        Ok(WatchAreaArg {
            latitude: lat.trim().parse().context("invalid latitude")?,
            longitude: lon.trim().parse().context("invalid longitude")?,
        })
    }
}

/// Command-line flags (spec.md-free name: this mirrors the teacher's
/// `Opt`, one field per documented flag).
#[derive(Debug, Parser)]
#[command(author, version, about = "poll the MOWAS warning feed and dispatch matching broadcasts")]
pub struct Opt {
    /// Main INI config file (`mowas_config` section).
    #[arg(long = "configfile")]
    pub config_file: Option<PathBuf>,

    /// Config file for the full-content (e.g. chat) notifier channel.
    #[arg(long = "messenger-config-file")]
    pub messenger_config_file: Option<PathBuf>,

    /// Config file for the SMS notifier channel.
    #[arg(long = "sms-messenger-config-file")]
    pub sms_messenger_config_file: Option<PathBuf>,

    /// Maximum characters per SMS segment (minimum 67).
    #[arg(long = "sms-message-length", default_value_t = 67)]
    pub sms_message_length: usize,

    /// Split long SMS text into multiple segments instead of truncating.
    #[arg(long = "sms-message-split")]
    pub sms_message_split: bool,

    /// Emit one synthetic test broadcast through the full pipeline and exit.
    #[arg(long = "generate-test-message")]
    pub generate_test_message: bool,

    /// Sleep interval in minutes when the previous cycle delivered nothing
    /// noteworthy (minimum 60).
    #[arg(long = "standard-run-interval", default_value_t = 60)]
    pub standard_run_interval: u64,

    /// Sleep interval in minutes right after an Alert or Update was
    /// delivered (minimum 15).
    #[arg(long = "emergency-run-interval", default_value_t = 15)]
    pub emergency_run_interval: u64,

    /// How long (minutes) cache entries and retained mail remain valid.
    #[arg(long = "ttl", default_value_t = 60 * 24)]
    pub ttl_minutes: u64,

    /// An APRS-IS callsign to follow for a dynamic watch point; the SSID
    /// suffix (`-9` etc.) is stripped and the identity upper-cased.
    #[arg(long = "follow-the-ham")]
    pub follow_the_ham: Option<String>,

    /// Minimum severity that survives the lifecycle filter.
    #[arg(long = "warning-level", default_value = "MINOR")]
    pub warning_level: Severity,

    /// Severity at or above which a delivery is flagged high-priority.
    #[arg(long = "high-prio-level", default_value = "SEVERE")]
    pub high_prio_level: Severity,

    /// Which text summarizer backend to use.
    #[arg(long = "text-summarizer", default_value = "internal")]
    pub text_summarizer: SummarizerChoice,

    /// Recipient address for the email channel.
    #[arg(long = "email-recipient")]
    pub email_recipient: Option<String>,

    /// Disable the covid-19 content filter.
    #[arg(long = "enable-covid-content")]
    pub enable_covid_content: bool,

    /// Translate enriched text into this ISO 639-1 language before dispatch.
    #[arg(long = "translate-to")]
    pub translate_to: Option<String>,

    /// Read broadcasts from a local JSON file instead of the live feed, for
    /// offline testing.
    #[arg(long = "localfile")]
    pub local_file: Option<PathBuf>,

    /// Watch points given directly on the command line, in addition to any
    /// configured in the INI file.
    #[arg(long = "watch-area")]
    pub watch_areas: Vec<WatchAreaArg>,
}

/// ISO 639-1 codes accepted by `--translate-to` / `translate_to`.
pub const SUPPORTED_LANGUAGES: [&str; 25] = [
    "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "hu", "it", "ja", "lt", "lv",
    "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sv", "tr", "zh",
];

/// Fully resolved, validated, immutable configuration for one run.
///
/// Assembled by layering the INI config file underneath CLI flags (CLI
/// wins), then validated once; nothing downstream re-checks these
/// invariants.
#[derive(Debug, Clone)]
pub struct Settings {
    pub standard_interval_minutes: u64,
    pub emergency_interval_minutes: u64,
    pub ttl_minutes: u64,
    pub min_severity: Severity,
    pub high_prio_level: Severity,
    pub active_categories: Vec<Category>,
    pub watch_areas: Vec<WatchAreaArg>,
    pub follow_the_ham: Option<String>,
    pub sms_message_length: usize,
    pub sms_message_split: bool,
    pub enable_covid_content: bool,
    pub translate_to: Option<String>,
    pub text_summarizer: SummarizerChoice,
    pub email_recipient: Option<String>,
    pub local_file: Option<PathBuf>,
    pub aprsdotfi_api_key: Option<String>,
    pub deepldotcom_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub palm_api_key: Option<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from_address: Option<String>,
    pub imap_mail_retention_max_days: u64,
    pub generate_test_message: bool,
    pub messenger_webhook_url: Option<String>,
    pub sms_messenger_webhook_url: Option<String>,
}

/// Turns `NOT_CONFIGURED` (and blank) into `None`, anything else into
/// `Some`.
fn configured(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty() && v.trim() != NOT_CONFIGURED)
}

/// The values the INI file can supply; every field optional, since the CLI
/// or built-in defaults can cover any of them.
#[derive(Default)]
struct FileValues {
    aprsdotfi_api_key: Option<String>,
    mowas_watch_areas: Option<String>,
    deepldotcom_api_key: Option<String>,
    openai_api_key: Option<String>,
    palm_api_key: Option<String>,
    smtp_server: Option<String>,
    smtp_port: Option<u16>,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    smtp_from_address: Option<String>,
    imap_mail_retention_max_days: Option<u64>,
    mowas_active_categories: Option<String>,
}

fn parse_ini(contents: &str) -> Result<FileValues> {
    let conf = ini::Ini::load_from_str(contents).context("could not parse config file")?;
    let section = conf.section(Some("mowas_config"));
    let get = |key: &str| -> Option<String> {
        section.and_then(|s| s.get(key)).map(|v| v.to_owned())
    };
    Ok(FileValues {
        aprsdotfi_api_key: configured(get("aprsdotfi_api_key")),
        mowas_watch_areas: configured(get("mowas_watch_areas")),
        deepldotcom_api_key: configured(get("deepldotcom_api_key")),
        openai_api_key: configured(get("openai_api_key")),
        palm_api_key: configured(get("palm_api_key")),
        smtp_server: configured(get("smtp_server")),
        smtp_port: get("smtp_port").and_then(|v| v.parse().ok()),
        smtp_username: configured(get("smtp_username")),
        smtp_password: configured(get("smtp_password")),
        smtp_from_address: configured(get("smtp_from_address")),
        imap_mail_retention_max_days: get("imap_mail_retention_max_days").and_then(|v| v.parse().ok()),
        mowas_active_categories: configured(get("mowas_active_categories")),
    })
}

/// Reads an Apprise-style destination config file (one notification target
/// per non-blank, non-comment `#` line) down to the single URL a
/// [`crate::dispatch::notifier::WebhookSink`] needs. Only the first
/// destination line is honored; fanning one channel out to several
/// destinations from one config file is future work, not this crate's
/// single-`WebhookSink`-per-channel model.
fn load_webhook_url(path: &std::path::Path) -> Result<Option<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("could not read messenger config file {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned))
}

fn parse_watch_areas(raw: &str) -> Result<Vec<WatchAreaArg>> {
    raw.split_whitespace().map(WatchAreaArg::from_str).collect()
}

fn parse_active_categories(raw: &str) -> Result<Vec<Category>> {
    let mut seen = HashSet::new();
    let mut categories = Vec::new();
    for name in raw.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let category = Category::from_str(name)
            .with_context(|| format!("unknown category in mowas_active_categories: {:?}", name))?;
        if seen.insert(category.name()) {
            categories.push(category);
        }
    }
    if categories.is_empty() {
        bail!("mowas_active_categories must name at least one category");
    }
    Ok(categories)
}

impl Settings {
    /// Resolve CLI flags plus an optional config file into validated
    /// settings.
    pub fn resolve(opt: &Opt) -> Result<Settings> {
        let file = match &opt.config_file {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("could not read config file {}", path.display()))?;
                parse_ini(&contents)?
            }
            None => FileValues::default(),
        };

        let mut watch_areas = opt.watch_areas.clone();
        if let Some(raw) = &file.mowas_watch_areas {
            watch_areas.extend(parse_watch_areas(raw)?);
        }

        let active_categories = match &file.mowas_active_categories {
            Some(raw) => parse_active_categories(raw)?,
            None => Category::ALL.to_vec(),
        };

        let settings = Settings {
            standard_interval_minutes: opt.standard_run_interval,
            emergency_interval_minutes: opt.emergency_run_interval,
            ttl_minutes: opt.ttl_minutes,
            min_severity: opt.warning_level,
            high_prio_level: opt.high_prio_level,
            active_categories,
            watch_areas,
            follow_the_ham: opt.follow_the_ham.as_deref().map(normalize_callsign),
            sms_message_length: opt.sms_message_length,
            sms_message_split: opt.sms_message_split,
            enable_covid_content: opt.enable_covid_content,
            translate_to: opt.translate_to.clone(),
            text_summarizer: opt.text_summarizer,
            email_recipient: opt.email_recipient.clone(),
            local_file: opt.local_file.clone(),
            aprsdotfi_api_key: file.aprsdotfi_api_key,
            deepldotcom_api_key: file.deepldotcom_api_key,
            openai_api_key: file.openai_api_key,
            palm_api_key: file.palm_api_key,
            smtp_server: file.smtp_server,
            smtp_port: file.smtp_port.unwrap_or(587),
            smtp_username: file.smtp_username,
            smtp_password: file.smtp_password,
            smtp_from_address: file.smtp_from_address,
            imap_mail_retention_max_days: file.imap_mail_retention_max_days.unwrap_or(30),
            generate_test_message: opt.generate_test_message,
            messenger_webhook_url: opt
                .messenger_config_file
                .as_deref()
                .map(load_webhook_url)
                .transpose()?
                .flatten(),
            sms_messenger_webhook_url: opt
                .sms_messenger_config_file
                .as_deref()
                .map(load_webhook_url)
                .transpose()?
                .flatten(),
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> std::result::Result<(), SettingsError> {
        if self.standard_interval_minutes < 60 {
            return Err(SettingsError::StandardIntervalTooShort(self.standard_interval_minutes));
        }
        if self.emergency_interval_minutes < 15 {
            return Err(SettingsError::EmergencyIntervalTooShort(self.emergency_interval_minutes));
        }
        if self.emergency_interval_minutes > self.standard_interval_minutes {
            return Err(SettingsError::EmergencyIntervalExceedsStandard {
                emergency: self.emergency_interval_minutes,
                standard: self.standard_interval_minutes,
            });
        }
        if self.sms_message_length < crate::enrich::sms::MIN_MESSAGE_LENGTH {
            return Err(SettingsError::SmsMessageTooShort {
                actual: self.sms_message_length,
                minimum: crate::enrich::sms::MIN_MESSAGE_LENGTH,
            });
        }
        if self.active_categories.is_empty() {
            return Err(SettingsError::NoActiveCategories);
        }
        if let Some(lang) = &self.translate_to {
            if !SUPPORTED_LANGUAGES.contains(&lang.as_str()) {
                return Err(SettingsError::UnsupportedLanguage(lang.clone()));
            }
        }
        Ok(())
    }
}

/// Strip an APRS SSID suffix (`-9`, `-15`, ...) and upper-case the
/// remainder, matching the callsign normalization the live position
/// provider expects.
fn normalize_callsign(raw: &str) -> String {
    raw.split_once('-')
        .map(|(call, _ssid)| call)
        .unwrap_or(raw)
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_opt() -> Opt {
        Opt {
            config_file: None,
            messenger_config_file: None,
            sms_messenger_config_file: None,
            sms_message_length: 67,
            sms_message_split: false,
            generate_test_message: false,
            standard_run_interval: 60,
            emergency_run_interval: 15,
            ttl_minutes: 1440,
            follow_the_ham: None,
            warning_level: Severity::Minor,
            high_prio_level: Severity::Severe,
            text_summarizer: SummarizerChoice::Internal,
            email_recipient: None,
            enable_covid_content: false,
            translate_to: None,
            local_file: None,
            watch_areas: vec![],
        }
    }

    #[test]
    fn defaults_resolve_to_all_categories() {
        let settings = Settings::resolve(&base_opt()).unwrap();
        assert_eq!(settings.active_categories.len(), 6);
    }

    #[test]
    fn emergency_interval_below_minimum_is_rejected() {
        let mut opt = base_opt();
        opt.emergency_run_interval = 5;
        assert!(Settings::resolve(&opt).is_err());
    }

    #[test]
    fn emergency_interval_above_standard_is_rejected() {
        let mut opt = base_opt();
        opt.standard_run_interval = 60;
        opt.emergency_run_interval = 90;
        assert!(Settings::resolve(&opt).is_err());
    }

    #[test]
    fn sms_message_length_below_minimum_is_rejected() {
        let mut opt = base_opt();
        opt.sms_message_length = 40;
        assert!(Settings::resolve(&opt).is_err());
    }

    #[test]
    fn unsupported_translation_language_is_rejected() {
        let mut opt = base_opt();
        opt.translate_to = Some("xx".to_owned());
        assert!(Settings::resolve(&opt).is_err());
    }

    #[test]
    fn config_file_parses_active_categories_and_watch_areas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mowas.conf");
        std::fs::write(
            &path,
            "[mowas_config]\n\
             mowas_active_categories = FLOOD, WILDFIRE\n\
             mowas_watch_areas = 48.4781,10.774 52.52,13.405\n\
             smtp_server = NOT_CONFIGURED\n",
        )
        .unwrap();
        let mut opt = base_opt();
        opt.config_file = Some(path);
        let settings = Settings::resolve(&opt).unwrap();
        assert_eq!(settings.active_categories.len(), 2);
        assert_eq!(settings.watch_areas.len(), 2);
        assert!(settings.smtp_server.is_none());
    }

    #[test]
    fn follow_the_ham_strips_ssid_and_upper_cases() {
        let mut opt = base_opt();
        opt.follow_the_ham = Some("db0abc-9".to_owned());
        let settings = Settings::resolve(&opt).unwrap();
        assert_eq!(settings.follow_the_ham.as_deref(), Some("DB0ABC"));
    }

    #[test]
    fn messenger_config_file_supplies_a_webhook_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messenger.conf");
        std::fs::write(&path, "# destinations\n\nhttps://example.com/hook\n").unwrap();
        let mut opt = base_opt();
        opt.messenger_config_file = Some(path);
        let settings = Settings::resolve(&opt).unwrap();
        assert_eq!(
            settings.messenger_webhook_url.as_deref(),
            Some("https://example.com/hook")
        );
        assert_eq!(settings.sms_messenger_webhook_url, None);
    }

    #[test]
    fn watch_area_arg_parses_lat_lon() {
        let arg: WatchAreaArg = "48.4781,10.774".parse().unwrap();
        assert_eq!(arg.latitude, 48.4781);
        assert_eq!(arg.longitude, 10.774);
    }
}
