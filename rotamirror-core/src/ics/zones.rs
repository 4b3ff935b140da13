//! TZID resolution for zoned feed timestamps.
//!
//! A TZID is tried as an IANA name first (including the trailing segments of
//! `/vendor/.../Region/City` style ids), then against the VTIMEZONE blocks the
//! feed itself carries, and finally as a Windows zone name.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::parser::Component;
use rrule::RRuleSet;

const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("UTC", "Etc/UTC"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("Romance Standard Time", "Europe/Paris"),
    ("E. Europe Standard Time", "Europe/Chisinau"),
    ("FLE Standard Time", "Europe/Kyiv"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("Israel Standard Time", "Asia/Jerusalem"),
    ("South Africa Standard Time", "Africa/Johannesburg"),
    ("Arabian Standard Time", "Asia/Dubai"),
    ("India Standard Time", "Asia/Kolkata"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Singapore Standard Time", "Asia/Singapore"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("Eastern Standard Time", "America/New_York"),
    ("Central Standard Time", "America/Chicago"),
    ("Mountain Standard Time", "America/Denver"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("E. South America Standard Time", "America/Sao_Paulo"),
];

/// Zones defined by a feed's VTIMEZONE components, keyed by TZID.
#[derive(Debug, Default)]
pub(crate) struct ZoneTable {
    zones: HashMap<String, Vec<Observance>>,
}

impl ZoneTable {
    pub(crate) fn from_components<'c, 'a: 'c>(
        vtimezones: impl IntoIterator<Item = &'c Component<'a>>,
    ) -> Self {
        let mut zones = HashMap::new();
        for vtimezone in vtimezones {
            let Some(tzid) = vtimezone.find_prop("TZID") else {
                continue;
            };
            let observances: Vec<Observance> = vtimezone
                .components
                .iter()
                .filter_map(Observance::from_component)
                .collect();
            if !observances.is_empty() {
                zones.insert(normalize_tzid(tzid.val.as_ref()).to_string(), observances);
            }
        }
        ZoneTable { zones }
    }

    /// Convert a wall-clock time in `tzid` to UTC, or `None` if the zone is unknown.
    pub(crate) fn to_utc(&self, local: NaiveDateTime, tzid: &str) -> Option<DateTime<Utc>> {
        let tzid = normalize_tzid(tzid);

        if let Some(tz) = iana_zone(tzid) {
            return localize(&tz, local);
        }
        if let Some(observances) = self.zones.get(tzid) {
            return localize(&offset_at(observances, local)?, local);
        }
        let tz = WINDOWS_ZONES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(tzid))
            .and_then(|(_, iana)| iana.parse::<Tz>().ok())?;
        localize(&tz, local)
    }
}

fn normalize_tzid(tzid: &str) -> &str {
    tzid.trim().trim_matches('"')
}

fn iana_zone(tzid: &str) -> Option<Tz> {
    if let Ok(tz) = tzid.parse() {
        return Some(tz);
    }
    // "/mozilla.org/20070129_1/Europe/Berlin" and similar vendor prefixes
    let segments: Vec<&str> = tzid.split('/').filter(|s| !s.is_empty()).collect();
    (1..segments.len()).find_map(|i| segments[i..].join("/").parse().ok())
}

fn localize<Z: TimeZone>(tz: &Z, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    // Local times inside a DST gap do not exist; shift them past the gap.
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Offset of the observance with the latest onset at or before `local`.
fn offset_at(observances: &[Observance], local: NaiveDateTime) -> Option<FixedOffset> {
    observances
        .iter()
        .filter_map(|o| o.latest_onset(local).map(|at| (at, o.offset)))
        .max_by_key(|(at, _)| *at)
        .map(|(_, offset)| offset)
        .or_else(|| {
            observances
                .iter()
                .find(|o| o.standard)
                .or(observances.first())
                .map(|o| o.offset)
        })
}

/// A STANDARD or DAYLIGHT sub-component.
#[derive(Debug, Clone)]
struct Observance {
    standard: bool,
    start: NaiveDateTime,
    offset: FixedOffset,
    rules: Option<RRuleSet>,
}

impl Observance {
    fn from_component(component: &Component<'_>) -> Option<Self> {
        let standard = match component.name.as_ref() {
            "STANDARD" => true,
            "DAYLIGHT" => false,
            _ => return None,
        };
        let start = parse_local(component.find_prop("DTSTART")?.val.as_ref())?;
        let offset = parse_offset(component.find_prop("TZOFFSETTO")?.val.as_ref())?;

        // Onsets are wall-clock times, labelled UTC so rrule leaves them as they are.
        let rules = component.find_prop("RRULE").and_then(|rrule| {
            format!(
                "DTSTART:{}Z\nRRULE:{}",
                start.format("%Y%m%dT%H%M%S"),
                rrule.val.as_ref().trim()
            )
            .parse::<RRuleSet>()
            .ok()
        });

        Some(Observance {
            standard,
            start,
            offset,
            rules,
        })
    }

    fn latest_onset(&self, local: NaiveDateTime) -> Option<NaiveDateTime> {
        if self.start > local {
            return None;
        }
        let Some(rules) = &self.rules else {
            return Some(self.start);
        };

        let tz: rrule::Tz = Utc.into();
        let after = (self.start - Duration::seconds(1)).and_utc().with_timezone(&tz);
        let before = (local + Duration::seconds(1)).and_utc().with_timezone(&tz);
        rules
            .clone()
            .after(after)
            .before(before)
            .all(u16::MAX)
            .dates
            .last()
            .map(|onset| onset.naive_utc())
            .or(Some(self.start))
    }
}

fn parse_local(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y%m%dT%H%M%S").ok()
}

/// `+HHMM`, `-HHMM` or `+HHMMSS`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    let (sign, digits) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    if !matches!(digits.len(), 4 | 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    let seconds: i32 = digits.get(4..6).map_or(Some(0), |s| s.parse().ok())?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60 + seconds))
}
