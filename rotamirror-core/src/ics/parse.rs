//! Rotation feed parsing using the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use icalendar::parser::{Component, Property, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};

use crate::error::ParseError;
use crate::event::{Event, Rotation};
use crate::ics::text::{decode_feed, repair_mojibake, unescape_text};
use crate::ics::zones::ZoneTable;

const UNTITLED: &str = "(No title)";

/// Parse a raw rotation feed into UTC events tagged with the rotation.
///
/// Every VEVENT in the document is returned, in document order. The whole feed
/// is rejected if the document is not a calendar or any event is malformed.
pub fn parse_feed(raw: &[u8], rotation: &Rotation) -> Result<Vec<Event>, ParseError> {
    let text = decode_feed(raw);
    let unfolded = unfold(&text);

    let is_calendar = unfolded
        .lines()
        .find(|line| !line.trim().is_empty())
        .is_some_and(|line| line.trim().eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !is_calendar {
        return Err(ParseError::NotCalendar(
            "document does not start with BEGIN:VCALENDAR".into(),
        ));
    }

    let calendar =
        read_calendar(&unfolded).map_err(|e| ParseError::NotCalendar(e.to_string()))?;

    let mut vevents = Vec::new();
    let mut vtimezones = Vec::new();
    for component in &calendar.components {
        collect_named(component, "VEVENT", &mut vevents);
        collect_named(component, "VTIMEZONE", &mut vtimezones);
    }
    let zones = ZoneTable::from_components(vtimezones);

    vevents
        .into_iter()
        .map(|vevent| parse_vevent(vevent, rotation, &zones))
        .collect()
}

/// Walk a component tree depth-first, collecting every component called `name`.
fn collect_named<'c, 'a>(
    component: &'c Component<'a>,
    name: &str,
    out: &mut Vec<&'c Component<'a>>,
) {
    if component.name == name {
        out.push(component);
    }
    for child in &component.components {
        collect_named(child, name, out);
    }
}

fn parse_vevent(
    vevent: &Component<'_>,
    rotation: &Rotation,
    zones: &ZoneTable,
) -> Result<Event, ParseError> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.as_ref().trim().to_string())
        .filter(|uid| !uid.is_empty())
        .ok_or(ParseError::MissingProperty { property: "UID" })?;

    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|s| !s.trim().is_empty())
        .map(|s| repair_mojibake(&s).into_owned())
        .unwrap_or_else(|| UNTITLED.to_string());

    let start_prop = vevent
        .find_prop("DTSTART")
        .ok_or(ParseError::MissingProperty { property: "DTSTART" })?;
    let start = to_utc(start_prop, &uid, "DTSTART", zones)?;

    let end = match (vevent.find_prop("DTEND"), vevent.find_prop("DURATION")) {
        (Some(end_prop), _) => to_utc(end_prop, &uid, "DTEND", zones)?,
        (None, Some(duration_prop)) => start + parse_duration(duration_prop, &uid)?,
        (None, None) => start,
    };

    if end < start {
        return Err(ParseError::EndBeforeStart { uid });
    }

    Ok(Event {
        source_uid: uid,
        summary,
        start,
        end,
        source_name: rotation.name.clone(),
        color: rotation.color.clone(),
    })
}

/// Normalize a DTSTART/DTEND property to UTC.
///
/// Floating times are taken as UTC, TZID times are converted from their zone,
/// and all-day dates become midnight UTC.
fn to_utc(
    prop: &Property<'_>,
    uid: &str,
    property: &'static str,
    zones: &ZoneTable,
) -> Result<DateTime<Utc>, ParseError> {
    let invalid = || ParseError::InvalidTime {
        uid: uid.to_string(),
        property,
        value: prop.val.to_string(),
    };

    let value = DatePerhapsTime::try_from(prop).map_err(|_| invalid())?;

    match value {
        DatePerhapsTime::Date(date) => Ok(midnight_utc(date)),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => Ok(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => Ok(naive.and_utc()),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            zones.to_utc(date_time, &tzid).ok_or_else(|| ParseError::UnknownTimeZone {
                uid: uid.to_string(),
                tzid,
            })
        }
    }
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn parse_duration(prop: &Property<'_>, uid: &str) -> Result<Duration, ParseError> {
    let raw = prop.val.as_ref().trim();
    let invalid = || ParseError::InvalidTime {
        uid: uid.to_string(),
        property: "DURATION",
        value: raw.to_string(),
    };

    if raw.starts_with('-') {
        return Err(ParseError::EndBeforeStart {
            uid: uid.to_string(),
        });
    }

    let duration = iso8601::duration(raw.trim_start_matches('+')).map_err(|_| invalid())?;
    let std_duration: std::time::Duration = duration.into();
    Duration::from_std(std_duration).map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rotation() -> Rotation {
        Rotation::new("TEAM_X", "sched-1").with_color("5")
    }

    fn feed(events: &str) -> String {
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//OpsGenie//Schedule//EN\r\n{}END:VCALENDAR\r\n",
            events
        )
    }

    #[test]
    fn test_parse_feed_utc_event() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:abc-1\r\n\
SUMMARY:On call\r\n\
DTSTART:20250320T090000Z\r\n\
DTEND:20250321T090000Z\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.source_uid, "abc-1");
        assert_eq!(event.summary, "On call");
        assert_eq!(event.source_name, "TEAM_X");
        assert_eq!(event.color.as_deref(), Some("5"));
        assert_eq!(event.start, Utc.with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap());
        assert_eq!(event.end, Utc.with_ymd_and_hms(2025, 3, 21, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_converts_tzid_to_utc() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:zoned-1\r\n\
SUMMARY:Primary\r\n\
DTSTART;TZID=Europe/Berlin:20250715T100000\r\n\
DTEND;TZID=Europe/Berlin:20250715T180000\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        // Berlin is UTC+2 in July
        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 7, 15, 8, 0, 0).unwrap());
        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2025, 7, 15, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_treats_floating_time_as_utc() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:floating-1\r\n\
SUMMARY:Secondary\r\n\
DTSTART:20250101T080000\r\n\
DTEND:20250101T200000\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap());
        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2025, 1, 1, 20, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_all_day_event_is_midnight_utc() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:day-1\r\n\
SUMMARY:Holiday cover\r\n\
DTSTART;VALUE=DATE:20250501\r\n\
DTEND;VALUE=DATE:20250502\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_uses_duration_without_dtend() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:dur-1\r\n\
SUMMARY:Short shift\r\n\
DTSTART:20250320T090000Z\r\n\
DURATION:PT8H\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2025, 3, 20, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_repairs_mojibake_summary() {
        let mangled: String = "Rufbereitschaft Süd".bytes().map(char::from).collect();
        let ics = feed(&format!(
            "BEGIN:VEVENT\r\n\
UID:enc-1\r\n\
SUMMARY:{}\r\n\
DTSTART:20250320T090000Z\r\n\
DTEND:20250321T090000Z\r\n\
END:VEVENT\r\n",
            mangled
        ));

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        assert_eq!(events[0].summary, "Rufbereitschaft Süd");
    }

    #[test]
    fn test_parse_feed_accepts_latin1_bytes() {
        let mut raw = feed(
            "BEGIN:VEVENT\r\n\
UID:latin-1\r\n\
SUMMARY:Caf__\r\n\
DTSTART:20250320T090000Z\r\n\
DTEND:20250321T090000Z\r\n\
END:VEVENT\r\n",
        )
        .into_bytes();
        let pos = raw.windows(5).position(|w| w == b"Caf__").unwrap();
        raw.splice(pos + 3..pos + 5, [0xE9]);

        let events = parse_feed(&raw, &rotation()).expect("Should parse");

        assert_eq!(events[0].summary, "Café");
    }

    #[test]
    fn test_parse_feed_unescapes_and_unfolds_summary() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:fold-1\r\n\
SUMMARY:Primary\\, EU \r\n and US\r\n\
DTSTART:20250320T090000Z\r\n\
DTEND:20250321T090000Z\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        assert_eq!(events[0].summary, "Primary, EU and US");
    }

    #[test]
    fn test_parse_feed_missing_summary_gets_placeholder() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:nosummary-1\r\n\
DTSTART:20250320T090000Z\r\n\
DTEND:20250321T090000Z\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        assert_eq!(events[0].summary, "(No title)");
    }

    #[test]
    fn test_parse_feed_returns_every_event() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:a\r\n\
SUMMARY:First\r\n\
DTSTART:20250320T090000Z\r\n\
DTEND:20250321T090000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:b\r\n\
SUMMARY:Second\r\n\
DTSTART:20250321T090000Z\r\n\
DTEND:20250322T090000Z\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        let uids: Vec<_> = events.iter().map(|e| e.source_uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_feed_empty_calendar_has_no_events() {
        let events = parse_feed(feed("").as_bytes(), &rotation()).expect("Should parse");
        assert!(events.is_empty());
    }

    #[test]
    fn test_parse_feed_rejects_non_calendar() {
        let result = parse_feed(b"<html><body>502 Bad Gateway</body></html>", &rotation());
        assert!(matches!(result, Err(ParseError::NotCalendar(_))));

        let result = parse_feed(b"", &rotation());
        assert!(matches!(result, Err(ParseError::NotCalendar(_))));
    }

    #[test]
    fn test_parse_feed_rejects_event_without_uid() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
SUMMARY:Orphan\r\n\
DTSTART:20250320T090000Z\r\n\
DTEND:20250321T090000Z\r\n\
END:VEVENT\r\n",
        );

        let result = parse_feed(ics.as_bytes(), &rotation());

        assert_eq!(result, Err(ParseError::MissingProperty { property: "UID" }));
    }

    #[test]
    fn test_parse_feed_rejects_unknown_timezone() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:tz-1\r\n\
SUMMARY:Primary\r\n\
DTSTART;TZID=Mars/Olympus_Mons:20250320T090000\r\n\
DTEND;TZID=Mars/Olympus_Mons:20250321T090000\r\n\
END:VEVENT\r\n",
        );

        let result = parse_feed(ics.as_bytes(), &rotation());

        assert!(matches!(result, Err(ParseError::UnknownTimeZone { .. })));
    }

    #[test]
    fn test_parse_feed_resolves_feed_defined_timezone() {
        let ics = feed(
            "BEGIN:VTIMEZONE\r\n\
TZID:W. Europe Standard Time\r\n\
BEGIN:STANDARD\r\n\
DTSTART:16010101T030000\r\n\
TZOFFSETFROM:+0200\r\n\
TZOFFSETTO:+0100\r\n\
RRULE:FREQ=YEARLY;BYDAY=-1SU;BYMONTH=10\r\n\
END:STANDARD\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:16010101T020000\r\n\
TZOFFSETFROM:+0100\r\n\
TZOFFSETTO:+0200\r\n\
RRULE:FREQ=YEARLY;BYDAY=-1SU;BYMONTH=3\r\n\
END:DAYLIGHT\r\n\
END:VTIMEZONE\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Rota HQ\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19700101T000000\r\n\
TZOFFSETFROM:+0530\r\n\
TZOFFSETTO:+0530\r\n\
END:STANDARD\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:a\r\n\
SUMMARY:Outlook zone\r\n\
DTSTART;TZID=W. Europe Standard Time:20250715T100000\r\n\
DTEND;TZID=W. Europe Standard Time:20250715T180000\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:b\r\n\
SUMMARY:UTC sibling\r\n\
DTSTART:20250716T090000Z\r\n\
DTEND:20250717T090000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:c\r\n\
SUMMARY:Custom zone\r\n\
DTSTART;TZID=Rota HQ:20250715T100000\r\n\
DTEND;TZID=Rota HQ:20250715T180000\r\n\
END:VEVENT\r\n",
        );

        let events = parse_feed(ics.as_bytes(), &rotation()).expect("Should parse");

        let uids: Vec<_> = events.iter().map(|e| e.source_uid.as_str()).collect();
        assert_eq!(uids, vec!["a", "b", "c"]);
        assert_eq!(events[0].start, Utc.with_ymd_and_hms(2025, 7, 15, 8, 0, 0).unwrap());
        assert_eq!(events[0].end, Utc.with_ymd_and_hms(2025, 7, 15, 16, 0, 0).unwrap());
        assert_eq!(events[1].start, Utc.with_ymd_and_hms(2025, 7, 16, 9, 0, 0).unwrap());
        assert_eq!(events[2].start, Utc.with_ymd_and_hms(2025, 7, 15, 4, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_feed_rejects_end_before_start() {
        let ics = feed(
            "BEGIN:VEVENT\r\n\
UID:backwards-1\r\n\
SUMMARY:Primary\r\n\
DTSTART:20250321T090000Z\r\n\
DTEND:20250320T090000Z\r\n\
END:VEVENT\r\n",
        );

        let result = parse_feed(ics.as_bytes(), &rotation());

        assert_eq!(
            result,
            Err(ParseError::EndBeforeStart {
                uid: "backwards-1".to_string()
            })
        );
    }
}
