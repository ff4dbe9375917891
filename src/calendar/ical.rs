//! iCalendar (RFC 5545) conversion for calendar events.

use chrono::{DateTime, Utc};
use icalendar::{
    Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event as IcalEvent,
    EventLike, Property,
};

use super::Event;

pub const PRODID: &str = "-//Lifedash//Calendar//EN";

/// Stable UID so re-exports of the same event dedupe in clients.
pub fn event_uid(event: &Event) -> String {
    format!("event-{}@lifedash", event.id)
}

pub fn to_ical(event: &Event) -> IcalEvent {
    let mut ical = IcalEvent::new();
    ical.uid(&event_uid(event));
    ical.summary(&event.title);
    ical.starts(event.date);
    ical.timestamp(event.updated_at);

    if let Some(ref desc) = event.description {
        ical.description(desc);
    }

    ical.done()
}

pub fn export_to_ical(events: &[Event], calendar_name: &str) -> String {
    let mut calendar = Calendar::new();
    calendar.name(calendar_name);
    calendar.append_property(Property::new("PRODID", PRODID));

    for event in events {
        calendar.push(to_ical(event));
    }

    calendar.done().to_string()
}

/// Event fields recovered from an imported VEVENT.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

/// Parses VEVENTs that carry both a summary and a start time; others are skipped.
pub fn import_from_ical(ical_str: &str) -> Vec<ImportedEvent> {
    let Ok(calendar) = ical_str.parse::<Calendar>() else {
        return Vec::new();
    };

    calendar
        .components
        .iter()
        .filter_map(|c| match c {
            CalendarComponent::Event(e) => from_ical(e),
            _ => None,
        })
        .collect()
}

fn from_ical(ical: &IcalEvent) -> Option<ImportedEvent> {
    let summary = ical.get_summary()?;
    let date = match ical.get_start()? {
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => dt,
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => naive.and_utc(),
        // No timezone database here; TZID wall time is kept as UTC.
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, .. }) => {
            date_time.and_utc()
        }
        DatePerhapsTime::Date(d) => d.and_hms_opt(0, 0, 0)?.and_utc(),
    };

    Some(ImportedEvent {
        title: summary.to_string(),
        description: ical.get_description().map(String::from),
        date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(id: i64, title: &str) -> Event {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap();
        Event {
            id,
            title: title.to_string(),
            description: Some("Quarterly review".to_string()),
            date: at,
            user_id: "u".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_event_to_ical() {
        let ical = to_ical(&event(7, "Dentist"));
        assert_eq!(ical.get_summary(), Some("Dentist"));
        assert_eq!(ical.get_uid(), Some("event-7@lifedash"));
        assert_eq!(ical.get_description(), Some("Quarterly review"));
    }

    #[test]
    fn test_export_contains_all_events() {
        let ics = export_to_ical(&[event(1, "Event 1"), event(2, "Event 2")], "Mine");
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains(PRODID));
        assert!(ics.contains("SUMMARY:Event 1"));
        assert!(ics.contains("SUMMARY:Event 2"));
    }

    #[test]
    fn test_export_then_import() {
        let ics = export_to_ical(&[event(1, "Standup")], "Mine");
        let imported = import_from_ical(&ics);
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].title, "Standup");
        assert_eq!(imported[0].date, Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_garbage_imports_nothing() {
        assert!(import_from_ical("not a calendar").is_empty());
    }
}
