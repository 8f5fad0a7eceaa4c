use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::api::models::Message;

#[derive(Debug, Clone, PartialEq)]
pub enum Row<'a> {
    DateSeparator(String),
    Message(&'a Message),
}

pub fn day_label(day: NaiveDate, today: NaiveDate) -> String {
    if day == today {
        "Today".to_string()
    } else if Some(day) == today.pred_opt() {
        "Yesterday".to_string()
    } else {
        day.format("%A, %B %-d, %Y").to_string()
    }
}

/// Interleave date separators with messages, calendar days taken in `tz`.
/// The first message always opens with a separator.
pub fn with_separators<'a, Tz: TimeZone>(messages: &'a [Message], today: NaiveDate, tz: &Tz) -> Vec<Row<'a>> {
    let mut rows = Vec::with_capacity(messages.len() + 1);
    let mut previous: Option<NaiveDate> = None;
    for message in messages {
        let day = local_day(&message.created_at, tz);
        if previous != Some(day) {
            rows.push(Row::DateSeparator(day_label(day, today)));
            previous = Some(day);
        }
        rows.push(Row::Message(message));
    }
    rows
}

fn local_day<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}
