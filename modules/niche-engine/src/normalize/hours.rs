//! Opening-hours normalization.
//!
//! Entries look like `"Mon - 9 to 5 PM"` or `{"day": "Monday", "hours": "9 AM–5 PM"}`
//! and come out as `"Monday - 9 AM to 5 PM"`. Anything that is not a
//! recognizable time range (`"Closed"`, `"Open 24 hours"`) passes through.

use std::sync::LazyLock;

use regex::Regex;

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z]+)\.?\s*(?:-|–|—|:)\s*(.*?)\s*$").unwrap());
static RANGE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+to\s+|\s*[-–—]\s*").unwrap());
static TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(?:([AaPp])\.?\s*[Mm]\.?)?$").unwrap()
});

const WEEKDAYS: &[(&[&str], &str)] = &[
    (&["mon", "monday"], "Monday"),
    (&["tue", "tues", "tuesday"], "Tuesday"),
    (&["wed", "weds", "wednesday"], "Wednesday"),
    (&["thu", "thur", "thurs", "thursday"], "Thursday"),
    (&["fri", "friday"], "Friday"),
    (&["sat", "saturday"], "Saturday"),
    (&["sun", "sunday"], "Sunday"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn flip(self) -> Self {
        match self {
            Meridiem::Am => Meridiem::Pm,
            Meridiem::Pm => Meridiem::Am,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Meridiem::Am => "AM",
            Meridiem::Pm => "PM",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u32,
    minute: Option<u32>,
    meridiem: Option<Meridiem>,
}

impl Clock {
    fn parse(s: &str) -> Option<Self> {
        let caps = TIME.captures(s.trim())?;
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute = match caps.get(2) {
            Some(m) => Some(m.as_str().parse::<u32>().ok()?),
            None => None,
        };
        let meridiem = caps.get(3).map(|m| {
            if m.as_str().eq_ignore_ascii_case("p") {
                Meridiem::Pm
            } else {
                Meridiem::Am
            }
        });

        if minute.is_some_and(|m| m > 59) {
            return None;
        }
        let clock = Self {
            hour,
            minute,
            meridiem,
        };
        match meridiem {
            Some(_) if !(1..=12).contains(&hour) => None,
            None if hour > 23 => None,
            _ => Some(clock.to_twelve_hour()),
        }
    }

    /// Fold unambiguous 24-hour values (`0`, `13..=23`) into 12-hour form.
    fn to_twelve_hour(self) -> Self {
        match (self.meridiem, self.hour) {
            (None, 0) => Self {
                hour: 12,
                meridiem: Some(Meridiem::Am),
                ..self
            },
            (None, h) if h > 12 => Self {
                hour: h - 12,
                meridiem: Some(Meridiem::Pm),
                ..self
            },
            _ => self,
        }
    }

    fn render(self, meridiem: Meridiem) -> String {
        match self.minute {
            Some(m) => format!("{}:{:02} {}", self.hour, m, meridiem.as_str()),
            None => format!("{} {}", self.hour, meridiem.as_str()),
        }
    }
}

/// Canonical weekday name for a full or abbreviated day. Unknown input is
/// returned trimmed and otherwise untouched.
pub fn normalize_day(day: &str) -> String {
    let trimmed = day.trim();
    let key = trimmed.trim_end_matches('.').to_ascii_lowercase();
    WEEKDAYS
        .iter()
        .find(|(aliases, _)| aliases.contains(&key.as_str()))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Reformat `"9 to 5 PM"` as `"9 AM to 5 PM"`.
///
/// An end time without a meridiem is taken as AM. A start time without one
/// takes the end's meridiem, unless that would put the start after the end
/// on the clock face, in which case it takes the other one.
pub fn normalize_time_range(range: &str) -> String {
    let trimmed = range.trim();
    let parts: Vec<&str> = RANGE_SPLIT.splitn(trimmed, 3).collect();
    let [start, end] = parts.as_slice() else {
        return trimmed.to_string();
    };
    let (Some(start), Some(end)) = (Clock::parse(start), Clock::parse(end)) else {
        return trimmed.to_string();
    };

    let end_meridiem = end.meridiem.unwrap_or(Meridiem::Am);
    let start_meridiem = start.meridiem.unwrap_or_else(|| {
        if start.hour % 12 > end.hour % 12 {
            end_meridiem.flip()
        } else {
            end_meridiem
        }
    });

    format!(
        "{} to {}",
        start.render(start_meridiem),
        end.render(end_meridiem)
    )
}

/// Normalize every comma-separated range in an hours string.
pub fn normalize_hours(hours: &str) -> String {
    clean_spaces(hours)
        .split(',')
        .map(normalize_time_range)
        .filter(|range| !range.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Normalize one `"<day> - <hours>"` entry.
pub fn normalize_entry(entry: &str) -> String {
    let cleaned = clean_spaces(entry);
    if let Some(caps) = ENTRY.captures(&cleaned) {
        let day = normalize_day(&caps[1]);
        return format!("{} - {}", day, normalize_hours(&caps[2]));
    }

    let day = normalize_day(&cleaned);
    if day != cleaned {
        return day;
    }
    normalize_hours(&cleaned)
}

/// Join a day and its hours given as separate fields.
pub fn normalize_day_hours(day: &str, hours: &str) -> String {
    let day = normalize_day(day);
    let hours = normalize_hours(hours);
    match (day.is_empty(), hours.is_empty()) {
        (true, _) => hours,
        (false, true) => day,
        (false, false) => format!("{day} - {hours}"),
    }
}

/// Providers use thin and narrow no-break spaces around dashes.
fn clean_spaces(s: &str) -> String {
    s.replace(['\u{2009}', '\u{202f}', '\u{a0}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
