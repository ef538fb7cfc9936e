//! Date formatting with LDML-style patterns.
//!
//! Supported tokens: `G`-`GGGGG`, `y yy yyy yyyy`, `M MM MMM MMMM`, `d dd`,
//! `E`-`EEEEE`, `H HH h hh m mm s ss a`. Text in single quotes is copied
//! literally (`''` is an apostrophe); any other non-letter is copied as is.

use chrono::{Datelike, NaiveDateTime, Timelike};

const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September", "October",
    "November", "December",
];
const MONTHS_SHORT_EN: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const MONTHS_NB: [&str; 12] = [
    "januar", "februar", "mars", "april", "mai", "juni", "juli", "august", "september", "oktober",
    "november", "desember",
];
const MONTHS_SHORT_NB: [&str; 12] = [
    "jan.", "feb.", "mar.", "apr.", "mai", "jun.", "jul.", "aug.", "sep.", "okt.", "nov.", "des.",
];
const WEEKDAYS_EN: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
const WEEKDAYS_SHORT_EN: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const WEEKDAYS_NB: [&str; 7] = ["mandag", "tirsdag", "onsdag", "torsdag", "fredag", "lørdag", "søndag"];
const WEEKDAYS_SHORT_NB: [&str; 7] = ["man.", "tir.", "ons.", "tor.", "fre.", "lør.", "søn."];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Locale {
    English,
    Norwegian,
}

impl Locale {
    fn from_language(language: &str) -> Self {
        match language {
            "nb" | "nn" | "no" => Locale::Norwegian,
            _ => Locale::English,
        }
    }
}

/// Default pattern for a language.
pub fn default_format(language: &str) -> &'static str {
    match language {
        "nb" | "nn" | "no" => "dd.MM.yyyy",
        "en" => "MM/dd/yyyy",
        _ => "yyyy-MM-dd",
    }
}

/// Format `date` with `pattern`, or with the language's default pattern.
///
/// Returns the first unsupported token as the error.
pub fn format_date(date: &NaiveDateTime, pattern: Option<&str>, language: &str) -> Result<String, String> {
    let pattern = pattern.unwrap_or_else(|| default_format(language));
    let locale = Locale::from_language(language);
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            out.push(c);
            i += 1;
            continue;
        }

        let mut len = 1;
        while chars.get(i + len) == Some(&c) {
            len += 1;
        }
        i += len;

        let token: String = std::iter::repeat(c).take(len).collect();
        let rendered = format_token(date, c, len, locale).ok_or(token)?;
        out.push_str(&rendered);
    }

    Ok(out)
}

fn format_token(date: &NaiveDateTime, letter: char, len: usize, locale: Locale) -> Option<String> {
    let month = date.month0() as usize;
    let weekday = date.weekday().num_days_from_monday() as usize;
    let norwegian = locale == Locale::Norwegian;

    let text = match (letter, len) {
        ('G', 1..=3) | ('G', 5) if norwegian => era(date, "f.Kr.", "e.Kr."),
        ('G', 4) if norwegian => era(date, "før Kristus", "etter Kristus"),
        ('G', 1..=3) => era(date, "BC", "AD"),
        ('G', 4) => era(date, "Before Christ", "Anno Domini"),
        ('G', 5) => era(date, "B", "A"),
        ('y', 2) => format!("{:02}", date.year().rem_euclid(100)),
        ('y', 1) => date.year().to_string(),
        ('y', 3..=4) => format!("{:0width$}", date.year(), width = len),
        ('M', 1) => date.month().to_string(),
        ('M', 2) => format!("{:02}", date.month()),
        ('M', 3) if norwegian => MONTHS_SHORT_NB[month].to_string(),
        ('M', 3) => MONTHS_SHORT_EN[month].to_string(),
        ('M', 4) if norwegian => MONTHS_NB[month].to_string(),
        ('M', 4) => MONTHS_EN[month].to_string(),
        ('d', 1) => date.day().to_string(),
        ('d', 2) => format!("{:02}", date.day()),
        ('E', 1..=3) if norwegian => WEEKDAYS_SHORT_NB[weekday].to_string(),
        ('E', 1..=3) => WEEKDAYS_SHORT_EN[weekday].to_string(),
        ('E', 4) if norwegian => WEEKDAYS_NB[weekday].to_string(),
        ('E', 4) => WEEKDAYS_EN[weekday].to_string(),
        ('E', 5) if norwegian => WEEKDAYS_NB[weekday].chars().next()?.to_uppercase().to_string(),
        ('E', 5) => WEEKDAYS_EN[weekday].chars().next()?.to_string(),
        ('H', 1) => date.hour().to_string(),
        ('H', 2) => format!("{:02}", date.hour()),
        ('h', 1) => date.hour12().1.to_string(),
        ('h', 2) => format!("{:02}", date.hour12().1),
        ('m', 1) => date.minute().to_string(),
        ('m', 2) => format!("{:02}", date.minute()),
        ('s', 1) => date.second().to_string(),
        ('s', 2) => format!("{:02}", date.second()),
        ('a', 1) => {
            let pm = date.hour12().0;
            match (norwegian, pm) {
                (true, false) => "a.m.",
                (true, true) => "p.m.",
                (false, false) => "AM",
                (false, true) => "PM",
            }
            .to_string()
        }
        _ => return None,
    };
    Some(text)
}

fn era(date: &NaiveDateTime, before: &str, after: &str) -> String {
    if date.year() > 0 { after } else { before }.to_string()
}
