//! Cell number formats from `xl/styles.xml`.
//!
//! Only date and time formats matter here: a cell such as `<c s="1"><v>45233</v></c>`
//! holds a day serial, and the workbook shows it as `11-03-23` or `2023-11-03`
//! depending on the format behind style 1. Every other format leaves the raw
//! value alone; numeric columns are parsed from it anyway.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use quick_xml::Reader;
use quick_xml::events::Event;

use super::{attribute, malformed};
use crate::error::ImportError;

/// Last serial a spreadsheet accepts (9999-12-31)
const MAX_DATE_SERIAL: f64 = 2_958_465.0;

/// Built-in date and time formats, as spreadsheet applications display them
fn builtin_date_format(id: u32) -> Option<&'static str> {
    match id {
        14 => Some("mm-dd-yy"),
        15 => Some("d-mmm-yy"),
        16 => Some("d-mmm"),
        17 => Some("mmm-yy"),
        18 => Some("h:mm AM/PM"),
        19 => Some("h:mm:ss AM/PM"),
        20 => Some("hh:mm"),
        21 => Some("hh:mm:ss"),
        22 => Some("m/d/yy hh:mm"),
        45 => Some("mm:ss"),
        46 => Some("[h]:mm:ss"),
        _ => None,
    }
}

#[derive(Debug, Default)]
pub(super) struct CellStyles {
    /// Date format code per `cellXfs` index, `None` for everything else
    date_formats: Vec<Option<String>>,
    date1904: bool,
}

impl CellStyles {
    pub(super) fn parse(xml: &[u8], date1904: bool) -> Result<Self, ImportError> {
        let mut custom_formats: HashMap<u32, String> = HashMap::new();
        let mut xf_format_ids: Vec<u32> = Vec::new();
        let mut in_cell_xfs = false;

        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
                Ok(Event::End(e)) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"numFmt" => {
                        let id = attribute(&e, b"numFmtId")?.and_then(|id| id.parse().ok());
                        if let (Some(id), Some(code)) = (id, attribute(&e, b"formatCode")?) {
                            custom_formats.insert(id, code);
                        }
                    }
                    // `xf` also appears under cellStyleXfs, which cells do not index
                    b"xf" if in_cell_xfs => {
                        let id = attribute(&e, b"numFmtId")?.and_then(|id| id.parse().ok());
                        xf_format_ids.push(id.unwrap_or(0));
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => return Err(malformed(e)),
                _ => {}
            }
            buf.clear();
        }

        let date_formats = xf_format_ids
            .into_iter()
            .map(|id| match custom_formats.get(&id) {
                Some(code) => is_date_format(code).then(|| code.clone()),
                None => builtin_date_format(id).map(str::to_string),
            })
            .collect();

        Ok(Self {
            date_formats,
            date1904,
        })
    }

    /// Display text of `raw` under `style`, or `None` when the style is not a
    /// date format or the value is not a usable serial
    pub(super) fn render_date(&self, style: usize, raw: &str) -> Option<String> {
        let format = self.date_formats.get(style)?.as_deref()?;
        let serial: f64 = raw.trim().parse().ok()?;
        let datetime = serial_to_datetime(serial, self.date1904)?;
        Some(render(&tokenize(first_section(format)), datetime, serial))
    }
}

/// The positive-number section of a format code
fn first_section(code: &str) -> &str {
    code.split(';').next().unwrap_or(code)
}

/// True when the code has date or time placeholders outside quoted text,
/// escapes and bracketed modifiers such as `[Red]` or `[$-409]`
fn is_date_format(code: &str) -> bool {
    let mut chars = first_section(code).chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                chars.by_ref().find(|&c| c == '"');
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&c| c != ']').collect();
                if matches!(inner.to_ascii_lowercase().as_str(), "h" | "hh" | "m" | "mm" | "s" | "ss") {
                    return true;
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => return true,
            _ => {}
        }
    }
    false
}

fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_DATE_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    let seconds = ((serial - serial.trunc()) * 86_400.0).round() as i64;

    // The 1900 system counts a nonexistent 1900-02-29 as serial 60
    let epoch = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if days < 60 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };

    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(TimeDelta::try_days(days)?)?
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    Year(usize),
    /// `m` runs; turned into [`Token::Minute`] next to hours or seconds
    Month(usize),
    Day(usize),
    Hour(usize),
    ElapsedHours,
    Minute(usize),
    Second(usize),
    AmPm { short: bool },
}

fn starts_with_ignore_case(chars: &[char], pattern: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    chars.len() >= pattern.len()
        && chars
            .iter()
            .zip(&pattern)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

fn tokenize(format: &str) -> Vec<Token> {
    let chars: Vec<char> = format.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '"')
                    .map_or(chars.len(), |offset| i + 1 + offset);
                tokens.push(Token::Literal(chars[i + 1..end].iter().collect()));
                i = end + 1;
            }
            '\\' => {
                if let Some(&escaped) = chars.get(i + 1) {
                    tokens.push(Token::Literal(escaped.to_string()));
                }
                i += 2;
            }
            '_' => {
                tokens.push(Token::Literal(" ".to_string()));
                i += 2;
            }
            '*' => i += 2,
            '[' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == ']')
                    .map_or(chars.len(), |offset| i + 1 + offset);
                let inner: String = chars[i + 1..end].iter().collect();
                if inner.eq_ignore_ascii_case("h") || inner.eq_ignore_ascii_case("hh") {
                    tokens.push(Token::ElapsedHours);
                }
                i = end + 1;
            }
            _ if starts_with_ignore_case(&chars[i..], "AM/PM") => {
                tokens.push(Token::AmPm { short: false });
                i += 5;
            }
            _ if starts_with_ignore_case(&chars[i..], "A/P") => {
                tokens.push(Token::AmPm { short: true });
                i += 3;
            }
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => {
                let letter = c.to_ascii_lowercase();
                let run = chars[i..]
                    .iter()
                    .take_while(|c| c.to_ascii_lowercase() == letter)
                    .count();
                tokens.push(match letter {
                    'y' => Token::Year(run),
                    'm' => Token::Month(run),
                    'd' => Token::Day(run),
                    'h' => Token::Hour(run),
                    _ => Token::Second(run),
                });
                i += run;
            }
            _ => {
                tokens.push(Token::Literal(c.to_string()));
                i += 1;
            }
        }
    }

    resolve_minutes(&mut tokens);
    tokens
}

/// `m` right after an hour or right before a second is minutes
fn resolve_minutes(tokens: &mut [Token]) {
    let fields: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, token)| !matches!(token, Token::Literal(_)))
        .map(|(index, _)| index)
        .collect();

    for (position, &index) in fields.iter().enumerate() {
        let Token::Month(run) = tokens[index] else {
            continue;
        };
        let after_hour = position > 0
            && matches!(tokens[fields[position - 1]], Token::Hour(_) | Token::ElapsedHours);
        let before_second = fields
            .get(position + 1)
            .is_some_and(|&next| matches!(tokens[next], Token::Second(_)));
        if after_hour || before_second {
            tokens[index] = Token::Minute(run);
        }
    }
}

fn padded(value: u32, run: usize) -> String {
    if run >= 2 {
        format!("{:02}", value)
    } else {
        value.to_string()
    }
}

fn render(tokens: &[Token], datetime: NaiveDateTime, serial: f64) -> String {
    let twelve_hour = tokens.iter().any(|t| matches!(t, Token::AmPm { .. }));
    let mut out = String::new();

    for token in tokens {
        match token {
            Token::Literal(text) => out.push_str(text),
            Token::Year(run) if *run <= 2 => out.push_str(&format!("{:02}", datetime.year() % 100)),
            Token::Year(_) => out.push_str(&format!("{:04}", datetime.year())),
            Token::Month(run) => match run {
                1 | 2 => out.push_str(&padded(datetime.month(), *run)),
                3 => out.push_str(&datetime.format("%b").to_string()),
                4 => out.push_str(&datetime.format("%B").to_string()),
                _ => out.extend(datetime.format("%B").to_string().chars().take(1)),
            },
            Token::Day(run) => match run {
                1 | 2 => out.push_str(&padded(datetime.day(), *run)),
                3 => out.push_str(&datetime.format("%a").to_string()),
                _ => out.push_str(&datetime.format("%A").to_string()),
            },
            Token::Hour(run) => {
                let hour = match (twelve_hour, datetime.hour() % 12) {
                    (true, 0) => 12,
                    (true, hour) => hour,
                    (false, _) => datetime.hour(),
                };
                out.push_str(&padded(hour, *run));
            }
            Token::ElapsedHours => out.push_str(&((serial * 24.0).floor() as i64).to_string()),
            Token::Minute(run) => out.push_str(&padded(datetime.minute(), *run)),
            Token::Second(run) => out.push_str(&padded(datetime.second(), *run)),
            Token::AmPm { short } => out.push_str(match (*short, datetime.hour() >= 12) {
                (false, false) => "AM",
                (false, true) => "PM",
                (true, false) => "A",
                (true, true) => "P",
            }),
        }
    }

    out
}
