use crate::model::{FortuneBody, FortuneRequest};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

// "1982. 04. 27." / "1982.4.27" as shown by some browsers' date inputs
static DOTTED_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})\.\s*([0-9]{1,2})\.\s*([0-9]{1,2})\.?$").unwrap());

// "오전 10:00" / "오후 3:05"
static KOREAN_12H_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(오전|오후)\s*([0-9]{1,2}):([0-9]{2})$").unwrap());

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());
static HH_MM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{2}:[0-9]{2}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("이름을 입력해주세요.")]
    MissingName,

    #[error("생년월일은 YYYY-MM-DD 형식으로 입력해주세요.")]
    InvalidDate { received: String },

    #[error("태어난 시간은 HH:MM(24시간) 형식으로 입력해주세요.")]
    InvalidTime { received: String },
}

impl InputError {
    /// The normalized value that was rejected, if any.
    pub fn received(&self) -> Option<&str> {
        match self {
            InputError::MissingName => None,
            InputError::InvalidDate { received } | InputError::InvalidTime { received } => {
                Some(received)
            }
        }
    }
}

pub fn normalize_birth_date(input: &str) -> String {
    let v = input.trim();
    match DOTTED_DATE.captures(v) {
        Some(caps) => format!("{}-{:0>2}-{:0>2}", &caps[1], &caps[2], &caps[3]),
        None => v.to_string(),
    }
}

pub fn normalize_birth_time(input: &str) -> String {
    let v = input.trim();
    let Some(caps) = KOREAN_12H_TIME.captures(v) else {
        return v.to_string();
    };
    // At most two ASCII digits, always parses.
    let mut hour: u32 = caps[2].parse().unwrap_or_default();
    if &caps[1] == "오전" {
        if hour == 12 {
            hour = 0;
        }
    } else if hour != 12 {
        hour += 12;
    }
    format!("{:02}:{}", hour, &caps[3])
}

pub fn is_valid_date_yyyy_mm_dd(v: &str) -> bool {
    if !ISO_DATE.is_match(v) {
        return false;
    }
    let (Ok(y), Ok(m), Ok(d)) = (
        v[0..4].parse::<i32>(),
        v[5..7].parse::<u32>(),
        v[8..10].parse::<u32>(),
    ) else {
        return false;
    };
    NaiveDate::from_ymd_opt(y, m, d).is_some()
}

pub fn is_valid_time_hh_mm(v: &str) -> bool {
    if !HH_MM.is_match(v) {
        return false;
    }
    match (v[0..2].parse::<u32>(), v[3..5].parse::<u32>()) {
        (Ok(h), Ok(m)) => h <= 23 && m <= 59,
        _ => false,
    }
}

impl FortuneRequest {
    /// Normalizes localized date/time formats, then validates name, date and
    /// time in that order.
    pub fn from_body(body: FortuneBody) -> Result<Self, InputError> {
        let name = body.name.as_deref().unwrap_or_default().trim().to_string();
        let birth_date = normalize_birth_date(body.birth_date.as_deref().unwrap_or_default());
        let birth_time = normalize_birth_time(body.birth_time.as_deref().unwrap_or_default());

        if name.is_empty() {
            return Err(InputError::MissingName);
        }
        if !is_valid_date_yyyy_mm_dd(&birth_date) {
            return Err(InputError::InvalidDate {
                received: birth_date,
            });
        }
        if !is_valid_time_hh_mm(&birth_time) {
            return Err(InputError::InvalidTime {
                received: birth_time,
            });
        }

        Ok(Self {
            name,
            birth_date,
            birth_time,
        })
    }
}
