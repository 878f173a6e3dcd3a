//! String format checks

use chrono::{DateTime, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
		.expect("email pattern is valid")
});

static UID: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-_.~]*$").expect("uid pattern is valid"));

static INTEGER_STRING: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^-?\d+$").expect("integer pattern is valid"));

/// Formats a string value can be constrained to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
	Email,
	Uid,
	Date,
	Time,
	DateTime,
	Uuid,
}

impl StringFormat {
	pub fn name(&self) -> &'static str {
		match self {
			StringFormat::Email => "email",
			StringFormat::Uid => "uid",
			StringFormat::Date => "date (YYYY-MM-DD)",
			StringFormat::Time => "time (HH:MM:SS)",
			StringFormat::DateTime => "RFC 3339 datetime",
			StringFormat::Uuid => "uuid",
		}
	}

	pub fn matches(&self, value: &str) -> bool {
		match self {
			StringFormat::Email => EMAIL.is_match(value),
			StringFormat::Uid => UID.is_match(value),
			StringFormat::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
			StringFormat::Time => {
				NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok()
					|| NaiveTime::parse_from_str(value, "%H:%M").is_ok()
			}
			StringFormat::DateTime => DateTime::parse_from_rfc3339(value).is_ok(),
			StringFormat::Uuid => uuid::Uuid::parse_str(value).is_ok(),
		}
	}
}

/// Whether a string holds a (possibly negative) base-10 integer
pub fn is_integer_string(value: &str) -> bool {
	INTEGER_STRING.is_match(value)
}
