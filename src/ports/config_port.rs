//! Configuration access port trait.
//!
//! Implementors only provide raw string lookups. The typed accessors parse
//! strictly: an absent or blank key yields the default, a present value that
//! does not parse is a `ConfigInvalid` error naming the section and key.

use chrono::NaiveDate;

use crate::domain::error::FactorlabError;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Every key/value pair in `section`, sorted by key. Empty when the
    /// section is absent.
    fn section_entries(&self, section: &str) -> Vec<(String, String)>;

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, FactorlabError> {
        match present(self.get_string(section, key)) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| FactorlabError::invalid(section, key, &raw, "expected a number")),
        }
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, FactorlabError> {
        match present(self.get_string(section, key)) {
            None => Ok(default),
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| FactorlabError::invalid(section, key, &raw, "expected an integer")),
        }
    }

    fn get_count(&self, section: &str, key: &str, default: usize) -> Result<usize, FactorlabError> {
        match present(self.get_string(section, key)) {
            None => Ok(default),
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                FactorlabError::invalid(section, key, &raw, "expected a non-negative integer")
            }),
        }
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, FactorlabError> {
        match present(self.get_string(section, key)) {
            None => Ok(default),
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| FactorlabError::invalid(section, key, &raw, "expected true or false")),
        }
    }

    fn get_date(&self, section: &str, key: &str) -> Result<Option<NaiveDate>, FactorlabError> {
        match present(self.get_string(section, key)) {
            None => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| FactorlabError::invalid(section, key, &raw, "expected YYYY-MM-DD")),
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
