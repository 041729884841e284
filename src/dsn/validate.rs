//! Format validators for DSN identifier fields.
//!
//! These are the category-06 hooks: SIRET (establishment identifier),
//! NIR (social security number) and DSN calendar dates. They validate
//! shape and check digits only; existence checks against registries are
//! out of scope.

use crate::errors::{codes, ArxError, ArxResult};
use chrono::NaiveDate;

/// SIRET: exactly 14 digits, Luhn-valid.
pub fn check_siret(value: &str) -> ArxResult<()> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ArxError::code(codes::INVALID_SIRET)
            .with_detail(format!("'{}' is not 14 digits", value)));
    }
    if !luhn_valid(value) {
        return Err(ArxError::code(codes::INVALID_SIRET)
            .with_detail(format!("'{}' fails the Luhn check", value)));
    }
    Ok(())
}

fn luhn_valid(digits: &str) -> bool {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = (b - b'0') as u32;
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// NIR: 13-character number plus a 2-digit key. Corsican birth
/// departments use `2A`/`2B` in positions 6-7; the key is computed on
/// the number with `A` read as 0 minus 1,000,000 and `B` as 0 minus
/// 2,000,000, then `key = 97 - (number mod 97)`.
pub fn check_nir(value: &str) -> ArxResult<()> {
    if value.len() != 15 {
        return Err(ArxError::code(codes::INVALID_NIR)
            .with_detail(format!("'{}' is not 15 characters", value)));
    }
    let (number_part, key_part) = value.split_at(13);
    let key: u64 = key_part.parse().map_err(|_| {
        ArxError::code(codes::INVALID_NIR).with_detail(format!("key '{}' is not numeric", key_part))
    })?;

    let mut corsica_offset: i64 = 0;
    let mut digits = String::with_capacity(13);
    for (i, c) in number_part.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            'A' | 'a' if i == 5 => {
                digits.push('0');
                corsica_offset = 1_000_000;
            }
            'B' | 'b' if i == 5 => {
                digits.push('0');
                corsica_offset = 2_000_000;
            }
            _ => {
                return Err(ArxError::code(codes::INVALID_NIR)
                    .with_detail(format!("unexpected character '{}' in '{}'", c, value)))
            }
        }
    }

    let number: i64 = digits.parse::<i64>().map_err(|_| {
        ArxError::code(codes::INVALID_NIR).with_detail(format!("'{}' is not numeric", number_part))
    })? - corsica_offset;

    let expected = 97 - (number % 97) as u64;
    if key != expected {
        return Err(ArxError::code(codes::INVALID_NIR).with_detail(format!(
            "key {} does not match (expected {})",
            key, expected
        )));
    }
    Ok(())
}

/// DSN date: `JJMMAAAA`, must exist in the calendar.
pub fn check_dsn_date(value: &str) -> ArxResult<()> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ArxError::code(codes::INVALID_DSN_DATE)
            .with_detail(format!("'{}' is not in JJMMAAAA form", value)));
    }
    let day: u32 = value[0..2].parse().unwrap();
    let month: u32 = value[2..4].parse().unwrap();
    let year: i32 = value[4..8].parse().unwrap();
    if NaiveDate::from_ymd_opt(year, month, day).is_none() {
        return Err(ArxError::code(codes::INVALID_DSN_DATE)
            .with_detail(format!("'{}' is not a calendar date", value)));
    }
    Ok(())
}
