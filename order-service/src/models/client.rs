use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub cpf: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input. `cpf` is stored as its eleven digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClient {
    pub name: String,
    pub cpf: String,
}

/// Strip the `000.000.000-00` punctuation, keeping only digits.
pub fn normalize_cpf(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Check a CPF against its two mod-11 check digits. Accepts the bare or the
/// punctuated form.
pub fn is_valid_cpf(raw: &str) -> bool {
    if raw
        .chars()
        .any(|c| !(c.is_ascii_digit() || c == '.' || c == '-'))
    {
        return false;
    }

    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        match (sum * 10) % 11 {
            10 => 0,
            r => r,
        }
    };

    check(9) == digits[9] && check(10) == digits[10]
}
