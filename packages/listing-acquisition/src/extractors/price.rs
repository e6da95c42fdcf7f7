//! Rent parsing and normalization to pence per calendar month.

use regex::Regex;
use std::sync::LazyLock;

static RE_PRICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)£\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)\s*(pcm|per\s+calendar\s+month|per\s+month|p/?m|pw|per\s+week|p/?w|pa|per\s+annum|per\s+year)\b",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentFrequency {
    Monthly,
    Weekly,
    Yearly,
}

impl RentFrequency {
    fn parse(unit: &str) -> Option<Self> {
        let unit: String = unit
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match unit.as_str() {
            "pcm" | "percalendarmonth" | "permonth" | "pm" => Some(RentFrequency::Monthly),
            "pw" | "perweek" => Some(RentFrequency::Weekly),
            "pa" | "perannum" | "peryear" => Some(RentFrequency::Yearly),
            _ => None,
        }
    }
}

/// A rent figure as found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPrice {
    /// Matched text, e.g. `£2,000 pcm`.
    pub raw: String,
    /// Amount in pence at the stated frequency.
    pub amount_pence: i64,
    pub frequency: RentFrequency,
}

impl ParsedPrice {
    /// Pence per calendar month, rounded to the nearest penny. `None` when
    /// the amount is too large to represent.
    pub fn monthly_pence(&self) -> Option<i64> {
        normalize_monthly(self.amount_pence, self.frequency)
    }
}

/// Convert an amount at a frequency into pence per calendar month.
pub fn normalize_monthly(amount_pence: i64, frequency: RentFrequency) -> Option<i64> {
    match frequency {
        RentFrequency::Monthly => Some(amount_pence),
        RentFrequency::Weekly => div_round(amount_pence.checked_mul(52)?, 12),
        RentFrequency::Yearly => div_round(amount_pence, 12),
    }
}

fn div_round(numerator: i64, denominator: i64) -> Option<i64> {
    numerator
        .checked_add(denominator / 2)
        .map(|n| n / denominator)
}

fn parse_pence(amount: &str) -> Option<i64> {
    let cleaned: String = amount.chars().filter(|c| *c != ',').collect();
    let (pounds, pence) = match cleaned.split_once('.') {
        Some((pounds, pence)) => (pounds, pence),
        None => (cleaned.as_str(), ""),
    };
    let pounds: i64 = pounds.parse().ok()?;
    let pence: i64 = match pence.len() {
        0 => 0,
        1 => pence.parse::<i64>().ok()? * 10,
        _ => pence.parse().ok()?,
    };
    pounds.checked_mul(100)?.checked_add(pence)
}

/// First rent figure with a recognised frequency in the text.
pub fn find_price(text: &str) -> Option<ParsedPrice> {
    RE_PRICE.captures_iter(text).find_map(|caps| {
        let amount_pence = parse_pence(&caps[1])?;
        let frequency = RentFrequency::parse(&caps[2])?;
        let raw = caps[0].split_whitespace().collect::<Vec<_>>().join(" ");
        Some(ParsedPrice {
            raw,
            amount_pence,
            frequency,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_price() {
        let price = find_price("Rent: £2,000 pcm (£462 pw)").unwrap();
        assert_eq!(price.raw, "£2,000 pcm");
        assert_eq!(price.frequency, RentFrequency::Monthly);
        assert_eq!(price.monthly_pence(), Some(200_000));
    }

    #[test]
    fn test_weekly_price_normalized() {
        let price = find_price("£300 per week").unwrap();
        // 30000 * 52 / 12 = 130000
        assert_eq!(price.monthly_pence(), Some(130_000));

        let price = find_price("£425 pw").unwrap();
        // 42500 * 52 / 12 = 184166.67
        assert_eq!(price.monthly_pence(), Some(184_167));
    }

    #[test]
    fn test_yearly_price_normalized() {
        let price = find_price("£18,000 per annum").unwrap();
        assert_eq!(price.monthly_pence(), Some(150_000));

        let price = find_price("£10,001 pa").unwrap();
        // 1000100 / 12 = 83341.67
        assert_eq!(price.monthly_pence(), Some(83_342));
    }

    #[test]
    fn test_pence_in_amount() {
        let price = find_price("£1,234.5 per month").unwrap();
        assert_eq!(price.amount_pence, 123_450);
    }

    #[test]
    fn test_oversized_amounts_do_not_overflow() {
        let price = find_price("£2,000,000,000,000,000 pw").unwrap();
        assert_eq!(price.amount_pence, 200_000_000_000_000_000);
        assert_eq!(price.monthly_pence(), None);

        assert_eq!(normalize_monthly(i64::MAX, RentFrequency::Yearly), None);
        assert!(find_price("£200,000,000,000,000,000 pcm").is_none());
    }

    #[test]
    fn test_price_without_frequency_ignored() {
        assert!(find_price("Deposit £2,307").is_none());
        assert!(find_price("no money here").is_none());
    }
}
