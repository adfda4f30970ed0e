use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::{MarketDataError, MarketDataStore, Sector};

/// Safety cap on retries before falling back to a known-good default —
/// mirrors the downloader's own last-resort fallback of ("000001", "2020-01-01").
const MAX_ATTEMPTS: u32 = 20;
const FALLBACK_CODE: &str = "000001";

impl MarketDataStore {
    /// Pick a random (instrument, start_date) pair validated against the
    /// instrument's own data range. `year_range` is `"Y1-Y2"`.
    pub fn random_pick(
        &self,
        sector: Sector,
        year_range: &str,
    ) -> Result<(String, NaiveDate), MarketDataError> {
        let (year_start, year_end) = parse_year_range(year_range)?;
        let listings = self.list_instruments()?;

        let mut filtered: Vec<&str> = listings
            .iter()
            .map(|l| l.code.as_str())
            .filter(|code| sector.matches(code))
            .collect();
        if filtered.is_empty() {
            filtered = listings.iter().map(|l| l.code.as_str()).collect();
        }
        if filtered.is_empty() {
            return fallback_pair();
        }

        let mut rng = rand::thread_rng();
        for _ in 0..MAX_ATTEMPTS {
            let code = match filtered.choose(&mut rng) {
                Some(c) => (*c).to_string(),
                None => break,
            };
            let year = rng.gen_range(year_start..=year_end);
            let month = rng.gen_range(1..=12u32);
            let day = rng.gen_range(1..=28u32); // avoid month-length edge cases

            let date = match NaiveDate::from_ymd_opt(year, month, day) {
                Some(d) => d,
                None => continue,
            };

            if self.validate(&code, date).unwrap_or(false) {
                return Ok((code, date));
            }
        }

        fallback_pair()
    }
}

fn fallback_pair() -> Result<(String, NaiveDate), MarketDataError> {
    Ok((
        FALLBACK_CODE.to_string(),
        NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid fallback date"),
    ))
}

fn parse_year_range(s: &str) -> Result<(i32, i32), MarketDataError> {
    let (start, end) = s
        .split_once('-')
        .ok_or_else(|| MarketDataError::InvalidYearRange(s.to_string()))?;
    let start: i32 = start
        .trim()
        .parse()
        .map_err(|_| MarketDataError::InvalidYearRange(s.to_string()))?;
    let end: i32 = end
        .trim()
        .parse()
        .map_err(|_| MarketDataError::InvalidYearRange(s.to_string()))?;
    if start > end {
        return Err(MarketDataError::InvalidYearRange(s.to_string()));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_year_range() {
        assert_eq!(parse_year_range("2020-2024").unwrap(), (2020, 2024));
        assert!(parse_year_range("2024-2020").is_err());
        assert!(parse_year_range("garbage").is_err());
    }

    #[test]
    fn test_sector_matches() {
        assert!(Sector::Main.matches("600000"));
        assert!(Sector::Main.matches("000001"));
        assert!(!Sector::Main.matches("300059"));
        assert!(Sector::Gem.matches("300059"));
        assert!(Sector::Sme.matches("002415"));
        assert!(Sector::All.matches("anything"));
    }
}
