use std::fs;

use chrono::NaiveDate;

use crate::{AdjustmentFactor, ExDividendEvent, MarketDataError, MarketDataStore, RawBar};

impl MarketDataStore {
    /// Load `kline_raw/{code}.csv`. Columns: date, open, close, high, low,
    /// volume, turnover, amplitude, change_pct, change_amount, turnover_rate
    /// — note close is written before high/low, matching the downloader's
    /// column order.
    pub fn load_bars(&self, code: &str) -> Result<Vec<RawBar>, MarketDataError> {
        let path = self.data_dir.join("kline_raw").join(format!("{code}.csv"));
        let text = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MarketDataError::NoData(code.to_string())
            } else {
                MarketDataError::Io {
                    path: path.display().to_string(),
                    source: e,
                }
            }
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut bars = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| MarketDataError::Csv {
                path: path.display().to_string(),
                source: e,
            })?;
            let date = match record.get(0).and_then(parse_date) {
                Some(d) => d,
                None => continue,
            };
            let open: f64 = field(&record, 1);
            let close: f64 = field(&record, 2);
            let high: f64 = field(&record, 3);
            let low: f64 = field(&record, 4);
            let volume: f64 = field(&record, 5);
            let turnover: f64 = field(&record, 6);
            let amplitude: f64 = field(&record, 7);
            let change_pct: f64 = field(&record, 8);
            let change_amount: f64 = field(&record, 9);
            let turnover_rate: f64 = field(&record, 10);

            bars.push(RawBar {
                date,
                open,
                high,
                low,
                close,
                volume,
                turnover,
                amplitude,
                change_pct,
                change_amount,
                turnover_rate,
            });
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);

        if bars.is_empty() {
            return Err(MarketDataError::NoData(code.to_string()));
        }

        Ok(bars)
    }

    /// Load `factor/{code}.csv`. Columns: date, factor. Missing entries for a
    /// date simply aren't in the returned vector — callers default to 1.0.
    pub fn load_factors(&self, code: &str) -> Result<Vec<AdjustmentFactor>, MarketDataError> {
        let path = self.data_dir.join("factor").join(format!("{code}.csv"));
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MarketDataError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut factors = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| MarketDataError::Csv {
                path: path.display().to_string(),
                source: e,
            })?;
            let date = match record.get(0).and_then(parse_date) {
                Some(d) => d,
                None => continue,
            };
            let factor: f64 = field(&record, 1);
            if factor > 0.0 {
                factors.push(AdjustmentFactor { date, factor });
            }
        }

        factors.sort_by_key(|f| f.date);
        Ok(factors)
    }

    /// Load `ex_dividend/{code}.csv`, if present. Loaded for forward
    /// compatibility; nothing in the replay engine consumes it yet (the
    /// factor table is already the authoritative adjustment source).
    pub fn load_dividends(&self, code: &str) -> Result<Vec<ExDividendEvent>, MarketDataError> {
        let path = self
            .data_dir
            .join("ex_dividend")
            .join(format!("{code}.csv"));
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MarketDataError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut events = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| MarketDataError::Csv {
                path: path.display().to_string(),
                source: e,
            })?;
            let date = match record.get(0).and_then(parse_date) {
                Some(d) => d,
                None => continue,
            };
            events.push(ExDividendEvent {
                date,
                cash_dividend: field(&record, 1),
                split_ratio: if field::<f64>(&record, 2) > 0.0 {
                    field(&record, 2)
                } else {
                    1.0
                },
            });
        }

        Ok(events)
    }

    /// Validate that `code` has data and that `date` falls within its range.
    pub fn validate(&self, code: &str, date: NaiveDate) -> Result<bool, MarketDataError> {
        let bars = match self.load_bars(code) {
            Ok(b) => b,
            Err(MarketDataError::NoData(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let (first, last) = match (bars.first(), bars.last()) {
            (Some(f), Some(l)) => (f.date, l.date),
            _ => return Ok(false),
        };
        Ok(date >= first && date <= last)
    }
}

fn field<T: std::str::FromStr + Default>(record: &csv::StringRecord, idx: usize) -> T {
    record
        .get(idx)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_default()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}
