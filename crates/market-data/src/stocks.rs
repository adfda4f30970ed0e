use std::collections::HashMap;
use std::fs;

use crate::{MarketDataError, MarketDataStore, StockListing};

impl MarketDataStore {
    /// Load `stock_list.csv` (columns: code, name).
    pub fn list_instruments(&self) -> Result<Vec<StockListing>, MarketDataError> {
        let path = self.data_dir().join("stock_list.csv");
        let text = fs::read_to_string(&path).map_err(|e| MarketDataError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut listings = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| MarketDataError::Csv {
                path: path.display().to_string(),
                source: e,
            })?;
            let code = record.get(0).unwrap_or("").trim().to_string();
            let name = record.get(1).unwrap_or("").trim().to_string();
            if code.is_empty() {
                continue;
            }
            listings.push(StockListing { code, name });
        }

        Ok(listings)
    }

    /// Look up a stock's display name from `stock_names.json`, falling back
    /// to a synthesized "股票{code}"-style placeholder when absent.
    pub fn stock_name(&self, code: &str) -> String {
        let path = self.data_dir().join("stock_names.json");
        let names: HashMap<String, String> = fs::read_to_string(&path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();

        names
            .get(code)
            .cloned()
            .unwrap_or_else(|| format!("股票{code}"))
    }
}
