use chrono::NaiveDate;
use core_types::{AdjustmentFactor, RawBar};
use market_data::{MarketDataError, MarketDataStore, Sector, StockListing};

/// Market-data provider boundary (§9 design note): the replay engine must
/// not know how bar/factor data was obtained. `S` talks to the provider
/// only through this trait, so an alternate MDP (a different downloader, a
/// test fixture) can stand in without touching `replay-engine`.
pub trait MarketDataProvider: Send + Sync {
    fn list_instruments(&self) -> Result<Vec<StockListing>, MarketDataError>;
    fn validate(&self, code: &str, date: NaiveDate) -> Result<bool, MarketDataError>;
    fn random_pick(&self, sector: Sector, year_range: &str) -> Result<(String, NaiveDate), MarketDataError>;
    fn load_bars(&self, code: &str) -> Result<Vec<RawBar>, MarketDataError>;
    fn load_factors(&self, code: &str) -> Result<Vec<AdjustmentFactor>, MarketDataError>;
    fn stock_name(&self, code: &str) -> String;
}

impl MarketDataProvider for MarketDataStore {
    fn list_instruments(&self) -> Result<Vec<StockListing>, MarketDataError> {
        MarketDataStore::list_instruments(self)
    }

    fn validate(&self, code: &str, date: NaiveDate) -> Result<bool, MarketDataError> {
        MarketDataStore::validate(self, code, date)
    }

    fn random_pick(&self, sector: Sector, year_range: &str) -> Result<(String, NaiveDate), MarketDataError> {
        MarketDataStore::random_pick(self, sector, year_range)
    }

    fn load_bars(&self, code: &str) -> Result<Vec<RawBar>, MarketDataError> {
        MarketDataStore::load_bars(self, code)
    }

    fn load_factors(&self, code: &str) -> Result<Vec<AdjustmentFactor>, MarketDataError> {
        MarketDataStore::load_factors(self, code)
    }

    fn stock_name(&self, code: &str) -> String {
        MarketDataStore::stock_name(self, code)
    }
}
