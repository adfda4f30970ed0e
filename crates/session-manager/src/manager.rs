use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use core_types::{AdjustmentFactor, CommissionSettings, RawBar, TradeAction};
use dashmap::DashMap;
use persistence::{
    BarSnapshotData, PersistenceStore, PositionLotRow, SessionCompletion, SessionStartData,
    SessionStatus, TradeData,
};
use replay_engine::ReplaySession;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use trade_simulator::TradeLedger;

use crate::error::SessionError;
use crate::provider::MarketDataProvider;
use crate::types::{
    AdjustmentRefresh, AdvanceOutcome, SessionData, SessionHistory, SessionSummary, StartMode,
    StartParams, StartedSession, TradeOutcome,
};

fn to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

/// One session's full state: the metadata S owns directly, plus the R/T
/// pair the session exclusively owns (§3 Ownership).
struct SessionEntry {
    user: String,
    instrument: String,
    instrument_name: String,
    start_date: NaiveDate,
    mode: String,
    created_at: chrono::DateTime<Utc>,
    replay: ReplaySession,
    ledger: TradeLedger,
}

/// Read-only raw-bar/factor tables for one instrument, cached across
/// sessions per §5's sharing note.
struct BarTable {
    bars: Vec<RawBar>,
    factors: Vec<AdjustmentFactor>,
}

/// Owns the process-wide `{session_id -> (R, T, metadata)}` mapping (§4.4).
///
/// Each entry is behind its own `tokio::sync::Mutex`, so operations against
/// different sessions never contend; operations against the same session
/// are serialised by the entry lock, giving the single total order §5
/// requires for concurrent trade/advance calls.
pub struct SessionManager {
    active_sessions: DashMap<String, Mutex<SessionEntry>>,
    bar_cache: DashMap<String, Arc<BarTable>>,
    persistence_cache: DashMap<String, PersistenceStore>,
    provider: Arc<dyn MarketDataProvider>,
    users_dir: PathBuf,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn MarketDataProvider>, users_dir: impl Into<PathBuf>) -> Self {
        Self {
            active_sessions: DashMap::new(),
            bar_cache: DashMap::new(),
            persistence_cache: DashMap::new(),
            provider,
            users_dir: users_dir.into(),
        }
    }

    fn bar_table(&self, code: &str) -> Result<Arc<BarTable>, SessionError> {
        if let Some(hit) = self.bar_cache.get(code) {
            return Ok(hit.clone());
        }
        let bars = self.provider.load_bars(code)?;
        let factors = self.provider.load_factors(code)?;
        let table = Arc::new(BarTable { bars, factors });
        self.bar_cache.insert(code.to_string(), table.clone());
        Ok(table)
    }

    async fn persistence_for(&self, user: &str) -> Result<PersistenceStore, SessionError> {
        if let Some(hit) = self.persistence_cache.get(user) {
            return Ok(hit.clone());
        }
        let path = self.users_dir.join(user).join("training_history.db");
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let store = PersistenceStore::open(&path).await?;
        self.persistence_cache
            .insert(user.to_string(), store.clone());
        Ok(store)
    }

    fn fresh_session_id(&self, username: &str) -> String {
        let mut id = format!("{username}_{}", Utc::now().format("%Y%m%d_%H%M%S"));
        while self.active_sessions.contains_key(&id) {
            id.push_str("_1");
        }
        id
    }

    async fn username_of(&self, session_id: &str) -> Result<String, SessionError> {
        let guard = self
            .active_sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        let e = guard.lock().await;
        Ok(e.user.clone())
    }

    /// `start(user, mode, params)` — resolves `(instrument, start_date)`,
    /// constructs R and T, records the session durably, and inserts it into
    /// the live map.
    pub async fn start(&self, params: StartParams) -> Result<StartedSession, SessionError> {
        let (code, start_date) = match &params.mode {
            StartMode::Random { sector, year_range } => self
                .provider
                .random_pick(*sector, year_range)
                .map_err(|e| SessionError::InvalidInstrumentOrDate(e.to_string()))?,
            StartMode::Specified {
                stock_code,
                start_date,
            } => {
                let ok = self
                    .provider
                    .validate(stock_code, *start_date)
                    .map_err(|e| SessionError::InvalidInstrumentOrDate(e.to_string()))?;
                if !ok {
                    return Err(SessionError::InvalidInstrumentOrDate(format!(
                        "{stock_code} has no data on or after {start_date}"
                    )));
                }
                (stock_code.clone(), *start_date)
            }
        };

        let table = self.bar_table(&code)?;
        let replay = ReplaySession::new(&code, &table.bars, &table.factors, start_date)?;
        let instrument_name = self.provider.stock_name(&code);
        let session_id = self.fresh_session_id(&params.user);

        let ledger = TradeLedger::new(
            code.clone(),
            params.initial_capital,
            to_decimal(params.commission.commission_rate),
            to_decimal(params.commission.min_commission),
            to_decimal(params.commission.stamp_tax_rate),
        );

        let commission_json =
            serde_json::to_string(&params.commission).unwrap_or_else(|_| "{}".to_string());
        let store = self.persistence_for(&params.user).await?;
        store
            .start_session(SessionStartData {
                session_id: session_id.clone(),
                instrument: code.clone(),
                instrument_name: instrument_name.clone(),
                start_date,
                mode: params.mode.as_str().to_string(),
                initial_capital: params.initial_capital,
                commission_settings_json: commission_json,
            })
            .await?;

        let entry = SessionEntry {
            user: params.user.clone(),
            instrument: code.clone(),
            instrument_name,
            start_date,
            mode: params.mode.as_str().to_string(),
            created_at: Utc::now(),
            replay,
            ledger,
        };
        self.active_sessions
            .insert(session_id.clone(), Mutex::new(entry));

        Ok(StartedSession {
            session_id,
            stock_code: code,
            start_date,
            mode: params.mode.as_str().to_string(),
        })
    }

    pub async fn data(&self, session_id: &str) -> Result<SessionData, SessionError> {
        let guard = self
            .active_sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        let e = guard.lock().await;
        Ok(SessionData {
            stock_name: e.instrument_name.clone(),
            kline_data: e.replay.visible_bars(),
            volume_data: e.replay.volume_series(),
            ma_data: e.replay.ma(&[5, 10, 20, 30, 60]),
            progress: e.replay.progress(),
            trade_markers: e.replay.trade_markers(),
        })
    }

    pub async fn set_adjustment(
        &self,
        session_id: &str,
        mode: &str,
    ) -> Result<AdjustmentRefresh, SessionError> {
        let guard = self
            .active_sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        let mut e = guard.lock().await;
        e.replay.set_adjustment(mode)?;
        Ok(AdjustmentRefresh {
            kline_data: e.replay.visible_bars(),
            volume_data: e.replay.volume_series(),
            ma_data: e.replay.ma(&[5, 10, 20, 30, 60]),
        })
    }

    /// `advance(session_id)` — per §4.4: on the last bar, finalize and
    /// evict; otherwise push the new price into T and report progress.
    pub async fn advance(&self, session_id: &str) -> Result<AdvanceOutcome, SessionError> {
        let username = self.username_of(session_id).await?;

        let advanced = {
            let guard = self
                .active_sessions
                .get(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
            let mut e = guard.lock().await;
            if !e.replay.next_bar() {
                None
            } else {
                let bar = e.replay.current_bar().expect("cursor moved to a valid index");
                e.ledger.update_current_price(to_decimal(bar.close), bar.bar_id);
                let volume = e
                    .replay
                    .volume_series()
                    .last()
                    .cloned()
                    .expect("at least one visible bar after advancing");
                let progress = e.replay.progress();
                let account = e.ledger.account_info();
                Some((bar, volume, progress, account))
            }
        };

        let Some((bar, volume, progress, account)) = advanced else {
            return self.finish(session_id, &username).await;
        };

        if let Ok(store) = self.persistence_for(&username).await {
            let snapshot = BarSnapshotData {
                bar_id: bar.bar_id,
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                total_assets: account.total_assets,
                available_cash: account.available_cash,
                position_value: account.position_value,
                floating_pnl: account.floating_pnl,
                total_shares: account.position_summary.total_shares,
                average_cost: account.position_summary.average_cost,
            };
            let _ = store.record_bar(session_id, snapshot).await;
        }

        Ok(AdvanceOutcome::Continue {
            finished: false,
            new_bar: bar,
            new_volume: volume,
            progress,
        })
    }

    async fn finish(&self, session_id: &str, username: &str) -> Result<AdvanceOutcome, SessionError> {
        let report = self
            .end_inner(session_id, username, SessionStatus::Completed)
            .await?;
        Ok(AdvanceOutcome::Finished {
            finished: true,
            report,
        })
    }

    /// `trade(session_id, action, lots)` — delegates to T, then marks the
    /// fill on R's chart and mirrors the trade into P.
    pub async fn trade(
        &self,
        session_id: &str,
        action: TradeAction,
        lots: i64,
    ) -> Result<TradeOutcome, SessionError> {
        let username = self.username_of(session_id).await?;

        let (trade, markers, before, after, open_lots) = {
            let guard = self
                .active_sessions
                .get(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
            let mut e = guard.lock().await;
            let date = e
                .replay
                .current_date()
                .ok_or_else(|| SessionError::InvalidInstrumentOrDate("no current bar".into()))?;
            let price = e
                .replay
                .current_bar()
                .ok_or_else(|| SessionError::InvalidInstrumentOrDate("no current bar".into()))?
                .close;
            let before = e.ledger.account_info().total_assets;
            let record = match action {
                TradeAction::Buy => e.ledger.buy(lots, to_decimal(price), date)?,
                TradeAction::Sell => e.ledger.sell(lots, to_decimal(price), date)?,
            }
            .clone();
            let info = e.ledger.account_info();
            let after = info.total_assets;
            let open_lots = info.position_summary.lots;
            e.replay.add_trade_marker(action, price);
            let markers = e.replay.trade_markers();
            (record, markers, before, after, open_lots)
        };

        if let Ok(store) = self.persistence_for(&username).await {
            let data = TradeData {
                bar_id: trade.bar_id,
                trade_date: trade.trade_date,
                action: trade.action.to_string(),
                quantity_lots: trade.quantity_lots,
                price: trade.price,
                amount: trade.amount,
                commission: trade.commission,
                stamp_tax: trade.stamp_tax,
                net_amount: trade.net_amount,
                total_assets_before: before,
                total_assets_after: after,
            };
            let _ = store.record_trade(session_id, data).await;

            let lot_rows: Vec<PositionLotRow> = open_lots
                .iter()
                .map(|lot| PositionLotRow {
                    instrument: lot.instrument.clone(),
                    quantity_shares: lot.quantity_shares,
                    cost_price: lot.cost_price.to_string(),
                    buy_date: lot.buy_date.to_string(),
                    buy_bar_id: lot.buy_bar_id,
                    available_date: lot.available_date.to_string(),
                    status: "active".to_string(),
                })
                .collect();
            let _ = store.replace_position_lots(session_id, &lot_rows).await;
        }

        Ok(TradeOutcome {
            success: true,
            trade,
            trade_markers: markers,
        })
    }

    pub async fn account(&self, session_id: &str) -> Result<trade_simulator::AccountInfo, SessionError> {
        let guard = self
            .active_sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        let e = guard.lock().await;
        Ok(e.ledger.account_info())
    }

    pub async fn indicator(
        &self,
        session_id: &str,
        kind: &str,
    ) -> Result<replay_engine::IndicatorSeries, SessionError> {
        let guard = self
            .active_sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        let e = guard.lock().await;
        Ok(e.replay.indicator(kind))
    }

    pub async fn history(&self, session_id: &str) -> Result<SessionHistory, SessionError> {
        let guard = self
            .active_sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        let e = guard.lock().await;
        Ok(SessionHistory {
            trade_history: e.ledger.trade_history().to_vec(),
            progress: e.replay.progress(),
            trade_markers: e.replay.trade_markers(),
        })
    }

    /// `end(session_id)` — generate the final report, persist as `ended`,
    /// and evict the session from the live map.
    pub async fn end(&self, session_id: &str) -> Result<trade_simulator::Report, SessionError> {
        let username = self.username_of(session_id).await?;
        self.end_inner(session_id, &username, SessionStatus::Ended)
            .await
    }

    async fn end_inner(
        &self,
        session_id: &str,
        username: &str,
        status: SessionStatus,
    ) -> Result<trade_simulator::Report, SessionError> {
        let (report, total_bars, completed_bars) = {
            let guard = self
                .active_sessions
                .get(session_id)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
            let e = guard.lock().await;
            let progress = e.replay.progress();
            let end_date = e.replay.current_date().unwrap_or(e.start_date);
            let report = e.ledger.generate_report(e.start_date, end_date);
            (report, progress.training_total + 1, progress.training_current + 1)
        };

        if let Ok(store) = self.persistence_for(username).await {
            let completion = SessionCompletion {
                end_date: report.end_date,
                final_capital: report.account.total_assets,
                total_return: report.account.total_return,
                max_drawdown: Decimal::ZERO,
                total_trades: report.total_trades,
                trade_win_rate: report.trade_win_rate,
                session_win_rate: report.session_win_rate,
                total_bars,
                completed_bars,
                total_commission: report.total_commission,
                status,
            };
            let _ = store.complete_session(username, session_id, completion).await;
        }

        self.active_sessions.remove(session_id);
        Ok(report)
    }

    /// `reset(session_id)` — restore R and T to their initial state without
    /// evicting the session; does not purge already-persisted rows (the
    /// prior run's history remains queryable by `session_detail`).
    pub async fn reset(&self, session_id: &str) -> Result<(), SessionError> {
        let guard = self
            .active_sessions
            .get(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        let mut e = guard.lock().await;
        e.replay.reset();
        e.ledger.reset();
        Ok(())
    }

    pub fn active_count(&self) -> usize {
        self.active_sessions.len()
    }

    pub async fn list_for_user(&self, user: &str) -> Vec<SessionSummary> {
        let mut out = Vec::new();
        for item in self.active_sessions.iter() {
            let locked = item.value().lock().await;
            if locked.user == user {
                out.push(SessionSummary {
                    session_id: item.key().clone(),
                    user: locked.user.clone(),
                    instrument: locked.instrument.clone(),
                    mode: locked.mode.clone(),
                    created_at: locked.created_at,
                });
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_data::{MarketDataError, Sector, StockListing};

    struct FixtureProvider {
        bars: Vec<RawBar>,
    }

    impl MarketDataProvider for FixtureProvider {
        fn list_instruments(&self) -> Result<Vec<StockListing>, MarketDataError> {
            Ok(vec![StockListing {
                code: "000001".into(),
                name: "test stock".into(),
            }])
        }

        fn validate(&self, _code: &str, date: NaiveDate) -> Result<bool, MarketDataError> {
            Ok(self.bars.first().map(|b| date >= b.date).unwrap_or(false)
                && self.bars.last().map(|b| date <= b.date).unwrap_or(false))
        }

        fn random_pick(
            &self,
            _sector: Sector,
            _year_range: &str,
        ) -> Result<(String, NaiveDate), MarketDataError> {
            Ok(("000001".into(), self.bars[0].date))
        }

        fn load_bars(&self, _code: &str) -> Result<Vec<RawBar>, MarketDataError> {
            Ok(self.bars.clone())
        }

        fn load_factors(&self, _code: &str) -> Result<Vec<AdjustmentFactor>, MarketDataError> {
            Ok(Vec::new())
        }

        fn stock_name(&self, _code: &str) -> String {
            "test stock".into()
        }
    }

    fn bar(date: NaiveDate, close: f64) -> RawBar {
        RawBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
            turnover: 0.0,
            amplitude: 0.0,
            change_pct: 0.0,
            change_amount: 0.0,
            turnover_rate: 0.0,
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn manager(tmp: &tempfile::TempDir) -> SessionManager {
        let bars: Vec<RawBar> = (0..10)
            .map(|i| bar(d(2024, 1, 1) + chrono::Duration::days(i), 10.0 + i as f64))
            .collect();
        SessionManager::new(Arc::new(FixtureProvider { bars }), tmp.path())
    }

    #[tokio::test]
    async fn start_advance_trade_end_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = manager(&tmp);

        let started = mgr
            .start(StartParams {
                user: "alice".into(),
                mode: StartMode::Specified {
                    stock_code: "000001".into(),
                    start_date: d(2024, 1, 1),
                },
                initial_capital: Decimal::from(100_000),
                commission: CommissionSettings::default(),
            })
            .await
            .unwrap();
        assert_eq!(mgr.active_count(), 1);

        let outcome = mgr.advance(&started.session_id).await.unwrap();
        assert!(matches!(outcome, AdvanceOutcome::Continue { .. }));

        let trade = mgr
            .trade(&started.session_id, TradeAction::Buy, 1)
            .await
            .unwrap();
        assert!(trade.success);
        assert_eq!(trade.trade_markers.len(), 1);

        // drain the rest of the bars
        loop {
            let outcome = mgr.advance(&started.session_id).await.unwrap();
            if let AdvanceOutcome::Finished { report, .. } = outcome {
                assert!(report.total_trades >= 1);
                break;
            }
        }
        assert_eq!(mgr.active_count(), 0);
    }
}
