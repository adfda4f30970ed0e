use std::path::Path;
use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::models::{
    BarHistoryRow, BarSnapshotData, PositionLotRow, SessionCompletion, SessionDetail,
    SessionStartData, SessionStatus, TradeData, TradeHistoryRow, TrainingSessionRow,
    UserStatistics, UserStatisticsRow,
};
use crate::PersistenceError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS training_sessions (
    session_id                TEXT PRIMARY KEY,
    instrument                 TEXT NOT NULL,
    instrument_name              TEXT NOT NULL,
    start_date                    TEXT NOT NULL,
    end_date                       TEXT,
    mode                             TEXT NOT NULL,
    initial_capital                   TEXT NOT NULL,
    final_capital                       TEXT,
    total_return                          TEXT,
    max_drawdown                            TEXT,
    total_trades                              INTEGER NOT NULL DEFAULT 0,
    trade_win_rate                              TEXT,
    session_win_rate                              TEXT,
    total_bars                                     INTEGER NOT NULL DEFAULT 0,
    completed_bars                                   INTEGER NOT NULL DEFAULT 0,
    status                                             TEXT NOT NULL DEFAULT 'active',
    commission_settings_json                             TEXT NOT NULL,
    created_at                                             TEXT NOT NULL,
    completed_at                                             TEXT
);

CREATE TABLE IF NOT EXISTS bar_history (
    session_id     TEXT NOT NULL,
    bar_id          INTEGER NOT NULL,
    date             TEXT NOT NULL,
    open              REAL NOT NULL,
    high                REAL NOT NULL,
    low                  REAL NOT NULL,
    close                 REAL NOT NULL,
    volume                 REAL NOT NULL,
    total_assets             TEXT NOT NULL,
    available_cash            TEXT NOT NULL,
    position_value             TEXT NOT NULL,
    floating_pnl                 TEXT NOT NULL,
    total_shares                   INTEGER NOT NULL,
    average_cost                    TEXT NOT NULL,
    created_at                        TEXT NOT NULL,
    PRIMARY KEY (session_id, bar_id),
    FOREIGN KEY (session_id) REFERENCES training_sessions(session_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS trade_history (
    session_id            TEXT NOT NULL,
    bar_id                 INTEGER NOT NULL,
    trade_date               TEXT NOT NULL,
    action                     TEXT NOT NULL,
    quantity_lots                INTEGER NOT NULL,
    price                           TEXT NOT NULL,
    amount                            TEXT NOT NULL,
    commission                         TEXT NOT NULL,
    stamp_tax                            TEXT NOT NULL,
    net_amount                             TEXT NOT NULL,
    total_assets_before                       TEXT NOT NULL,
    total_assets_after                          TEXT NOT NULL,
    created_at                                    TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES training_sessions(session_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS position_lots (
    session_id       TEXT NOT NULL,
    instrument         TEXT NOT NULL,
    quantity_shares      INTEGER NOT NULL,
    cost_price             TEXT NOT NULL,
    buy_date                TEXT NOT NULL,
    buy_bar_id                INTEGER NOT NULL,
    available_date             TEXT NOT NULL,
    status                       TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES training_sessions(session_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_statistics (
    username                TEXT PRIMARY KEY,
    total_sessions            INTEGER NOT NULL DEFAULT 0,
    completed_sessions          INTEGER NOT NULL DEFAULT 0,
    total_trades                   INTEGER NOT NULL DEFAULT 0,
    total_return_sum                 TEXT NOT NULL DEFAULT '0',
    best_return                        TEXT NOT NULL DEFAULT '0',
    worst_return                         TEXT NOT NULL DEFAULT '0',
    avg_trade_win_rate                     TEXT NOT NULL DEFAULT '0',
    avg_session_win_rate                     TEXT NOT NULL DEFAULT '0',
    total_commission_paid                      TEXT NOT NULL DEFAULT '0',
    last_updated                                 TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bar_history_session ON bar_history(session_id);
CREATE INDEX IF NOT EXISTS idx_trade_history_session ON trade_history(session_id);
CREATE INDEX IF NOT EXISTS idx_position_lots_session ON position_lots(session_id);
"#;

/// Run `SCHEMA` statement by statement, since sqlx doesn't support multiple
/// statements through the prepared-statement path.
async fn run_schema(pool: &SqlitePool) -> Result<(), PersistenceError> {
    for statement in SCHEMA.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt).execute(pool).await?;
        }
    }
    Ok(())
}

/// Per-user SQLite store — one file per username, holding every training
/// session, bar snapshot, trade and the user's running statistics.
///
/// The spec's redesign flag folds what the original kept as several small
/// per-concern databases into this one file; `user-store` owns the
/// lighter-weight `config.json` sitting next to it.
#[derive(Clone)]
pub struct PersistenceStore {
    pool: SqlitePool,
}

impl PersistenceStore {
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        run_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn start_session(&self, data: SessionStartData) -> Result<(), PersistenceError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO training_sessions \
             (session_id, instrument, instrument_name, start_date, mode, \
              initial_capital, total_trades, total_bars, completed_bars, \
              status, commission_settings_json, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, 0, 0, ?, ?, ?)",
        )
        .bind(&data.session_id)
        .bind(&data.instrument)
        .bind(&data.instrument_name)
        .bind(data.start_date.to_string())
        .bind(&data.mode)
        .bind(data.initial_capital.to_string())
        .bind(SessionStatus::Active.to_string())
        .bind(&data.commission_settings_json)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_bar(
        &self,
        session_id: &str,
        bar: BarSnapshotData,
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT OR REPLACE INTO bar_history \
             (session_id, bar_id, date, open, high, low, close, volume, \
              total_assets, available_cash, position_value, floating_pnl, \
              total_shares, average_cost, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(bar.bar_id)
        .bind(bar.date.to_string())
        .bind(bar.open)
        .bind(bar.high)
        .bind(bar.low)
        .bind(bar.close)
        .bind(bar.volume)
        .bind(bar.total_assets.to_string())
        .bind(bar.available_cash.to_string())
        .bind(bar.position_value.to_string())
        .bind(bar.floating_pnl.to_string())
        .bind(bar.total_shares)
        .bind(bar.average_cost.to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "UPDATE training_sessions SET completed_bars = completed_bars + 1 WHERE session_id = ?",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_trade(
        &self,
        session_id: &str,
        trade: TradeData,
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO trade_history \
             (session_id, bar_id, trade_date, action, quantity_lots, price, \
              amount, commission, stamp_tax, net_amount, \
              total_assets_before, total_assets_after, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(trade.bar_id)
        .bind(trade.trade_date.to_string())
        .bind(&trade.action)
        .bind(trade.quantity_lots)
        .bind(trade.price.to_string())
        .bind(trade.amount.to_string())
        .bind(trade.commission.to_string())
        .bind(trade.stamp_tax.to_string())
        .bind(trade.net_amount.to_string())
        .bind(trade.total_assets_before.to_string())
        .bind(trade.total_assets_after.to_string())
        .bind(now)
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "UPDATE training_sessions SET total_trades = total_trades + 1 WHERE session_id = ?",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn replace_position_lots(
        &self,
        session_id: &str,
        lots: &[PositionLotRow],
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM position_lots WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        for lot in lots {
            sqlx::query(
                "INSERT INTO position_lots \
                 (session_id, instrument, quantity_shares, cost_price, \
                  buy_date, buy_bar_id, available_date, status) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(session_id)
            .bind(&lot.instrument)
            .bind(lot.quantity_shares)
            .bind(&lot.cost_price)
            .bind(&lot.buy_date)
            .bind(lot.buy_bar_id)
            .bind(&lot.available_date)
            .bind(&lot.status)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Finalizes a session and rolls its figures into `user_statistics`.
    ///
    /// A session with zero trades is a no-op against the statistics table —
    /// the user didn't actually train, so it shouldn't move their averages.
    pub async fn complete_session(
        &self,
        username: &str,
        session_id: &str,
        completion: SessionCompletion,
    ) -> Result<(), PersistenceError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE training_sessions SET \
             end_date = ?, final_capital = ?, total_return = ?, max_drawdown = ?, \
             total_trades = ?, trade_win_rate = ?, session_win_rate = ?, \
             total_bars = ?, completed_bars = ?, status = ?, completed_at = ? \
             WHERE session_id = ?",
        )
        .bind(completion.end_date.to_string())
        .bind(completion.final_capital.to_string())
        .bind(completion.total_return.to_string())
        .bind(completion.max_drawdown.to_string())
        .bind(completion.total_trades)
        .bind(completion.trade_win_rate.to_string())
        .bind(completion.session_win_rate.to_string())
        .bind(completion.total_bars)
        .bind(completion.completed_bars)
        .bind(completion.status.to_string())
        .bind(now)
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if completion.total_trades == 0 {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        let existing: Option<UserStatisticsRow> =
            sqlx::query_as("SELECT * FROM user_statistics WHERE username = ?")
                .bind(username)
                .fetch_optional(&mut *tx)
                .await?;

        let stats = match existing {
            Some(row) => {
                let total_sessions = row.total_sessions + 1;
                let completed_sessions = row.completed_sessions + 1;
                let total_trades = row.total_trades + completion.total_trades;
                let prior_return_sum =
                    Decimal::from_str(&row.total_return_sum).unwrap_or(Decimal::ZERO);
                let total_return_sum = prior_return_sum + completion.total_return;
                let best_return = Decimal::from_str(&row.best_return)
                    .unwrap_or(Decimal::ZERO)
                    .max(completion.total_return);
                let worst_return = Decimal::from_str(&row.worst_return)
                    .unwrap_or(Decimal::ZERO)
                    .min(completion.total_return);
                let prior_trade_win =
                    Decimal::from_str(&row.avg_trade_win_rate).unwrap_or(Decimal::ZERO);
                let prior_session_win =
                    Decimal::from_str(&row.avg_session_win_rate).unwrap_or(Decimal::ZERO);
                let prior_trade_count = row.total_trades;
                let avg_trade_win_rate = if total_trades > 0 {
                    (prior_trade_win * Decimal::from(prior_trade_count)
                        + completion.trade_win_rate * Decimal::from(completion.total_trades))
                        / Decimal::from(total_trades)
                } else {
                    Decimal::ZERO
                };
                let avg_session_win_rate = (prior_session_win
                    * Decimal::from(row.completed_sessions)
                    + completion.session_win_rate)
                    / Decimal::from(completed_sessions);
                let total_commission_paid = Decimal::from_str(&row.total_commission_paid)
                    .unwrap_or(Decimal::ZERO)
                    + completion.total_commission;
                UserStatisticsRow {
                    username: username.to_string(),
                    total_sessions,
                    completed_sessions,
                    total_trades,
                    total_return_sum: total_return_sum.to_string(),
                    best_return: best_return.to_string(),
                    worst_return: worst_return.to_string(),
                    avg_trade_win_rate: avg_trade_win_rate.to_string(),
                    avg_session_win_rate: avg_session_win_rate.to_string(),
                    total_commission_paid: total_commission_paid.to_string(),
                    last_updated: now,
                }
            }
            None => UserStatisticsRow {
                username: username.to_string(),
                total_sessions: 1,
                completed_sessions: 1,
                total_trades: completion.total_trades,
                total_return_sum: completion.total_return.to_string(),
                best_return: completion.total_return.to_string(),
                worst_return: completion.total_return.to_string(),
                avg_trade_win_rate: completion.trade_win_rate.to_string(),
                avg_session_win_rate: completion.session_win_rate.to_string(),
                total_commission_paid: completion.total_commission.to_string(),
                last_updated: now,
            },
        };

        sqlx::query(
            "INSERT OR REPLACE INTO user_statistics \
             (username, total_sessions, completed_sessions, total_trades, \
              total_return_sum, best_return, worst_return, avg_trade_win_rate, \
              avg_session_win_rate, total_commission_paid, last_updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&stats.username)
        .bind(stats.total_sessions)
        .bind(stats.completed_sessions)
        .bind(stats.total_trades)
        .bind(&stats.total_return_sum)
        .bind(&stats.best_return)
        .bind(&stats.worst_return)
        .bind(&stats.avg_trade_win_rate)
        .bind(&stats.avg_session_win_rate)
        .bind(&stats.total_commission_paid)
        .bind(stats.last_updated)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn user_statistics(&self, username: &str) -> Result<UserStatistics, PersistenceError> {
        let row: Option<UserStatisticsRow> =
            sqlx::query_as("SELECT * FROM user_statistics WHERE username = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        let Some(row) = row else {
            return Ok(UserStatistics::zero(username));
        };
        let total_return_sum = Decimal::from_str(&row.total_return_sum).unwrap_or(Decimal::ZERO);
        let avg_return = if row.completed_sessions > 0 {
            total_return_sum / Decimal::from(row.completed_sessions)
        } else {
            Decimal::ZERO
        };
        let avg_trade_win_rate =
            Decimal::from_str(&row.avg_trade_win_rate).unwrap_or(Decimal::ZERO);
        let success_rate = if row.total_sessions > 0 {
            (Decimal::from(100) * Decimal::from(row.completed_sessions))
                / Decimal::from(row.total_sessions)
        } else {
            Decimal::ZERO
        };
        Ok(UserStatistics {
            username: row.username,
            total_sessions: row.total_sessions,
            completed_sessions: row.completed_sessions,
            total_trades: row.total_trades,
            best_return: Decimal::from_str(&row.best_return).unwrap_or(Decimal::ZERO),
            worst_return: Decimal::from_str(&row.worst_return).unwrap_or(Decimal::ZERO),
            avg_trade_win_rate,
            avg_session_win_rate: Decimal::from_str(&row.avg_session_win_rate)
                .unwrap_or(Decimal::ZERO),
            total_commission_paid: Decimal::from_str(&row.total_commission_paid)
                .unwrap_or(Decimal::ZERO),
            avg_return,
            success_rate,
        })
    }

    pub async fn training_history(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TrainingSessionRow>, PersistenceError> {
        let rows = sqlx::query_as::<_, TrainingSessionRow>(
            "SELECT * FROM training_sessions ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn session_detail(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionDetail>, PersistenceError> {
        let session: Option<TrainingSessionRow> =
            sqlx::query_as("SELECT * FROM training_sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(session) = session else {
            return Ok(None);
        };
        let bars = sqlx::query_as::<_, BarHistoryRow>(
            "SELECT * FROM bar_history WHERE session_id = ? ORDER BY bar_id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        let trades = sqlx::query_as::<_, TradeHistoryRow>(
            "SELECT * FROM trade_history WHERE session_id = ? ORDER BY bar_id ASC, created_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(SessionDetail {
            session,
            bars,
            trades,
        }))
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM bar_history WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM trade_history WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM position_lots WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM training_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStartData;
    use rust_decimal_macros::dec;

    async fn memory_store() -> PersistenceStore {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new().connect_with(opts).await.unwrap();
        run_schema(&pool).await.unwrap();
        PersistenceStore { pool }
    }

    #[tokio::test]
    async fn start_and_fetch_session() {
        let store = memory_store().await;
        store
            .start_session(SessionStartData {
                session_id: "alice_20260101_000000".into(),
                instrument: "600519".into(),
                instrument_name: "贵州茅台".into(),
                start_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                mode: "random".into(),
                initial_capital: dec!(100000),
                commission_settings_json: "{}".into(),
            })
            .await
            .unwrap();
        let history = store.training_history(10, 0).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "active");
    }

    #[tokio::test]
    async fn zero_trade_completion_does_not_touch_statistics() {
        let store = memory_store().await;
        store
            .start_session(SessionStartData {
                session_id: "bob_20260101_000000".into(),
                instrument: "000001".into(),
                instrument_name: "平安银行".into(),
                start_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                mode: "random".into(),
                initial_capital: dec!(100000),
                commission_settings_json: "{}".into(),
            })
            .await
            .unwrap();
        store
            .complete_session(
                "bob",
                "bob_20260101_000000",
                SessionCompletion {
                    end_date: chrono::NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
                    final_capital: dec!(100000),
                    total_return: dec!(0),
                    max_drawdown: dec!(0),
                    total_trades: 0,
                    trade_win_rate: dec!(0),
                    session_win_rate: dec!(0),
                    total_bars: 20,
                    completed_bars: 20,
                    total_commission: dec!(0),
                    status: SessionStatus::Completed,
                },
            )
            .await
            .unwrap();
        let stats = store.user_statistics("bob").await.unwrap();
        assert_eq!(stats.total_sessions, 0);
    }

    #[tokio::test]
    async fn completion_rolls_up_weighted_statistics() {
        let store = memory_store().await;
        for (i, (trades, win_rate, ret)) in
            [(4i64, dec!(0.5), dec!(0.1)), (6i64, dec!(0.8333), dec!(0.2))]
                .into_iter()
                .enumerate()
        {
            let session_id = format!("carol_2026010{}_000000", i + 1);
            store
                .start_session(SessionStartData {
                    session_id: session_id.clone(),
                    instrument: "600519".into(),
                    instrument_name: "贵州茅台".into(),
                    start_date: chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    mode: "random".into(),
                    initial_capital: dec!(100000),
                    commission_settings_json: "{}".into(),
                })
                .await
                .unwrap();
            store
                .complete_session(
                    "carol",
                    &session_id,
                    SessionCompletion {
                        end_date: chrono::NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
                        final_capital: dec!(100000) * (Decimal::ONE + ret),
                        total_return: ret,
                        max_drawdown: dec!(0.05),
                        total_trades: trades,
                        trade_win_rate: win_rate,
                        session_win_rate: if ret > Decimal::ZERO { dec!(1) } else { dec!(0) },
                        total_bars: 20,
                        completed_bars: 20,
                        total_commission: dec!(10),
                        status: SessionStatus::Completed,
                    },
                )
                .await
                .unwrap();
        }
        let stats = store.user_statistics("carol").await.unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_trades, 10);
        assert_eq!(stats.best_return, dec!(0.2));
        assert_eq!(stats.worst_return, dec!(0.1));
    }
}
