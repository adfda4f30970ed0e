use std::collections::VecDeque;

use chrono::{Days, NaiveDate, Utc};
use core_types::TradeAction;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::commission::{commission, stamp_tax};
use crate::error::TradeError;
use crate::models::{AccountInfo, LotStatus, PositionLot, PositionSummary, Report, TradeRecord};

const SHARES_PER_LOT: i64 = 100;

/// FIFO lot-tracking ledger for one session's simulated brokerage account.
/// Enforces T+1 settlement, commission/stamp-tax schedules, and incremental
/// mark-to-market against `current_price`.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    instrument: String,
    initial_capital: Decimal,
    current_capital: Decimal,
    current_price: Decimal,
    current_bar_id: i64,
    position_lots: Vec<PositionLot>,
    trade_history: Vec<TradeRecord>,
    commission_rate: Decimal,
    min_commission: Decimal,
    stamp_tax_rate: Decimal,
}

impl TradeLedger {
    pub fn new(
        instrument: impl Into<String>,
        initial_capital: Decimal,
        commission_rate: Decimal,
        min_commission: Decimal,
        stamp_tax_rate: Decimal,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            initial_capital,
            current_capital: initial_capital,
            current_price: Decimal::ZERO,
            current_bar_id: 0,
            position_lots: Vec::new(),
            trade_history: Vec::new(),
            commission_rate,
            min_commission,
            stamp_tax_rate,
        }
    }

    fn total_shares(&self) -> i64 {
        self.position_lots
            .iter()
            .filter(|l| l.status == LotStatus::Active)
            .map(|l| l.quantity_shares)
            .sum()
    }

    fn total_cost(&self) -> Decimal {
        self.position_lots
            .iter()
            .filter(|l| l.status == LotStatus::Active)
            .map(|l| Decimal::from(l.quantity_shares) * l.cost_price)
            .sum()
    }

    fn average_cost(&self) -> Decimal {
        let shares = self.total_shares();
        if shares == 0 {
            Decimal::ZERO
        } else {
            (self.total_cost() / Decimal::from(shares)).round_dp(4)
        }
    }

    fn market_value(&self) -> Decimal {
        Decimal::from(self.total_shares()) * self.current_price
    }

    fn available_shares_at(&self, date: NaiveDate) -> i64 {
        self.position_lots
            .iter()
            .filter(|l| l.status == LotStatus::Active && l.available_date <= date)
            .map(|l| l.quantity_shares)
            .sum()
    }

    /// Largest `q >= 0` such that a hypothetical buy of `q` lots at
    /// `current_price` still leaves `current_capital >= 0`, found by binary
    /// search over `[0, floor(current_capital/(current_price*100))]`.
    pub fn max_buyable_lots(&self) -> i64 {
        if self.current_price <= Decimal::ZERO {
            return 0;
        }
        let upper = (self.current_capital / (self.current_price * Decimal::from(SHARES_PER_LOT)))
            .floor()
            .to_i64()
            .unwrap_or(0)
            .max(0);

        let affordable = |q: i64| -> bool {
            if q == 0 {
                return true;
            }
            let amount = self.current_price * Decimal::from(q * SHARES_PER_LOT);
            let fee = commission(amount, self.commission_rate, self.min_commission);
            amount + fee <= self.current_capital
        };

        let (mut lo, mut hi) = (0i64, upper);
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            if affordable(mid) {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        lo
    }

    pub fn buy(&mut self, lots: i64, price: Decimal, date: NaiveDate) -> Result<&TradeRecord, TradeError> {
        if lots <= 0 {
            return Err(TradeError::InvalidQuantity);
        }
        let max_buyable = self.max_buyable_lots();
        if lots > max_buyable {
            return Err(TradeError::ExceedsMaxBuyable {
                requested: lots,
                max_buyable,
            });
        }

        let shares = lots * SHARES_PER_LOT;
        let amount = price * Decimal::from(shares);
        let fee = commission(amount, self.commission_rate, self.min_commission);
        let net_amount = amount + fee;

        if net_amount > self.current_capital {
            return Err(TradeError::InsufficientFunds {
                required: net_amount,
                available: self.current_capital,
            });
        }

        self.current_capital -= net_amount;

        let available_date = date
            .checked_add_days(Days::new(1))
            .unwrap_or(date);
        self.position_lots.push(PositionLot {
            instrument: self.instrument.clone(),
            quantity_shares: shares,
            cost_price: price,
            buy_date: date,
            buy_bar_id: self.current_bar_id,
            available_date,
            status: LotStatus::Active,
        });

        self.trade_history.push(TradeRecord {
            instrument: self.instrument.clone(),
            action: TradeAction::Buy,
            quantity_lots: lots,
            price,
            amount,
            commission: fee,
            stamp_tax: Decimal::ZERO,
            net_amount,
            trade_date: date,
            bar_id: self.current_bar_id,
            timestamp: Utc::now(),
        });

        Ok(self.trade_history.last().unwrap())
    }

    pub fn sell(&mut self, lots: i64, price: Decimal, date: NaiveDate) -> Result<&TradeRecord, TradeError> {
        if lots <= 0 {
            return Err(TradeError::InvalidQuantity);
        }
        let requested_shares = lots * SHARES_PER_LOT;
        let available_shares = self.available_shares_at(date);
        if requested_shares > available_shares {
            return Err(TradeError::InsufficientAvailableShares {
                requested_shares,
                available_shares,
            });
        }

        let amount = price * Decimal::from(requested_shares);
        let fee = commission(amount, self.commission_rate, self.min_commission);
        let tax = stamp_tax(amount, self.stamp_tax_rate);
        let net_amount = amount - fee - tax;

        // Consume lots FIFO by ascending buy_bar_id, restricted to those
        // already settled by `date`.
        let mut remaining = requested_shares;
        let mut order: Vec<usize> = (0..self.position_lots.len())
            .filter(|&i| {
                self.position_lots[i].status == LotStatus::Active
                    && self.position_lots[i].available_date <= date
            })
            .collect();
        order.sort_by_key(|&i| self.position_lots[i].buy_bar_id);

        for i in order {
            if remaining == 0 {
                break;
            }
            let lot = &mut self.position_lots[i];
            let take = remaining.min(lot.quantity_shares);
            lot.quantity_shares -= take;
            remaining -= take;
            if lot.quantity_shares == 0 {
                lot.status = LotStatus::Sold;
            }
        }

        self.current_capital += net_amount;

        self.trade_history.push(TradeRecord {
            instrument: self.instrument.clone(),
            action: TradeAction::Sell,
            quantity_lots: lots,
            price,
            amount,
            commission: fee,
            stamp_tax: tax,
            net_amount,
            trade_date: date,
            bar_id: self.current_bar_id,
            timestamp: Utc::now(),
        });

        Ok(self.trade_history.last().unwrap())
    }

    pub fn update_current_price(&mut self, price: Decimal, bar_id: i64) {
        self.current_price = price;
        self.current_bar_id = bar_id;
    }

    fn position_summary(&self) -> PositionSummary {
        let total_shares = self.total_shares();
        let total_cost = self.total_cost();
        let average_cost = self.average_cost();
        let market_value = self.market_value();
        let floating_pnl = market_value - total_cost;
        let pnl_percent = if total_cost.is_zero() {
            Decimal::ZERO
        } else {
            (floating_pnl / total_cost * Decimal::from(100)).round_dp(2)
        };
        PositionSummary {
            total_shares,
            total_cost,
            average_cost,
            market_value,
            floating_pnl,
            pnl_percent,
            lots: self
                .position_lots
                .iter()
                .filter(|l| l.status == LotStatus::Active)
                .cloned()
                .collect(),
        }
    }

    pub fn account_info(&self) -> AccountInfo {
        let market_value = self.market_value();
        let total_cost = self.total_cost();
        let total_assets = self.current_capital + market_value;
        let total_return = if self.initial_capital.is_zero() {
            Decimal::ZERO
        } else {
            ((total_assets - self.initial_capital) / self.initial_capital * Decimal::from(100))
                .round_dp(2)
        };
        AccountInfo {
            total_assets,
            available_cash: self.current_capital,
            position_value: market_value,
            floating_pnl: market_value - total_cost,
            initial_capital: self.initial_capital,
            total_return,
            current_bar_id: self.current_bar_id,
            max_buyable_lots: self.max_buyable_lots(),
            position_summary: self.position_summary(),
        }
    }

    pub fn trade_history(&self) -> &[TradeRecord] {
        &self.trade_history
    }

    pub fn generate_report(&self, start_date: NaiveDate, end_date: NaiveDate) -> Report {
        let account = self.account_info();
        let (win_count, total_completed) = match_realized_pnl(&self.trade_history);
        let total_sell_trades = self
            .trade_history
            .iter()
            .filter(|t| t.action == TradeAction::Sell)
            .count() as i64;
        let trade_win_rate = if total_completed == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(win_count) / Decimal::from(total_completed) * Decimal::from(100))
                .round_dp(2)
        };
        let session_win_rate = if account.total_assets > self.initial_capital {
            Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        let total_commission: Decimal = self.trade_history.iter().map(|t| t.commission).sum();
        let total_stamp_tax: Decimal = self.trade_history.iter().map(|t| t.stamp_tax).sum();

        Report {
            account,
            instrument: self.instrument.clone(),
            start_date,
            end_date,
            total_trades: self.trade_history.len() as i64,
            trade_win_rate,
            win_count,
            total_sell_trades,
            session_win_rate,
            total_commission,
            total_stamp_tax,
        }
    }

    pub fn reset(&mut self) {
        self.current_capital = self.initial_capital;
        self.current_price = Decimal::ZERO;
        self.current_bar_id = 0;
        self.position_lots.clear();
        self.trade_history.clear();
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }
}

struct OpenBatch {
    remaining_quantity: i64,
    remaining_net_cost: Decimal,
}

/// FIFO realized-PnL matcher: walks the buy/sell trade history, slicing each
/// sell against open buy batches front-to-back. Returns `(win_count,
/// total_completed)`.
fn match_realized_pnl(trades: &[TradeRecord]) -> (i64, i64) {
    let mut queue: VecDeque<OpenBatch> = VecDeque::new();
    let mut win_count = 0i64;
    let mut total_completed = 0i64;

    for trade in trades {
        match trade.action {
            TradeAction::Buy => queue.push_back(OpenBatch {
                remaining_quantity: trade.quantity_lots,
                remaining_net_cost: trade.net_amount,
            }),
            TradeAction::Sell => {
                let mut sell_left = trade.quantity_lots;
                let unit_sell = if trade.quantity_lots == 0 {
                    Decimal::ZERO
                } else {
                    trade.net_amount / Decimal::from(trade.quantity_lots)
                };
                while sell_left > 0 {
                    let Some(batch) = queue.front_mut() else { break };
                    let slice = sell_left.min(batch.remaining_quantity);
                    if slice == 0 {
                        break;
                    }
                    let unit_buy = batch.remaining_net_cost / Decimal::from(batch.remaining_quantity);
                    let profit = (unit_sell - unit_buy) * Decimal::from(slice);

                    total_completed += 1;
                    if profit > Decimal::ZERO {
                        win_count += 1;
                    }

                    batch.remaining_quantity -= slice;
                    batch.remaining_net_cost -= unit_buy * Decimal::from(slice);
                    sell_left -= slice;
                    if batch.remaining_quantity == 0 {
                        queue.pop_front();
                    }
                }
            }
        }
    }

    (win_count, total_completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger() -> TradeLedger {
        TradeLedger::new("000001", dec!(100000), dec!(0.0003), dec!(5), dec!(0.001))
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn fifo_partial_fill_scenario() {
        let mut l = ledger();
        l.update_current_price(dec!(10.00), 1);
        l.buy(2, dec!(10.00), d(2024, 1, 1)).unwrap();
        l.update_current_price(dec!(12.00), 2);
        l.buy(1, dec!(12.00), d(2024, 1, 2)).unwrap();
        l.update_current_price(dec!(15.00), 3);
        l.sell(2, dec!(15.00), d(2024, 1, 3)).unwrap();

        let report = l.generate_report(d(2024, 1, 1), d(2024, 1, 3));
        assert_eq!(report.win_count, 1);
        assert_eq!(report.trade_win_rate, dec!(100.00));

        let active: Vec<_> = l
            .position_lots
            .iter()
            .filter(|p| p.status == LotStatus::Active)
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].quantity_shares, 100);
        assert_eq!(active[0].cost_price, dec!(12.00));
    }

    #[test]
    fn t_plus_one_blocks_same_day_sell() {
        let mut l = ledger();
        l.update_current_price(dec!(20.00), 1);
        l.buy(1, dec!(20.00), d(2024, 1, 2)).unwrap();

        let err = l.sell(1, dec!(20.00), d(2024, 1, 2)).unwrap_err();
        assert!(matches!(err, TradeError::InsufficientAvailableShares { .. }));

        assert!(l.sell(1, dec!(20.00), d(2024, 1, 3)).is_ok());
    }

    #[test]
    fn max_buyable_boundary() {
        let mut l = TradeLedger::new("000001", dec!(10000), dec!(0.0003), dec!(5), dec!(0.001));
        l.update_current_price(dec!(33.33), 1);
        assert_eq!(l.max_buyable_lots(), 2);
    }

    #[test]
    fn buy_rejects_zero_quantity() {
        let mut l = ledger();
        l.update_current_price(dec!(10.00), 1);
        assert!(matches!(l.buy(0, dec!(10.00), d(2024, 1, 1)), Err(TradeError::InvalidQuantity)));
    }
}
