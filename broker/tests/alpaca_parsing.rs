//! Tests for Alpaca API response parsing and conversions. No live connection needed.

#[cfg(feature = "alpaca")]
mod alpaca_tests {
    use chrono::{NaiveDate, Timelike};
    use trendbook::Symbol;
    use trendbook_broker::alpaca::types::{
        AccountResponse, BarsResponse, CalendarDay, ClockResponse, LatestTradeResponse,
        OrderRequest, OrderResponse, PositionResponse,
    };
    use trendbook_broker::alpaca::{parse_cents, parse_whole_shares, to_open_order, to_position};
    use trendbook_broker::{BrokerOrder, BrokerSide};

    // ========================================================================
    // Amounts
    // ========================================================================

    #[test]
    fn cents_round_to_nearest() {
        assert_eq!(parse_cents("185.50").unwrap(), 185_50);
        assert_eq!(parse_cents("0.005").unwrap(), 1);
        assert_eq!(parse_cents(" 10000 ").unwrap(), 10_000_00);
        assert!(parse_cents("abc").is_err());
    }

    #[test]
    fn whole_shares_truncate() {
        assert_eq!(parse_whole_shares("10").unwrap(), 10);
        assert_eq!(parse_whole_shares("10.75").unwrap(), 10);
        assert!(parse_whole_shares("").is_err());
    }

    // ========================================================================
    // Account / positions / orders
    // ========================================================================

    #[test]
    fn parse_account() {
        let json = r#"{
            "id": "904837e3-3b76-47ec-b432-046db621571b",
            "portfolio_value": "10000.00",
            "buying_power": "20000.00",
            "cash": "10000.00",
            "trading_blocked": false
        }"#;
        let acct: AccountResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parse_cents(&acct.buying_power).unwrap(), 20_000_00);
        assert!(!acct.trading_blocked);
    }

    #[test]
    fn parse_position() {
        let json = r#"{
            "asset_id": "x",
            "symbol": "AAPL",
            "qty": "45",
            "market_value": "8550.00",
            "current_price": "190.00",
            "avg_entry_price": "180.12",
            "side": "long"
        }"#;
        let raw: PositionResponse = serde_json::from_str(json).unwrap();
        let pos = to_position(&raw).unwrap();
        assert_eq!(pos.symbol, Symbol::new("AAPL"));
        assert_eq!(pos.quantity, 45);
        assert_eq!(pos.market_value_cents, 8_550_00);
        assert_eq!(pos.current_price_cents, 190_00);
    }

    #[test]
    fn position_with_long_symbol_is_rejected() {
        let raw = PositionResponse {
            symbol: "WAYTOOLONG".into(),
            qty: "1".into(),
            market_value: "1".into(),
            current_price: "1".into(),
            avg_entry_price: "1".into(),
        };
        assert!(to_position(&raw).is_err());
    }

    #[test]
    fn parse_open_order() {
        let json = r#"{
            "id": "61e69015-8549-4bfd-b9c3-01e75843f47d",
            "symbol": "MSFT",
            "qty": "3",
            "side": "sell",
            "type": "market",
            "status": "new"
        }"#;
        let raw: OrderResponse = serde_json::from_str(json).unwrap();
        let order = to_open_order(&raw).unwrap();
        assert_eq!(order.side, BrokerSide::Sell);
        assert_eq!(order.quantity, 3);
        assert_eq!(order.id.0, "61e69015-8549-4bfd-b9c3-01e75843f47d");
    }

    #[test]
    fn notional_order_without_qty() {
        let json = r#"{"id":"a","symbol":"SPY","qty":null,"side":"buy","status":"new"}"#;
        let raw: OrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(to_open_order(&raw).unwrap().quantity, 0);
    }

    #[test]
    fn serialize_market_order() {
        let order = BrokerOrder::market_day(Symbol::new("AAPL"), BrokerSide::Buy, 45);
        let req = OrderRequest {
            symbol: order.symbol.as_str(),
            qty: order.quantity.to_string(),
            side: order.side.as_str(),
            order_type: order.order_type.as_str(),
            time_in_force: order.time_in_force.as_str(),
        };
        let v: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(v["type"], "market");
        assert_eq!(v["time_in_force"], "day");
        assert_eq!(v["qty"], "45");
        assert_eq!(v["side"], "buy");
    }

    // ========================================================================
    // Clock / calendar / market data
    // ========================================================================

    #[test]
    fn parse_clock_keeps_exchange_time() {
        let json = r#"{
            "timestamp": "2024-03-15T10:21:56.582318528-04:00",
            "is_open": true,
            "next_open": "2024-03-18T09:30:00-04:00",
            "next_close": "2024-03-15T16:00:00-04:00"
        }"#;
        let clock: ClockResponse = serde_json::from_str(json).unwrap();
        assert!(clock.is_open);
        assert_eq!(clock.timestamp.naive_local().hour(), 10);
        assert_eq!(clock.next_open.naive_local().hour(), 9);
        assert_eq!(clock.next_close.naive_local().hour(), 16);
    }

    #[test]
    fn parse_calendar() {
        let json = r#"[{"date":"2024-07-03","open":"09:30","close":"13:00"}]"#;
        let days: Vec<CalendarDay> = serde_json::from_str(json).unwrap();
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 7, 3).unwrap());
        assert_eq!(days[0].close, "13:00");
    }

    #[test]
    fn parse_latest_trade() {
        let json = r#"{"symbol":"AAPL","trade":{"t":"2024-03-15T19:59:59Z","p":172.62,"s":100}}"#;
        let t: LatestTradeResponse = serde_json::from_str(json).unwrap();
        assert_eq!(t.trade.p, 172.62);
    }

    #[test]
    fn parse_bars_page() {
        let json = r#"{
            "bars": {
                "AAPL": [
                    {"t":"2024-01-02T05:00:00Z","o":1,"h":1,"l":1,"c":185.64,"v":1},
                    {"t":"2024-01-03T05:00:00Z","o":1,"h":1,"l":1,"c":184.25,"v":1}
                ]
            },
            "next_page_token": null
        }"#;
        let page: BarsResponse = serde_json::from_str(json).unwrap();
        let bars = page.bars.unwrap();
        assert_eq!(bars["AAPL"].len(), 2);
        assert_eq!(
            bars["AAPL"][0].t.date_naive(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn parse_empty_bars_page() {
        let page: BarsResponse = serde_json::from_str(r#"{"bars":null}"#).unwrap();
        assert!(page.bars.is_none());
    }
}
