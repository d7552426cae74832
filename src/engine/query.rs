//! Filter, sort, and pagination over record snapshots
//!
//! Pure functions so the query path can be exercised without any upstream
//! or cache in place. Invalid caller input never errors: unknown sort
//! fields and periods have already been defaulted by the parse layer, and
//! an undecodable cursor reads as offset zero.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::types::{
    Pagination, SortDirection, SortField, SortSpec, TimePeriod, TokenFilter, TokenPage,
    TokenRecord,
};

/// Encode a sequence offset as an opaque cursor (base64 of the decimal).
pub fn encode_cursor(offset: usize) -> String {
    BASE64.encode(offset.to_string())
}

/// Decode a cursor back to an offset. Anything undecodable is offset zero.
///
/// Cursors are positional, not content-addressed: a mutation of the
/// underlying set between two requests can skip or repeat items.
pub fn decode_cursor(cursor: Option<&str>) -> usize {
    cursor
        .and_then(|c| BASE64.decode(c).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Apply all filter predicates, AND-combined.
pub fn apply_filter(records: Vec<TokenRecord>, filter: &TokenFilter) -> Vec<TokenRecord> {
    let needle = filter.search.as_ref().map(|s| s.to_lowercase());

    records
        .into_iter()
        .filter(|rec| {
            let volume = rec.volume_for(filter.period);
            if let Some(min) = filter.min_volume {
                if volume < min {
                    return false;
                }
            }
            if let Some(max) = filter.max_volume {
                if volume > max {
                    return false;
                }
            }
            if let Some(min) = filter.min_market_cap {
                if rec.market_cap_usd < min {
                    return false;
                }
            }
            if let Some(max) = filter.max_market_cap {
                if rec.market_cap_usd > max {
                    return false;
                }
            }
            if let Some(min) = filter.min_liquidity {
                if rec.liquidity_usd < min {
                    return false;
                }
            }
            if let Some(protocol) = &filter.protocol {
                if !rec.protocol.eq_ignore_ascii_case(protocol) {
                    return false;
                }
            }
            if let Some(chain) = &filter.chain {
                if !rec.chain.eq_ignore_ascii_case(chain) {
                    return false;
                }
            }
            if let Some(needle) = &needle {
                if !rec.matches_text(needle) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Sort in place. `sort_by` is stable, so ties keep the underlying order.
pub fn sort_records(records: &mut [TokenRecord], sort: SortSpec, period: TimePeriod) {
    records.sort_by(|a, b| {
        let ordering = match sort.field {
            SortField::Volume => a.volume_for(period).total_cmp(&b.volume_for(period)),
            SortField::PriceChange => a
                .price_change_for(period)
                .total_cmp(&b.price_change_for(period)),
            SortField::MarketCap => a.market_cap_usd.total_cmp(&b.market_cap_usd),
            SortField::Liquidity => a.liquidity_usd.total_cmp(&b.liquidity_usd),
            SortField::TxCount => a.tx_count.cmp(&b.tx_count),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Cut one page out of the filtered+sorted sequence.
pub fn paginate(records: Vec<TokenRecord>, page: &Pagination, cache_hit: bool) -> TokenPage {
    let total = records.len();
    let limit = page.limit.max(1);
    let start = decode_cursor(page.cursor.as_deref()).min(total);
    let end = (start + limit).min(total);
    let has_more = end < total;

    TokenPage {
        tokens: records[start..end].to_vec(),
        total,
        next_cursor: if has_more {
            Some(encode_cursor(end))
        } else {
            None
        },
        prev_cursor: if start > 0 {
            Some(encode_cursor(start.saturating_sub(limit)))
        } else {
            None
        },
        cache_hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(address: &str, volume_24h: f64, market_cap: f64) -> TokenRecord {
        let mut rec = TokenRecord::empty(address);
        rec.volume_24h_usd = volume_24h;
        rec.volume_usd = volume_24h;
        rec.market_cap_usd = market_cap;
        rec.chain = "solana".to_string();
        rec.protocol = "raydium".to_string();
        rec
    }

    #[test]
    fn test_cursor_round_trip() {
        for offset in [0usize, 42, 100_000] {
            let cursor = encode_cursor(offset);
            assert_eq!(decode_cursor(Some(cursor.as_str())), offset);
        }
    }

    #[test]
    fn test_invalid_cursor_reads_as_zero() {
        assert_eq!(decode_cursor(None), 0);
        assert_eq!(decode_cursor(Some("!!!not-base64!!!")), 0);
        // Valid base64 but not a number
        let non_numeric = BASE64.encode("abc");
        assert_eq!(decode_cursor(Some(non_numeric.as_str())), 0);
    }

    #[test]
    fn test_contradictory_range_filters_yield_nothing() {
        let records = vec![record("a", 700.0, 0.0), record("b", 2000.0, 0.0)];
        let filter = TokenFilter {
            min_volume: Some(1000.0),
            max_volume: Some(500.0),
            ..Default::default()
        };
        assert!(apply_filter(records, &filter).is_empty());
    }

    #[test]
    fn test_filters_and_combine() {
        let mut a = record("a", 5000.0, 1_000_000.0);
        a.liquidity_usd = 40_000.0;
        let mut b = record("b", 5000.0, 1_000_000.0);
        b.liquidity_usd = 400.0;
        let c = record("c", 50.0, 1_000_000.0);

        let filter = TokenFilter {
            min_volume: Some(1000.0),
            min_liquidity: Some(10_000.0),
            ..Default::default()
        };
        let out = apply_filter(vec![a, b, c], &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].address, "a");
    }

    #[test]
    fn test_protocol_and_chain_match_case_insensitively() {
        let records = vec![record("a", 1.0, 0.0)];
        let filter = TokenFilter {
            protocol: Some("Raydium".to_string()),
            chain: Some("SOLANA".to_string()),
            ..Default::default()
        };
        assert_eq!(apply_filter(records, &filter).len(), 1);
    }

    #[test]
    fn test_volume_filter_uses_period_with_generic_fallback() {
        // 1h volume never reported: the generic figure is what gets ranged
        let mut rec = record("a", 0.0, 0.0);
        rec.volume_usd = 800.0;
        let filter = TokenFilter {
            min_volume: Some(500.0),
            period: TimePeriod::H1,
            ..Default::default()
        };
        assert_eq!(apply_filter(vec![rec], &filter).len(), 1);
    }

    #[test]
    fn test_text_search_filter() {
        let mut a = record("MintAAA", 1.0, 0.0);
        a.name = "Dogwifhat".to_string();
        a.symbol = "WIF".to_string();
        let b = record("MintBBB", 1.0, 0.0);

        let filter = TokenFilter {
            search: Some("wif".to_string()),
            ..Default::default()
        };
        let out = apply_filter(vec![a, b], &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].address, "MintAAA");
    }

    #[test]
    fn test_sort_by_volume_desc() {
        let mut records = vec![
            record("low", 10.0, 0.0),
            record("high", 1000.0, 0.0),
            record("mid", 100.0, 0.0),
        ];
        sort_records(&mut records, SortSpec::default(), TimePeriod::H24);
        let order: Vec<_> = records.iter().map(|r| r.address.as_str()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_sort_by_created_at_asc() {
        let mut a = record("older", 0.0, 0.0);
        a.created_at = 100;
        let mut b = record("newer", 0.0, 0.0);
        b.created_at = 200;

        let mut records = vec![b, a];
        sort_records(
            &mut records,
            SortSpec {
                field: SortField::CreatedAt,
                direction: SortDirection::Asc,
            },
            TimePeriod::H24,
        );
        assert_eq!(records[0].address, "older");
    }

    #[test]
    fn test_pagination_walk_visits_every_element_once() {
        // Follow next_cursor from the start; every record seen exactly once
        let records: Vec<TokenRecord> = (0..25)
            .map(|i| record(&format!("mint{:02}", i), i as f64, 0.0))
            .collect();

        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = paginate(
                records.clone(),
                &Pagination {
                    limit: 10,
                    cursor: cursor.clone(),
                },
                false,
            );
            seen.extend(page.tokens.iter().map(|r| r.address.clone()));
            assert_eq!(page.total, 25);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 25);
        let unique: std::collections::HashSet<_> = seen.iter().collect();
        assert_eq!(unique.len(), 25);
    }

    #[test]
    fn test_pagination_cursors() {
        let records: Vec<TokenRecord> =
            (0..10).map(|i| record(&format!("m{}", i), 0.0, 0.0)).collect();

        // First page: no prev, next points at the second page
        let first = paginate(
            records.clone(),
            &Pagination {
                limit: 4,
                cursor: None,
            },
            false,
        );
        assert_eq!(first.tokens.len(), 4);
        assert!(first.prev_cursor.is_none());
        assert_eq!(decode_cursor(first.next_cursor.as_deref()), 4);

        // Middle page: prev steps back a full page
        let second = paginate(
            records.clone(),
            &Pagination {
                limit: 4,
                cursor: first.next_cursor,
            },
            false,
        );
        assert_eq!(decode_cursor(second.prev_cursor.as_deref()), 0);
        assert_eq!(decode_cursor(second.next_cursor.as_deref()), 8);

        // Last page: short, no next
        let third = paginate(
            records,
            &Pagination {
                limit: 4,
                cursor: second.next_cursor,
            },
            false,
        );
        assert_eq!(third.tokens.len(), 2);
        assert!(third.next_cursor.is_none());
        assert_eq!(decode_cursor(third.prev_cursor.as_deref()), 4);
    }

    #[test]
    fn test_cursor_past_end_yields_empty_final_page() {
        let records: Vec<TokenRecord> =
            (0..3).map(|i| record(&format!("m{}", i), 0.0, 0.0)).collect();
        let page = paginate(
            records,
            &Pagination {
                limit: 10,
                cursor: Some(encode_cursor(50)),
            },
            false,
        );
        assert!(page.tokens.is_empty());
        assert!(page.next_cursor.is_none());
        assert_eq!(page.total, 3);
    }
}
