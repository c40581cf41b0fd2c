// =============================================================================
// Instrument Universe — CSV dump parsing, ATM resolution, owned cache
// =============================================================================
//
// The broker publishes the tradable contract universe as a CSV dump per
// exchange segment. Resolution walks that snapshot: round spot to the nearest
// strike, take the nearest future expiry for the underlying, and match the
// (name, expiry, strike, CE|PE) tuple.
//
// The cache is an owned object handed to the router — not process-global
// state — and it is refreshable: a snapshot counts as stale once its nearest
// cached expiry has passed, so contract lists do not rot across expiry
// rollovers in a long-running process.
// =============================================================================

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::types::OptionSide;

// ---------------------------------------------------------------------------
// Instrument model
// ---------------------------------------------------------------------------

/// One tradable contract from the broker's instrument dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub tradingsymbol: String,
    /// Underlying name, e.g. "NIFTY".
    pub name: String,
    pub expiry: NaiveDate,
    pub strike: f64,
    /// "CE", "PE", or "FUT".
    pub instrument_type: String,
    pub exchange: String,
    pub lot_size: u32,
}

/// Raw CSV row as the broker serialises it; converted into [`Instrument`]
/// after validating the expiry.
#[derive(Debug, Deserialize)]
struct RawInstrumentRecord {
    tradingsymbol: String,
    name: String,
    expiry: String,
    strike: f64,
    instrument_type: String,
    exchange: String,
    #[serde(default)]
    lot_size: u32,
}

/// Parse a broker instrument CSV dump.
///
/// Rows without a parseable expiry (cash equities, indices) are dropped —
/// only dated contracts participate in option resolution.
pub fn parse_instrument_dump<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<Instrument>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut instruments = Vec::new();
    let mut undated = 0usize;

    for record in rdr.deserialize::<RawInstrumentRecord>() {
        let raw = match record {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "skipping malformed instrument row");
                continue;
            }
        };

        match NaiveDate::parse_from_str(raw.expiry.trim(), "%Y-%m-%d") {
            Ok(expiry) => instruments.push(Instrument {
                tradingsymbol: raw.tradingsymbol,
                name: raw.name,
                expiry,
                strike: raw.strike,
                instrument_type: raw.instrument_type,
                exchange: raw.exchange,
                lot_size: raw.lot_size,
            }),
            Err(_) => undated += 1,
        }
    }

    debug!(
        dated = instruments.len(),
        undated, "instrument dump parsed"
    );
    Ok(instruments)
}

// ---------------------------------------------------------------------------
// ATM resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("no {name} expiry on or after {today} in the instrument universe")]
    NoExpiry { name: String, today: NaiveDate },

    #[error("no {name} {expiry} {strike} {instrument_type} contract in the instrument universe")]
    NotFound {
        name: String,
        expiry: NaiveDate,
        strike: f64,
        instrument_type: &'static str,
    },
}

/// Round `spot` to the nearest strike on a `step` grid.
pub fn round_to_strike(spot: f64, step: f64) -> f64 {
    (spot / step).round() * step
}

/// Nearest expiry on or after `today` for contracts named `name`.
pub fn nearest_expiry(instruments: &[Instrument], name: &str, today: NaiveDate) -> Option<NaiveDate> {
    instruments
        .iter()
        .filter(|i| i.name == name && i.expiry >= today)
        .map(|i| i.expiry)
        .min()
}

/// Resolve the at-the-money contract for `side` at the given spot price.
pub fn resolve_atm(
    instruments: &[Instrument],
    name: &str,
    side: OptionSide,
    spot: f64,
    strike_step: f64,
    today: NaiveDate,
) -> Result<Instrument, ResolveError> {
    let strike = round_to_strike(spot, strike_step);
    let expiry = nearest_expiry(instruments, name, today).ok_or_else(|| ResolveError::NoExpiry {
        name: name.to_string(),
        today,
    })?;

    let wanted_type = side.instrument_type();

    instruments
        .iter()
        .find(|i| {
            i.name == name
                && i.expiry == expiry
                && i.strike == strike
                && i.instrument_type == wanted_type
        })
        .cloned()
        .ok_or(ResolveError::NotFound {
            name: name.to_string(),
            expiry,
            strike,
            instrument_type: wanted_type,
        })
}

// ---------------------------------------------------------------------------
// Owned, refreshable cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedUniverse {
    instruments: Vec<Instrument>,
    fetched_at: DateTime<Utc>,
}

/// Process-lifetime cache of the instrument universe for one exchange
/// segment, with an explicit refresh policy.
pub struct InstrumentCache {
    exchange: String,
    inner: RwLock<Option<CachedUniverse>>,
}

impl InstrumentCache {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            inner: RwLock::new(None),
        }
    }

    /// Replace the cached universe (initial fill, refresh, or test setup).
    pub fn install(&self, instruments: Vec<Instrument>) {
        info!(
            exchange = %self.exchange,
            count = instruments.len(),
            "instrument universe cached"
        );
        *self.inner.write() = Some(CachedUniverse {
            instruments,
            fetched_at: Utc::now(),
        });
    }

    /// Clone of the cached universe, if any.
    pub fn snapshot(&self) -> Option<Vec<Instrument>> {
        self.inner.read().as_ref().map(|c| c.instruments.clone())
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().as_ref().map(|c| c.fetched_at)
    }

    /// Whether the cache needs a refresh before resolving against it.
    ///
    /// The snapshot is stale when it is empty, or when the nearest expiry it
    /// holds for `name` has already passed — after a rollover the cached
    /// contract list no longer contains the front expiry.
    pub fn is_stale(&self, name: &str, today: NaiveDate) -> bool {
        let guard = self.inner.read();
        match guard.as_ref() {
            None => true,
            Some(cached) => nearest_expiry(&cached.instruments, name, today).is_none(),
        }
    }
}

impl std::fmt::Debug for InstrumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self
            .inner
            .read()
            .as_ref()
            .map(|c| c.instruments.len())
            .unwrap_or(0);
        f.debug_struct("InstrumentCache")
            .field("exchange", &self.exchange)
            .field("instruments", &count)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn contract(expiry: &str, strike: f64, instrument_type: &str) -> Instrument {
        let expiry = NaiveDate::parse_from_str(expiry, "%Y-%m-%d").unwrap();
        Instrument {
            tradingsymbol: format!(
                "NIFTY{}{}{}",
                expiry.format("%y%b").to_string().to_uppercase(),
                strike as i64,
                instrument_type
            ),
            name: "NIFTY".to_string(),
            expiry,
            strike,
            instrument_type: instrument_type.to_string(),
            exchange: "NFO".to_string(),
            lot_size: 50,
        }
    }

    fn universe() -> Vec<Instrument> {
        vec![
            contract("2026-08-13", 10450.0, "CE"),
            contract("2026-08-13", 10500.0, "CE"),
            contract("2026-08-13", 10500.0, "PE"),
            contract("2026-08-13", 10550.0, "CE"),
            contract("2026-08-20", 10500.0, "CE"),
        ]
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
    }

    #[test]
    fn rounds_spot_to_nearest_strike() {
        assert_eq!(round_to_strike(10523.0, 50.0), 10500.0);
        assert_eq!(round_to_strike(10525.0, 50.0), 10550.0);
        assert_eq!(round_to_strike(10476.0, 50.0), 10500.0);
        assert_eq!(round_to_strike(10474.9, 50.0), 10450.0);
    }

    #[test]
    fn resolves_atm_call() {
        let ins = resolve_atm(&universe(), "NIFTY", OptionSide::Call, 10523.0, 50.0, today())
            .unwrap();
        assert_eq!(ins.strike, 10500.0);
        assert_eq!(ins.instrument_type, "CE");
        // Nearest expiry wins over the later weekly.
        assert_eq!(ins.expiry, NaiveDate::from_ymd_opt(2026, 8, 13).unwrap());
    }

    #[test]
    fn resolves_atm_put() {
        let ins = resolve_atm(&universe(), "NIFTY", OptionSide::Put, 10523.0, 50.0, today())
            .unwrap();
        assert_eq!(ins.instrument_type, "PE");
        assert_eq!(ins.strike, 10500.0);
    }

    #[test]
    fn missing_contract_is_not_found() {
        // 10600 CE does not exist in the universe.
        let err = resolve_atm(&universe(), "NIFTY", OptionSide::Call, 10601.0, 50.0, today())
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { strike, .. } if strike == 10600.0));
    }

    #[test]
    fn no_future_expiry_is_an_error() {
        let late = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let err =
            resolve_atm(&universe(), "NIFTY", OptionSide::Call, 10500.0, 50.0, late).unwrap_err();
        assert!(matches!(err, ResolveError::NoExpiry { .. }));
    }

    #[test]
    fn parse_dump_keeps_dated_rows_only() {
        let csv = "\
instrument_token,exchange_token,tradingsymbol,name,last_price,expiry,strike,tick_size,lot_size,instrument_type,segment,exchange
9604354,37517,NIFTY26AUG10500CE,NIFTY,0,2026-08-13,10500.0,0.05,50,CE,NFO-OPT,NFO
9604610,37518,NIFTY26AUG10500PE,NIFTY,0,2026-08-13,10500.0,0.05,50,PE,NFO-OPT,NFO
256265,1001,NIFTY 50,NIFTY 50,0,,0.0,0.05,0,EQ,INDICES,NSE
";
        let instruments = parse_instrument_dump(csv.as_bytes()).unwrap();
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].tradingsymbol, "NIFTY26AUG10500CE");
        assert_eq!(instruments[0].lot_size, 50);
    }

    #[test]
    fn cache_staleness_tracks_expiry_rollover() {
        let cache = InstrumentCache::new("NFO");
        assert!(cache.is_stale("NIFTY", today()));

        cache.install(universe());
        assert!(!cache.is_stale("NIFTY", today()));

        // Past the last cached expiry the snapshot is stale again.
        let after_rollover = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        assert!(cache.is_stale("NIFTY", after_rollover));

        // Between the two cached expiries the snapshot still serves.
        let mid = NaiveDate::from_ymd_opt(2026, 8, 15).unwrap();
        assert!(!cache.is_stale("NIFTY", mid));
    }

    #[test]
    fn snapshot_roundtrip() {
        let cache = InstrumentCache::new("NFO");
        assert!(cache.snapshot().is_none());
        cache.install(universe());
        assert_eq!(cache.snapshot().unwrap().len(), universe().len());
    }
}
