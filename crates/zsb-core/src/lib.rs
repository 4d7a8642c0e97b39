//! Core type aliases, identifiers, and constants for the survival backend.
//!
//! This crate provides the foundational types and locked configuration
//! parameters used throughout the zsb workspace.

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Wallet balances, prices, and fees.
pub type Gold = i64;
/// TCP/UDP port numbers handed to match servers.
pub type Port = u16;
/// Horde wave counter within a match.
pub type Wave = u32;
/// Position of a player in a lobby roster; doubles as the spawn slot.
pub type SpawnIndex = usize;
/// Item stack counts.
pub type StackCount = u32;
/// Item wear in [0, 1].
pub type Durability = f32;
/// Trader standing in [-1, 1].
pub type Reputation = f32;
/// Milliseconds since the unix epoch, as surfaced in JSON payloads.
pub type UnixMillis = u64;
/// Opaque client-supplied player/account identifier. Never parsed.
pub type PlayerId = String;

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::str::FromStr;

/// Generic ID wrapper providing compile-time type safety over uuid::Uuid.
pub struct ID<T> {
    inner: uuid::Uuid,
    marker: PhantomData<T>,
}

impl<T> ID<T> {
    pub fn inner(&self) -> uuid::Uuid {
        self.inner
    }
    /// Cast ID<T> to ID<U> while preserving the underlying UUID.
    pub fn cast<U>(self) -> ID<U> {
        ID {
            inner: self.inner,
            marker: PhantomData,
        }
    }
}

impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.inner()
    }
}
impl<T> From<uuid::Uuid> for ID<T> {
    fn from(inner: uuid::Uuid) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }
}

impl<T> FromStr for ID<T> {
    type Err = uuid::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(Self::from)
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self {
            inner: uuid::Uuid::now_v7(),
            marker: PhantomData,
        }
    }
}

impl<T> Copy for ID<T> {}
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for ID<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.inner.hash(state);
    }
}

impl<T> Debug for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ID").field(&self.inner).finish()
    }
}
impl<T> Display for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

/// IDs cross the wire as plain uuid strings.
impl<T> serde::Serialize for ID<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.inner)
    }
}
impl<'de, T> serde::Deserialize<'de> for ID<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        uuid::Uuid::from_str(&s)
            .map(Self::from)
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// MATCH SERVER SUPERVISION
// Heartbeat cadence is a protocol contract with match servers; the timeout
// is three missed beats. These constants are locked and must not drift.
// ============================================================================
use std::time::Duration;

/// Interval at which match servers report liveness.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
/// A server whose last heartbeat is older than this is declared dead.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(6);
/// Supervisory loop period for the orchestrator.
pub const ORCHESTRATOR_TICK: Duration = Duration::from_secs(2);
/// Grace period between a termination request and a forced kill.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// Number of one-second polls while waiting for a fresh server to report Ready.
pub const SPAWN_WAIT_POLLS: usize = 30;
/// Interval between spawn-wait polls.
pub const SPAWN_WAIT_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// RAID LIFECYCLE
// ============================================================================
/// A raid stuck in Preparing longer than this releases its item locks.
pub const RAID_PREPARE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Floor on orphaned matches: an Active raid older than this is expired.
pub const RAID_ACTIVE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);
/// Period of the expired-raid sweep.
pub const RAID_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ============================================================================
// SOCIAL & LOBBY
// ============================================================================
/// Game invites older than this are culled on read.
pub const INVITE_TTL: Duration = Duration::from_secs(5 * 60);
/// Lobbies idle this long while not InGame are removed.
pub const LOBBY_IDLE_TTL: Duration = Duration::from_secs(60 * 60);
/// Period of the stale-lobby sweep.
pub const LOBBY_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Code alphabet excludes 0/O and 1/I so codes survive being read aloud.
pub const LOBBY_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Lobby code length.
pub const LOBBY_CODE_LENGTH: usize = 8;
/// Upper bound on lobby size; spawn indices run 0..max-1.
pub const LOBBY_MAX_PLAYERS: usize = 8;

// ============================================================================
// ECONOMY
// ============================================================================
/// Up-front, non-refundable market listing fee rate.
pub const LISTING_FEE_RATE: f64 = 0.05;
/// Minimum listing fee in gold.
pub const LISTING_MIN_FEE: Gold = 1;
/// Fee rate taken from the seller's proceeds on a sale.
pub const SALE_FEE_RATE: f64 = 0.05;
/// Permitted listing durations, in hours.
pub const LISTING_MIN_HOURS: u64 = 1;
pub const LISTING_MAX_HOURS: u64 = 72;
/// Period of the expired-listing sweep.
pub const MARKET_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Reputation slope on trader buy prices: price * (1 - 0.15 * rep).
pub const TRADER_BUY_SLOPE: f64 = 0.15;
/// Reputation slope on trader buyback rates: base + 0.10 * rep.
pub const TRADER_BUYBACK_SLOPE: f64 = 0.10;
/// Reputation gained per unit bought.
pub const TRADER_REP_GAIN_BUY: Reputation = 0.001;
/// Reputation gained per unit sold.
pub const TRADER_REP_GAIN_SELL: Reputation = 0.0005;
/// Period of the trader restock sweep.
pub const TRADER_RESTOCK_INTERVAL: Duration = Duration::from_secs(60 * 60);
/// XP required per derived character level.
pub const XP_PER_LEVEL: u64 = 1000;

// ============================================================================
// TIME
// ============================================================================
/// Current wall-clock time in milliseconds since the unix epoch.
pub fn now_millis() -> UnixMillis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_millis() as UnixMillis
}

// ============================================================================
// IDEMPOTENCY
// ============================================================================
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-lifetime cache of serialized responses keyed by operation id.
/// A retried mutation with a seen opId replays the committed response
/// verbatim and performs no state changes.
#[derive(Default)]
pub struct OpCache {
    seen: Mutex<HashMap<String, String>>,
}

impl OpCache {
    pub fn new() -> Self {
        Self::default()
    }
    /// Returns the cached response for an opId, if one was recorded.
    pub fn lookup(&self, op: &str) -> Option<String> {
        self.seen.lock().expect("opcache lock").get(op).cloned()
    }
    /// Records the serialized response for an opId. First write wins.
    pub fn record(&self, op: &str, response: &str) {
        self.seen
            .lock()
            .expect("opcache lock")
            .entry(op.to_string())
            .or_insert_with(|| response.to_string());
    }
}

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
#[cfg(feature = "server")]
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

#[cfg(test)]
mod tests {
    use super::*;
    struct Widget;
    #[test]
    fn id_round_trips_through_string() {
        let id = ID::<Widget>::default();
        let parsed = id.to_string().parse::<ID<Widget>>().unwrap();
        assert_eq!(id, parsed);
    }
    #[test]
    fn id_casts_preserve_uuid() {
        let id = ID::<Widget>::default();
        let cast = id.cast::<u8>();
        assert_eq!(id.inner(), cast.inner());
    }
    #[test]
    fn opcache_replays_first_response() {
        let cache = OpCache::new();
        assert!(cache.lookup("op-1").is_none());
        cache.record("op-1", "{\"version\":1}");
        cache.record("op-1", "{\"version\":2}");
        assert_eq!(cache.lookup("op-1").as_deref(), Some("{\"version\":1}"));
    }
    #[test]
    fn code_alphabet_is_unambiguous() {
        assert_eq!(LOBBY_CODE_ALPHABET.len(), 32);
        for c in [b'0', b'O', b'1', b'I'] {
            assert!(!LOBBY_CODE_ALPHABET.contains(&c));
        }
    }
    #[test]
    fn heartbeat_timeout_is_three_beats() {
        assert_eq!(HEARTBEAT_TIMEOUT, HEARTBEAT_INTERVAL * 3);
    }
}
