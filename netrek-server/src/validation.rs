//! Stateless field validators and the per-client rate limiter (§4.5).
//!
//! Validators never hold state; the rate limiter is the one stateful piece
//! and is safe for concurrent use from multiple session tasks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::ValidationError;

const MAX_PLAYER_NAME_LEN: usize = 32;
const MAX_CHAT_MESSAGE_LEN: usize = 256;
const MAX_BEAM_AMOUNT: i64 = 1000;

fn is_allowed_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '<' | '>' | '(' | ')')
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trims, checks length and character set, then HTML-escapes.
pub fn validate_player_name(s: &str) -> Result<String, ValidationError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_PLAYER_NAME_LEN {
        return Err(ValidationError::InvalidPlayerName);
    }
    if !trimmed.chars().all(is_allowed_name_char) {
        return Err(ValidationError::InvalidPlayerName);
    }
    Ok(escape_html(trimmed))
}

/// Trims, checks length, strips control characters other than `\n`/`\t`,
/// then HTML-escapes.
pub fn validate_chat_message(s: &str) -> Result<String, ValidationError> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_CHAT_MESSAGE_LEN {
        return Err(ValidationError::InvalidChatMessage);
    }
    let stripped: String = trimmed
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();
    if stripped.is_empty() {
        return Err(ValidationError::InvalidChatMessage);
    }
    Ok(escape_html(&stripped))
}

pub fn validate_team_id(n: i64, max_team_id: i64) -> Result<(), ValidationError> {
    if n < 0 || n > max_team_id {
        return Err(ValidationError::InvalidTeamId(n));
    }
    Ok(())
}

pub fn validate_beam_amount(n: i64) -> Result<(), ValidationError> {
    if n < 0 || n > MAX_BEAM_AMOUNT {
        return Err(ValidationError::InvalidBeamAmount(n));
    }
    Ok(())
}

/// `-1` means "not firing" and is always accepted.
pub fn validate_weapon_index(n: i32) -> Result<(), ValidationError> {
    if n == -1 || (0..=7).contains(&n) {
        return Ok(());
    }
    Err(ValidationError::InvalidWeaponIndex(n))
}

const BUCKET_CAPACITY: f64 = 100.0;
const WINDOW: Duration = Duration::from_secs(60);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(now: Instant) -> Self {
        Bucket {
            tokens: BUCKET_CAPACITY,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let refill = elapsed.as_secs_f64() / WINDOW.as_secs_f64() * BUCKET_CAPACITY;
        self.tokens = (self.tokens + refill).min(BUCKET_CAPACITY);
        self.last_refill = now;
    }
}

/// Per-client token bucket (§4.5): capacity 100, refilled over a 60 s
/// window, one token consumed per admitted message. Clients idle for more
/// than twice the window are dropped by [`RateLimiter::collect_garbage`].
pub struct RateLimiter {
    buckets: Mutex<HashMap<u64, Bucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Admits a single message from `client_key` at `now`, consuming one
    /// token. Returns an error once the bucket is empty.
    pub fn admit(&self, client_key: u64, now: Instant) -> Result<(), ValidationError> {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let bucket = buckets.entry(client_key).or_insert_with(|| Bucket::new(now));
        bucket.refill(now);
        if bucket.tokens < 1.0 {
            return Err(ValidationError::RateLimited);
        }
        bucket.tokens -= 1.0;
        Ok(())
    }

    /// Drops buckets that have not refilled in over 2x the window; call
    /// periodically from a background task.
    pub fn collect_garbage(&self, now: Instant) {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < WINDOW * 2);
    }

    pub fn remove(&self, client_key: u64) {
        self.buckets.lock().expect("rate limiter mutex poisoned").remove(&client_key);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// `ValidateMessage`: size, JSON well-formedness, and rate admission.
pub fn validate_message(bytes: &[u8], client_key: u64, limiter: &RateLimiter, now: Instant) -> Result<(), ValidationError> {
    if bytes.len() > protocol::MAX_PAYLOAD_LEN {
        return Err(ValidationError::OversizeMessage {
            max: protocol::MAX_PAYLOAD_LEN,
            actual: bytes.len(),
        });
    }
    if !bytes.is_empty() {
        serde_json::from_slice::<serde_json::Value>(bytes).map_err(|e| ValidationError::MalformedJson(e.to_string()))?;
    }
    limiter.admit(client_key, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_name_trims_and_escapes() {
        assert_eq!(validate_player_name("  Alice  ").unwrap(), "Alice");
    }

    #[test]
    fn player_name_rejects_empty_after_trim() {
        assert!(validate_player_name("   ").is_err());
        assert!(validate_player_name("").is_err());
    }

    #[test]
    fn player_name_boundary_lengths() {
        assert!(validate_player_name(&"a".repeat(32)).is_ok());
        assert!(validate_player_name(&"a".repeat(33)).is_err());
    }

    #[test]
    fn chat_message_escapes_script_tags() {
        let out = validate_chat_message("<script>alert(1)</script>").unwrap();
        assert_eq!(out, "&lt;script&gt;alert(1)&lt;/script&gt;");
    }

    #[test]
    fn chat_message_strips_control_chars_but_keeps_newline() {
        let out = validate_chat_message("hi\x07there\nfriend").unwrap();
        assert_eq!(out, "hithere\nfriend");
    }

    #[test]
    fn weapon_index_boundaries() {
        assert!(validate_weapon_index(-1).is_ok());
        assert!(validate_weapon_index(-2).is_err());
        assert!(validate_weapon_index(7).is_ok());
        assert!(validate_weapon_index(8).is_err());
    }

    #[test]
    fn beam_amount_boundaries() {
        assert!(validate_beam_amount(0).is_ok());
        assert!(validate_beam_amount(1000).is_ok());
        assert!(validate_beam_amount(1001).is_err());
        assert!(validate_beam_amount(-1).is_err());
    }

    #[test]
    fn team_id_respects_configured_max() {
        assert!(validate_team_id(0, 1).is_ok());
        assert!(validate_team_id(1, 1).is_ok());
        assert!(validate_team_id(2, 1).is_err());
    }

    #[test]
    fn oversize_message_is_rejected_before_json_parse() {
        let limiter = RateLimiter::new();
        let big = vec![b'a'; protocol::MAX_PAYLOAD_LEN + 1];
        let err = validate_message(&big, 1, &limiter, Instant::now()).unwrap_err();
        assert!(matches!(err, ValidationError::OversizeMessage { .. }));
    }

    #[test]
    fn message_size_boundary_65536_rejected_65535_accepted() {
        let limiter = RateLimiter::new();
        let oversize = vec![b'1'; 65536];
        assert!(matches!(
            validate_message(&oversize, 1, &limiter, Instant::now()).unwrap_err(),
            ValidationError::OversizeMessage { .. }
        ));

        // 65535 bytes of JSON whitespace-padded digits, still valid JSON.
        let mut at_limit = vec![b' '; 65535 - 1];
        at_limit.push(b'1');
        assert!(validate_message(&at_limit, 2, &limiter, Instant::now()).is_ok());
    }

    #[test]
    fn rate_limiter_denies_after_capacity_exhausted() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for _ in 0..100 {
            limiter.admit(7, now).unwrap();
        }
        assert!(limiter.admit(7, now).is_err());
    }

    #[test]
    fn rate_limiter_refills_over_the_window() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.admit(7, start).unwrap();
        }
        assert!(limiter.admit(7, start).is_err());
        let later = start + Duration::from_secs(60);
        assert!(limiter.admit(7, later).is_ok());
    }

    #[test]
    fn garbage_collection_drops_long_idle_clients() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        limiter.admit(7, start).unwrap();
        limiter.collect_garbage(start + Duration::from_secs(121));
        assert!(limiter.buckets.lock().unwrap().get(&7).is_none());
    }
}
