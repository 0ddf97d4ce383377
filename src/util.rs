use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static CALL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
static COMPLETION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);
const HEX: &[u8; 16] = b"0123456789abcdef";

#[inline]
fn mix_u64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

fn push_u64_hex_16(out: &mut String, value: u64) {
    let mut buf = [0u8; 16];
    let mut v = value;
    for slot in buf.iter_mut().rev() {
        *slot = HEX[(v & 0xf) as usize];
        v >>= 4;
    }
    // Safety not needed: buf is ASCII hex by construction.
    out.push_str(std::str::from_utf8(&buf).unwrap_or("0000000000000000"));
}

fn next_prefixed_id(prefix: &str, counter: &AtomicU64) -> String {
    let seq = counter.fetch_add(1, Ordering::Relaxed);
    let mixed = mix_u64(seq ^ unix_now_secs().rotate_left(17));
    let mut out = String::with_capacity(prefix.len() + 17);
    out.push_str(prefix);
    out.push('-');
    push_u64_hex_16(&mut out, mixed);
    out
}

/// Generate a fresh `chatcmpl-...` completion id.
pub(crate) fn next_completion_id() -> String {
    next_prefixed_id("chatcmpl", &COMPLETION_ID_COUNTER)
}

/// Generate a fresh `call_...` tool-call id for backend calls that arrive
/// without one.
pub(crate) fn next_call_id() -> String {
    let seq = CALL_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = mix_u64(seq ^ unix_now_secs());
    let mut out = String::with_capacity(21);
    out.push_str("call_");
    push_u64_hex_16(&mut out, mixed);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_ids_are_unique_and_prefixed() {
        let a = next_completion_id();
        let b = next_completion_id();
        assert!(a.starts_with("chatcmpl-"));
        assert_eq!(a.len(), "chatcmpl-".len() + 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_call_ids_are_unique_and_prefixed() {
        let a = next_call_id();
        let b = next_call_id();
        assert!(a.starts_with("call_"));
        assert_eq!(a.len(), 21);
        assert_ne!(a, b);
    }
}
