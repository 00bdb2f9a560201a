use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;

/// Number of random bytes behind every CSRF state token.
pub const STATE_BYTES: usize = 32;

/// Generate a fresh, unguessable CSRF state token.
///
/// The bytes come from the thread-local CSPRNG (seeded by the OS) and are
/// encoded as unpadded base64url, so the token is safe to put in a query string.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare a stored state with the one received on the callback.
///
/// Runs in time independent of where the inputs first differ.
pub fn states_match(expected: &str, received: &str) -> bool {
    let expected = expected.as_bytes();
    let received = received.as_bytes();
    if expected.len() != received.len() {
        return false;
    }
    expected
        .iter()
        .zip(received)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
