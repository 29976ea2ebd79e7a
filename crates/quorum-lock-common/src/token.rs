// Lock token generation
// Tokens are random values proving ownership of a lock at every replica

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Number of random bytes in a default token
pub const TOKEN_BYTES: usize = 16;

/// Produces a fresh token for each acquisition
pub type TokenGenerator = Arc<dyn Fn() -> anyhow::Result<String> + Send + Sync>;

/// Generate `TOKEN_BYTES` bytes from the OS random source, base64-encoded
pub fn random_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| anyhow::anyhow!("random source failed: {}", e))?;
    Ok(STANDARD.encode(bytes))
}

/// The default generator used by new locks
pub fn default_token_generator() -> TokenGenerator {
    Arc::new(random_token)
}
