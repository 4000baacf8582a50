//! Rotating symmetric key rings.
//!
//! Each ring holds at most two secrets for one purpose: the newest (used for
//! all new signing/encryption) and the previous generation (verification
//! fallback). Provided the rotation interval is at least the token TTL, any
//! still-valid token crosses at most one rotation boundary.
//!
//! Concurrency model: reads are lock-snapshot copies and never block on a
//! rotation in flight; `rotate` is the only writer and is driven by a single
//! rotator thread.

use std::sync::{Arc, PoisonError, RwLock, mpsc};
use std::thread;
use std::time::Duration;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;

/// Secret length in bytes (AES-256 / HMAC-SHA256 key size).
pub const SECRET_BYTES: usize = 32;

/// A single symmetric secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret([u8; SECRET_BYTES]);

impl Secret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_BYTES] {
        &self.0
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Key material stays out of logs.
        f.write_str("Secret(..)")
    }
}

/// Logical purpose of a ring. Signing and envelope rings rotate independently;
/// compromise of one does not invalidate the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    Signing,
    Envelope,
}

impl KeyPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPurpose::Signing => "signing",
            KeyPurpose::Envelope => "envelope",
        }
    }
}

/// A size-bounded rotating list of secrets.
///
/// State machine: `[k0] -> [k0,k1] -> [k1,k2] -> ...` — construction seeds the
/// first key, so a cold start is immediately usable.
#[derive(Debug)]
pub struct KeyRing {
    purpose: KeyPurpose,
    // Oldest first, newest last; len is 1 or 2.
    keys: RwLock<Vec<Secret>>,
}

impl KeyRing {
    pub fn new(purpose: KeyPurpose) -> Self {
        Self {
            purpose,
            keys: RwLock::new(vec![Secret::generate()]),
        }
    }

    pub fn purpose(&self) -> KeyPurpose {
        self.purpose
    }

    /// Append a fresh secret and drop everything but the last two.
    pub fn rotate(&self) {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.push(Secret::generate());
        if keys.len() > 2 {
            let excess = keys.len() - 2;
            keys.drain(..excess);
        }
        debug!(purpose = self.purpose.as_str(), "key ring rotated");
    }

    /// The key used for new signatures/encryptions.
    pub fn newest(&self) -> Secret {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.last().cloned().unwrap_or_else(Secret::generate)
    }

    /// Snapshot in verification order: newest first, then the previous
    /// generation if one exists.
    pub fn keys_newest_first(&self) -> Vec<Secret> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle to the background rotation thread.
///
/// One rotator drives all rings it was given; rotation is therefore sequenced
/// through a single writer.
#[derive(Debug)]
pub struct KeyRotator {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl KeyRotator {
    /// Spawn the rotation thread. Rings are rotated every `interval` until
    /// [`KeyRotator::stop`] is called.
    pub fn spawn(name: &'static str, rings: Vec<Arc<KeyRing>>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || rotation_loop(rings, shutdown_rx, interval))
            .expect("failed to spawn key rotator thread");

        Self {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }

    /// Request graceful shutdown and wait for the rotator to stop.
    pub fn stop(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

fn rotation_loop(rings: Vec<Arc<KeyRing>>, shutdown_rx: mpsc::Receiver<()>, interval: Duration) {
    loop {
        match shutdown_rx.recv_timeout(interval) {
            // Shutdown requested, or the handle was dropped.
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                for ring in &rings {
                    ring.rotate();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_seeds_one_key() {
        let ring = KeyRing::new(KeyPurpose::Signing);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.newest(), ring.keys_newest_first()[0]);
    }

    #[test]
    fn ring_is_capped_at_two() {
        let ring = KeyRing::new(KeyPurpose::Envelope);
        ring.rotate();
        ring.rotate();
        ring.rotate();
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn newest_first_order_after_rotation() {
        let ring = KeyRing::new(KeyPurpose::Signing);
        let k0 = ring.newest();
        ring.rotate();
        let snapshot = ring.keys_newest_first();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1], k0);
        assert_ne!(snapshot[0], k0);
        assert_eq!(snapshot[0], ring.newest());
    }

    #[test]
    fn previous_generation_is_dropped_after_two_rotations() {
        let ring = KeyRing::new(KeyPurpose::Signing);
        let k0 = ring.newest();
        ring.rotate();
        ring.rotate();
        assert!(!ring.keys_newest_first().contains(&k0));
    }

    #[test]
    fn rotator_rotates_and_stops() {
        let ring = Arc::new(KeyRing::new(KeyPurpose::Signing));
        let rotator = KeyRotator::spawn(
            "test-rotator",
            vec![ring.clone()],
            Duration::from_millis(10),
        );
        std::thread::sleep(Duration::from_millis(50));
        rotator.stop();

        assert_eq!(ring.len(), 2);
    }
}
