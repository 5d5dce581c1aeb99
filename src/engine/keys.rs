//! Where leaf key pairs come from.
//!
//! Generating a 2048 bit RSA key takes long enough to be noticeable in the
//! latency of an issuance request. A [`KeyPool`] keeps a bounded number of
//! keys ready, generated by a single background task, so that requests only
//! wait for key generation when the pool runs dry.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::commons::CertResult;
use crate::commons::error::Error;

/// Generates a new RSA key pair of `bits` length.
pub fn generate_key(bits: u32) -> CertResult<PKey<Private>> {
    let rsa = Rsa::generate(bits)
        .map_err(|e| Error::signing(format!("could not generate {bits} bit RSA key: {e}")))?;
    PKey::from_rsa(rsa).map_err(Error::signing)
}

async fn generate_key_blocking(bits: u32) -> CertResult<PKey<Private>> {
    tokio::task::spawn_blocking(move || generate_key(bits))
        .await
        .map_err(|e| Error::signing(format!("key generation task failed: {e}")))?
}

//------------ KeySource -----------------------------------------------------

/// Supplies one fresh key pair per issuance.
#[derive(Clone)]
pub enum KeySource {
    /// Generate the key when it is needed.
    Generate { bits: u32 },

    /// Take a key from a pregeneration pool.
    Pool(Arc<KeyPool>),
}

impl KeySource {
    pub fn generate(bits: u32) -> Self {
        KeySource::Generate { bits }
    }

    pub fn pool(pool: Arc<KeyPool>) -> Self {
        KeySource::Pool(pool)
    }

    /// The size of the keys this source hands out.
    pub fn key_bits(&self) -> u32 {
        match self {
            KeySource::Generate { bits } => *bits,
            KeySource::Pool(pool) => pool.key_bits(),
        }
    }

    pub async fn acquire(&self) -> CertResult<PKey<Private>> {
        match self {
            KeySource::Generate { bits } => generate_key_blocking(*bits).await,
            KeySource::Pool(pool) => pool.acquire().await,
        }
    }
}

//------------ KeyPool -------------------------------------------------------

/// A bounded supply of pregenerated key pairs.
///
/// Keys travel through a channel, so every key is received by exactly one
/// caller of [`acquire`][Self::acquire]. The producer task is stopped when
/// the pool is dropped.
pub struct KeyPool {
    keys: Mutex<mpsc::Receiver<PKey<Private>>>,
    key_bits: u32,
    size: usize,
    producer: JoinHandle<()>,
}

impl KeyPool {
    /// Creates the pool and starts its producer on the current runtime.
    ///
    /// The producer fills the pool up to `size` keys, then checks every
    /// `refill_interval` whether it needs topping up.
    pub fn start(refill_interval: Duration, size: usize, key_bits: u32) -> CertResult<Self> {
        if size == 0 {
            return Err(Error::config("key pool size must be at least 1"));
        }
        let runtime = Handle::try_current()
            .map_err(|e| Error::config(format!("cannot start key pool producer: {e}")))?;

        let (tx, rx) = mpsc::channel(size);
        let producer = runtime.spawn(replenish(tx, refill_interval, key_bits));
        debug!("Started key pool for {size} keys of {key_bits} bits");

        Ok(KeyPool {
            keys: Mutex::new(rx),
            key_bits,
            size,
            producer,
        })
    }

    pub fn key_bits(&self) -> u32 {
        self.key_bits
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Takes one key from the pool, waiting for one if it is empty.
    pub async fn acquire(&self) -> CertResult<PKey<Private>> {
        let mut keys = self.keys.lock().await;
        keys.recv()
            .await
            .ok_or_else(|| Error::signing("key pool producer has stopped"))
    }

    /// Like [`acquire`][Self::acquire] but gives up after `timeout`.
    pub async fn acquire_timeout(&self, timeout: Duration) -> CertResult<PKey<Private>> {
        tokio::time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| Error::signing("key pool exhausted"))?
    }
}

impl Drop for KeyPool {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

async fn replenish(
    tx: mpsc::Sender<PKey<Private>>,
    refill_interval: Duration,
    key_bits: u32,
) {
    loop {
        while tx.capacity() > 0 {
            let key = match generate_key_blocking(key_bits).await {
                Ok(key) => key,
                Err(e) => {
                    error!("Key pool could not generate key: {e}");
                    break;
                }
            };
            if tx.send(key).await.is_err() {
                debug!("Key pool was dropped, stopping producer");
                return;
            }
        }
        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(refill_interval).await;
    }
}

//------------ Tests ---------------------------------------------------------
