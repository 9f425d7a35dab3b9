#![allow(dead_code)]

use std::env;
use std::sync::{Mutex, MutexGuard, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Serialises `RULEKIT_*` mutations across tests and restores every touched
/// variable on drop.
pub struct EnvVarGuard {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    fn acquire_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn new() -> Self {
        Self {
            saved: Vec::new(),
            _lock: Self::acquire_lock(),
        }
    }

    pub fn set(key: &'static str, value: &str) -> Self {
        Self::new().and_set(key, value)
    }

    pub fn clear(key: &'static str) -> Self {
        Self::new().and_clear(key)
    }

    pub fn and_set(mut self, key: &'static str, value: &str) -> Self {
        self.remember(key);
        env::set_var(key, value);
        self
    }

    pub fn and_clear(mut self, key: &'static str) -> Self {
        self.remember(key);
        env::remove_var(key);
        self
    }

    fn remember(&mut self, key: &'static str) {
        if !self.saved.iter().any(|(saved, _)| *saved == key) {
            self.saved.push((key, env::var(key).ok()));
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, original) in self.saved.drain(..).rev() {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}
