// ABOUTME: Scoped process-environment overrides for vendor CLIs that demand them.
// ABOUTME: Serialized behind a global mutex; prior values restored on drop.

use parking_lot::{Mutex, MutexGuard};
use std::env;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Temporarily sets process-wide environment variables.
///
/// Most invocations pass credentials through [`Invocation::env`], which never
/// touches shared state. Some vendor CLIs spawn their own children (SSH
/// helpers) that read the process environment directly; for those the
/// variables must genuinely be set process-wide. The process environment is
/// shared mutable state, so all such scopes serialize on one mutex and the
/// guard restores every prior value when dropped, on success and failure
/// paths alike.
///
/// [`Invocation::env`]: super::Invocation::env
pub struct ScopedEnv {
    saved: Vec<(String, Option<String>)>,
    _guard: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    pub fn apply<'a, I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let guard = ENV_LOCK.lock();

        let mut saved = Vec::new();
        for (key, value) in vars {
            saved.push((key.to_string(), env::var(key).ok()));
            // SAFETY: mutation is serialized by ENV_LOCK; no other thread in
            // this process writes the environment outside a ScopedEnv.
            unsafe { env::set_var(key, value) };
        }

        Self {
            saved,
            _guard: guard,
        }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, previous) in self.saved.drain(..).rev() {
            // SAFETY: still holding ENV_LOCK through _guard.
            unsafe {
                match previous {
                    Some(value) => env::set_var(&key, value),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}
