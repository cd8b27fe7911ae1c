//! Cached binding wrappers.
//!
//! Three flavors: [`constant`] returns a fixed value regardless of scope,
//! [`lazy`] memoizes on first call, and [`input_cached`] stores one result
//! per observed input fingerprint. Fingerprints record file paths by
//! `(path, mtime-ms)` only; content hashing stays off the hot path. A
//! binding can expire its own cache entry from inside the computation with
//! [`Eval::expires_now`], [`Eval::expires_with`], or [`Eval::expires_when`].

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use javelin_util::fs as jfs;

use crate::evaluator::{lock, Eval};
use crate::key::Value;
use crate::listener::FEATURE_CACHE_HIT;

/// A dependency fingerprint captured per evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// No observable inputs.
    Unit,
    Text(String),
    /// A file identified by path and last-modified time.
    Path { path: PathBuf, mtime_ms: u64 },
    /// Collections fingerprint element-wise.
    List(Vec<Fingerprint>),
}

impl Fingerprint {
    /// Fingerprint a file by `(path, mtime-ms)`; a missing file records
    /// mtime 0 and therefore differs from any existing one.
    pub fn of_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::Path {
            mtime_ms: jfs::mtime_ms(&path),
            path,
        }
    }

    pub fn of_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::List(paths.into_iter().map(Self::of_path).collect())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// A stored expiry condition attached to a cache entry.
#[derive(Clone)]
pub enum ExpirySignal {
    /// The entry is never stored.
    Now,
    /// Expired when the file's mtime changes from the recorded one.
    PathMtime { path: PathBuf, mtime_ms: u64 },
    /// Expired when the predicate returns true.
    When(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl ExpirySignal {
    fn expired(&self) -> bool {
        match self {
            Self::Now => true,
            Self::PathMtime { path, mtime_ms } => jfs::mtime_ms(path) != *mtime_ms,
            Self::When(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for ExpirySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Now => write!(f, "Now"),
            Self::PathMtime { path, mtime_ms } => {
                write!(f, "PathMtime({}, {mtime_ms})", path.display())
            }
            Self::When(_) => write!(f, "When(..)"),
        }
    }
}

/// A binding producing a fixed value regardless of scope.
pub fn constant<V: Value>(
    value: V,
) -> impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static {
    move |_| Ok(value.clone())
}

/// A binding that computes once and returns the memoized value afterwards.
pub fn lazy<V: Value>(
    compute: impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static,
) -> impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static {
    let cell: Mutex<Option<V>> = Mutex::new(None);
    move |eval| {
        if let Some(value) = lock(&cell).clone() {
            eval.feature(FEATURE_CACHE_HIT);
            return Ok(value);
        }
        let value = compute(eval)?;
        *lock(&cell) = Some(value.clone());
        Ok(value)
    }
}

struct StoredEntry<V> {
    fingerprint: Fingerprint,
    value: V,
    expiry: Vec<ExpirySignal>,
}

impl<V> StoredEntry<V> {
    fn expired(&self) -> bool {
        self.expiry.iter().any(ExpirySignal::expired)
    }
}

/// A binding memoized per input fingerprint.
///
/// `fingerprint` captures the observable inputs of the computation; a
/// stored result is returned whenever the captured fingerprint matches any
/// prior invocation's. The computation can attach expiry signals through
/// the [`Eval`] context.
pub fn input_cached<V: Value>(
    fingerprint: impl Fn(&mut Eval<'_>) -> miette::Result<Fingerprint> + Send + Sync + 'static,
    compute: impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static,
) -> impl Fn(&mut Eval<'_>) -> miette::Result<V> + Send + Sync + 'static {
    let store: Mutex<Vec<StoredEntry<V>>> = Mutex::new(Vec::new());
    move |eval| {
        let fp = fingerprint(eval)?;
        {
            let mut entries = lock(&store);
            entries.retain(|e| !e.expired());
            if let Some(entry) = entries.iter().find(|e| e.fingerprint == fp) {
                eval.feature(FEATURE_CACHE_HIT);
                return Ok(entry.value.clone());
            }
        }

        eval.push_cache_frame();
        let result = compute(eval);
        let signals = eval.pop_cache_frame();
        let value = result?;

        if !signals.iter().any(|s| matches!(s, ExpirySignal::Now)) {
            lock(&store).push(StoredEntry {
                fingerprint: fp,
                value: value.clone(),
                expiry: signals,
            });
        }
        Ok(value)
    }
}

impl Eval<'_> {
    /// Discard the enclosing cache entry: the result of this computation is
    /// not stored.
    pub fn expires_now(&self) {
        self.push_signal(ExpirySignal::Now);
    }

    /// Expire the enclosing cache entry when `path`'s mtime changes.
    pub fn expires_with(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.push_signal(ExpirySignal::PathMtime {
            mtime_ms: jfs::mtime_ms(&path),
            path,
        });
    }

    /// Expire the enclosing cache entry when the predicate returns true.
    pub fn expires_when(&self, predicate: impl Fn() -> bool + Send + Sync + 'static) {
        self.push_signal(ExpirySignal::When(Arc::new(predicate)));
    }

    fn push_signal(&self, signal: ExpirySignal) {
        let mut frames = lock(&self.evaluator().inner().cache_frames);
        if let Some(frame) = frames.last_mut() {
            frame.push(signal);
        }
    }

    pub(crate) fn push_cache_frame(&self) {
        lock(&self.evaluator().inner().cache_frames).push(Vec::new());
    }

    pub(crate) fn pop_cache_frame(&self) -> Vec<ExpirySignal> {
        lock(&self.evaluator().inner().cache_frames)
            .pop()
            .unwrap_or_default()
    }
}
