//! Generic `WakeLock` trait for the keep-awake resource (screen / CPU) the
//! session holds while video is streaming.

/// A non-reference-counted keep-awake lock.
///
/// The session acquires it at most once and releases it only while held, so
/// implementations never see a double release.
pub trait WakeLock: Send {
    fn acquire(&mut self);

    fn release(&mut self);

    /// Return `true` while the lock is held.
    fn is_held(&self) -> bool;
}
