//! PID registry (§6, optional external collaborator).
//!
//! Tracks subprocesses started by `run_command` so a host process can
//! clean up orphans on shutdown. Purely advisory: the dispatcher works
//! correctly with no registry wired at all.

/// Tracks live subprocess PIDs. All methods are synchronous and
/// non-blocking — callers invoke them from inside an async context but
/// must not await inside an implementation.
pub trait PidRegistry: Send + Sync {
    fn track_process(&self, pid: u32, cmd_label: &str);
    fn untrack_process(&self, pid: u32);
    fn cleanup_orphaned(&self);
    fn cleanup_on_shutdown(&self);
}

/// Default registry: does nothing. Used when no host-level tracking is
/// wired in.
pub struct NoOpPidRegistry;

impl PidRegistry for NoOpPidRegistry {
    fn track_process(&self, _pid: u32, _cmd_label: &str) {}
    fn untrack_process(&self, _pid: u32) {}
    fn cleanup_orphaned(&self) {}
    fn cleanup_on_shutdown(&self) {}
}
