//! Best-effort elevated scheduling for the update thread

use tracing::debug;

/// Ask the OS to schedule the calling thread ahead of normal threads.
///
/// Unprivileged processes are usually refused; that is logged and ignored.
#[cfg(unix)]
pub fn raise_current_thread() {
    unsafe {
        let policy = libc::SCHED_RR;
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = libc::sched_get_priority_min(policy);
        let rc = libc::pthread_setschedparam(libc::pthread_self(), policy, &param);
        if rc == 0 {
            debug!("Update thread running with real-time priority");
        } else {
            debug!("Could not raise update thread priority (errno {})", rc);
        }
    }
}

#[cfg(not(unix))]
pub fn raise_current_thread() {
    debug!("Update thread priority not adjusted on this platform");
}
