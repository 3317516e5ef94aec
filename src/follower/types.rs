use std::time::Duration;

/// How long a follower waits for a handshake response or availability
/// broadcast before counting the round as missed. One second longer than
/// the leader's round interval so a reply sent at the very end of a round
/// still arrives in time.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(31);

/// Upper bound (inclusive, whole seconds) of the random delay before each
/// availability report.
pub const HEARTBEAT_JITTER_SECS: u64 = 30;

/// Grace period after a redirect, giving the promoted leader time to boot
/// before the handshake is retried against it.
pub const PROMOTION_BACKOFF: Duration = Duration::from_secs(10);

/// Protocol position of a follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerState {
    /// Nothing sent yet; persisted identity not consulted.
    Unregistered,
    /// Handshake request sent, response pending.
    AwaitingHandshake,
    /// Identity assigned; reporting availability every round.
    Active,
    /// Leader declared dead; successor selection in progress.
    Promoting,
    /// A different node was promoted; backing off before re-handshaking
    /// against it.
    Redirected,
}

/// Why the follower loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerExit {
    /// This node won promotion and must now run the leader dispatcher.
    Promoted,
}
