//! The bundle of lifecycle state owned by one controller.

use std::collections::HashSet;

use crate::controller::{OpenFuture, RetryFuture};
use crate::generation::GenerationTracker;
use crate::guards::{ConnectGuard, InFlight};
use crate::notice::Announcer;
use crate::registry::SessionRegistry;
use crate::title::SequenceCounter;

use sshdesk_core::{ConnectionId, SessionId};

/// Registry, generation tracker and guards, mutated together under one lock.
///
/// Mutations happen synchronously between transport await points, so each
/// critical section is atomic with respect to every other lifecycle task.
#[derive(Default)]
pub(crate) struct SessionContext {
    pub registry: SessionRegistry,
    pub generations: GenerationTracker,
    pub connecting: ConnectGuard,
    /// Sessions with an open or retry between `begin` and `finish`
    pub attempting: HashSet<SessionId>,
    pub opens: InFlight<ConnectionId, OpenFuture>,
    pub retries: InFlight<SessionId, RetryFuture>,
    pub sequences: SequenceCounter,
    pub announcer: Announcer,
}
