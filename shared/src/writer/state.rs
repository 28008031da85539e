use crate::writer::error::StateTransitionError;

/// Where an object is in its replication lifecycle on one connection.
///
/// The declaration order is significant: every state from `PendingTearOff`
/// onwards is a leaving state, and `WaitOnDestroyConfirmation` may be
/// entered from any of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReplicatedObjectState {
    #[default]
    Invalid,
    PendingCreate,
    WaitOnCreateConfirmation,
    Created,
    /// Waiting for in-flight data to be acknowledged before leaving.
    WaitOnFlush,
    /// One last state goes out, then replication ends without destroying
    /// the remote instance.
    PendingTearOff,
    /// Destroyed on its own while its root keeps replicating.
    SubObjectPendingDestroy,
    /// The object came back into scope before its destroy was confirmed.
    CancelPendingDestroy,
    PendingDestroy,
    WaitOnDestroyConfirmation,
    Destroyed,
    /// Destruction-info placeholder whose work is done.
    PermanentlyDestroyed,
}

impl ReplicatedObjectState {
    pub const ALL: [ReplicatedObjectState; 12] = [
        ReplicatedObjectState::Invalid,
        ReplicatedObjectState::PendingCreate,
        ReplicatedObjectState::WaitOnCreateConfirmation,
        ReplicatedObjectState::Created,
        ReplicatedObjectState::WaitOnFlush,
        ReplicatedObjectState::PendingTearOff,
        ReplicatedObjectState::SubObjectPendingDestroy,
        ReplicatedObjectState::CancelPendingDestroy,
        ReplicatedObjectState::PendingDestroy,
        ReplicatedObjectState::WaitOnDestroyConfirmation,
        ReplicatedObjectState::Destroyed,
        ReplicatedObjectState::PermanentlyDestroyed,
    ];

    pub fn can_transition_to(self, to: ReplicatedObjectState) -> bool {
        use ReplicatedObjectState::*;

        let from = self;
        match to {
            Invalid => matches!(from, PermanentlyDestroyed | Destroyed | PendingCreate),
            PendingCreate => matches!(from, Invalid | WaitOnCreateConfirmation),
            WaitOnCreateConfirmation => matches!(from, PendingCreate | CancelPendingDestroy),
            Created => matches!(
                from,
                PendingCreate | WaitOnCreateConfirmation | CancelPendingDestroy | WaitOnFlush
            ),
            WaitOnFlush => from != Invalid,
            PendingTearOff => matches!(
                from,
                PendingTearOff
                    | WaitOnFlush
                    | WaitOnCreateConfirmation
                    | Created
                    | WaitOnDestroyConfirmation
            ),
            SubObjectPendingDestroy => matches!(
                from,
                PendingDestroy
                    | SubObjectPendingDestroy
                    | WaitOnCreateConfirmation
                    | Created
                    | WaitOnFlush
                    | WaitOnDestroyConfirmation
            ),
            CancelPendingDestroy => matches!(from, WaitOnDestroyConfirmation | CancelPendingDestroy),
            PendingDestroy => from != Invalid,
            WaitOnDestroyConfirmation => from >= PendingTearOff,
            Destroyed => matches!(
                from,
                WaitOnDestroyConfirmation | PendingTearOff | CancelPendingDestroy
            ),
            PermanentlyDestroyed => matches!(from, Invalid | WaitOnCreateConfirmation),
        }
    }

    /// Moves `self` to `to`, or leaves it untouched and reports the illegal
    /// edge.
    pub fn transition(&mut self, to: ReplicatedObjectState) -> Result<(), StateTransitionError> {
        if !self.can_transition_to(to) {
            return Err(StateTransitionError::Illegal { from: *self, to });
        }
        *self = to;
        Ok(())
    }

    /// States in which the object exists, or will exist, on the remote side.
    pub fn is_replicating(self) -> bool {
        !matches!(
            self,
            ReplicatedObjectState::Invalid | ReplicatedObjectState::PermanentlyDestroyed
        )
    }

    /// States in which the writer may put a batch for the object on the wire.
    pub fn can_send(self) -> bool {
        matches!(
            self,
            ReplicatedObjectState::PendingCreate
                | ReplicatedObjectState::Created
                | ReplicatedObjectState::WaitOnFlush
                | ReplicatedObjectState::PendingTearOff
        )
    }
}
