//! Dual-barrier rendezvous between the two preemption participants.
//!
//! Each trial is fenced by two distinct barriers. Separate start and end
//! barriers keep adjacent trials from aliasing: one thread can already be
//! waiting to start trial n+1 while its peer has not yet left trial n, and
//! with a single reused barrier those two waits would incorrectly release
//! each other.

use std::sync::{Arc, Barrier};

#[derive(Debug)]
struct Inner {
    start: Barrier,
    end: Barrier,
}

/// One participant's handle to a two-thread rendezvous.
///
/// Exactly two handles exist per rendezvous and they are not cloneable, so
/// every wait is a pairwise meeting. There is no timeout: a participant
/// whose peer never arrives blocks forever, which is the accepted failure
/// mode on a dedicated benchmarking host.
#[derive(Debug)]
pub struct Rendezvous {
    inner: Arc<Inner>,
}

impl Rendezvous {
    /// Create the two linked handles for one experiment run.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let inner = Arc::new(Inner {
            start: Barrier::new(2),
            end: Barrier::new(2),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            Self { inner },
        )
    }

    /// Block until both participants are ready to start the trial.
    pub fn await_start(&self) {
        self.inner.start.wait();
    }

    /// Block until both participants have finished the trial.
    pub fn await_end(&self) {
        self.inner.end.wait();
    }
}
