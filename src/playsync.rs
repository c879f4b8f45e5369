// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Where a background operation is in its lifetime.
#[derive(Clone, Copy, Debug, PartialEq)]
enum RunState {
    Running,
    Cancelled,
    Finished,
}

/// A cancel handle is shared between whoever owns a background operation (a sequence
/// playback, an output stream) and the thread doing the work. The worker must check
/// it regularly and call `finish` when it runs out of work.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<Mutex<RunState>>,
    condvar: Arc<Condvar>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            state: Arc::new(Mutex::new(RunState::Running)),
            condvar: Arc::new(Condvar::new()),
        }
    }

    /// Returns true if the operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.state.lock() == RunState::Cancelled
    }

    /// Returns true if the operation ran to completion.
    pub fn is_finished(&self) -> bool {
        *self.state.lock() == RunState::Finished
    }

    /// Returns true once the operation was either cancelled or finished.
    pub fn is_done(&self) -> bool {
        *self.state.lock() != RunState::Running
    }

    /// Blocks until the operation is cancelled or finished.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        self.condvar
            .wait_while(&mut state, |state| *state == RunState::Running);
    }

    /// Cancels the operation. Has no effect once the operation is done.
    pub fn cancel(&self) {
        self.transition(RunState::Cancelled);
    }

    /// Marks the operation as completed. Has no effect once the operation is done.
    pub fn finish(&self) {
        self.transition(RunState::Finished);
    }

    fn transition(&self, to: RunState) {
        let mut state = self.state.lock();
        if *state == RunState::Running {
            *state = to;
            self.condvar.notify_all();
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        CancelHandle::new()
    }
}
