//! Fixed-capacity command pool and list manager.
//!
//! Every command slot is created up front and recycled for the life of the
//! process. Membership is tracked with three index deques over the arena:
//! Free, Pending, and Active. A slot that a caller has borrowed between
//! acquisition and submission sits on no list at all ([`Stage::Owned`]);
//! counting those borrows keeps the conservation invariant checkable:
//! free + owned + pending + active always equals the pool capacity.

use core::fmt;

use heapless::{Deque, Vec};

use crate::command::{Command, Stage};

/// Opaque index into the pool arena.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CommandHandle(pub(crate) usize);

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

/// List-manager defects. Every variant is a programming error in the caller
/// or a corruption of the bookkeeping, never a recoverable runtime state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PoolError {
    /// The handle does not name a slot in this pool.
    InvalidHandle { handle: CommandHandle },
    /// The slot is not in the stage the operation requires.
    ListMismatch {
        handle: CommandHandle,
        expected: Stage,
        found: Stage,
    },
    /// The slot is already Free.
    DoubleRelease { handle: CommandHandle },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidHandle { handle } => {
                write!(f, "{handle} is not a pool slot")
            }
            PoolError::ListMismatch {
                handle,
                expected,
                found,
            } => {
                write!(f, "{handle} is {found}, operation requires {expected}")
            }
            PoolError::DoubleRelease { handle } => {
                write!(f, "{handle} released while already free")
            }
        }
    }
}

/// Per-stage slot counts at one instant.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ListCensus {
    pub free: usize,
    pub owned: usize,
    pub pending: usize,
    pub active: usize,
}

impl ListCensus {
    /// Sum over every stage; equals the pool capacity when bookkeeping is
    /// intact.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.free + self.owned + self.pending + self.active
    }
}

impl fmt::Display for ListCensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "free={} owned={} pending={} active={}",
            self.free, self.owned, self.pending, self.active
        )
    }
}

/// Arena of `N` command slots with Free/Pending/Active index lists.
#[derive(Debug)]
pub struct CommandPool<C, const N: usize> {
    slots: Vec<Command<C>, N>,
    free: Deque<usize, N>,
    pending: Deque<usize, N>,
    active: Deque<usize, N>,
}

impl<C, const N: usize> CommandPool<C, N> {
    /// Creates the pool with every slot vacant and on the Free list.
    #[must_use]
    pub fn new() -> Self {
        let mut slots = Vec::new();
        let mut free = Deque::new();
        for index in 0..N {
            // Both containers hold exactly N entries; the pushes cannot fail.
            let _ = slots.push(Command::vacant());
            let _ = free.push_back(index);
        }
        Self {
            slots,
            free,
            pending: Deque::new(),
            active: Deque::new(),
        }
    }

    /// Total number of slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Per-stage slot counts.
    #[must_use]
    pub fn census(&self) -> ListCensus {
        let free = self.free.len();
        let pending = self.pending.len();
        let active = self.active.len();
        ListCensus {
            free,
            owned: N - free - pending - active,
            pending,
            active,
        }
    }

    /// Pops the Free head and hands the slot to the caller as Owned.
    /// Returns `None` when every slot is in flight.
    pub fn acquire(&mut self) -> Option<CommandHandle> {
        let index = self.free.pop_front()?;
        self.slots[index].set_stage(Stage::Owned);
        Some(CommandHandle(index))
    }

    /// Returns an Owned slot to the Free tail, scrubbed. FIFO reuse keeps
    /// recently-freed slots cold, which makes use-after-release bugs loud.
    pub fn release(&mut self, handle: CommandHandle) -> Result<(), PoolError> {
        let slot = self.slot_mut(handle)?;
        match slot.stage() {
            Stage::Owned => {}
            Stage::Free => return Err(PoolError::DoubleRelease { handle }),
            found @ (Stage::Pending | Stage::Active) => {
                return Err(PoolError::ListMismatch {
                    handle,
                    expected: Stage::Owned,
                    found,
                });
            }
        }
        slot.reset();
        // Deque holds at most N distinct indices; the push cannot fail.
        let _ = self.free.push_back(handle.0);
        Ok(())
    }

    /// Appends an Owned slot to the Pending tail.
    pub fn move_to_pending(&mut self, handle: CommandHandle) -> Result<(), PoolError> {
        let slot = self.slot_mut(handle)?;
        let found = slot.stage();
        if found != Stage::Owned {
            return Err(PoolError::ListMismatch {
                handle,
                expected: Stage::Owned,
                found,
            });
        }
        slot.set_stage(Stage::Pending);
        let _ = self.pending.push_back(handle.0);
        Ok(())
    }

    /// Moves a Pending slot to the Active tail, preserving the order of the
    /// commands left behind.
    pub fn move_to_active(&mut self, handle: CommandHandle) -> Result<(), PoolError> {
        let slot = self.slot_mut(handle)?;
        let found = slot.stage();
        if found != Stage::Pending {
            return Err(PoolError::ListMismatch {
                handle,
                expected: Stage::Pending,
                found,
            });
        }
        if !Self::unlink(&mut self.pending, handle.0) {
            return Err(PoolError::ListMismatch {
                handle,
                expected: Stage::Pending,
                found: Stage::Owned,
            });
        }
        self.slots[handle.0].set_stage(Stage::Active);
        let _ = self.active.push_back(handle.0);
        Ok(())
    }

    /// Detaches an Active slot and hands it back to the caller as Owned.
    pub fn remove_from_active(&mut self, handle: CommandHandle) -> Result<(), PoolError> {
        let slot = self.slot_mut(handle)?;
        let found = slot.stage();
        if found != Stage::Active {
            return Err(PoolError::ListMismatch {
                handle,
                expected: Stage::Active,
                found,
            });
        }
        if !Self::unlink(&mut self.active, handle.0) {
            return Err(PoolError::ListMismatch {
                handle,
                expected: Stage::Active,
                found: Stage::Owned,
            });
        }
        self.slots[handle.0].set_stage(Stage::Owned);
        Ok(())
    }

    /// Detaches a slot from whichever list currently holds it, leaving it
    /// Owned. Rejects Free and already-Owned slots.
    pub fn remove(&mut self, handle: CommandHandle) -> Result<(), PoolError> {
        let slot = self.slot_mut(handle)?;
        match slot.stage() {
            Stage::Pending => {
                if !Self::unlink(&mut self.pending, handle.0) {
                    return Err(PoolError::ListMismatch {
                        handle,
                        expected: Stage::Pending,
                        found: Stage::Owned,
                    });
                }
            }
            Stage::Active => {
                if !Self::unlink(&mut self.active, handle.0) {
                    return Err(PoolError::ListMismatch {
                        handle,
                        expected: Stage::Active,
                        found: Stage::Owned,
                    });
                }
            }
            found @ (Stage::Free | Stage::Owned) => {
                return Err(PoolError::ListMismatch {
                    handle,
                    expected: Stage::Pending,
                    found,
                });
            }
        }
        self.slots[handle.0].set_stage(Stage::Owned);
        Ok(())
    }

    /// Handle of the command at the Active head, if any.
    #[must_use]
    pub fn peek_active_head(&self) -> Option<CommandHandle> {
        self.active.front().copied().map(CommandHandle)
    }

    /// Pending handles in queue order.
    pub fn pending_iter(&self) -> impl Iterator<Item = CommandHandle> + '_ {
        self.pending.iter().copied().map(CommandHandle)
    }

    /// Shared access to a slot.
    pub fn get(&self, handle: CommandHandle) -> Result<&Command<C>, PoolError> {
        self.slots
            .get(handle.0)
            .ok_or(PoolError::InvalidHandle { handle })
    }

    /// Exclusive access to a slot.
    pub fn get_mut(&mut self, handle: CommandHandle) -> Result<&mut Command<C>, PoolError> {
        self.slot_mut(handle)
    }

    fn slot_mut(&mut self, handle: CommandHandle) -> Result<&mut Command<C>, PoolError> {
        self.slots
            .get_mut(handle.0)
            .ok_or(PoolError::InvalidHandle { handle })
    }

    /// Removes `index` from `list` by rotating the deque once, keeping the
    /// relative order of every other entry. Returns whether it was present.
    fn unlink(list: &mut Deque<usize, N>, index: usize) -> bool {
        let len = list.len();
        let mut found = false;
        for _ in 0..len {
            // pop/push over the original length is a full rotation.
            if let Some(entry) = list.pop_front() {
                if entry == index && !found {
                    found = true;
                } else {
                    let _ = list.push_back(entry);
                }
            }
        }
        found
    }
}

impl<C, const N: usize> Default for CommandPool<C, N> {
    fn default() -> Self {
        Self::new()
    }
}
