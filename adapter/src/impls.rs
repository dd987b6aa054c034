use std::ops::{Deref, DerefMut};

use crate::{prelude::*, LockedState, UnlockedState};

impl<C: Locked> Deref for LockedState<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<C: Locked> DerefMut for LockedState<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<C: Unlocked> Deref for UnlockedState<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<C: Unlocked> DerefMut for UnlockedState<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
