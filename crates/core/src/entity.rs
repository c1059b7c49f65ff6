//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing revision of the persisted state.
    ///
    /// Stores bump this on every committed save; it is the basis for
    /// [`ExpectedVersion`](crate::ExpectedVersion) checks.
    fn version(&self) -> u64;
}
