use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn get(self) -> u32 {
                self.0
            }

            /// The id following this one.
            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// Identifier of a material in `materials.xml`.
    MaterialId
);
define_id!(
    /// Identifier of a quadric surface in `geometry.xml`.
    SurfaceId
);
define_id!(
    /// Identifier of a cell in `geometry.xml`.
    CellId
);
define_id!(
    /// Identifier of a universe (cell container).
    UniverseId
);
define_id!(
    /// Identifier of a tally filter in `tallies.xml`.
    FilterId
);
define_id!(
    /// Identifier of a tally in `tallies.xml`.
    TallyId
);
