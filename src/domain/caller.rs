//! Direction flag passed into every generated delete function.
//!
//! A function suppresses exactly the edge its caller came through. Untyped
//! extension tables are cleared for every caller.
//!
//! | caller        | sent by                                  | suppressed block  |
//! |---------------|------------------------------------------|-------------------|
//! | `External`    | clients                                  | none              |
//! | `FromOwner`   | owner cascades (parts, children, refs)   | none              |
//! | `FromParent`  | supertype dispatching to its subtype     | parent cascade    |
//! | `FromSubtype` | subtype cascading up to its supertype    | typed dispatch    |

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Caller {
    #[default]
    External,
    FromOwner,
    FromParent,
    FromSubtype,
}

impl Caller {
    /// Integer encoding used by the generated SQL.
    pub const fn code(self) -> i32 {
        match self {
            Self::External => 0,
            Self::FromSubtype => 1,
            Self::FromParent => 2,
            Self::FromOwner => 3,
        }
    }

    pub fn skips_subtype_dispatch(self) -> bool {
        self == Self::FromSubtype
    }

    pub fn skips_parent_cascade(self) -> bool {
        self == Self::FromParent
    }
}
