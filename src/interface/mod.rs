//! Hand-off boundaries to collaborators outside the core engine.

pub mod external;
