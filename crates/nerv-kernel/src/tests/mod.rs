//! Crate-level test support and behavioural suites.

pub(crate) mod support;
