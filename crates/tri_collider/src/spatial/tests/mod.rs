//! Scenario tests comparing the collider backends

pub(crate) mod test_utils;
