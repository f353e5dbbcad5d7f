//! End-to-end tests for thingstack live under `tests/`; this crate has no
//! runtime code.
