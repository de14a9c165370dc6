//! Test suites for the daemon supervisor.

mod support;
