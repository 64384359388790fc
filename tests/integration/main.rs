//! Integration tests: the HTTP API over an in-memory store and the
//! end-to-end delivery scenarios.

mod delivery_test;
mod digest_test;
mod helpers;
mod preference_test;
mod retention_test;
mod tray_test;
mod unsubscribe_test;
