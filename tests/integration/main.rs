//! Integration tests over in-memory repositories and a scripted registry.

mod helpers;

mod assertion_test;
mod notification_test;
mod sync_test;
