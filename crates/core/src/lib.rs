//! Job execution core for the ansiweb front end.
//!
//! Turns a submitted inventory/playbook pair into a supervised run of the
//! automation engine inside its own workspace directory, and exposes a
//! read path over the workspaces that already exist on disk. Nothing in
//! this crate knows about HTTP.

pub mod catalog;
pub mod error;
pub mod jobs;
pub mod types;
