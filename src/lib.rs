//! Clipboard-mediated copy and paste against uncooperative desktop apps.

pub mod clipboard;
pub mod config;
pub mod keys;
pub mod platform;
