//! The popup runtime: session lifecycle, exchange state machine, and the
//! seams (display sink, event source) a host binding implements.

pub mod controller;
pub mod host;
pub mod sink;
