//! Tool handlers, grouped the way the tool list is.

mod charts;
mod execution;
mod files;
mod sandbox;
mod telnet;
