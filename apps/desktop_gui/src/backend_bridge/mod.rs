//! Backend side of the GUI: the worker thread that owns the controller.

pub mod commands;
pub mod prompt;
pub mod runtime;
