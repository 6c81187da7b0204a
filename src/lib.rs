pub mod builtin;
pub mod config;
pub mod execution;
pub mod fd;
pub mod parser;
pub mod pipeline;
pub mod scanner;
pub mod shell;
pub mod sig;
