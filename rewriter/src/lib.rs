// oclbc — OpenCL kernel branch & barrier coverage instrumenter
//
// Library root. One module per rewriting phase.

pub mod analyze;
pub mod ast;
pub mod config;
pub mod edit;
pub mod hostgen;
pub mod instrument;
pub mod layout;
pub mod lexer;
pub mod metadata;
pub mod parser;
pub mod session;
pub mod source_map;
pub mod status;
pub mod walk;
