pub mod ast;
pub mod cdefs;
pub mod errors;
pub mod functions;
pub mod passes;
pub mod span;
pub mod structs;
pub mod typecheck;
pub mod types;
pub mod visit;
