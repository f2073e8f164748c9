mod build_stack;

pub use build_stack::BuildStack;
