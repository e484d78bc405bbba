// Domain layer - Core types, policies and error taxonomy

pub mod errors;
pub mod model;
pub mod rules;
