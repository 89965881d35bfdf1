pub mod introspect;
pub mod session;
