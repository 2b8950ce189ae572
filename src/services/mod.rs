pub mod cleanup;
pub mod pipeline;
pub mod remote;
pub mod stage;
