//! These models represent the objects passed around by the agent
//!
//! The conversation is kept in a provider neutral shape: a flat list of messages where
//! assistant turns may carry tool calls and tool turns carry one normalized result each.
//! Every provider converts from and to these structs at its own boundary, see
//! `providers::utils`, so nothing outside the providers ever sees a wire format.
pub mod message;
pub mod role;
pub mod tool;
