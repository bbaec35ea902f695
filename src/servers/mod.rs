//! Server implementations
//!
//! - ingress: accepts LED frames over TCP and answers with device status

pub mod ingress;
