//! Policy-driven execution of operations against the cache and the network.
//!
//! A [`FetchPolicy`] is an ordered plan over two sources. The
//! [`FetchOrchestrator`] walks that plan either to a single result
//! ([`FetchOrchestrator::execute`]) or as a stream carrying one
//! [`Response`] per attempted source ([`FetchOrchestrator::stream`]).

mod orchestrator;
mod policy;
mod request;
mod response;
mod transport;


pub use orchestrator::*;
pub use policy::*;
pub use request::*;
pub use response::*;
pub use transport::*;
