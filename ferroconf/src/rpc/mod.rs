//! Request construction and encoding.
//!
//! The [`RequestBuilder`] turns one of three input shapes into a
//! [`Request`]: `get` and `get-config` become typed operations, anything
//! else is sent as an opaque payload.

mod builder;
mod datastore;
mod request;

pub use builder::{RequestBuilder, RpcInput};
pub use datastore::Datastore;
pub use request::{Filter, Operation, Payload, ReplyKind, Request};
