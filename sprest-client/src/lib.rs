pub mod client;
pub mod entities;
mod group;
mod materialize;
pub mod node;

pub use client::{Client, ClientConfig};
pub use entities::{normalize_email_properties, SEND_EMAIL_ENDPOINT};
pub use group::Slot;
pub use node::RequestNode;

pub use sprest_core::{
    AmbientContext, Deferred, GroupId, HttpMethod, MethodDescriptor, MethodTable, NodeId,
    ODataQuery, RequestInfo, RequestType, SpRestError, StaticMethodTable, TargetInfo,
};
pub use sprest_transport::{RawResponse, Transport, TransportError};
