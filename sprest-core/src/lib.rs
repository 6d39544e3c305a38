// Building blocks shared by the transport and the request orchestrator.
pub mod context;
pub mod deferred;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod mapper;
pub mod method;
pub mod odata;
pub mod target;

pub use context::AmbientContext;
pub use deferred::Deferred;
pub use error::SpRestError;
pub use ids::{GroupId, NodeId, NodeIdAllocator};
pub use mapper::{
    builtin_table, normalize_type_name, EntityMethods, MethodTable, PropertyDecl,
    StaticMethodTable,
};
pub use method::{MethodDescriptor, MethodInfo, RequestType};
pub use odata::ODataQuery;
pub use target::{HttpMethod, RequestInfo, TargetInfo};
