mod middleware;
mod render;

pub use middleware::{REQUEST_ID_HEADER, RequestId};
pub use render::{HttpState, build_router};
