use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{
    ApiError, ApplyLayoutResult, ClusterLayout, ClusterStatus, ConnectNodeResult, LayoutVersion,
    UpdateLayoutBody,
};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Remote cluster-management API consumed by the layout planner.
///
/// Layout versions passed to `apply_layout` / `revert_layout` are the version
/// the staged changes were computed against; implementations translate to
/// whatever the transport expects.
pub trait AdminApi: Send + Sync {
    fn cluster_status(&self) -> BoxFuture<'_, ApiResult<ClusterStatus>>;

    fn cluster_layout(&self) -> BoxFuture<'_, ApiResult<ClusterLayout>>;

    /// Stage role changes and (optionally) new layout parameters.
    fn update_layout(&self, body: UpdateLayoutBody) -> BoxFuture<'_, ApiResult<ClusterLayout>>;

    fn apply_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ApplyLayoutResult>>;

    fn revert_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ClusterLayout>>;

    /// Ask the controller to connect to peers given as `<node id>@<addr>`.
    fn connect_nodes(&self, peers: Vec<String>)
        -> BoxFuture<'_, ApiResult<Vec<ConnectNodeResult>>>;
}

impl<T: AdminApi + ?Sized> AdminApi for Arc<T> {
    fn cluster_status(&self) -> BoxFuture<'_, ApiResult<ClusterStatus>> {
        (**self).cluster_status()
    }

    fn cluster_layout(&self) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        (**self).cluster_layout()
    }

    fn update_layout(&self, body: UpdateLayoutBody) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        (**self).update_layout(body)
    }

    fn apply_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ApplyLayoutResult>> {
        (**self).apply_layout(version)
    }

    fn revert_layout(&self, version: LayoutVersion) -> BoxFuture<'_, ApiResult<ClusterLayout>> {
        (**self).revert_layout(version)
    }

    fn connect_nodes(
        &self,
        peers: Vec<String>,
    ) -> BoxFuture<'_, ApiResult<Vec<ConnectNodeResult>>> {
        (**self).connect_nodes(peers)
    }
}
