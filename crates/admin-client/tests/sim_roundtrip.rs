use std::sync::Arc;

use admin_client::{AdminConfig, HttpAdminClient};
use common::{
    AdminApi, ApiError, LayoutParameters, LayoutVersion, NodeCapacity, NodeRoleChange,
    UpdateLayoutBody, ZoneRedundancy,
};
use layout_engine::{Capacity, CapacityUnit, StagingStore};
use orchestrator::{ErrorKind, LayoutOrchestrator};
use sim_controller::{SimCluster, SimServer};

async fn start(nodes: usize) -> (SimServer, HttpAdminClient) {
    let server = SimServer::bind(Arc::new(SimCluster::seeded(nodes)), "127.0.0.1:0")
        .await
        .unwrap();
    let client = HttpAdminClient::new(&AdminConfig {
        endpoint: server.endpoint(),
        admin_token: Some("test-token".into()),
        timeout_secs: 5,
    })
    .unwrap();
    (server, client)
}

#[tokio::test]
async fn stage_apply_and_read_back() {
    let (server, client) = start(2).await;
    let id = server.cluster().node_ids().await[0].clone();

    let status = client.cluster_status().await.unwrap();
    assert_eq!(status.nodes.len(), 2);
    assert_eq!(status.layout_version, LayoutVersion(0));

    let staged = client
        .update_layout(UpdateLayoutBody {
            parameters: Some(LayoutParameters::new(ZoneRedundancy::Maximum)),
            roles: vec![NodeRoleChange::assign(
                id.clone(),
                "eu".into(),
                NodeCapacity::Gateway,
                vec!["edge".into()],
            )],
        })
        .await
        .unwrap();
    assert_eq!(staged.staged_role_changes.len(), 1);
    assert_eq!(staged.staged_role_changes[0].capacity, Some(NodeCapacity::Gateway));

    let applied = client.apply_layout(LayoutVersion(0)).await.unwrap();
    assert_eq!(applied.layout.version, LayoutVersion(1));

    let layout = client.cluster_layout().await.unwrap();
    assert_eq!(layout.role(&id).unwrap().capacity, NodeCapacity::Gateway);
    assert_eq!(
        layout.parameters,
        Some(LayoutParameters::new(ZoneRedundancy::Maximum))
    );
}

#[tokio::test]
async fn stale_apply_is_a_conflict() {
    let (_server, client) = start(1).await;

    let err = client.apply_layout(LayoutVersion(4)).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.status(), Some(409));
    assert!(err.message().contains("layout version"));
}

#[tokio::test]
async fn revert_keeps_version() {
    let (server, client) = start(1).await;
    let id = server.cluster().node_ids().await[0].clone();
    client
        .update_layout(UpdateLayoutBody {
            parameters: None,
            roles: vec![NodeRoleChange::remove(id)],
        })
        .await
        .unwrap();

    let layout = client.revert_layout(LayoutVersion(0)).await.unwrap();
    assert_eq!(layout.version, LayoutVersion(0));
    assert!(layout.staged_role_changes.is_empty());
}

#[tokio::test]
async fn controller_message_is_passed_through() {
    let (_server, client) = start(1).await;

    let err = client
        .update_layout(UpdateLayoutBody {
            parameters: Some(LayoutParameters::new(ZoneRedundancy::AtLeast(0))),
            roles: vec![],
        })
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::server(400, "zone redundancy must be at least 1")
    );
}

#[tokio::test]
async fn unreachable_controller_is_a_transport_error() {
    // Grab a free port and release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpAdminClient::new(&AdminConfig {
        endpoint: format!("http://{addr}"),
        timeout_secs: 2,
        ..AdminConfig::default()
    })
    .unwrap();
    let err = client.cluster_layout().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport { .. }));
}

#[tokio::test]
async fn orchestrated_edit_over_http() {
    let (server, client) = start(3).await;
    let id = server.cluster().node_ids().await[1].clone();
    let orchestrator = LayoutOrchestrator::new(client);

    let view = orchestrator.refresh().await.unwrap();
    let mut store = StagingStore::new();
    store.open_for_node(&view, &id);
    {
        let edit = store.target_mut().unwrap();
        edit.zone = "ap".into();
        edit.capacity = Capacity::new(2.0, CapacityUnit::TB);
        edit.tags = vec!["nvme".into()];
    }
    orchestrator.submit_session(&mut store).await.unwrap();
    assert!(!store.is_open());

    let view = orchestrator.topology().await.unwrap();
    assert_eq!(view.zone_catalog(), vec!["ap"]);
    assert_eq!(view.tag_catalog(), vec!["nvme"]);

    let outcome = orchestrator.apply(view.version()).await.unwrap();
    assert_eq!(outcome.current_version, Some(LayoutVersion(1)));

    let err = orchestrator.revert(LayoutVersion(0)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let role = orchestrator.layout().await.unwrap().role(&id).cloned().unwrap();
    assert_eq!(role.capacity, NodeCapacity::Storage(2_000_000_000_000));
}
