//! Subcommand implementations. Output goes to the writer passed in so the
//! commands can run against an in-memory controller in tests.

use std::io::Write;

use anyhow::{anyhow, bail, Result};
use common::{AdminApi, LayoutVersion, NodeCapacity, NodeId, StagedChange, ZoneRedundancy};
use layout_engine::{format_bytes, Capacity, NodeView, StagingStore, TopologyView};
use orchestrator::{LayoutOrchestrator, MutationOutcome};
use tracing::debug;

/// Fields of `layoutctl assign`. Unset fields keep the node's current value.
#[derive(Debug, Clone, Default)]
pub struct AssignArgs {
    pub node: String,
    pub zone: Option<String>,
    pub capacity: Option<Capacity>,
    pub gateway: bool,
    pub tags: Vec<String>,
    pub redundancy: Option<ZoneRedundancy>,
}

fn describe_capacity(capacity: Option<NodeCapacity>) -> String {
    match capacity {
        Some(NodeCapacity::Gateway) => "gateway".to_string(),
        Some(NodeCapacity::Storage(bytes)) => format_bytes(bytes),
        None => "-".to_string(),
    }
}

/// Find a node by full id or unique id prefix among everything the view knows.
pub fn resolve_node(view: &TopologyView, input: &str) -> Result<NodeId> {
    let input = input.trim();
    if input.is_empty() {
        bail!("node id must not be empty");
    }

    let mut candidates: Vec<&NodeId> = view
        .status()
        .map(|status| status.members().iter().map(|node| &node.id).collect())
        .unwrap_or_default();
    candidates.extend(view.layout().roles.iter().map(|role| &role.id));
    candidates.extend(view.layout().staged_role_changes.iter().map(|c| &c.id));
    candidates.sort();
    candidates.dedup();

    if let Some(exact) = candidates.iter().find(|id| id.as_str() == input) {
        return Ok((*exact).clone());
    }
    let matches: Vec<&NodeId> = candidates
        .into_iter()
        .filter(|id| id.as_str().starts_with(input))
        .collect();
    match matches.as_slice() {
        [single] => Ok((*single).clone()),
        [] => Err(anyhow!("no node matches `{}`", input)),
        _ => Err(anyhow!("`{}` matches {} nodes, use a longer prefix", input, matches.len())),
    }
}

pub async fn status<A: AdminApi>(orch: &LayoutOrchestrator<A>, out: &mut impl Write) -> Result<()> {
    let view = orch.topology().await?;
    let Some(status) = view.status() else {
        return Ok(());
    };

    writeln!(out, "Layout version: {}", view.version().get())?;
    writeln!(out, "ID\tHostname\tAddress\tUp\tZone\tCapacity\tTags")?;
    for node in status.members() {
        let (zone, capacity, tags) = match view.node_view(&node.id) {
            Some(NodeView::Assigned(role)) => {
                let marker = if role.pending { "*" } else { "" };
                (
                    format!("{}{}", role.zone, marker),
                    describe_capacity(role.capacity),
                    role.tags.join(","),
                )
            }
            Some(NodeView::Removing { .. }) => ("(removing)".to_string(), "-".to_string(), String::new()),
            None => ("(unassigned)".to_string(), "-".to_string(), String::new()),
        };
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            node.id.short(),
            node.hostname,
            node.addr,
            if node.is_up { "yes" } else { "no" },
            zone,
            capacity,
            tags
        )?;
    }
    Ok(())
}

pub async fn layout<A: AdminApi>(orch: &LayoutOrchestrator<A>, out: &mut impl Write) -> Result<()> {
    let view = orch.topology().await?;
    let layout = view.layout();

    writeln!(out, "Layout version: {}", layout.version.get())?;
    let committed = layout
        .parameters
        .map(|p| p.zone_redundancy)
        .unwrap_or_default();
    writeln!(out, "Zone redundancy: {}", committed)?;

    if layout.roles.is_empty() {
        writeln!(out, "(no committed roles)")?;
    } else {
        writeln!(out, "ID\tZone\tCapacity\tTags")?;
        for role in &layout.roles {
            writeln!(
                out,
                "{}\t{}\t{}\t{}",
                role.id.short(),
                role.zone,
                describe_capacity(Some(role.capacity)),
                role.tags.join(",")
            )?;
        }
    }

    let summary = view.summary();
    if summary.is_empty() {
        writeln!(out, "No staged changes.")?;
        return Ok(());
    }

    writeln!(
        out,
        "Staged changes: {} assignment(s), {} removal(s)",
        summary.assignments, summary.removals
    )?;
    for (id, change) in view.pending_changes() {
        match change {
            StagedChange::Removed => writeln!(out, "  - {}\tremove", id.short())?,
            StagedChange::Modified(_) => {
                if let Some(NodeView::Assigned(role)) = view.node_view(&id) {
                    writeln!(
                        out,
                        "  ~ {}\t{}\t{}\t{}",
                        id.short(),
                        role.zone,
                        describe_capacity(role.capacity),
                        role.tags.join(",")
                    )?;
                }
            }
            StagedChange::Unchanged => {}
        }
    }
    if let Some(params) = layout.staged_parameters {
        writeln!(out, "  zone redundancy -> {}", params.zone_redundancy)?;
    }
    writeln!(
        out,
        "Run `layoutctl apply --version {}` to commit or `layoutctl revert --version {}` to discard.",
        layout.version.get(),
        layout.version.get()
    )?;
    Ok(())
}

pub async fn zones<A: AdminApi>(orch: &LayoutOrchestrator<A>, out: &mut impl Write) -> Result<()> {
    for zone in orch.topology().await?.zone_catalog() {
        writeln!(out, "{}", zone)?;
    }
    Ok(())
}

pub async fn tags<A: AdminApi>(orch: &LayoutOrchestrator<A>, out: &mut impl Write) -> Result<()> {
    for tag in orch.topology().await?.tag_catalog() {
        writeln!(out, "{}", tag)?;
    }
    Ok(())
}

pub async fn assign<A: AdminApi>(
    orch: &LayoutOrchestrator<A>,
    args: AssignArgs,
    out: &mut impl Write,
) -> Result<()> {
    let view = orch.topology().await?;
    let node_id = resolve_node(&view, &args.node)?;

    let mut store = StagingStore::new();
    store.open_for_node(&view, &node_id);
    let origin = store.origin();
    if let Some(edit) = store.target_mut() {
        if let Some(zone) = args.zone {
            edit.zone = zone;
        }
        if let Some(capacity) = args.capacity {
            edit.capacity = capacity;
            edit.is_gateway = false;
        }
        if args.gateway {
            edit.is_gateway = true;
        }
        if !args.tags.is_empty() {
            edit.tags = args.tags;
        }
        if let Some(redundancy) = args.redundancy {
            edit.redundancy = redundancy;
        }
        debug!(?edit, ?origin, "assign edit prepared");
    }

    let outcome = orch.submit_session(&mut store).await?;
    writeln!(
        out,
        "Staged role for node {} against layout version {}.",
        node_id.short(),
        outcome.version.get()
    )?;
    writeln!(out, "Run `layoutctl layout` to review and `layoutctl apply` to commit.")?;
    Ok(())
}

pub async fn remove<A: AdminApi>(
    orch: &LayoutOrchestrator<A>,
    node: &str,
    out: &mut impl Write,
) -> Result<()> {
    let view = orch.topology().await?;
    let node_id = resolve_node(&view, node)?;
    let outcome = orch.stage_removal(&node_id).await?;
    writeln!(
        out,
        "Staged removal of node {} against layout version {}.",
        node_id.short(),
        outcome.version.get()
    )?;
    Ok(())
}

async fn target_version<A: AdminApi>(
    orch: &LayoutOrchestrator<A>,
    version: Option<u64>,
) -> Result<LayoutVersion> {
    match version {
        Some(version) => Ok(LayoutVersion(version)),
        None => Ok(orch.layout().await?.version),
    }
}

fn report(outcome: &MutationOutcome, out: &mut impl Write) -> Result<()> {
    for line in &outcome.messages {
        writeln!(out, "{}", line)?;
    }
    match outcome.current_version {
        Some(current) => writeln!(out, "Cluster is now at layout version {}.", current.get())?,
        None => writeln!(out, "Accepted; cluster state could not be reloaded.")?,
    }
    Ok(())
}

pub async fn apply<A: AdminApi>(
    orch: &LayoutOrchestrator<A>,
    version: Option<u64>,
    out: &mut impl Write,
) -> Result<()> {
    let version = target_version(orch, version).await?;
    let outcome = orch.apply(version).await?;
    report(&outcome, out)
}

pub async fn revert<A: AdminApi>(
    orch: &LayoutOrchestrator<A>,
    version: Option<u64>,
    out: &mut impl Write,
) -> Result<()> {
    let version = target_version(orch, version).await?;
    let outcome = orch.revert(version).await?;
    writeln!(out, "Staged changes against layout version {} discarded.", version.get())?;
    report(&outcome, out)
}

pub async fn connect<A: AdminApi>(
    orch: &LayoutOrchestrator<A>,
    peer: &str,
    out: &mut impl Write,
) -> Result<()> {
    orch.connect_node(peer).await?;
    writeln!(out, "Connected to {}.", peer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use layout_engine::CapacityUnit;
    use orchestrator::{ErrorKind, LayoutError};
    use sim_controller::SimCluster;
    use std::sync::Arc;

    fn orchestrator(nodes: usize) -> LayoutOrchestrator<Arc<SimCluster>> {
        LayoutOrchestrator::new(Arc::new(SimCluster::seeded(nodes)))
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn assign_then_apply() {
        let orch = orchestrator(2);
        let id = orch.api().node_ids().await[0].clone();

        let mut out = Vec::new();
        assign(
            &orch,
            AssignArgs {
                node: id.to_string(),
                zone: Some("eu".into()),
                capacity: Some(Capacity::new(2.0, CapacityUnit::TB)),
                tags: vec!["ssd".into()],
                ..AssignArgs::default()
            },
            &mut out,
        )
        .await
        .unwrap();
        assert!(output(out).contains("Staged role"));

        let mut out = Vec::new();
        layout(&orch, &mut out).await.unwrap();
        let text = output(out);
        assert!(text.contains("1 assignment(s)"));
        assert!(text.contains("2.00 TB"));

        let mut out = Vec::new();
        apply(&orch, None, &mut out).await.unwrap();
        assert!(output(out).contains("layout version 1"));

        let mut out = Vec::new();
        zones(&orch, &mut out).await.unwrap();
        assert_eq!(output(out), "eu\n");
    }

    #[tokio::test]
    async fn assign_without_zone_is_a_validation_error() {
        let orch = orchestrator(1);
        let id = orch.api().node_ids().await[0].clone();

        let err = assign(
            &orch,
            AssignArgs {
                node: id.to_string(),
                gateway: true,
                ..AssignArgs::default()
            },
            &mut Vec::new(),
        )
        .await
        .unwrap_err();
        let layout_err = err.downcast_ref::<LayoutError>().unwrap();
        assert_eq!(layout_err.kind(), ErrorKind::Validation);
        assert!(orch.api().snapshot().await.staged_role_changes.is_empty());
    }

    #[tokio::test]
    async fn stale_explicit_version_is_a_conflict() {
        let orch = orchestrator(1);
        let err = apply(&orch, Some(3), &mut Vec::new()).await.unwrap_err();
        let layout_err = err.downcast_ref::<LayoutError>().unwrap();
        assert_eq!(layout_err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn nodes_resolve_by_unique_prefix() {
        let orch = orchestrator(2);
        orch.connect_node("abc123@10.0.9.1:3901").await.unwrap();
        let view = orch.topology().await.unwrap();

        assert_eq!(resolve_node(&view, "abc").unwrap(), NodeId::from("abc123"));

        let err = resolve_node(&view, "zzz").unwrap_err();
        assert!(err.to_string().contains("no node matches"));
        // Seeded ids share a long run of leading zeros.
        let err = resolve_node(&view, "0000").unwrap_err();
        assert!(err.to_string().contains("matches 2 nodes"));
    }

    #[tokio::test]
    async fn status_marks_pending_roles() {
        let orch = orchestrator(1);
        let id = orch.api().node_ids().await[0].clone();
        assign(
            &orch,
            AssignArgs {
                node: id.to_string(),
                zone: Some("us".into()),
                gateway: true,
                ..AssignArgs::default()
            },
            &mut Vec::new(),
        )
        .await
        .unwrap();

        let mut out = Vec::new();
        status(&orch, &mut out).await.unwrap();
        let text = output(out);
        assert!(text.contains("us*"));
        assert!(text.contains("gateway"));
    }

    #[tokio::test]
    async fn revert_discards_staged_removal() {
        let orch = orchestrator(1);
        let id = orch.api().node_ids().await[0].clone();
        remove(&orch, id.as_str(), &mut Vec::new()).await.unwrap();

        let mut out = Vec::new();
        revert(&orch, None, &mut out).await.unwrap();
        assert!(output(out).contains("discarded"));
        assert!(orch.api().snapshot().await.staged_role_changes.is_empty());
    }
}
