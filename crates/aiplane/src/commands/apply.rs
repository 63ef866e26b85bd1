use crate::manifest::{StateFile, load_manifest};
use crate::utils::{Context, find_spec, print_action, print_diagnostic};
use aiplane_cloud::{ReconcileItem, ResourceStatus};
use anyhow::bail;
use colored::Colorize;
use std::path::Path;

pub async fn handle(
    ctx: &Context,
    manifest: &Path,
    state: Option<&Path>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let resources = load_manifest(manifest)?;
    let mut state_file = StateFile::load(state)?;

    let mut items = Vec::new();
    for resource in resources.iter() {
        let key = resource.key();
        items.push(ReconcileItem {
            spec: find_spec(&resource.resource_type)?,
            desired: Some(resource.desired()),
            observed: state_file.resources.get(&key).cloned(),
            credential: resource.credential.clone(),
            key,
        });
    }
    // state entries no longer in the manifest are removed
    for (key, observed) in &state_file.resources {
        if resources.resources.contains_key(key) {
            continue;
        }
        items.push(ReconcileItem {
            key: key.clone(),
            spec: find_spec(&observed.resource_type)?,
            desired: None,
            observed: Some(observed.clone()),
            credential: None,
        });
    }

    println!("{}", format!("Applying {} resource(s)...", items.len()).blue());
    let reconciler = ctx.reconciler()?;
    let report = reconciler.reconcile_all(items).await;

    for (key, result) in &report.results {
        print_action(&result.action);
        if result.status == ResourceStatus::Creating {
            println!("      {}", "still creating; re-run apply to resume".yellow());
        }
        state_file.record(key, result.state.clone());
    }
    println!();
    for diagnostic in report.diagnostics() {
        print_diagnostic(diagnostic);
    }

    match out {
        Some(path) => state_file.save(path)?,
        None => println!("{}", serde_json::to_string_pretty(&state_file)?),
    }

    let fatal = report.fatal_count();
    if fatal > 0 {
        bail!("apply finished with {} error(s) in {}ms", fatal, report.duration_ms);
    }
    println!(
        "{} {} ({}ms)",
        "Apply complete:".green().bold(),
        report.summary(),
        report.duration_ms
    );
    Ok(())
}
