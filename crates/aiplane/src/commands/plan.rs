use crate::manifest::{StateFile, load_manifest};
use crate::utils::{find_spec, print_action};
use aiplane_cloud::{Plan, plan};
use colored::Colorize;
use std::path::Path;

pub fn handle(manifest: &Path, state: Option<&Path>) -> anyhow::Result<()> {
    let resources = load_manifest(manifest)?;
    let state = StateFile::load(state)?;

    let mut actions = Vec::new();
    for resource in resources.iter() {
        let spec = find_spec(&resource.resource_type)?;
        let key = resource.key();
        let mut action = plan(&spec, Some(&resource.desired()), state.resources.get(&key));
        action.id = key;
        actions.push(action);
    }
    for (key, observed) in &state.resources {
        if resources.resources.contains_key(key) {
            continue;
        }
        let spec = find_spec(&observed.resource_type)?;
        let mut action = plan(&spec, None, Some(observed));
        action.id = key.clone();
        actions.push(action);
    }

    let plan = Plan::new(actions);
    println!("{}", "Plan:".bold());
    for action in &plan.actions {
        print_action(action);
    }
    println!();
    if plan.has_changes {
        println!("{}", plan.summary().to_string().bold());
    } else {
        println!("{}", "No changes. Remote resources match the manifest.".green());
    }
    Ok(())
}
