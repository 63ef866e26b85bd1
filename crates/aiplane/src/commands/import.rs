use crate::manifest::StateFile;
use crate::utils::{Context, find_spec, print_action, print_diagnostic};
use aiplane_cloud::fatal_count;
use anyhow::bail;
use colored::Colorize;
use std::path::Path;

pub async fn handle(
    ctx: &Context,
    resource_type: &str,
    id: &str,
    name: Option<String>,
    state: Option<&Path>,
    out: Option<&Path>,
    key: Option<&str>,
) -> anyhow::Result<()> {
    let spec = find_spec(resource_type)?;
    let mut state_file = StateFile::load(state)?;
    let name = name.unwrap_or_else(|| id.to_string());
    let state_key = format!("{}:{}", spec.type_name, name);

    if state_file.resources.contains_key(&state_key) {
        bail!("{} is already in the state file", state_key);
    }

    let reconciler = ctx.reconciler()?;
    let result = reconciler.import_resource(&spec, id, key).await;

    for diagnostic in &result.diagnostics {
        print_diagnostic(diagnostic);
    }
    let fatal = fatal_count(&result.diagnostics);
    if fatal > 0 {
        bail!("import of {} failed", state_key);
    }

    print_action(&result.action);
    let imported = result.state;
    match out {
        Some(path) => {
            state_file.record(&state_key, imported);
            state_file.save(path)?;
            println!(
                "{} {} -> {}",
                "Imported".green().bold(),
                state_key,
                path.display()
            );
        }
        None => {
            println!("{}", serde_json::to_string_pretty(&imported)?);
        }
    }
    Ok(())
}
