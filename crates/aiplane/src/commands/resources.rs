use aiplane_cloud_openai::endpoints;
use colored::Colorize;

pub fn handle() -> anyhow::Result<()> {
    println!(
        "{}",
        format!(
            "{:<26} {:<8} {:<36} {}",
            "TYPE", "SCOPE", "IDENTITY", "CAPABILITIES"
        )
        .bold()
    );
    println!("{}", "─".repeat(100).dimmed());

    for endpoint in endpoints() {
        let spec = &endpoint.spec;
        let caps = spec.capabilities;
        let flags: Vec<&str> = [
            (caps.supports_update, "update"),
            (caps.supports_delete, "delete"),
            (caps.supports_cancel, "cancel"),
            (caps.is_async, "async"),
            (caps.is_import_only, "import-only"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();

        println!(
            "{} {:<8} {:<36} {}",
            format!("{:<26}", spec.type_name).cyan(),
            spec.required_scope().to_string(),
            spec.identity.join(":"),
            flags.join(", ").dimmed()
        );
    }
    Ok(())
}
