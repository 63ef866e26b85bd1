use crate::utils::{Context, find_spec, print_diagnostic};
use aiplane_cloud::{AttributeMap, PageCursor, SortOrder};
use anyhow::bail;
use colored::Colorize;
use futures_util::StreamExt;
use serde_json::Value;

pub struct ListArgs {
    pub resource_type: String,
    pub filters: Vec<String>,
    pub limit: u32,
    pub order: String,
    pub after: Option<String>,
    pub before: Option<String>,
    pub json: bool,
    pub key: Option<String>,
}

/// Parse `key=value` pairs into a filter map.
fn parse_filters(filters: &[String]) -> anyhow::Result<AttributeMap> {
    let mut map = AttributeMap::new();
    for filter in filters {
        let Some((key, value)) = filter.split_once('=') else {
            bail!("invalid filter '{}', expected KEY=VALUE", filter);
        };
        map.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(map)
}

fn summary(item: &AttributeMap) -> String {
    ["name", "email", "role", "status"]
        .iter()
        .filter_map(|field| item.get(*field).and_then(Value::as_str).map(|v| format!("{}={}", field, v)))
        .collect::<Vec<_>>()
        .join("  ")
}

pub async fn handle(ctx: &Context, args: ListArgs) -> anyhow::Result<()> {
    let spec = find_spec(&args.resource_type)?;
    let filter = parse_filters(&args.filters)?;
    let order = if args.order == "asc" {
        SortOrder::Asc
    } else {
        SortOrder::Desc
    };
    let mut cursor = PageCursor::first(args.limit).with_order(order);
    if let Some(after) = args.after {
        cursor = cursor.starting_after(after);
    }
    if let Some(before) = args.before {
        cursor = cursor.ending_before(before);
    }

    let reconciler = ctx.reconciler()?;
    let mut items = reconciler.list(&spec, filter, cursor, args.key.as_deref());
    let mut count = 0usize;

    while let Some(item) = items.next().await {
        match item {
            Ok(item) => {
                count += 1;
                if args.json {
                    println!("{}", Value::Object(item));
                } else {
                    let id = item.get("id").and_then(Value::as_str).unwrap_or("-");
                    println!("{} {}", format!("{:<40}", id).cyan(), summary(&item).dimmed());
                }
            }
            Err(diagnostic) => {
                print_diagnostic(&diagnostic);
                bail!("listing {} failed after {} item(s)", spec.type_name, count);
            }
        }
    }

    if !args.json {
        eprintln!("{}", format!("{} {}(s)", count, spec.type_name).dimmed());
    }
    Ok(())
}
