use std::path::Path;

use fieldmark_core::db::{MarkingStore, SqliteMarkingStore};
use fieldmark_core::models::Marking;
use fieldmark_core::works::normalize_work_order;
use serde::Serialize;

use crate::commands::common::{format_timestamp, open_database};
use crate::error::CliError;

/// Trimmed marking representation for `list --json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkingListItem {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    work_order: Option<String>,
    last_modified: i64,
    device_id: Option<String>,
}

fn marking_to_item(marking: &Marking) -> MarkingListItem {
    MarkingListItem {
        id: marking.identity_key(),
        kind: marking.kind.to_string(),
        work_order: marking.properties.work_order.clone(),
        last_modified: marking.effective_modified(),
        device_id: marking.device_id.clone(),
    }
}

pub fn run_list(
    limit: usize,
    work_order: Option<&str>,
    as_json: bool,
    db_path: Option<&Path>,
) -> Result<(), CliError> {
    let db = open_database(db_path)?;
    let store = SqliteMarkingStore::new(db.connection());

    let filter = work_order.and_then(normalize_work_order);
    let markings: Vec<Marking> = store
        .load_all()?
        .into_iter()
        .filter(|marking| {
            filter.as_ref().is_none_or(|wanted| {
                marking
                    .properties
                    .work_order
                    .as_deref()
                    .and_then(normalize_work_order)
                    .as_ref()
                    == Some(wanted)
            })
        })
        .take(limit)
        .collect();

    if as_json {
        let items: Vec<MarkingListItem> = markings.iter().map(marking_to_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if markings.is_empty() {
        println!("No markings found.");
        return Ok(());
    }

    for marking in &markings {
        let work_order = marking.properties.work_order.as_deref().unwrap_or("-");
        println!(
            "{}  {:<9}  {:<12}  {}",
            format_timestamp(marking.effective_modified()),
            marking.kind,
            work_order,
            marking.identity_key()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use fieldmark_core::models::MarkingProperties;

    use super::*;

    #[test]
    fn item_carries_identity_key_for_idless_markings() {
        let mut marking = Marking::new_marker(35.0, 139.0, MarkingProperties::default(), "dev-1");
        marking.id = None;
        marking.timestamp = Some(100);
        marking.last_modified = Some(100);

        let item = marking_to_item(&marking);
        assert_eq!(item.id, "100:marker:35.0000,139.0000");
        assert_eq!(item.last_modified, 100);
    }
}
