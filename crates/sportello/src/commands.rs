//! The list, add, edit and delete commands, over any transport.

use anyhow::{bail, Context, Result};
use chrono::Local;
use elenco::templates::render_document;
use elenco::{
    ClientId, DeleteOutcome, ListView, LoadOutcome, ResourceId, ResourceSet, SubmitOutcome,
    Transport,
};
use serde_json::Value;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A `field=value` pair from the command line. Values that parse as JSON
/// are taken as JSON; anything else is a string.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got `{raw}`"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

pub fn parse_id(raw: &str) -> ResourceId {
    raw.parse::<i64>()
        .map(ResourceId::Int)
        .unwrap_or_else(|_| ResourceId::Text(raw.to_string()))
}

/// Ask on `output`, read the answer from `input`. Only yes counts.
pub fn confirm_with(mut input: impl BufRead, mut output: impl Write, prompt: &str) -> bool {
    if write!(output, "{prompt} [y/N] ").and_then(|_| output.flush()).is_err() {
        return false;
    }
    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn load_failed(outcome: LoadOutcome) -> Result<()> {
    match outcome {
        LoadOutcome::Failed(err) => bail!("Failed to load list: {}", err.user_message()),
        _ => Ok(()),
    }
}

pub async fn list<T: Transport>(
    set: &mut ResourceSet<T>,
    view: &mut ListView,
    page: u32,
    output: Option<PathBuf>,
) -> Result<()> {
    let outcome = if page > 1 {
        view.go_to_page(set, page).await?
    } else {
        view.fetch(set).await?
    };
    if outcome == LoadOutcome::OutOfRange {
        bail!("Page {page} does not exist");
    }
    load_failed(outcome)?;

    let kind = set.kind();
    if let Some(state) = set.page_state() {
        info!(
            kind = kind.name(),
            page = state.current_page,
            pages = state.total_pages,
            "Loaded page"
        );
    }
    for resource in set.iter() {
        info!(
            id = %resource.id().map(ToString::to_string).unwrap_or_default(),
            label = %elenco::render::label(kind, resource),
            "Entry"
        );
    }

    if let Some(output) = output {
        let path = output_path(&output, kind.name());
        let title = format!("{}s", kind.title());
        let document = render_document(&title, view.html()).into_string();
        std::fs::write(&path, document)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "HTML saved");
    }
    Ok(())
}

/// A directory gets a timestamped file name; anything else is used as is.
pub fn output_path(output: &Path, kind: &str) -> PathBuf {
    if output.is_dir() {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        output.join(format!("{kind}-{stamp}.html"))
    } else {
        output.to_path_buf()
    }
}

pub async fn add<T: Transport>(
    set: &mut ResourceSet<T>,
    view: &mut ListView,
    values: Vec<(String, Value)>,
) -> Result<()> {
    let cid = view
        .add_new(set)?
        .context("Another new item is already open")?;
    submit(set, view, cid, values).await
}

pub async fn edit<T: Transport>(
    set: &mut ResourceSet<T>,
    view: &mut ListView,
    id: &ResourceId,
    values: Vec<(String, Value)>,
) -> Result<()> {
    let cid = locate(set, view, id).await?;
    view.edit(set, cid)?;
    submit(set, view, cid, values).await
}

async fn submit<T: Transport>(
    set: &mut ResourceSet<T>,
    view: &mut ListView,
    cid: ClientId,
    values: Vec<(String, Value)>,
) -> Result<()> {
    let editor = view
        .item_mut(cid)
        .and_then(|item| item.editor_mut())
        .context("Item is not being edited")?;
    editor.set_values(values.into_iter().collect());

    match view.submit(set, cid).await? {
        SubmitOutcome::Saved => {
            let id = set
                .get(cid)
                .and_then(|r| r.id())
                .map(ToString::to_string)
                .unwrap_or_default();
            info!(kind = set.kind().name(), id = %id, "Saved");
            Ok(())
        }
        SubmitOutcome::Invalid(errors) => bail!("Validation failed: {errors}"),
        SubmitOutcome::Failed(err) => bail!("Save failed: {}", err.user_message()),
        SubmitOutcome::NotEditing => bail!("Item is not being edited"),
    }
}

pub async fn delete<T: Transport>(
    set: &mut ResourceSet<T>,
    view: &mut ListView,
    id: &ResourceId,
    assume_yes: bool,
) -> Result<()> {
    let cid = locate(set, view, id).await?;
    let confirm = |prompt: &str| {
        assume_yes || confirm_with(std::io::stdin().lock(), std::io::stdout(), prompt)
    };
    match view.delete(set, cid, &confirm).await? {
        DeleteOutcome::Deleted => {
            info!(kind = set.kind().name(), id = %id, "Deleted");
            Ok(())
        }
        DeleteOutcome::Declined => {
            warn!(id = %id, "Delete cancelled");
            Ok(())
        }
        DeleteOutcome::Failed(err) => bail!("Delete failed: {}", err.user_message()),
        DeleteOutcome::NotAllowed => bail!("Item is being edited"),
    }
}

/// Walk the pages until the resource with `id` shows up.
async fn locate<T: Transport>(
    set: &mut ResourceSet<T>,
    view: &mut ListView,
    id: &ResourceId,
) -> Result<ClientId> {
    load_failed(view.fetch(set).await?)?;
    loop {
        if let Some(resource) = set.find_by_id(id) {
            return Ok(resource.cid());
        }
        if !set.page_state().is_some_and(|state| state.has_next()) {
            bail!("No {} with id {id}", set.kind().name());
        }
        load_failed(view.next_page(set).await?)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elenco::kind;
    use elenco::{Endpoint, MemoryTransport, PageConfig, TemplateRegistry};
    use serde_json::json;
    use std::io::Cursor;
    use std::sync::Arc;

    fn textbooks(transport: &MemoryTransport) -> (ResourceSet<MemoryTransport>, ListView) {
        let set = ResourceSet::new(
            Arc::new(kind::textbook()),
            Endpoint::new("/api/textbooks"),
            Arc::new(transport.clone()),
        )
        .with_pagination(PageConfig::default().with_page_size(1));
        let view = ListView::new(&set, Arc::new(TemplateRegistry::with_defaults()));
        (set, view)
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("tab_title=Midterm").unwrap(),
            ("tab_title".to_string(), json!("Midterm"))
        );
        assert_eq!(
            parse_assignment("is_active=true").unwrap(),
            ("is_active".to_string(), json!(true))
        );
        assert_eq!(
            parse_assignment(r#"chapters=[{"title":"One","url":"/one.pdf"}]"#).unwrap().1,
            json!([{"title": "One", "url": "/one.pdf"}])
        );
        assert!(parse_assignment("no-equals").is_err());
        assert!(parse_assignment("=value").is_err());
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42"), ResourceId::Int(42));
        assert_eq!(parse_id("abc"), ResourceId::Text("abc".to_string()));
    }

    #[test]
    fn test_confirm_with() {
        let mut out = Vec::new();
        assert!(confirm_with(Cursor::new("y\n"), &mut out, "Delete?"));
        assert_eq!(String::from_utf8(out).unwrap(), "Delete? [y/N] ");
        assert!(!confirm_with(Cursor::new("\n"), Vec::new(), "Delete?"));
        assert!(!confirm_with(Cursor::new("nope\n"), Vec::new(), "Delete?"));
    }

    #[tokio::test]
    async fn test_edit_finds_resource_on_later_page() {
        let transport = MemoryTransport::with_records(vec![
            json!({"tab_title": "One", "chapters": [{"title": "a", "url": "/a"}]}),
            json!({"tab_title": "Two", "chapters": [{"title": "b", "url": "/b"}]}),
        ]);
        let (mut set, mut view) = textbooks(&transport);

        edit(&mut set, &mut view, &ResourceId::Int(2), vec![("tab_title".to_string(), json!("Deux"))])
            .await
            .unwrap();
        assert_eq!(transport.records()[1]["tab_title"], json!("Deux"));
    }

    #[tokio::test]
    async fn test_add_reports_validation_errors() {
        let transport = MemoryTransport::new();
        let (mut set, mut view) = textbooks(&transport);

        let err = add(&mut set, &mut view, vec![("tab_title".to_string(), json!("Reader"))])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Please add at least one chapter."));
        assert!(transport.records().is_empty());
    }

    #[tokio::test]
    async fn test_delete_with_yes() {
        let transport = MemoryTransport::with_records(vec![json!({"tab_title": "One"})]);
        let (mut set, mut view) = textbooks(&transport);

        delete(&mut set, &mut view, &ResourceId::Int(1), true).await.unwrap();
        assert!(transport.records().is_empty());
    }

    #[tokio::test]
    async fn test_list_writes_html() {
        let transport = MemoryTransport::with_records(vec![json!({"tab_title": "Syllabus"})]);
        let (mut set, mut view) = textbooks(&transport);
        let dir = tempfile::tempdir().unwrap();

        list(&mut set, &mut view, 1, Some(dir.path().to_path_buf())).await.unwrap();

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let html = std::fs::read_to_string(path).unwrap();
        assert!(html.contains("<title>Textbooks</title>"));
        assert!(html.contains("Syllabus"));
    }

    #[tokio::test]
    async fn test_list_out_of_range_page() {
        let transport = MemoryTransport::with_records(vec![json!({"tab_title": "Syllabus"})]);
        let (mut set, mut view) = textbooks(&transport);
        view.fetch(&mut set).await.unwrap();

        let err = list(&mut set, &mut view, 7, None).await.unwrap_err();
        assert!(err.to_string().contains("Page 7 does not exist"));
    }

    #[tokio::test]
    async fn test_list_missing_page_on_first_load() {
        let transport = MemoryTransport::with_records(vec![json!({"tab_title": "Syllabus"})]);
        let (mut set, mut view) = textbooks(&transport);

        let err = list(&mut set, &mut view, 7, None).await.unwrap_err();
        assert!(err.to_string().contains("Page 7 does not exist"));
        assert_eq!(set.page_state().map(|s| s.current_page), Some(1));
        assert!(!view.html().contains("Page 7"));
    }
}
