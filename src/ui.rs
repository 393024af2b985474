// UI layer: the interactive explorer. A three-state loop (all notebooks
// -> notebook -> note) driven by line commands read with `dialoguer`,
// delegating every operation to `api::Client`. Also owns the access
// token file: the client only defines the Credentials shape, where it
// lives on disk is decided here.

use crate::api::Client;
use crate::model::{Credentials, NotebookInfo};
use anyhow::{Context, Result};
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How many notes a notebook view lists before cutting off.
const NOTE_LIST_LIMIT: usize = 50;

/// Where the access token is persisted between runs.
pub fn token_file_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cirrus_token.json")
}

fn read_token_file(path: &Path) -> Option<Credentials> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

fn write_token_file(path: &Path, token: &Credentials) -> Result<()> {
    let data = serde_json::to_string_pretty(token)?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Loads the persisted access token, if any usable one exists.
pub fn load_access_token() -> Option<Credentials> {
    read_token_file(&token_file_path())
}

/// Persists the access token for future runs.
pub fn save_access_token(token: &Credentials) -> Result<()> {
    write_token_file(&token_file_path(), token)
}

/// Runs the three-legged authorization flow interactively: request
/// temporary credentials, send the user to the consent URL, prompt for
/// the verifier, exchange it for an access token and persist it.
pub fn request_access(client: &mut Client) -> Result<()> {
    println!(
        "Access token ({}) not found, starting authorization...",
        token_file_path().display()
    );
    let bar = spinner("Requesting temporary credentials...");
    let temporary = client.request_temporary_credentials();
    bar.finish_and_clear();
    let temporary = temporary.context("request temporary credentials")?;

    let auth_url = client.authorization_url(&temporary);
    println!("Authorize this application at:\n{auth_url}");
    if webbrowser::open(&auth_url).is_err() {
        println!("Could not open a browser; please visit the URL above manually.");
    }

    let verifier = prompt("Verifier")?;
    let bar = spinner("Requesting access token...");
    let access = client.request_token(&temporary, &verifier);
    bar.finish_and_clear();
    let access = access.context("exchange verifier for access token")?;

    save_access_token(&access).context("save access token")?;
    println!("Access token saved to {}", token_file_path().display());
    Ok(())
}

enum View {
    AllNotebooks,
    Notebook(NotebookInfo),
    Note { notebook: NotebookInfo, path: String },
}

/// Main explorer loop. Runs until the user quits; a failed listing or a
/// console-read failure ends the loop through the error path, anything
/// else prints and keeps the current view.
pub fn explore(client: &Client) -> Result<()> {
    let mut view = View::AllNotebooks;
    loop {
        view = match view {
            View::AllNotebooks => match browse_notebooks(client)? {
                Some(next) => next,
                None => return Ok(()),
            },
            View::Notebook(notebook) => match browse_notebook(client, notebook)? {
                Some(next) => next,
                None => return Ok(()),
            },
            View::Note { notebook, path } => match browse_note(client, notebook, path)? {
                Some(next) => next,
                None => return Ok(()),
            },
        };
    }
}

fn browse_notebooks(client: &Client) -> Result<Option<View>> {
    let mut notebooks = client.list_notebooks().context("list notebooks")?;
    order_notebooks(&mut notebooks);

    println!("All notebooks:");
    for line in notebook_lines(&notebooks) {
        println!("{line}");
    }
    if notebooks.is_empty() {
        println!("q: quit");
    } else {
        println!("1-{}: view notebook, q: quit", notebooks.len());
    }

    let cmd = prompt(">")?;
    if cmd == "q" {
        return Ok(None);
    }
    if let Ok(index) = cmd.parse::<usize>() {
        if index >= 1 && index <= notebooks.len() {
            return Ok(Some(View::Notebook(notebooks.swap_remove(index - 1))));
        }
    }
    Ok(Some(View::AllNotebooks))
}

fn browse_notebook(client: &Client, notebook: NotebookInfo) -> Result<Option<View>> {
    println!("Notebook: {}", notebook.name);
    let notes = client.list_notes(&notebook.path).context("list notes")?;
    for (i, path) in notes.iter().take(NOTE_LIST_LIMIT).enumerate() {
        // Titles need one note_info call each; fall back to the raw
        // path when a single note cannot be fetched.
        match client.note_info(path) {
            Ok(note) => println!("{:2}: {}", i + 1, note.title),
            Err(_) => println!("{:2}: (path) {}", i + 1, path),
        }
    }
    if notes.len() > NOTE_LIST_LIMIT {
        println!(
            "(showing the first {} of {} notes)",
            NOTE_LIST_LIMIT,
            notes.len()
        );
    }

    if !notes.is_empty() {
        println!("1-{}: view note", notes.len());
    }
    println!(
        "a: all notebooks, q: quit, delete: delete this notebook, \
         put <file>: add a note with the file as its attachment"
    );

    let cmd = prompt(">")?;
    match cmd.as_str() {
        "a" => return Ok(Some(View::AllNotebooks)),
        "q" => return Ok(None),
        "delete" => {
            return match client.delete_notebook(&notebook.path) {
                Ok(()) => {
                    println!("Notebook deleted.");
                    Ok(Some(View::AllNotebooks))
                }
                Err(error) => {
                    println!("DeleteNotebook failed: {error}");
                    Ok(Some(View::Notebook(notebook)))
                }
            };
        }
        _ => {}
    }
    if let Some(file) = argument(&cmd, "put") {
        put_attachment_note(client, &notebook, Path::new(&file));
        return Ok(Some(View::Notebook(notebook)));
    }
    if let Ok(index) = cmd.parse::<usize>() {
        if index >= 1 && index <= notes.len() {
            let path = notes[index - 1].clone();
            return Ok(Some(View::Note { notebook, path }));
        }
    }
    Ok(Some(View::Notebook(notebook)))
}

fn browse_note(client: &Client, notebook: NotebookInfo, path: String) -> Result<Option<View>> {
    println!("Note: {path}");
    let note = match client.note_info(&path) {
        Ok(note) => note,
        Err(error) => {
            println!("NoteInfo failed: {error}");
            return Ok(Some(View::Notebook(notebook)));
        }
    };

    println!("Title     : {}", note.title);
    println!("Author    : {}", note.author);
    println!("Source    : {}", note.source);
    println!("Size      : {} bytes", note.size);
    println!("CreateTime: {}", note.create_time.format("%Y-%m-%d %H:%M:%S"));
    println!("ModifyTime: {}", note.modify_time.format("%Y-%m-%d %H:%M:%S"));
    println!("Content   : {} bytes", note.content.len());
    println!(
        "a: all notebooks, n: notebook, q: quit, content: show content, \
         delete: delete this note, title/author/source <text>: change a field, \
         move <notebook name>: move to another notebook, adl <link>: authorize download link"
    );

    let cmd = prompt(">")?;
    match cmd.as_str() {
        "a" => return Ok(Some(View::AllNotebooks)),
        "n" => return Ok(Some(View::Notebook(notebook))),
        "q" => return Ok(None),
        "content" => println!("{}", note.content),
        "delete" => {
            match client.delete_note(&path) {
                Ok(()) => println!("Note deleted."),
                Err(error) => println!("DeleteNote failed: {error}"),
            }
            return Ok(Some(View::Notebook(notebook)));
        }
        _ => {
            if let Some(title) = argument(&cmd, "title") {
                println!("Changing title to {title}");
                report_update(client.update_note(
                    &path,
                    &title,
                    &note.author,
                    &note.source,
                    &note.content,
                ));
            } else if let Some(author) = argument(&cmd, "author") {
                println!("Changing author to {author}");
                report_update(client.update_note(
                    &path,
                    &note.title,
                    &author,
                    &note.source,
                    &note.content,
                ));
            } else if let Some(source) = argument(&cmd, "source") {
                println!("Changing source to {source}");
                report_update(client.update_note(
                    &path,
                    &note.title,
                    &note.author,
                    &source,
                    &note.content,
                ));
            } else if let Some(name) = argument(&cmd, "move") {
                if move_note_to(client, &path, &name) {
                    return Ok(Some(View::Notebook(notebook)));
                }
            } else if let Some(link) = argument(&cmd, "adl") {
                match client.authorize_download_link(&link) {
                    Ok(url) => println!("{url}"),
                    Err(error) => println!("AuthorizeDownloadLink failed: {error}"),
                }
            }
        }
    }
    Ok(Some(View::Note { notebook, path }))
}

/// Uploads a file and creates a note embedding it: images inline, other
/// attachment types with their source link alongside.
fn put_attachment_note(client: &Client, notebook: &NotebookInfo, file: &Path) {
    let bar = spinner("Uploading...");
    let uploaded = client.upload_attachment(file);
    bar.finish_and_clear();
    let attachment = match uploaded {
        Ok(attachment) => attachment,
        Err(error) => {
            println!("UploadAttachment failed: {error}");
            return;
        }
    };

    let content = match &attachment.src {
        None => format!(r#"<img src="{}">"#, attachment.url),
        Some(src) => format!(r#"<img path="{}" src="{}">"#, attachment.url, src),
    };
    let title = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("attachment");
    match client.create_note(&notebook.path, title, "cirrus", "", &content) {
        Ok(path) => println!("Created note {path}"),
        Err(error) => println!("CreateNote failed: {error}"),
    }
}

fn move_note_to(client: &Client, path: &str, name: &str) -> bool {
    match client.find_notebook(name) {
        Ok(Some(destination)) => match client.move_note(path, &destination.path) {
            Ok(()) => {
                println!("Note moved to {}.", destination.name);
                true
            }
            Err(error) => {
                println!("MoveNote failed: {error}");
                false
            }
        },
        Ok(None) => {
            println!("No notebook named {name}.");
            false
        }
        Err(error) => {
            println!("FindNotebook failed: {error}");
            false
        }
    }
}

/// Sorts notebooks for display: ungrouped notebooks first, then groups
/// in lexicographic order, names lexicographic within each group.
fn order_notebooks(notebooks: &mut [NotebookInfo]) {
    notebooks.sort_by(|a, b| {
        (!a.group.is_empty(), &a.group, &a.name).cmp(&(!b.group.is_empty(), &b.group, &b.name))
    });
}

/// Renders an ordered notebook list: a header line before each group,
/// grouped entries indented, numbering continuous across groups.
fn notebook_lines(notebooks: &[NotebookInfo]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut previous_group = None;
    for (i, notebook) in notebooks.iter().enumerate() {
        if !notebook.group.is_empty() && previous_group != Some(notebook.group.as_str()) {
            lines.push(format!("    + {}", notebook.group));
        }
        previous_group = Some(notebook.group.as_str());
        if notebook.group.is_empty() {
            lines.push(format!("{:2}: {}({})", i + 1, notebook.name, notebook.notes_num));
        } else {
            lines.push(format!(
                "{:2}:     {}({})",
                i + 1,
                notebook.name,
                notebook.notes_num
            ));
        }
    }
    lines
}

/// `<name> <argument>` commands; returns the trimmed argument.
fn argument(cmd: &str, name: &str) -> Option<String> {
    let rest = cmd.strip_prefix(name)?.strip_prefix(' ')?.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_owned())
    }
}

fn report_update(result: crate::error::Result<()>) {
    match result {
        Ok(()) => println!("Note updated."),
        Err(error) => println!("UpdateNote failed: {error}"),
    }
}

fn prompt(message: &str) -> Result<String> {
    let line: String = Input::<String>::new()
        .with_prompt(message)
        .allow_empty(true)
        .interact_text()?;
    Ok(line.trim().to_owned())
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn notebook(name: &str, group: &str) -> NotebookInfo {
        NotebookInfo {
            name: name.to_owned(),
            group: group.to_owned(),
            path: format!("/nb/{name}"),
            notes_num: 1,
            create_time: DateTime::<Utc>::UNIX_EPOCH,
            modify_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn ungrouped_notebooks_order_first() {
        let mut notebooks = vec![
            notebook("zeta", "Work"),
            notebook("beta", ""),
            notebook("alpha", "Home"),
            notebook("gamma", ""),
            notebook("alpha", "Work"),
        ];
        order_notebooks(&mut notebooks);
        let order: Vec<(&str, &str)> = notebooks
            .iter()
            .map(|nb| (nb.group.as_str(), nb.name.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("", "beta"),
                ("", "gamma"),
                ("Home", "alpha"),
                ("Work", "alpha"),
                ("Work", "zeta"),
            ]
        );
    }

    #[test]
    fn rendering_reproduces_order_with_group_headers() {
        let mut notebooks = vec![
            notebook("zeta", "Work"),
            notebook("beta", ""),
            notebook("alpha", "Home"),
            notebook("gamma", ""),
            notebook("alpha", "Work"),
        ];
        order_notebooks(&mut notebooks);
        assert_eq!(
            notebook_lines(&notebooks),
            vec![
                " 1: beta(1)",
                " 2: gamma(1)",
                "    + Home",
                " 3:     alpha(1)",
                "    + Work",
                " 4:     alpha(1)",
                " 5:     zeta(1)",
            ]
        );
    }

    #[test]
    fn token_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let token = Credentials {
            token: "access".to_owned(),
            secret: "shh".to_owned(),
        };
        write_token_file(&path, &token).unwrap();
        assert_eq!(read_token_file(&path), Some(token));
    }

    #[test]
    fn missing_or_corrupt_token_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        assert_eq!(read_token_file(&path), None);
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(read_token_file(&path), None);
    }

    #[test]
    fn command_arguments_are_trimmed() {
        assert_eq!(argument("title  My Note ", "title").as_deref(), Some("My Note"));
        assert_eq!(argument("title", "title"), None);
        assert_eq!(argument("title ", "title"), None);
        assert_eq!(argument("titled x", "title"), None);
    }
}
