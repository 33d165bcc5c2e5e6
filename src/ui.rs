// UI layer: the interactive bucket browser. It walks "directories" (key
// prefixes) with `dialoguer` select prompts until the user confirms a prefix
// or exits. Listing and prompting go through traits so the loop runs
// without a terminal in tests.

use std::io::Write;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::Select;

use crate::format::{format_bytes, join_remote};
use crate::store::{list_all, ListQuery, ObjectMeta, ObjectStore};

/// Files shown per directory before collapsing into "... and N more".
pub const FILE_PREVIEW_LIMIT: usize = 10;

/// Asks the user to pick one of `items`.
pub trait Prompter {
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> Result<usize>;
}

/// Keyboard-driven prompt on the real terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn select(&mut self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        // `Select` shows a keyboard-navigable list; arrow keys and Enter.
        let selection = Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()?;
        Ok(selection)
    }
}

/// What a menu entry does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseAction {
    SelectCurrent,
    Parent,
    Exit,
    /// Descend into the given full prefix.
    Enter(String),
    /// A file entry; selecting it changes nothing.
    File(String),
}

/// Whether the loop keeps going after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue,
    Done(Option<String>),
}

/// Navigation state: the prefix being viewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseState {
    prefix: String,
}

impl BrowseState {
    pub fn new(start: &str) -> Self {
        Self {
            prefix: normalize_prefix(start),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn apply(&mut self, action: &BrowseAction) -> Step {
        match action {
            BrowseAction::SelectCurrent => Step::Done(Some(self.prefix.clone())),
            BrowseAction::Exit => Step::Done(None),
            BrowseAction::Parent => {
                self.prefix = parent_prefix(&self.prefix);
                Step::Continue
            }
            BrowseAction::Enter(prefix) => {
                self.prefix = normalize_prefix(prefix);
                Step::Continue
            }
            BrowseAction::File(_) => Step::Continue,
        }
    }
}

/// `/a\b` → `a/b/`; the root stays empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let joined = join_remote("", prefix);
    if joined.is_empty() {
        joined
    } else {
        format!("{joined}/")
    }
}

/// Drop the last segment: `a/b/` → `a/`, `a/` → ``.
pub fn parent_prefix(prefix: &str) -> String {
    match prefix.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) => format!("{parent}/"),
        None => String::new(),
    }
}

fn last_segment(prefix: &str) -> &str {
    let trimmed = prefix.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Sub-directories and files directly under one prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub directories: Vec<String>,
    pub files: Vec<ObjectMeta>,
}

impl Listing {
    pub fn fetch<S: ObjectStore + ?Sized>(store: &S, prefix: &str) -> Result<Self> {
        let page = list_all(store, &ListQuery::prefix(prefix).directories())
            .context("Failed to list directory")?;
        Ok(Listing {
            directories: page.prefixes,
            // Skip the zero-byte placeholder some tools create for folders.
            files: page.objects.into_iter().filter(|o| o.key != prefix).collect(),
        })
    }
}

/// Menu entries for the current state, in display order.
pub fn menu(state: &BrowseState, listing: &Listing) -> Vec<(String, BrowseAction)> {
    let mut entries = vec![(
        format!("✓ Select this directory (/{})", state.prefix()),
        BrowseAction::SelectCurrent,
    )];
    if !state.prefix().is_empty() {
        entries.push(("⬆ Go back".to_string(), BrowseAction::Parent));
    }
    entries.push(("✗ Exit".to_string(), BrowseAction::Exit));

    for dir in &listing.directories {
        entries.push((format!("📁 {}/", last_segment(dir)), BrowseAction::Enter(dir.clone())));
    }
    for file in listing.files.iter().take(FILE_PREVIEW_LIMIT) {
        entries.push((
            format!("📄 {}", last_segment(&file.key)),
            BrowseAction::File(file.key.clone()),
        ));
    }
    entries
}

/// Print the header and file preview for one directory.
pub fn render<W: Write>(
    out: &mut W,
    state: &BrowseState,
    listing: &Listing,
) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", format!("📂 Current: /{}", state.prefix()).blue())?;
    writeln!(
        out,
        "{}",
        format!(
            "   {} director{}, {} file(s)",
            listing.directories.len(),
            if listing.directories.len() == 1 { "y" } else { "ies" },
            listing.files.len()
        )
        .dark_grey()
    )?;

    for file in listing.files.iter().take(FILE_PREVIEW_LIMIT) {
        writeln!(
            out,
            "   📄 {} {}",
            last_segment(&file.key).to_string().cyan(),
            format!("({})", format_bytes(file.size)).dark_grey()
        )?;
    }
    if listing.files.len() > FILE_PREVIEW_LIMIT {
        let hidden = listing.files.len() - FILE_PREVIEW_LIMIT;
        writeln!(out, "{}", format!("   ... and {hidden} more file(s)").dark_grey())?;
    }
    Ok(())
}

/// Run the browser from `start`. Returns the confirmed prefix, or `None`
/// when the user exits.
pub fn browse<S, P, W>(
    store: &S,
    prompter: &mut P,
    out: &mut W,
    start: &str,
) -> Result<Option<String>>
where
    S: ObjectStore + ?Sized,
    P: Prompter + ?Sized,
    W: Write,
{
    let mut state = BrowseState::new(start);

    loop {
        let listing = Listing::fetch(store, state.prefix())?;
        render(out, &state, &listing)?;

        let entries = menu(&state, &listing);
        let labels: Vec<String> = entries.iter().map(|(label, _)| label.clone()).collect();
        let choice = prompter.select("Choose a directory", &labels, 0)?;
        let (_, action) = entries
            .get(choice)
            .with_context(|| format!("selection {choice} out of range"))?;

        if let Step::Done(selected) = state.apply(action) {
            return Ok(selected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("static"), "static/");
        assert_eq!(normalize_prefix("/static\\js/"), "static/js/");
    }

    #[test]
    fn test_parent_prefix() {
        assert_eq!(parent_prefix("a/b/c/"), "a/b/");
        assert_eq!(parent_prefix("a/"), "");
        assert_eq!(parent_prefix(""), "");
    }

    #[test]
    fn test_state_transitions() {
        let mut state = BrowseState::new("");
        assert_eq!(state.apply(&BrowseAction::Enter("static/".into())), Step::Continue);
        assert_eq!(state.apply(&BrowseAction::Enter("static/js/".into())), Step::Continue);
        assert_eq!(state.prefix(), "static/js/");

        assert_eq!(state.apply(&BrowseAction::File("static/js/app.js".into())), Step::Continue);
        assert_eq!(state.prefix(), "static/js/");

        assert_eq!(state.apply(&BrowseAction::Parent), Step::Continue);
        assert_eq!(state.prefix(), "static/");
        assert_eq!(
            state.apply(&BrowseAction::SelectCurrent),
            Step::Done(Some("static/".to_string()))
        );
        assert_eq!(state.apply(&BrowseAction::Exit), Step::Done(None));
    }

    #[test]
    fn test_menu_at_root_has_no_back_entry() {
        let listing = Listing {
            directories: vec!["static/".into()],
            files: vec![],
        };
        let entries = menu(&BrowseState::new(""), &listing);
        let actions: Vec<BrowseAction> = entries.into_iter().map(|(_, a)| a).collect();
        assert_eq!(
            actions,
            vec![
                BrowseAction::SelectCurrent,
                BrowseAction::Exit,
                BrowseAction::Enter("static/".into()),
            ]
        );
    }

    #[test]
    fn test_menu_caps_file_entries() {
        let files = (0..15)
            .map(|i| ObjectMeta {
                key: format!("img/{i:02}.png"),
                size: 1024,
                ..Default::default()
            })
            .collect();
        let listing = Listing {
            directories: vec!["img/thumbs/".into()],
            files,
        };
        let state = BrowseState::new("img");
        let entries = menu(&state, &listing);

        // select, back, exit, one directory, ten files
        assert_eq!(entries.len(), 3 + 1 + FILE_PREVIEW_LIMIT);
        assert_eq!(entries[3].0, "📁 thumbs/");
        assert_eq!(entries[4].0, "📄 00.png");

        let mut out = Vec::new();
        render(&mut out, &state, &listing).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("/img/"));
        assert!(text.contains("... and 5 more file(s)"));
        assert!(text.contains("09.png"));
        assert!(!text.contains("10.png"));
    }
}
