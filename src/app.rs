use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use crossterm::{
    cursor::{Hide, Show},
    event, execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use rand::rngs::OsRng;
use ratatui::{Terminal, backend::CrosstermBackend};
use rpassword::prompt_password;
use thiserror::Error;
use tracing::{error, info};
use zeroize::Zeroize;

use crate::crypto::SessionKey;
use crate::generator::{MAX_LENGTH, random_alphanumeric};
use crate::input::Input;
use crate::models::{Entry, Obscured};
use crate::selection::{Chord, Selection, window};
use crate::storage::{
    LOG_FILE, MASTER_FILE, MIN_VIEWPORT_ROWS, Store, StoreError, default_base_dir,
    ensure_base_dir, load_config, load_master, save_master,
};
use crate::ui::{self, Clipboard, Modal, Row, RowStyle, SystemClipboard, View};

/// Why a prompt was abandoned. Never shown to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("nothing was entered")]
    Empty,
    #[error("'{0}' is not a positive length")]
    NotALength(String),
    #[error("{0} is longer than {max} characters", max = MAX_LENGTH)]
    TooLong(usize),
}

fn required(raw: &str) -> Result<&str, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(InputError::Empty)
    } else {
        Ok(trimmed)
    }
}

fn parse_length(raw: &str) -> Result<usize, InputError> {
    let trimmed = required(raw)?;
    match trimmed.parse::<usize>() {
        Ok(n) if n > MAX_LENGTH => Err(InputError::TooLong(n)),
        Ok(n) if n > 0 => Ok(n),
        _ => Err(InputError::NotALength(trimmed.to_string())),
    }
}

/// Per-session flags. Lives only as long as the TUI does.
#[derive(Debug)]
pub struct Session {
    key: SessionKey,
    pub reveal_mode: bool,
    pub last_copy_flag: bool,
    pub help_visible: bool,
}

impl Session {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            reveal_mode: false,
            last_copy_flag: false,
            help_visible: false,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Default)]
struct AddForm {
    step: usize,
    label: String,
    secret: String,
}

#[derive(Default)]
struct GenerateForm {
    step: usize,
    label: String,
    length: String,
}

enum Prompt {
    Add(AddForm),
    Generate(GenerateForm),
    Search(String),
    ConfirmDelete(Entry),
}

fn edit(buf: &mut String, input: Input) {
    match input {
        Input::Char(c) => buf.push(c),
        Input::Backspace => {
            buf.pop();
        }
        _ => {}
    }
}

pub struct App<C: Clipboard> {
    store: Store,
    store_path: PathBuf,
    session: Session,
    selection: Selection,
    chord: Chord,
    prompt: Option<Prompt>,
    status: Option<String>,
    capacity: usize,
    clipboard: C,
}

impl<C: Clipboard> App<C> {
    pub fn new(
        store: Store,
        store_path: PathBuf,
        key: SessionKey,
        capacity: usize,
        clipboard: C,
    ) -> Self {
        Self {
            store,
            store_path,
            session: Session::new(key),
            selection: Selection::new(),
            chord: Chord::default(),
            prompt: None,
            status: None,
            capacity: capacity.max(MIN_VIEWPORT_ROWS),
            clipboard,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// Process one input event to completion.
    pub fn handle(&mut self, input: Input) -> Flow {
        self.session.last_copy_flag = false;
        self.status = None;
        match input {
            Input::Interrupt => return Flow::Quit,
            Input::Resize => return Flow::Continue,
            _ => {}
        }
        if let Some(prompt) = self.prompt.take() {
            self.handle_prompt(prompt, input);
            return Flow::Continue;
        }
        self.handle_browse(input)
    }

    fn handle_browse(&mut self, input: Input) -> Flow {
        let key = match input {
            Input::Char(c) => c,
            Input::Down => 'j',
            Input::Up => 'k',
            _ => {
                self.chord.disarm();
                return Flow::Continue;
            }
        };
        let count = self.store.size();
        if self.chord.feed(key) {
            self.selection.top(count);
            return Flow::Continue;
        }
        if self.chord.is_armed() {
            return Flow::Continue;
        }
        match key {
            'j' => {
                self.selection.down(count);
                self.session.reveal_mode = false;
            }
            'k' => {
                self.selection.up(count);
                self.session.reveal_mode = false;
            }
            'G' => self.selection.bottom(count),
            'M' => self.selection.middle(count),
            'd' => self.session.reveal_mode = !self.session.reveal_mode,
            'c' => self.copy_selected(),
            'a' => self.prompt = Some(Prompt::Add(AddForm::default())),
            'r' => self.prompt = Some(Prompt::Generate(GenerateForm::default())),
            'D' => match self.selected_entry() {
                Some(entry) => self.prompt = Some(Prompt::ConfirmDelete(entry)),
                None => self.status = Some("No password selected".into()),
            },
            '/' => self.prompt = Some(Prompt::Search(String::new())),
            'h' => self.session.help_visible = !self.session.help_visible,
            'q' => return Flow::Quit,
            _ => {}
        }
        Flow::Continue
    }

    fn handle_prompt(&mut self, prompt: Prompt, input: Input) {
        if input == Input::Esc {
            return;
        }
        match prompt {
            Prompt::Add(mut form) => {
                if input != Input::Enter {
                    let field = if form.step == 0 {
                        &mut form.label
                    } else {
                        &mut form.secret
                    };
                    edit(field, input);
                    self.prompt = Some(Prompt::Add(form));
                    return;
                }
                if form.step == 0 {
                    if required(&form.label).is_ok() {
                        form.step = 1;
                        self.prompt = Some(Prompt::Add(form));
                    }
                    return;
                }
                self.finish_add(form);
            }
            Prompt::Generate(mut form) => {
                if input != Input::Enter {
                    let field = if form.step == 0 {
                        &mut form.label
                    } else {
                        &mut form.length
                    };
                    edit(field, input);
                    self.prompt = Some(Prompt::Generate(form));
                    return;
                }
                if form.step == 0 {
                    if required(&form.label).is_ok() {
                        form.step = 1;
                        self.prompt = Some(Prompt::Generate(form));
                    }
                    return;
                }
                let (Ok(label), Ok(len)) = (required(&form.label), parse_length(&form.length))
                else {
                    return;
                };
                let label = label.to_string();
                self.generate_in_memory(&label, len);
                self.commit(format!("Generated password for {label}"));
            }
            Prompt::Search(mut query) => {
                if input != Input::Enter {
                    edit(&mut query, input);
                    self.prompt = Some(Prompt::Search(query));
                    return;
                }
                if let Ok(label) = required(&query) {
                    self.search(label);
                }
            }
            Prompt::ConfirmDelete(entry) => match input {
                Input::Char('y') | Input::Char('Y') => self.delete(&entry),
                Input::Char('n') | Input::Char('N') => {}
                _ => self.prompt = Some(Prompt::ConfirmDelete(entry)),
            },
        }
    }

    fn finish_add(&mut self, mut form: AddForm) {
        if let (Ok(label), Ok(_)) = (required(&form.label), required(&form.secret)) {
            let key = self.session.key;
            let label = label.to_string();
            self.store
                .insert(Obscured::seal(&label, &key), Obscured::seal(&form.secret, &key));
            self.selection.reclamp(self.store.size());
            info!(entries = self.store.size(), "entry added");
            self.commit(format!("Added {label}"));
        }
        form.secret.zeroize();
    }

    /// Insert a fresh random secret without touching the file; `commit` saves it.
    fn generate_in_memory(&mut self, label: &str, len: usize) {
        let mut secret = random_alphanumeric(&mut OsRng, len);
        let key = self.session.key;
        self.store
            .insert(Obscured::seal(label, &key), Obscured::seal(&secret, &key));
        secret.zeroize();
        self.selection.reclamp(self.store.size());
        info!(entries = self.store.size(), len, "entry generated");
    }

    fn delete(&mut self, entry: &Entry) {
        if self.store.remove(&entry.label) {
            self.selection.reclamp(self.store.size());
            info!(entries = self.store.size(), "entry deleted");
            let label = entry.label.open(&self.session.key);
            self.commit(format!("Deleted {label}"));
        }
    }

    fn search(&mut self, label: &str) {
        let target = Obscured::seal(label, &self.session.key);
        match self.store.find(&target) {
            Some(position) => self.selection.jump_to(position, self.store.size()),
            None => self.status = Some(format!("No password under '{label}'")),
        }
    }

    /// Flush the store. A failed write is reported and the in-memory change kept.
    fn commit(&mut self, done: String) {
        match self.store.save(&self.store_path) {
            Ok(()) => self.status = Some(done),
            Err(e) => {
                error!("save failed: {e}");
                self.status = Some(format!("Save failed: {e}"));
            }
        }
    }

    fn copy_selected(&mut self) {
        let Some(entry) = self.selected_entry() else {
            return;
        };
        let mut plain = entry.secret.open(&self.session.key);
        self.clipboard.copy(&plain);
        plain.zeroize();
        self.session.last_copy_flag = true;
    }

    fn selected_entry(&self) -> Option<Entry> {
        self.selection
            .entry_index(self.store.size())
            .and_then(|idx| self.store.get(idx))
    }

    /// Read-only projection for the renderer.
    pub fn view(&self) -> View {
        let key = &self.session.key;
        let count = self.store.size();
        let win = window(self.selection.cursor(), count, self.capacity);
        let selected = win.selected();
        let rows = self
            .store
            .iter()
            .skip(win.first)
            .take(win.len)
            .enumerate()
            .map(|(idx, (label, secret))| {
                if Some(idx) != selected {
                    return Row {
                        text: format!("{}: {}", label.display_masked(), secret.display_masked()),
                        style: RowStyle::Plain,
                    };
                }
                let label = label.open(key);
                if self.session.reveal_mode {
                    Row {
                        text: format!("{label}: {}", secret.open(key)),
                        style: RowStyle::Revealed,
                    }
                } else if self.session.last_copy_flag {
                    Row {
                        text: format!("{label} copied!"),
                        style: RowStyle::Copied,
                    }
                } else {
                    Row {
                        text: format!("{label}: {}", secret.display_masked()),
                        style: RowStyle::Selected,
                    }
                }
            })
            .collect();

        View {
            rows,
            capacity: self.capacity,
            help_visible: self.session.help_visible,
            status: self.status.clone(),
            modal: self.prompt.as_ref().map(prompt_modal),
        }
    }
}

fn masked(text: &str) -> String {
    "*".repeat(text.chars().count())
}

fn form_lines(step: usize, fields: [(&str, String); 2], hint: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for (idx, (label, value)) in fields.into_iter().enumerate() {
        if idx > step {
            break;
        }
        let marker = if idx == step { ">" } else { " " };
        lines.push(format!("{marker} {label}: {value}"));
    }
    lines.push(String::new());
    lines.push(hint.to_string());
    lines
}

fn prompt_modal(prompt: &Prompt) -> Modal {
    match prompt {
        Prompt::Add(form) => Modal {
            title: "Add password".into(),
            lines: form_lines(
                form.step,
                [
                    ("Key", form.label.clone()),
                    ("Password", masked(&form.secret)),
                ],
                "Enter confirms; empty input or Esc cancels",
            ),
        },
        Prompt::Generate(form) => Modal {
            title: "Generate password".into(),
            lines: form_lines(
                form.step,
                [("Key", form.label.clone()), ("Length", form.length.clone())],
                "Enter confirms; empty input or Esc cancels",
            ),
        },
        Prompt::Search(query) => Modal {
            title: "Search".into(),
            lines: vec![
                format!("> Key: {query}"),
                String::new(),
                "Enter jumps to the key; Esc cancels".into(),
            ],
        },
        Prompt::ConfirmDelete(_) => Modal {
            title: "Confirm delete".into(),
            lines: vec![
                "Delete the selected password?".into(),
                String::new(),
                "[y] Yes   [n] No".into(),
            ],
        },
    }
}

struct Options {
    store: Option<PathBuf>,
    generate: Option<usize>,
}

pub fn run() -> Result<()> {
    let bin_name = executable_name();
    let mut args = std::env::args().skip(1);
    let mut opts = Options {
        store: None,
        generate: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("{bin_name} v{}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_usage(&bin_name);
                return Ok(());
            }
            "-s" | "--store" => {
                let p = args.next().ok_or_else(|| anyhow!("--store requires a path"))?;
                opts.store = Some(PathBuf::from(p));
            }
            "-g" | "--generate" => {
                let raw = args.next().ok_or_else(|| anyhow!("--generate requires a length"))?;
                let len = parse_length(&raw).map_err(|e| anyhow!("--generate: {e}"))?;
                opts.generate = Some(len);
            }
            other => {
                print_usage(&bin_name);
                bail!("unknown argument: {other}");
            }
        }
    }

    if let Some(len) = opts.generate {
        let mut generated = random_alphanumeric(&mut OsRng, len);
        println!("{generated}");
        generated.zeroize();
        return Ok(());
    }

    let base_dir = default_base_dir()?;
    ensure_base_dir(&base_dir)?;
    crate::logging::init(&base_dir.join(LOG_FILE))?;
    let config = load_config(&base_dir)?;
    let store_path = opts
        .store
        .unwrap_or_else(|| config.resolve_store_path(&base_dir));
    info!(store = %store_path.display(), "session starting");

    let key = prompt_session_key()?;
    let master_path = base_dir.join(MASTER_FILE);
    ensure_master(&master_path, &key)?;
    if !authenticate(&master_path, &key)? {
        info!("session abandoned at login");
        return Ok(());
    }

    let store = open_store(&store_path)?;
    let mut app = App::new(
        store,
        store_path,
        key,
        config.viewport_rows,
        SystemClipboard::default(),
    );
    run_tui(&mut app)?;
    info!("session closed");
    Ok(())
}

fn prompt_session_key() -> Result<SessionKey> {
    loop {
        let mut raw = prompt_password("Enter your key: ")?;
        if raw.trim().is_empty() {
            continue;
        }
        let parsed = SessionKey::parse(&raw);
        raw.zeroize();
        match parsed {
            Ok(key) => return Ok(key),
            Err(e) => eprintln!("{e}"),
        }
    }
}

fn ensure_master(path: &Path, key: &SessionKey) -> Result<()> {
    if load_master(path)?.is_some() {
        return Ok(());
    }
    println!("No master password found. Let's set one.");
    let mut master = loop {
        let mut p1 = prompt_password("Set a master password: ")?;
        let mut p2 = prompt_password("Confirm master password: ")?;
        if p1.is_empty() {
            println!("Master password cannot be empty.");
        } else if p1 != p2 {
            println!("Passwords did not match, try again.");
        } else {
            p2.zeroize();
            break p1;
        }
        p1.zeroize();
        p2.zeroize();
    };
    save_master(path, Obscured::seal(&master, key))?;
    master.zeroize();
    info!(path = %path.display(), "master password created");
    Ok(())
}

/// Ask for the master password until it matches; `q` gives up.
fn authenticate(path: &Path, key: &SessionKey) -> Result<bool> {
    let mut expected = load_master(path)?
        .ok_or_else(|| anyhow!("Master password file missing: {}", path.display()))?
        .open(key);
    let mut prompt = "Enter master password ('q' quits): ";
    let outcome = loop {
        let mut input = prompt_password(prompt)?;
        let matched = input == expected;
        let quit = input == "q";
        input.zeroize();
        if matched {
            break true;
        }
        if quit {
            break false;
        }
        prompt = "Try again: ";
    };
    expected.zeroize();
    Ok(outcome)
}

fn open_store(path: &Path) -> Result<Store> {
    match Store::load(path) {
        Ok(store) => Ok(store),
        Err(StoreError::NotFound(missing)) => {
            print!("No password file at {}. Create it? (y/N): ", missing.display());
            io::stdout().flush()?;
            let mut ans = String::new();
            io::stdin().read_line(&mut ans)?;
            if !matches!(ans.trim().to_lowercase().as_str(), "y" | "yes") {
                bail!("No password file, nothing to open");
            }
            let store = Store::new();
            store
                .save(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!(path = %path.display(), "created empty store");
            Ok(store)
        }
        Err(e) => Err(e.into()),
    }
}

/// Put the terminal back before the panic message is printed.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        disable_raw_mode().ok();
        execute!(io::stdout(), LeaveAlternateScreen, Show).ok();
        original_hook(panic);
    }));
}

fn run_tui<C: Clipboard>(app: &mut App<C>) -> Result<()> {
    install_panic_hook();
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, Hide)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = (|| -> Result<()> {
        loop {
            let view = app.view();
            terminal.draw(|f| ui::draw(f, &view))?;
            let Some(input) = Input::from_event(&event::read()?) else {
                continue;
            };
            if app.handle(input) == Flow::Quit {
                break;
            }
        }
        Ok(())
    })();

    teardown_terminal(&mut terminal);
    result
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();
    terminal.show_cursor().ok();
}

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} [OPTIONS]");
    eprintln!("  -s, --store <PATH>      Open this password file instead of the configured one");
    eprintln!("  -g, --generate <N>      Print a random alphanumeric password of length N");
    eprintln!("  -V, --version           Show version and exit");
    eprintln!("  -h, --help              Show this help");
}

fn executable_name() -> String {
    let fallback = "passterm".to_string();
    let arg0 = match std::env::args().next() {
        Some(v) => v,
        None => return fallback,
    };
    match Path::new(&arg0).file_name().and_then(|name| name.to_str()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => fallback,
    }
}
