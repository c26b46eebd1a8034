//! Interactive menu shell.

use crate::commands::{format_keys, format_reply, format_sync, zero_based};
use crate::config::Config;
use colored::Colorize;
use otpkey_client::{list_ports, ClientError, Session};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::io::{Read, Write};

type LineEditor = Editor<(), DefaultHistory>;

/// Entries of the main menu, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    SyncTime,
    ListKeys,
    AddKey,
    DeleteKey,
    ResetDevice,
    Quit,
}

pub const MENU: [MenuItem; 6] = [
    MenuItem::SyncTime,
    MenuItem::ListKeys,
    MenuItem::AddKey,
    MenuItem::DeleteKey,
    MenuItem::ResetDevice,
    MenuItem::Quit,
];

impl MenuItem {
    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::SyncTime => "Sync time",
            MenuItem::ListKeys => "List keys",
            MenuItem::AddKey => "Add key",
            MenuItem::DeleteKey => "Delete key",
            MenuItem::ResetDevice => "Reset device",
            MenuItem::Quit => "Quit",
        }
    }
}

fn print_bar() {
    println!("{}", "-".repeat(40));
}

fn print_menu<T: AsRef<str>>(title: &str, entries: &[T]) {
    print_bar();
    println!("{}", title.bold());
    print_bar();
    for (i, entry) in entries.iter().enumerate() {
        println!("{}. {}", i + 1, entry.as_ref());
    }
    print_bar();
}

/// Parses a 1-based menu choice into a zero-based index below `len`.
pub fn parse_selection(input: &str, len: usize) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    (1..=len).contains(&choice).then(|| choice - 1)
}

/// Reads one line; `None` when the operator pressed Ctrl-C or Ctrl-D.
fn prompt(rl: &mut LineEditor, text: &str) -> Result<Option<String>, ReadlineError> {
    match rl.readline(text) {
        Ok(line) => Ok(Some(line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Asks the operator to pick one of the available ports.
fn select_port(rl: &mut LineEditor) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let ports = list_ports()?;
    let entries: Vec<String> = ports
        .iter()
        .map(|p| format!("{} ({})", p.name, p.description.dimmed()))
        .collect();

    loop {
        print_menu("Which port is your device connected to?", &entries);
        let Some(line) = prompt(rl, "> ")? else {
            return Ok(None);
        };
        match parse_selection(&line, ports.len()) {
            Some(i) => return Ok(Some(ports[i].name.clone())),
            None => println!("{}", "Poor choice. Try again.".yellow()),
        }
    }
}

/// Runs the interactive shell until the operator quits.
pub fn run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut rl: LineEditor = Editor::new()?;

    let port = match config.device.port.clone() {
        Some(port) => port,
        None => match select_port(&mut rl)? {
            Some(port) => port,
            None => return Ok(()),
        },
    };

    print_bar();
    println!("Connecting to serial terminal at {}...", port.cyan());
    let (mut session, sync) = Session::connect(config.connection_config(&port))?;
    print_bar();
    println!("{}", format_sync(&sync));

    let labels: Vec<&str> = MENU.iter().map(MenuItem::label).collect();
    loop {
        print_menu("What else would you like to do?", &labels);
        let Some(line) = prompt(&mut rl, "> ")? else {
            break;
        };
        let Some(i) = parse_selection(&line, MENU.len()) else {
            println!("{}", "Poor choice. Try again.".yellow());
            continue;
        };

        let item = MENU[i];
        if item == MenuItem::Quit {
            break;
        }
        if let Err(e) = run_item(&mut session, &mut rl, item) {
            let client_err = e.downcast_ref::<ClientError>();
            if matches!(
                client_err,
                Some(ClientError::ConnectionClosed | ClientError::NotConnected)
            ) {
                session.close();
                return Err(e);
            }
            if client_err.is_some_and(ClientError::is_input_error) {
                tracing::debug!("rejected input: {}", e);
                println!("{} {}", "[+]".green(), "Invalid key".red());
            } else {
                println!("{}: {}", "Error".red(), e);
            }
        }
    }

    session.close();
    println!("OK bye!");
    Ok(())
}

fn run_item<S: Read + Write>(
    session: &mut Session<S>,
    rl: &mut LineEditor,
    item: MenuItem,
) -> Result<(), Box<dyn std::error::Error>> {
    match item {
        MenuItem::SyncTime => {
            let sync = session.sync()?;
            print_bar();
            println!("{}", format_sync(&sync));
        }
        MenuItem::ListKeys => {
            let keys = session.list_keys()?;
            print_bar();
            println!("{}", format_keys(&keys));
        }
        MenuItem::AddKey => {
            let Some(name) = prompt(rl, "Enter a name for the key (3 chars): ")? else {
                return Ok(());
            };
            println!("What key do you want to add?");
            let Some(secret) = prompt(rl, "Enter in base32 format: ")? else {
                return Ok(());
            };
            let reply = session.add_key(&name, secret.trim())?;
            print_bar();
            println!("{}", format_reply(&reply));
        }
        MenuItem::DeleteKey => {
            let keys = session.list_keys()?;
            print_bar();
            println!("{}", format_keys(&keys));
            if keys.is_empty() {
                return Ok(());
            }
            print_bar();
            let Some(line) = prompt(rl, "Which key do you want to delete? ")? else {
                return Ok(());
            };
            let Some(index) = line.trim().parse().ok().and_then(zero_based) else {
                println!("{}", "Poor choice. Try again.".yellow());
                return Ok(());
            };
            let reply = session.delete_key(index)?;
            print_bar();
            println!("{}", format_reply(&reply));
        }
        MenuItem::ResetDevice => {
            let reply = session.wipe()?;
            print_bar();
            println!("{}", format_reply(&reply));
        }
        MenuItem::Quit => {}
    }
    Ok(())
}
