//! Interactive shell
//!
//! The single event loop that owns the coordinator. It multiplexes user
//! commands from stdin, results from the update channel, and the camera
//! preview ticker while a camera is open.

use anyhow::Result;
use scribe_core::{Coordinator, Notice, ScribeError, UpdateReceiver};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

const HELP: &str = "\
Commands:
  open <file>...      load one image, or several as a batch
  folder <dir>        recognize every image in a folder
  camera [index]      open a camera preview
  capture             capture the current preview frame
  close               close the camera without capturing
  ocr                 recognize the current image
  cancel              stop the running batch
  text                print the last result
  status              show the session status
  save-text <path>    save the result as plain text
  save-pdf <path>     save the result as a PDF document
  scan                scan a document
  clear               drop the image and result
  help                show this help
  quit                leave";

/// Preview status is reported once per this many frames
const PREVIEW_REPORT_EVERY: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Open(Vec<PathBuf>),
    Folder(PathBuf),
    Camera(Option<u32>),
    Capture,
    Close,
    Ocr,
    Cancel,
    Text,
    Status,
    SaveText(PathBuf),
    SavePdf(PathBuf),
    Scan,
    Clear,
    Help,
    Quit,
    Nothing,
}

/// Split a command line into words
///
/// Single or double quotes group a word containing spaces; a backslash
/// escapes the next character outside single quotes.
fn split_words(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('\''), c) => current.push(c),
            (_, '\\') => {
                let escaped = chars.next().ok_or("trailing backslash")?;
                current.push(escaped);
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let mut words = split_words(line)?.into_iter();
    let Some(verb) = words.next() else {
        return Ok(Command::Nothing);
    };
    let args: Vec<String> = words.collect();

    let one_path = |name: &str| -> std::result::Result<PathBuf, String> {
        match args.as_slice() {
            [path] => Ok(PathBuf::from(path)),
            _ => Err(format!("usage: {name} <path>")),
        }
    };
    let no_args = |command: Command| -> std::result::Result<Command, String> {
        if args.is_empty() {
            Ok(command)
        } else {
            Err(format!("`{verb}` takes no arguments"))
        }
    };

    match verb.to_ascii_lowercase().as_str() {
        "open" => Ok(Command::Open(args.iter().map(PathBuf::from).collect())),
        "folder" => one_path("folder").map(Command::Folder),
        "camera" => match args.as_slice() {
            [] => Ok(Command::Camera(None)),
            [index] => index
                .parse()
                .map(|i| Command::Camera(Some(i)))
                .map_err(|_| format!("invalid camera index: {index}")),
            _ => Err("usage: camera [index]".to_string()),
        },
        "capture" => no_args(Command::Capture),
        "close" => no_args(Command::Close),
        "ocr" => no_args(Command::Ocr),
        "cancel" => no_args(Command::Cancel),
        "text" => no_args(Command::Text),
        "status" => no_args(Command::Status),
        "save-text" => one_path("save-text").map(Command::SaveText),
        "save-pdf" => one_path("save-pdf").map(Command::SavePdf),
        "scan" => no_args(Command::Scan),
        "clear" => no_args(Command::Clear),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command `{other}` (try `help`)")),
    }
}

fn show(notice: &Notice) {
    match notice {
        Notice::Error(_) => eprintln!("{notice}"),
        _ => println!("{notice}"),
    }
}

fn prompt() {
    print!("scanscribe> ");
    let _ = std::io::stdout().flush();
}

fn print_status(coordinator: &Coordinator) {
    println!("status: {}", coordinator.status());
    match coordinator.current_image() {
        Some(image) => {
            let (width, height) = image.dimensions();
            println!("image: {} ({width}x{height})", image.origin());
        }
        None => println!("image: none"),
    }
    println!("text: {} characters", coordinator.result_text().chars().count());
    if coordinator.camera_active() {
        println!("camera: previewing");
    }
    if let Some(error) = coordinator.session().last_error() {
        println!("last error: {error}");
    }
}

fn dispatch(
    coordinator: &mut Coordinator,
    command: Command,
) -> std::result::Result<Option<Notice>, ScribeError> {
    let notice = match command {
        Command::Open(paths) => coordinator.select_files(paths)?,
        Command::Folder(dir) => coordinator.open_folder(&dir)?,
        Command::Camera(index) => coordinator.open_camera(index)?,
        Command::Capture => coordinator.capture()?,
        Command::Close => coordinator.close_camera()?,
        Command::Ocr => coordinator.run_recognition()?,
        Command::Cancel => coordinator.cancel_batch()?,
        Command::SaveText(path) => coordinator.export_plain_text(path)?,
        Command::SavePdf(path) => coordinator.export_document(path)?,
        Command::Scan => coordinator.scan()?,
        Command::Clear => coordinator.clear(),
        Command::Text => {
            let text = coordinator.result_text();
            if text.is_empty() {
                return Ok(Some(Notice::Info("No text yet".to_string())));
            }
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            return Ok(None);
        }
        Command::Status => {
            print_status(coordinator);
            return Ok(None);
        }
        Command::Help => {
            println!("{HELP}");
            return Ok(None);
        }
        Command::Quit | Command::Nothing => return Ok(None),
    };
    Ok(Some(notice))
}

/// Run the shell until `quit`, end of input or Ctrl-C
pub async fn run(mut coordinator: Coordinator, mut updates: UpdateReceiver) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut preview = interval(coordinator.preview_interval());
    preview.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut preview_frames: u64 = 0;

    println!("scanscribe - type `help` for commands");
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "stdin closed");
                        break;
                    }
                };
                match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => {
                        let opened_camera = matches!(command, Command::Camera(_));
                        match dispatch(&mut coordinator, command) {
                            Ok(Some(notice)) => show(&notice),
                            Ok(None) => {}
                            Err(e) => eprintln!("Error: {e}"),
                        }
                        if opened_camera {
                            preview_frames = 0;
                            preview.reset();
                        }
                    }
                    Err(message) => eprintln!("{message}"),
                }
                prompt();
            }
            Some(event) = updates.recv() => {
                if let Some(notice) = coordinator.apply(event) {
                    show(&notice);
                    prompt();
                }
            }
            _ = preview.tick(), if coordinator.camera_active() => {
                if let Some((width, height)) = coordinator.preview_tick() {
                    preview_frames += 1;
                    if preview_frames % PREVIEW_REPORT_EVERY == 1 {
                        eprintln!("preview: frame {preview_frames} ({width}x{height})");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("interrupted");
                break;
            }
        }
    }

    coordinator.shutdown().await;
    // results that landed while shutting down
    while let Ok(event) = updates.try_recv() {
        if let Some(notice) = coordinator.apply(event) {
            show(&notice);
        }
    }
    println!("bye");
    Ok(())
}
