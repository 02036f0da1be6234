//! CLI entry point for kataribe
//!
//! Plays a script file in the terminal: dialogue is printed line by line,
//! Enter continues, and timed waits run in real time.

use kataribe::{Directive, Engine, EngineConfig, EngineStep};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "play" => {
            if args.len() < 3 {
                eprintln!("Error: Missing script file path");
                eprintln!();
                print_usage();
                process::exit(1);
            }
            let file_path = PathBuf::from(&args[2]);
            let auto = args.iter().skip(3).any(|a| a == "--auto");
            let skip = args.iter().skip(3).any(|a| a == "--skip");
            if let Err(err) = run_play(&file_path, auto, skip) {
                eprintln!("Error: {err}");
                process::exit(1);
            }
        }
        "--help" | "-h" => {
            print_usage();
        }
        other => {
            eprintln!("Error: Unknown command '{other}'");
            eprintln!();
            print_usage();
            process::exit(1);
        }
    }
}

fn print_usage() {
    println!("kataribe - Narrative Script Engine");
    println!();
    println!("USAGE:");
    println!("    kataribe play <script.knr> [--auto] [--skip]");
    println!();
    println!("COMMANDS:");
    println!("    play <file>    Play a script in the terminal");
    println!("    --help, -h     Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --auto    Advance automatically instead of waiting for Enter");
    println!("    --skip    Fast-forward through waits");
}

fn run_play(file_path: &Path, auto: bool, skip: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file_path)
        .map_err(|err| anyhow::anyhow!("failed to read '{}': {err}", file_path.display()))?;
    let name = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Main")
        .to_string();

    let mut engine = Engine::new(EngineConfig::default());
    let diags = engine.load_script(&name, &text);
    for diag in diags.iter() {
        eprintln!("warning: {diag}");
    }

    engine.set_auto_play(auto);
    let mut step = if skip {
        engine.play(&name)?;
        engine.set_skip(true)?
    } else {
        engine.play(&name)?
    };

    let stdin = std::io::stdin();
    loop {
        render(engine.drain_output());
        match step {
            EngineStep::WaitingForInput => {
                print!("▼ ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                step = engine.continue_input()?;
            }
            EngineStep::WaitingForTimer => {
                std::thread::sleep(Duration::from_millis(100));
                step = engine.tick(0.1)?;
            }
            EngineStep::Halted => break,
        }
    }
    render(engine.drain_output());
    println!("(end)");
    Ok(())
}

fn render(directives: Vec<Directive>) {
    for directive in directives {
        match directive {
            Directive::Print { author, text, reset } => {
                if reset {
                    match &author {
                        Some(author) => print!("\n{author}: {text}"),
                        None => print!("\n{text}"),
                    }
                } else {
                    print!("{text}");
                }
                let _ = std::io::stdout().flush();
            }
            Directive::SetAppearance { actor, appearance } => {
                println!("[{actor} looks {appearance}]");
            }
            Directive::PlayMusic { path, .. } => println!("[bgm: {path}]"),
            Directive::PlaySound { path, .. } => println!("[sfx: {path}]"),
            Directive::ShowBackground { id, appearance } => match appearance {
                Some(app) => println!("[background: {id} ({app})]"),
                None => println!("[background: {id}]"),
            },
            Directive::ShowCharacter { id, appearance } => match appearance {
                Some(app) => println!("[enter: {id} ({app})]"),
                None => println!("[enter: {id}]"),
            },
            Directive::HideActor { id } => println!("[exit: {id}]"),
            Directive::PlayMovie { path } => println!("[movie: {path}]"),
        }
    }
}
