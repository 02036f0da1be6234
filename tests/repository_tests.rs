//! File-system script repository and async loading helpers.

use kataribe::loader::{
    load_scripts_into, CancellationToken, FileSystemScriptRepository, RepositoryError,
    ScriptRepository,
};
use kataribe::{Engine, EngineConfig, EngineStep};
use std::path::PathBuf;

struct TempScripts {
    root: PathBuf,
}

impl TempScripts {
    fn new(tag: &str, files: &[(&str, &str)]) -> Self {
        let root = std::env::temp_dir().join(format!("kataribe-test-{}-{tag}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        for (name, text) in files {
            std::fs::write(root.join(format!("{name}.knr")), text).unwrap();
        }
        Self { root }
    }
}

impl Drop for TempScripts {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

#[tokio::test]
async fn loads_script_text_from_disk() {
    let dir = TempScripts::new("load", &[("main", "Yui: hello")]);
    let repo = FileSystemScriptRepository::new(&dir.root);

    let text = repo.load_script("main").await.unwrap();
    assert_eq!(text, "Yui: hello");
}

#[tokio::test]
async fn missing_script_is_not_found() {
    let dir = TempScripts::new("missing", &[]);
    let repo = FileSystemScriptRepository::new(&dir.root);

    assert!(matches!(
        repo.load_script("ghost").await,
        Err(RepositoryError::NotFound { name }) if name == "ghost"
    ));
}

#[tokio::test]
async fn lists_scripts_sorted_and_ignores_other_files() {
    let dir = TempScripts::new("list", &[("zeta", ""), ("alpha", "")]);
    std::fs::write(dir.root.join("notes.txt"), "not a script").unwrap();
    let repo = FileSystemScriptRepository::new(&dir.root);

    let names = repo.list_scripts().await.unwrap();
    assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
}

#[tokio::test]
async fn loads_every_listed_script_into_the_engine() {
    let dir = TempScripts::new(
        "into-engine",
        &[("main", "Yui: start\n@goto chapter2"), ("chapter2", "Mei: next")],
    );
    let repo = FileSystemScriptRepository::new(&dir.root);
    let mut engine = Engine::new(EngineConfig::default());

    let diags = load_scripts_into(&mut engine, &repo, &CancellationToken::new())
        .await
        .unwrap();
    assert!(diags.is_empty());

    assert_eq!(engine.play("main").unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.continue_input().unwrap(), EngineStep::WaitingForInput);
    assert_eq!(engine.printer().text, "next");
}

#[tokio::test]
async fn cancelled_token_aborts_loading() {
    let dir = TempScripts::new("cancel", &[("main", "Yui: hi")]);
    let repo = FileSystemScriptRepository::new(&dir.root);
    let mut engine = Engine::new(EngineConfig::default());

    let token = CancellationToken::new();
    token.cancel();
    assert!(matches!(
        load_scripts_into(&mut engine, &repo, &token).await,
        Err(RepositoryError::Cancelled)
    ));
}
