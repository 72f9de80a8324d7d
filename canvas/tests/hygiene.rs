//! Hygiene: source-scan budgets for the engine crate.
//!
//! The engine runs inside every client and must never take the session down,
//! so anything that can panic or silently swallow a result is budgeted. The
//! engine is also clock-free and I/O-free; reading wall time or printing to
//! stdout from `src/` is a bug. Budgets only ever go down.

use std::fs;
use std::path::Path;

struct Budget {
    pattern: &'static str,
    max: usize,
    why: &'static str,
}

const BUDGETS: &[Budget] = &[
    Budget { pattern: ".unwrap()", max: 0, why: "panics on None/Err" },
    Budget { pattern: ".expect(", max: 0, why: "panics on None/Err" },
    Budget { pattern: "panic!(", max: 0, why: "crashes the host" },
    Budget { pattern: "unreachable!(", max: 0, why: "crashes the host" },
    Budget { pattern: "todo!(", max: 0, why: "unfinished path" },
    Budget { pattern: "unimplemented!(", max: 0, why: "unfinished path" },
    Budget { pattern: "let _ =", max: 0, why: "discards a result unseen" },
    Budget { pattern: ".ok()", max: 0, why: "drops the error value" },
    Budget { pattern: "#[allow(dead_code)]", max: 0, why: "hides unused code" },
    Budget { pattern: "SystemTime", max: 0, why: "engine time comes from now_ms" },
    Budget { pattern: "Instant::now", max: 0, why: "engine time comes from now_ms" },
    Budget { pattern: "println!(", max: 0, why: "use tracing" },
    Budget { pattern: "eprintln!(", max: 0, why: "use tracing" },
];

struct SourceFile {
    path: String,
    content: String,
}

/// Production `.rs` files under `src/`, sibling `_test.rs` files excluded.
fn source_files() -> Vec<SourceFile> {
    let mut files = Vec::new();
    collect(Path::new("src"), &mut files);
    files
}

fn collect(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect(&path, out);
            continue;
        }
        let path_str = path.to_string_lossy().to_string();
        if !path_str.ends_with(".rs") || path_str.ends_with("_test.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path: path_str, content });
        }
    }
}

fn hits(files: &[SourceFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .filter_map(|file| {
            let count = file.content.lines().filter(|line| line.contains(pattern)).count();
            (count > 0).then(|| (file.path.clone(), count))
        })
        .collect()
}

#[test]
fn scan_finds_engine_sources() {
    let files = source_files();
    assert!(files.iter().any(|f| f.path.ends_with("engine.rs")));
    assert!(files.iter().all(|f| !f.path.ends_with("_test.rs")));
}

#[test]
fn budgets_hold() {
    let files = source_files();
    let mut failures = Vec::new();
    for budget in BUDGETS {
        let found = hits(&files, budget.pattern);
        let count: usize = found.iter().map(|(_, c)| c).sum();
        if count > budget.max {
            let detail: Vec<String> =
                found.iter().map(|(path, c)| format!("    {path}: {c}")).collect();
            failures.push(format!(
                "`{}` found {count}, max {} ({})\n{}",
                budget.pattern,
                budget.max,
                budget.why,
                detail.join("\n")
            ));
        }
    }
    assert!(failures.is_empty(), "hygiene budgets exceeded:\n{}", failures.join("\n"));
}
