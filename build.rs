use std::path::{Path, PathBuf};
use std::process::Command;

const MAX_LINES: usize = 750;

const CHECKED_EXTENSIONS: &[&str] = &["rs", "md", "yaml", "toml"];

const EXCLUDED_DIRS: &[&str] = &[
    "target",
    ".git",
    "node_modules",
    "examples",
    "original_source",
    "output",
];

const EXCLUDED_FILES: &[&str] = &["Cargo.lock"];

type Violations = Vec<(PathBuf, Vec<(usize, String)>)>;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/main");
    println!("cargo:rerun-if-changed=.git/packed-refs");

    let sha = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=CONCEPT_FORGE_GIT_SHA={}", sha);

    let root = PathBuf::from(
        std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set"),
    );
    let files = collect_files_to_check(&root);
    for file in &files {
        println!("cargo:rerun-if-changed={}", file.display());
    }
    let rust_files: Vec<PathBuf> = files
        .iter()
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()) == Some("rs")
                && p.file_name().and_then(|n| n.to_str()) != Some("build.rs")
        })
        .cloned()
        .collect();

    enforce_line_limits(&root, &files);
    enforce_no_dead_code_allows(&root, &rust_files);
    enforce_no_test_skips(&root, &rust_files);
    enforce_no_nested_runtimes(&root, &rust_files);
    enforce_serial_for_env_mutations(&root, &rust_files);
}

fn enforce_line_limits(root: &Path, files: &[PathBuf]) {
    let mut violations = Vec::new();
    for file in files {
        let rel_path = file.strip_prefix(root).unwrap_or(file);
        match count_lines(file) {
            Ok(line_count) if line_count > MAX_LINES => {
                violations.push((rel_path.to_path_buf(), line_count));
            }
            Ok(_) => {}
            Err(e) => {
                println!(
                    "cargo:warning=Could not read file {}: {}",
                    rel_path.display(),
                    e
                );
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n========================================");
        eprintln!("FILE LINE LIMIT EXCEEDED (max {} lines)", MAX_LINES);
        eprintln!("========================================");
        for (path, lines) in &violations {
            eprintln!(
                "  {} - {} lines (exceeds by {})",
                path.display(),
                lines,
                lines - MAX_LINES
            );
        }
        eprintln!("========================================\n");
        eprintln!("Please split these files into smaller modules.\n");
        panic!(
            "Build failed: {} file(s) exceed the {} line limit",
            violations.len(),
            MAX_LINES
        );
    }
}

fn collect_files_to_check(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if let Ok(output) = Command::new("git")
        .args(["ls-files"])
        .current_dir(root)
        .output()
    {
        if output.status.success() {
            if let Ok(stdout) = String::from_utf8(output.stdout) {
                for line in stdout.lines() {
                    let path = root.join(line);
                    if should_check_file(&path, root) {
                        files.push(path);
                    }
                }
                if !files.is_empty() {
                    return files;
                }
            }
        }
    }

    walk_directory(root, root, &mut files);
    files
}

fn walk_directory(dir: &Path, root: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_dir() {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if EXCLUDED_DIRS.contains(&name) {
                    continue;
                }
            }
            walk_directory(&path, root, files);
        } else if should_check_file(&path, root) {
            files.push(path);
        }
    }
}

fn should_check_file(path: &Path, root: &Path) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e,
        None => return false,
    };

    if !CHECKED_EXTENSIONS.contains(&ext) {
        return false;
    }

    if let Ok(rel_path) = path.strip_prefix(root) {
        let rel_str = rel_path.to_string_lossy();
        if EXCLUDED_FILES.iter().any(|excluded| rel_str == *excluded) {
            return false;
        }

        for component in rel_path.components() {
            if let Some(name) = component.as_os_str().to_str() {
                if EXCLUDED_DIRS.contains(&name) {
                    return false;
                }
            }
        }
    }

    true
}

fn count_lines(path: &Path) -> std::io::Result<usize> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .count())
}

/// Name of the function declared on `line`, if any.
fn fn_name(line: &str) -> Option<String> {
    let (_, after_fn) = line.split_once("fn ")?;
    let (name, _) = after_fn.split_once('(')?;
    Some(name.trim().to_string())
}

fn is_test_attribute(trimmed: &str) -> bool {
    trimmed == "#[test]" || trimmed.starts_with("#[tokio::test")
}

/// Line number and name of the test function following a test attribute.
fn test_fn_after(lines: &[&str], attr_index: usize) -> Option<(usize, String)> {
    lines
        .iter()
        .skip(attr_index + 1)
        .take(4)
        .find(|l| l.contains("fn "))
        .map(|l| (attr_index + 1, fn_name(l).unwrap_or_default()))
}

fn report(root: &Path, violations: &mut Violations, file: &Path, found: Vec<(usize, String)>) {
    if !found.is_empty() {
        let rel_path = file.strip_prefix(root).unwrap_or(file).to_path_buf();
        violations.push((rel_path, found));
    }
}

fn print_violations(title: &str, violations: &Violations, advice: &[&str]) {
    eprintln!("\n========================================");
    eprintln!("{}", title);
    eprintln!("========================================");
    eprintln!();
    for (path, lines) in violations {
        for (line_num, message) in lines {
            eprintln!("  {}:{}", path.display(), line_num);
            eprintln!("    {}", message.trim());
            eprintln!();
        }
    }
    eprintln!("========================================");
    eprintln!();
    for line in advice {
        eprintln!("{}", line);
    }
    eprintln!("\n========================================\n");
}

fn total(violations: &Violations) -> usize {
    violations.iter().map(|(_, v)| v.len()).sum()
}

fn enforce_no_dead_code_allows(root: &Path, rust_files: &[PathBuf]) {
    let mut violations = Violations::new();

    for file in rust_files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let found = content
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let trimmed = line.trim();
                (trimmed.starts_with("#[allow(") || trimmed.starts_with("#![allow("))
                    && trimmed.contains("dead_code")
            })
            .map(|(i, line)| (i + 1, line.to_string()))
            .collect();
        report(root, &mut violations, file, found);
    }

    if !violations.is_empty() {
        print_violations(
            "#[allow(dead_code)] IS NOT ALLOWED",
            &violations,
            &[
                "Do NOT use #[allow(dead_code)] to silence warnings.",
                "",
                "Instead:",
                "  - DELETE unused code entirely",
                "  - If the code is for tests, use #[cfg(test)]",
                "  - If the code is a public API, make it actually public",
            ],
        );
        panic!(
            "Build failed: {} #[allow(dead_code)] occurrence(s) found. Remove the dead code.",
            total(&violations)
        );
    }
}

/// Bans tests that silently skip instead of failing.
fn enforce_no_test_skips(root: &Path, rust_files: &[PathBuf]) {
    let skip_patterns = [
        "Skipping test",
        "skipping test",
        "Test skipped",
        "test skipped",
        "graphviz not installed",
    ];
    let mut violations = Violations::new();

    for file in rust_files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        let mut found = Vec::new();

        let mut current: Option<(usize, String)> = None;
        let mut brace_depth = 0i32;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if is_test_attribute(trimmed) {
                current = test_fn_after(&lines, i);
                brace_depth = 0;
            }
            let Some((start, name)) = current.clone() else {
                continue;
            };

            for c in line.chars() {
                if c == '{' {
                    brace_depth += 1;
                } else if c == '}' {
                    brace_depth -= 1;
                    if brace_depth == 0 {
                        current = None;
                    }
                }
            }

            if let Some(pattern) = skip_patterns.iter().find(|p| line.contains(*p)) {
                found.push((start, format!("test `{}` contains skip pattern: {}", name, pattern)));
                current = None;
            } else if trimmed == "return;" && brace_depth > 1 {
                found.push((
                    start,
                    format!("test `{}` has conditional early return (silent skip)", name),
                ));
                current = None;
            }
        }
        report(root, &mut violations, file, found);
    }

    if !violations.is_empty() {
        print_violations(
            "SILENT TEST SKIPS ARE NOT ALLOWED",
            &violations,
            &[
                "Tests must FAIL if they cannot run, not silently pass.",
                "",
                "Instead of skipping:",
                "  - Use a test double (scripted provider, recording renderer)",
                "  - Use assert!() to verify preconditions",
                "  - If truly optional, use #[ignore] with a reason",
            ],
        );
        panic!(
            "Build failed: {} silent test skip(s) found. Make tests fail instead of skip.",
            total(&violations)
        );
    }
}

/// Bans spawning threads that create their own tokio runtime.
fn enforce_no_nested_runtimes(root: &Path, rust_files: &[PathBuf]) {
    let mut violations = Violations::new();

    for file in rust_files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        let mut found = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if (trimmed.contains("std::thread::spawn") || trimmed.contains("thread::spawn("))
                && !trimmed.starts_with("//")
            {
                let context = lines.iter().skip(i).take(20).copied().collect::<Vec<_>>().join("\n");
                if context.contains("Runtime::new()") || context.contains("runtime::Builder") {
                    found.push((i + 1, line.to_string()));
                }
            }
        }
        report(root, &mut violations, file, found);
    }

    if !violations.is_empty() {
        print_violations(
            "NESTED TOKIO RUNTIMES ARE NOT ALLOWED",
            &violations,
            &[
                "Blocking work belongs in tokio::task::spawn_blocking on the",
                "main runtime, not in a thread with a runtime of its own.",
            ],
        );
        panic!(
            "Build failed: {} nested runtime(s) found. Use spawn_blocking instead.",
            total(&violations)
        );
    }
}

/// Requires #[serial] for tests that mutate environment variables.
fn enforce_serial_for_env_mutations(root: &Path, rust_files: &[PathBuf]) {
    let mut violations = Violations::new();

    for file in rust_files {
        let Ok(content) = std::fs::read_to_string(file) else {
            continue;
        };
        let lines: Vec<&str> = content.lines().collect();
        let mut found = Vec::new();

        let mut current: Option<(usize, String)> = None;
        let mut has_serial = false;
        let mut brace_depth = 0i32;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed == "#[serial]" || trimmed == "#[serial_test::serial]" {
                has_serial = true;
            }
            if is_test_attribute(trimmed) {
                current = test_fn_after(&lines, i);
                brace_depth = 0;
            }
            let Some((start, name)) = current.clone() else {
                continue;
            };

            for c in line.chars() {
                if c == '{' {
                    brace_depth += 1;
                } else if c == '}' {
                    brace_depth -= 1;
                    if brace_depth == 0 {
                        current = None;
                        has_serial = false;
                    }
                }
            }

            let mutates_env = !trimmed.starts_with("//")
                && (trimmed.contains("env::set_var") || trimmed.contains("env::remove_var"));
            if mutates_env && !has_serial {
                found.push((start, format!("test `{}` mutates env without #[serial]", name)));
                current = None;
            }
        }
        report(root, &mut violations, file, found);
    }

    if !violations.is_empty() {
        print_violations(
            "ENV MUTATIONS REQUIRE #[serial]",
            &violations,
            &[
                "Tests that call std::env::set_var or std::env::remove_var",
                "modify global state and cause flaky failures in parallel.",
                "",
                "Add #[serial] from the serial_test crate.",
            ],
        );
        panic!(
            "Build failed: {} test(s) mutate env vars without #[serial].",
            total(&violations)
        );
    }
}
