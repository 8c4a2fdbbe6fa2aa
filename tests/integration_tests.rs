use cloudtidy::cli::{CliError, OrganizeCommand, run_cli_with_config};
use cloudtidy::config::{Config, ConfigError};
use cloudtidy::file_category::{DiagnosticLine, NullSink};
use cloudtidy::file_organizer::{Executor, RecordStatus};
use cloudtidy::local_drive::{FileSource, LocalDrive};
use cloudtidy::path_template::{build_path, join_path};
use cloudtidy::planner::{MovePlanner, SkipReason};
use cloudtidy::undo::{HistoryError, HistoryStore, RecordSummary};
/// Integration tests for cloudtidy
///
/// These tests run complete organize / undo workflows against a temporary
/// directory, both through the library pipeline and through the CLI entry
/// point.
///
/// Test categories:
/// 1. Organization workflows
/// 2. Dry-run mode and batch limits
/// 3. Undo and divergence
/// 4. Configuration and filtering
/// 5. Error scenarios
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

const RULES: &str = r#"
[organization]
destination_root = "Organized"
folder_structure = "{category}"

[categories]
default_category = "Other"

[categories.definitions.Finance]
keywords = ["invoice", "receipt"]
priority = 60

[categories.definitions.Pictures]
keywords = ["photo", "screenshot"]
extensions = [".jpg", ".png"]
patterns = ['IMG_\d{4}']
priority = 70

[categories.definitions.Traffic_Tickets]
keywords = ["speeding", "ticket", "citation"]
patterns = ['ticket-\d{4}']
priority = 80
"#;

/// A temporary drive plus a configuration file kept outside of it.
struct TestFixture {
    drive_dir: TempDir,
    config_dir: TempDir,
    config_path: PathBuf,
}

impl TestFixture {
    fn new() -> Self {
        Self::with_config("")
    }

    /// Uses the test rules with `extra` TOML appended.
    fn with_config(extra: &str) -> Self {
        let drive_dir = TempDir::new().expect("Failed to create temp directory");
        let config_dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = config_dir.path().join("cloudtidy.toml");
        fs::write(&config_path, format!("{}\n{}", RULES, extra)).expect("Failed to write config");
        TestFixture {
            drive_dir,
            config_dir,
            config_path,
        }
    }

    fn path(&self) -> &Path {
        self.drive_dir.path()
    }

    fn create_file(&self, rel_path: &str, content: &str) {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    fn run(&self, command: OrganizeCommand) -> Result<(), CliError> {
        run_cli_with_config(command, Some(&self.config_path))
    }

    fn organize(&self) -> Result<(), CliError> {
        self.run(OrganizeCommand::Organize {
            dir: self.path().to_path_buf(),
            dry_run: false,
            max_files: None,
            json: false,
        })
    }

    fn undo(&self, operation_id: &str) -> Result<(), CliError> {
        self.run(OrganizeCommand::Undo {
            dir: self.path().to_path_buf(),
            operation_id: operation_id.to_string(),
        })
    }

    fn history(&self) -> Vec<RecordSummary> {
        HistoryStore::open(self.path().join(".cloudtidy/history"))
            .expect("Failed to open history")
            .list()
            .expect("Failed to list history")
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }
}

// ============================================================================
// Organization workflows
// ============================================================================

#[test]
fn test_organize_moves_files_into_categories() {
    let fixture = TestFixture::new();
    fixture.create_file("invoice-2024-01-15.pdf", "invoice");
    fixture.create_file("IMG_1234.jpg", "jpeg");
    fixture.create_file("speeding-ticket-2024-03.pdf", "ticket");
    fixture.create_file("random-file.txt", "misc");

    fixture.organize().expect("Organize failed");

    fixture.assert_file_exists("Organized/Finance/invoice-2024-01-15.pdf");
    fixture.assert_file_exists("Organized/Pictures/IMG_1234.jpg");
    fixture.assert_file_exists("Organized/Traffic_Tickets/speeding-ticket-2024-03.pdf");
    fixture.assert_file_exists("Organized/Other/random-file.txt");
    fixture.assert_file_not_exists("invoice-2024-01-15.pdf");
    fixture.assert_file_not_exists("random-file.txt");

    let history = fixture.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RecordStatus::Complete);
    assert_eq!(history[0].files_moved, 4);
    assert!(!history[0].dry_run);
}

#[test]
fn test_organize_preserves_file_content() {
    let fixture = TestFixture::new();
    fixture.create_file("Scans/receipt-hardware.pdf", "total: 42.00");

    fixture.organize().expect("Organize failed");

    let moved = fs::read_to_string(fixture.path().join("Organized/Finance/receipt-hardware.pdf"))
        .expect("Moved file should be readable");
    assert_eq!(moved, "total: 42.00");
}

#[test]
fn test_organize_empty_directory() {
    let fixture = TestFixture::new();
    fixture.organize().expect("Organize failed");
    assert!(fixture.history().is_empty());
}

#[test]
fn test_organize_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.create_file("invoice.pdf", "a");
    fixture.create_file("photo.png", "b");

    fixture.organize().expect("First organize failed");
    fixture.organize().expect("Second organize failed");

    fixture.assert_file_exists("Organized/Finance/invoice.pdf");
    fixture.assert_file_exists("Organized/Pictures/photo.png");
    // the second run had nothing to do and recorded nothing
    assert_eq!(fixture.history().len(), 1);
}

#[test]
fn test_same_name_from_different_folders_gets_suffix() {
    let fixture = TestFixture::new();
    fixture.create_file("Archive/invoice.pdf", "archive");
    fixture.create_file("Inbox/invoice.pdf", "inbox");

    fixture.organize().expect("Organize failed");

    let first = fs::read_to_string(fixture.path().join("Organized/Finance/invoice.pdf")).unwrap();
    let second =
        fs::read_to_string(fixture.path().join("Organized/Finance/invoice(2).pdf")).unwrap();
    assert_eq!(first, "archive");
    assert_eq!(second, "inbox");
}

#[test]
fn test_later_run_suffixes_name_of_already_organized_file() {
    let fixture = TestFixture::new();
    fixture.create_file("invoice.pdf", "first");
    fixture.organize().expect("First organize failed");

    fixture.create_file("Inbox/invoice.pdf", "second");
    fixture.organize().expect("Second organize failed");

    let first = fs::read_to_string(fixture.path().join("Organized/Finance/invoice.pdf")).unwrap();
    let second =
        fs::read_to_string(fixture.path().join("Organized/Finance/invoice(2).pdf")).unwrap();
    assert_eq!(first, "first");
    assert_eq!(second, "second");

    let history = fixture.history();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|h| h.status == RecordStatus::Complete));
}

#[test]
fn test_library_pipeline_uses_date_template() {
    let fixture = TestFixture::new();
    fixture.create_file("Downloads/invoice-march.pdf", "x");
    fixture.create_file("Downloads/holiday.jpg", "y");

    let compiled = Config::from_toml("")
        .expect("Empty config is valid")
        .compile()
        .expect("Default config compiles");
    let mut drive = LocalDrive::new(fixture.path()).unwrap();
    let files = drive.list_files("").unwrap();
    let layout = compiled.settings.layout().unwrap();
    let mut lines: Vec<DiagnosticLine> = Vec::new();

    let mut plan = MovePlanner::new(&compiled.registry, &compiled.settings).plan(
        &files,
        |f| layout.matches(&f.path),
        &mut lines,
    );
    assert_eq!(lines.len(), 2);

    let record = Executor::new(false).execute(&mut plan, &mut drive);
    assert_eq!(record.status, RecordStatus::Complete);

    for file in &files {
        let category = if file.name.ends_with(".jpg") {
            "Pictures"
        } else {
            "Finance"
        };
        let expanded = build_path(category, file.created, "{category}/{year}/{month}");
        let folder = join_path(["Organized", expanded.as_str()]);
        fixture.assert_file_exists(&format!("{}/{}", folder, file.name));
    }

    // the moved files are recognized as organized on the next pass
    let again = drive.list_files("").unwrap();
    let replan = MovePlanner::new(&compiled.registry, &compiled.settings).plan(
        &again,
        |f| layout.matches(&f.path),
        &mut NullSink,
    );
    assert!(replan.is_empty());
    assert!(replan.skipped.iter().all(|s| s.reason == SkipReason::AlreadyOrganized));
}

// ============================================================================
// Dry-run mode and batch limits
// ============================================================================

#[test]
fn test_dry_run_moves_nothing_and_records_nothing() {
    let fixture = TestFixture::new();
    fixture.create_file("invoice.pdf", "a");
    fixture.create_file("IMG_0001.png", "b");

    fixture
        .run(OrganizeCommand::Organize {
            dir: fixture.path().to_path_buf(),
            dry_run: true,
            max_files: None,
            json: false,
        })
        .expect("Dry run failed");

    fixture.assert_file_exists("invoice.pdf");
    fixture.assert_file_exists("IMG_0001.png");
    fixture.assert_file_not_exists("Organized");
    assert!(fixture.history().is_empty());
}

#[test]
fn test_json_dry_run_succeeds() {
    let fixture = TestFixture::new();
    fixture.create_file("invoice.pdf", "a");

    fixture
        .run(OrganizeCommand::Organize {
            dir: fixture.path().to_path_buf(),
            dry_run: true,
            max_files: None,
            json: true,
        })
        .expect("JSON dry run failed");
    fixture.assert_file_exists("invoice.pdf");
}

#[test]
fn test_batch_limit_defers_remaining_files() {
    let fixture = TestFixture::new();
    for i in 0..15 {
        fixture.create_file(&format!("scan-{:02}.jpg", i), "img");
    }
    let organize = |max_files| {
        fixture.run(OrganizeCommand::Organize {
            dir: fixture.path().to_path_buf(),
            dry_run: false,
            max_files,
            json: false,
        })
    };

    organize(Some(10)).expect("First batch failed");

    for i in 0..10 {
        fixture.assert_file_exists(&format!("Organized/Pictures/scan-{:02}.jpg", i));
    }
    for i in 10..15 {
        fixture.assert_file_exists(&format!("scan-{:02}.jpg", i));
    }

    organize(Some(10)).expect("Second batch failed");
    for i in 10..15 {
        fixture.assert_file_exists(&format!("Organized/Pictures/scan-{:02}.jpg", i));
    }
    let history = fixture.history();
    assert_eq!(history.len(), 2);
    let mut moved: Vec<usize> = history.iter().map(|h| h.files_moved).collect();
    moved.sort();
    assert_eq!(moved, vec![5, 10]);
}

#[test]
fn test_configured_batch_limit() {
    let fixture = TestFixture::with_config("[limits]\nmax_files_per_run = 2\n");
    for name in ["a-invoice.pdf", "b-invoice.pdf", "c-invoice.pdf"] {
        fixture.create_file(name, "x");
    }

    fixture.organize().expect("Organize failed");

    fixture.assert_file_exists("Organized/Finance/a-invoice.pdf");
    fixture.assert_file_exists("Organized/Finance/b-invoice.pdf");
    fixture.assert_file_exists("c-invoice.pdf");
}

// ============================================================================
// Undo and divergence
// ============================================================================

#[test]
fn test_undo_round_trip() {
    let fixture = TestFixture::new();
    fixture.create_file("Inbox/invoice.pdf", "a");
    fixture.create_file("IMG_4321.jpg", "b");
    fixture.create_file("notes.txt", "c");

    fixture.organize().expect("Organize failed");
    let id = fixture.history()[0].id.clone();

    fixture.undo(&id).expect("Undo failed");

    fixture.assert_file_exists("Inbox/invoice.pdf");
    fixture.assert_file_exists("IMG_4321.jpg");
    fixture.assert_file_exists("notes.txt");
    fixture.assert_file_not_exists("Organized/Finance/invoice.pdf");
    assert_eq!(fixture.history()[0].status, RecordStatus::Undone);

    let second = fixture.undo(&id);
    assert!(matches!(
        second,
        Err(CliError::History(HistoryError::AlreadyUndone(_)))
    ));
}

#[test]
fn test_undo_restores_suffixed_files_to_their_sources() {
    let fixture = TestFixture::new();
    fixture.create_file("Archive/invoice.pdf", "archive");
    fixture.create_file("Inbox/invoice.pdf", "inbox");

    fixture.organize().expect("Organize failed");
    let id = fixture.history()[0].id.clone();
    fixture.undo(&id).expect("Undo failed");

    assert_eq!(
        fs::read_to_string(fixture.path().join("Archive/invoice.pdf")).unwrap(),
        "archive"
    );
    assert_eq!(
        fs::read_to_string(fixture.path().join("Inbox/invoice.pdf")).unwrap(),
        "inbox"
    );
}

#[test]
fn test_undo_with_moved_files_is_partial() {
    let fixture = TestFixture::new();
    fixture.create_file("invoice.pdf", "a");
    fixture.create_file("receipt.pdf", "b");

    fixture.organize().expect("Organize failed");
    let id = fixture.history()[0].id.clone();

    // the user moves one organized file away before undoing
    fs::rename(
        fixture.path().join("Organized/Finance/receipt.pdf"),
        fixture.path().join("kept-receipt.pdf"),
    )
    .unwrap();

    fixture.undo(&id).expect("Undo should succeed partially");

    fixture.assert_file_exists("invoice.pdf");
    fixture.assert_file_not_exists("receipt.pdf");
    assert_eq!(fixture.history()[0].status, RecordStatus::PartiallyUndone);

    // a partially undone run may be retried; the diverged file stays skipped
    fixture.undo(&id).expect("Retry should be allowed");
    assert_eq!(fixture.history()[0].status, RecordStatus::PartiallyUndone);
}

#[test]
fn test_undo_unknown_operation() {
    let fixture = TestFixture::new();
    assert!(matches!(
        fixture.undo("20240101_000000_abcdef"),
        Err(CliError::History(HistoryError::NotFound(_)))
    ));
}

// ============================================================================
// Configuration and filtering
// ============================================================================

#[test]
fn test_exclusions_from_config() {
    let fixture = TestFixture::with_config(
        "[limits]\nexclude_extensions = [\"tmp\"]\nexclude_patterns = [\"keep/*\"]\n",
    );
    fixture.create_file("invoice.tmp", "draft");
    fixture.create_file("keep/invoice.pdf", "pinned");
    fixture.create_file("invoice.pdf", "move me");

    fixture.organize().expect("Organize failed");

    fixture.assert_file_exists("invoice.tmp");
    fixture.assert_file_exists("keep/invoice.pdf");
    fixture.assert_file_exists("Organized/Finance/invoice.pdf");
}

#[test]
fn test_hidden_files_are_left_alone() {
    let fixture = TestFixture::new();
    fixture.create_file(".invoice.pdf", "hidden");
    fixture.create_file(".config/receipt.pdf", "hidden dir");

    fixture.organize().expect("Organize failed");

    fixture.assert_file_exists(".invoice.pdf");
    fixture.assert_file_exists(".config/receipt.pdf");
}

#[test]
fn test_missing_config_file_is_an_error() {
    let fixture = TestFixture::new();
    let result = run_cli_with_config(
        OrganizeCommand::Classify {
            names: vec!["invoice.pdf".to_string()],
        },
        Some(&fixture.config_dir.path().join("missing.toml")),
    );
    assert!(matches!(
        result,
        Err(CliError::Config(ConfigError::ConfigNotFound(_)))
    ));
}

#[test]
fn test_zero_priority_config_is_an_error() {
    let fixture = TestFixture::with_config(
        "[categories.definitions.Broken]\nkeywords = [\"x\"]\npriority = 0\n",
    );
    let result = fixture.organize();
    assert!(matches!(
        result,
        Err(CliError::Config(ConfigError::InvalidPriority { .. }))
    ));
}

// ============================================================================
// Other commands and error scenarios
// ============================================================================

#[test]
fn test_history_suggest_and_classify_commands() {
    let fixture = TestFixture::new();
    fixture.create_file("mortgage-statement-jan.pdf", "a");
    fixture.create_file("mortgage-statement-feb.pdf", "b");

    fixture
        .run(OrganizeCommand::Suggest {
            dir: fixture.path().to_path_buf(),
            top: 5,
        })
        .expect("Suggest failed");
    fixture
        .run(OrganizeCommand::Classify {
            names: vec!["IMG_1234.jpg".to_string(), "unknown.bin".to_string()],
        })
        .expect("Classify failed");

    fixture.organize().expect("Organize failed");
    fixture
        .run(OrganizeCommand::History {
            dir: fixture.path().to_path_buf(),
            limit: 5,
            days: Some(30),
        })
        .expect("History failed");

    // suggest and classify never touch the drive
    fixture.assert_file_exists("Organized/Other/mortgage-statement-jan.pdf");
    assert_eq!(fixture.history().len(), 1);
}

#[test]
fn test_organize_nonexistent_directory() {
    let fixture = TestFixture::new();
    let result = fixture.run(OrganizeCommand::Organize {
        dir: fixture.path().join("does-not-exist"),
        dry_run: false,
        max_files: None,
        json: false,
    });
    assert!(matches!(result, Err(CliError::Source(_))));
}
