use super::*;
use pretty_assertions::assert_eq;

fn accept(state: &mut WorkspaceState, request: MutationRequest) -> MutationReport {
    let effects = mutate(state, request);
    let id = persisted(&effects);
    report(&settle(state, id, RemoteReply::Accepted))
}

#[test]
fn directory_rename_rewrites_keys_tabs_and_selection() {
    let mut state = seeded(&[("a/.keep", ""), ("a/f.py", "x"), ("b.py", "")]);
    run_user(
        &mut state,
        UserAction::OpenFile {
            path: "a/f.py".to_string(),
        },
    );

    let effects = mutate(&mut state, rename("a", "z"));
    assert!(matches!(
        effects.as_slice(),
        [
            WorkspaceEffect::Persist {
                call: RemoteCall::RenameItem { .. },
                ..
            },
            WorkspaceEffect::RequestFrame
        ]
    ));
    // Nothing moves until the backend agrees.
    assert_eq!(keys(&state), vec!["a/.keep", "a/f.py", "b.py"]);

    let report = report(&settle(&mut state, persisted(&effects), RemoteReply::Accepted));
    assert_eq!(report.phase, MutationPhase::LocalApplied);
    assert_eq!(keys(&state), vec!["b.py", "z/.keep", "z/f.py"]);
    assert_eq!(state.tabs.paths(), &["z/f.py".to_string()]);
    assert_eq!(state.tabs.selected(), Some("z/f.py"));
}

#[test]
fn move_into_own_subdirectory_is_rejected_before_any_request() {
    let mut state = seeded(&[("docs/.keep", ""), ("docs/sub/.keep", "")]);
    let effects = mutate(
        &mut state,
        MutationRequest::Move {
            path: "docs".to_string(),
            target_dir: "docs/sub".to_string(),
        },
    );

    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, WorkspaceEffect::Persist { .. })));
    let report = report(&effects);
    assert_eq!(report.phase, MutationPhase::Rejected);
    assert!(matches!(report.error, Some(WorkspaceError::InvalidMove { .. })));
    assert_eq!(keys(&state), vec!["docs/.keep", "docs/sub/.keep"]);
}

#[test]
fn move_to_root_uses_basename() {
    let mut state = seeded(&[("src/util.py", "u"), ("src/.keep", "")]);
    let report = accept(
        &mut state,
        MutationRequest::Move {
            path: "src/util.py".to_string(),
            target_dir: String::new(),
        },
    );
    assert_eq!(report.error, None);
    assert_eq!(keys(&state), vec!["src/.keep", "util.py"]);
}

#[test]
fn duplicate_adds_exactly_one_key() {
    let mut state = seeded(&[("x.py", "print('x')")]);
    let effects = mutate(
        &mut state,
        MutationRequest::Duplicate {
            path: "x.py".to_string(),
            new_name: "x_copy.py".to_string(),
        },
    );
    assert!(effects.iter().any(|effect| matches!(
        effect,
        WorkspaceEffect::Persist {
            call: RemoteCall::DuplicateItem { source_path, new_path },
            ..
        } if source_path == "x.py" && new_path == "x_copy.py"
    )));
    settle(&mut state, persisted(&effects), RemoteReply::Accepted);

    assert_eq!(keys(&state), vec!["x.py", "x_copy.py"]);
    assert_eq!(state.store.get("x_copy.py"), Some("print('x')"));
}

#[test]
fn delete_cascades_and_clears_removed_selection() {
    let mut state = seeded(&[("a/.keep", ""), ("a/b.py", ""), ("c.py", "")]);
    run_user(
        &mut state,
        UserAction::OpenFile {
            path: "c.py".to_string(),
        },
    );
    run_user(
        &mut state,
        UserAction::OpenFile {
            path: "a/b.py".to_string(),
        },
    );

    accept(
        &mut state,
        MutationRequest::Delete {
            path: "a".to_string(),
        },
    );

    assert_eq!(keys(&state), vec!["c.py"]);
    assert_eq!(state.tabs.paths(), &["c.py".to_string()]);
    assert_eq!(state.tabs.selected(), None);
}

#[test]
fn delete_all_waits_for_confirmation() {
    let mut state = seeded(&[("a.py", ""), ("b/.keep", "")]);
    run_user(
        &mut state,
        UserAction::OpenFile {
            path: "a.py".to_string(),
        },
    );

    let effects = mutate(&mut state, MutationRequest::DeleteAll);
    assert_eq!(state.store.len(), 2);

    settle(&mut state, persisted(&effects), RemoteReply::Accepted);
    assert!(state.store.is_empty());
    assert!(state.tabs.is_empty());
    assert_eq!(state.tabs.selected(), None);
}

#[test]
fn create_file_is_optimistic_and_focused() {
    let mut state = seeded(&[("src/.keep", "")]);
    let effects = mutate(
        &mut state,
        MutationRequest::CreateFile {
            dir: "src".to_string(),
            name: "app.py".to_string(),
            content: String::new(),
        },
    );

    assert!(state.store.contains("src/app.py"));
    assert_eq!(state.tabs.selected(), Some("src/app.py"));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        WorkspaceEffect::Persist {
            call: RemoteCall::SaveFile { path, .. },
            ..
        } if path == "src/app.py"
    )));
}

#[test]
fn create_folder_writes_marker_and_calls_create_folder() {
    let mut state = state();
    let effects = mutate(
        &mut state,
        MutationRequest::CreateFolder {
            dir: String::new(),
            name: "lib".to_string(),
        },
    );
    assert_eq!(keys(&state), vec!["lib/.keep"]);
    assert!(effects.iter().any(|effect| matches!(
        effect,
        WorkspaceEffect::Persist {
            call: RemoteCall::CreateFolder { path },
            ..
        } if path == "lib"
    )));
    assert!(state.projection().root.find("lib").is_some());
}

#[test]
fn renaming_file_to_disallowed_extension_is_rejected() {
    let mut state = seeded(&[("notes.md", "")]);
    let report = report(&mutate(&mut state, rename("notes.md", "notes.exe")));
    assert_eq!(
        report.error,
        Some(WorkspaceError::DisallowedExtension {
            name: "notes.exe".to_string()
        })
    );
}
