use super::*;
use pretty_assertions::assert_eq;

fn terminal_text(state: &WorkspaceState) -> Vec<String> {
    state.terminal.iter().map(|chunk| chunk.text.clone()).collect()
}

#[test]
fn growing_test_log_is_streamed_without_duplicates() {
    let mut state = state();
    let conn = start(&mut state, "p");

    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "AB")]),
    );
    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "ABCD")]),
    );
    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "ABCD")]),
    );

    assert_eq!(terminal_text(&state), vec!["AB".to_string(), "CD".to_string()]);
    assert!(state
        .terminal
        .iter()
        .all(|chunk| chunk.log_path == TEST_RESULTS_LOG));
}

#[test]
fn new_run_resets_cursors_and_terminal() {
    let mut state = state();
    let conn = start(&mut state, "first");
    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "AB")]),
    );

    let conn = start(&mut state, "second");
    assert!(state.terminal.is_empty());
    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "AB")]),
    );

    assert_eq!(terminal_text(&state), vec!["AB".to_string()]);
    assert_eq!(state.terminal.last_seq(), 1);
}

#[test]
fn ordinary_files_do_not_reach_the_terminal() {
    let mut state = state();
    let conn = start(&mut state, "p");
    frame(
        &mut state,
        conn,
        agent_with_files("Coder", "Done! Code generated.", &[("main.py", "print(1)")]),
    );
    assert!(state.terminal.is_empty());
}

#[test]
fn dismissing_a_log_removes_key_and_tab() {
    let mut state = state();
    let conn = start(&mut state, "p");
    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "ok")]),
    );
    assert!(state.tabs.is_open(TEST_RESULTS_LOG));

    let effects = run_user(
        &mut state,
        UserAction::DismissLog {
            path: TEST_RESULTS_LOG.to_string(),
        },
    );

    assert_eq!(effects, vec![WorkspaceEffect::RequestFrame]);
    assert!(!state.store.contains(TEST_RESULTS_LOG));
    assert!(!state.tabs.is_open(TEST_RESULTS_LOG));

    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "ok again")]),
    );
    assert_eq!(
        terminal_text(&state),
        vec!["ok".to_string(), "ok again".to_string()]
    );
}

#[test]
fn dismissing_untracked_path_is_ignored() {
    let mut state = seeded(&[("main.py", "")]);
    let effects = run_user(
        &mut state,
        UserAction::DismissLog {
            path: "main.py".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(state.store.contains("main.py"));
}

#[test]
fn reloading_the_workspace_mid_run_keeps_log_cursors() {
    let mut state = state();
    let conn = start(&mut state, "p");
    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "AB")]),
    );

    run_runtime(
        &mut state,
        RuntimeAction::SeedWorkspace {
            files: vec![(TEST_RESULTS_LOG.to_string(), "AB".to_string())],
        },
    );
    frame(
        &mut state,
        conn,
        agent_with_files("Tester", "Running", &[(TEST_RESULTS_LOG, "ABCD")]),
    );

    assert_eq!(terminal_text(&state), vec!["AB".to_string(), "CD".to_string()]);
}
