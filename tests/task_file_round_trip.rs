//! Property tests for the task file format: parsing a serialized task
//! list reproduces the same canonical fields.

use proptest::prelude::*;

use trunkline::domain::models::{Task, TaskStatus};
use trunkline::services::task_store::{parse_tasks, serialize_tasks};

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop_oneof![
        Just(TaskStatus::Unclaimed),
        Just(TaskStatus::UpNext),
        Just(TaskStatus::InProgress),
        Just(TaskStatus::Completed),
        Just(TaskStatus::Merged),
    ]
}

/// Titles and descriptions the sanitizer leaves unchanged.
fn arb_clean_text() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 _.-]{0,40}".prop_map(|s| s.trim().to_string())
        .prop_filter("non-empty after trim", |s| !s.is_empty())
}

fn arb_file_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,8}\\.[a-z]{1,3}", 0..4)
}

fn arb_task(task_id: u64) -> impl Strategy<Value = Task> {
    (
        arb_clean_text(),
        proptest::option::of(arb_clean_text()),
        arb_status(),
        1_i64..=10,
        0_i64..=20,
        arb_file_list(),
        arb_file_list(),
    )
        .prop_map(
            move |(title, description, status, priority, merge_order, exclusive, shared)| {
                let mut task = Task::new(task_id, "prop", title);
                task.description = description;
                task.status = status;
                task.priority = priority;
                task.merge_order = merge_order;
                task.exclusive_files = exclusive;
                task.shared_files = shared;
                if status == TaskStatus::InProgress {
                    task.session = Some(format!("{}-prop", task_id));
                }
                task
            },
        )
}

fn arb_task_list() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(Just(()), 1..6).prop_flat_map(|slots| {
        let strategies: Vec<_> = (0..slots.len())
            .map(|i| arb_task((i + 1) as u64))
            .collect();
        strategies
    })
}

/// Dependency lists drawn from the ids actually present.
fn wire_dependencies(mut tasks: Vec<Task>) -> Vec<Task> {
    let ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    for (index, task) in tasks.iter_mut().enumerate() {
        // Depend on some earlier tasks only, keeping the graph acyclic
        task.dependencies = ids[..index].iter().take(2).cloned().collect();
    }
    tasks
}

fn canonical(task: &Task) -> impl PartialEq + std::fmt::Debug {
    (
        (
            task.id.clone(),
            task.task_id,
            task.title.clone(),
            task.status,
            task.branch.clone(),
            task.session.clone(),
            task.description.clone(),
            task.dependencies.clone(),
            task.priority,
            task.merge_order,
            task.exclusive_files.clone(),
            task.shared_files.clone(),
        ),
        task.initialization_deps.clone(),
    )
}

proptest! {
    #[test]
    fn parse_serialize_parse_is_identity(tasks in arb_task_list()) {
        let tasks = wire_dependencies(tasks);

        let doc = serialize_tasks(&tasks);
        let first = parse_tasks(&doc, "prop").unwrap();
        let doc2 = serialize_tasks(&first);
        let second = parse_tasks(&doc2, "prop").unwrap();

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert_eq!(canonical(a), canonical(b));
        }
    }

    #[test]
    fn serialized_document_has_canonical_shape(tasks in arb_task_list()) {
        let doc = serialize_tasks(&tasks);
        prop_assert!(doc.starts_with("# tasks.md"));
        prop_assert!(doc.ends_with('\n'));
        let blocks = doc.matches("## Task:").count();
        prop_assert_eq!(blocks, tasks.len());
    }

    #[test]
    fn sanitized_branches_survive_round_trip(raw in "[a-z/&\\\\]{1,20}") {
        use trunkline::domain::models::sanitize_identifier;
        let once = sanitize_identifier(&raw);
        prop_assert_eq!(sanitize_identifier(&once), once.clone());
        prop_assert!(!once.contains('/'));
        prop_assert!(!once.contains('\\'));
        prop_assert!(!once.contains('&'));
    }
}
