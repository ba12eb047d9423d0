//! Integration tests for the SQLite store.

use kanban_graph::db::{DependencyGraph, SqliteStore, TaskStore};
use kanban_graph::types::{NewBoard, NewColumn, NewProject, NewTask, TaskUpdate};
use std::sync::Arc;

fn setup_store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("Failed to create in-memory database")
}

fn new_project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        description: Some(format!("{} project", name)),
    }
}

fn new_column(name: &str) -> NewColumn {
    NewColumn {
        name: name.to_string(),
        position: None,
    }
}

fn new_task(column_id: i64, title: &str) -> NewTask {
    NewTask {
        column_id,
        title: title.to_string(),
        description: None,
        assignee_name: None,
    }
}

mod project_tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get_project() {
        let store = setup_store();

        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let loaded = store.get_project(project.id).await.unwrap().unwrap();

        assert_eq!(loaded, project);
        assert_eq!(loaded.description.as_deref(), Some("Alpha project"));
        assert!(loaded.created_at > 0);
    }

    #[tokio::test]
    async fn list_projects_in_creation_order() {
        let store = setup_store();
        store.create_project(new_project("Alpha")).await.unwrap();
        store.create_project(new_project("Beta")).await.unwrap();

        let names: Vec<String> = store
            .list_projects()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();

        assert_eq!(names, vec!["Alpha", "Beta"]);
    }

    #[tokio::test]
    async fn delete_project_cascades() {
        let store = setup_store();
        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let board = store
            .create_board(project.id, NewBoard { name: "Main".into() })
            .await
            .unwrap();
        let column = store.create_column(board.id, new_column("To Do")).await.unwrap();
        let task = store
            .create_task(project.id, new_task(column.id, "Write"))
            .await
            .unwrap();

        assert!(store.delete_project(project.id).await.unwrap());

        assert!(store.get_project(project.id).await.unwrap().is_none());
        assert!(store.get_board(board.id).await.unwrap().is_none());
        assert!(store.get_task(task.id).await.unwrap().is_none());
        assert!(!store.delete_project(project.id).await.unwrap());
    }
}

mod board_tests {
    use super::*;

    #[tokio::test]
    async fn columns_get_increasing_positions() {
        let store = setup_store();
        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let board = store
            .create_board(project.id, NewBoard { name: "Main".into() })
            .await
            .unwrap();

        for name in ["To Do", "In Progress", "Done"] {
            store.create_column(board.id, new_column(name)).await.unwrap();
        }

        let columns = store.list_columns(board.id).await.unwrap();
        let positions: Vec<i32> = columns.iter().map(|c| c.position).collect();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(names, vec!["To Do", "In Progress", "Done"]);
    }

    #[tokio::test]
    async fn explicit_column_position_orders_list() {
        let store = setup_store();
        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let board = store
            .create_board(project.id, NewBoard { name: "Main".into() })
            .await
            .unwrap();

        store.create_column(board.id, new_column("Done")).await.unwrap();
        store
            .create_column(
                board.id,
                NewColumn {
                    name: "Backlog".into(),
                    position: Some(-1),
                },
            )
            .await
            .unwrap();

        let columns = store.list_columns(board.id).await.unwrap();
        assert_eq!(columns[0].name, "Backlog");
    }

    #[tokio::test]
    async fn column_project_resolves_through_board() {
        let store = setup_store();
        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let board = store
            .create_board(project.id, NewBoard { name: "Main".into() })
            .await
            .unwrap();
        let column = store.create_column(board.id, new_column("To Do")).await.unwrap();

        assert_eq!(store.column_project(column.id).await.unwrap(), Some(project.id));
        assert_eq!(store.column_project(column.id + 100).await.unwrap(), None);
    }
}

mod task_tests {
    use super::*;

    #[tokio::test]
    async fn task_status_is_column_name() {
        let store = setup_store();
        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let board = store
            .create_board(project.id, NewBoard { name: "Main".into() })
            .await
            .unwrap();
        let todo = store.create_column(board.id, new_column("To Do")).await.unwrap();
        let done = store.create_column(board.id, new_column("Done")).await.unwrap();

        let task = store
            .create_task(project.id, new_task(todo.id, "Write"))
            .await
            .unwrap();
        assert_eq!(task.status, "To Do");
        assert!(!task.is_completed());

        let moved = store
            .update_task(
                task.id,
                TaskUpdate {
                    column_id: Some(done.id),
                    assignee_name: Some("kai".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.status, "Done");
        assert!(moved.is_completed());
        assert_eq!(moved.assignee_name.as_deref(), Some("kai"));
        assert_eq!(moved.title, "Write");
    }

    #[tokio::test]
    async fn tasks_append_to_column() {
        let store = setup_store();
        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let board = store
            .create_board(project.id, NewBoard { name: "Main".into() })
            .await
            .unwrap();
        let todo = store.create_column(board.id, new_column("To Do")).await.unwrap();

        let first = store
            .create_task(project.id, new_task(todo.id, "First"))
            .await
            .unwrap();
        let second = store
            .create_task(project.id, new_task(todo.id, "Second"))
            .await
            .unwrap();

        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert_eq!(store.list_tasks(project.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_missing_task_returns_none() {
        let store = setup_store();
        let result = store
            .update_task(
                404,
                TaskUpdate {
                    title: Some("Nope".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(!store.delete_task(404).await.unwrap());
    }
}

#[tokio::test]
async fn file_database_persists_edges_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kanban.db");

    let (a, b) = {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let project = store.create_project(new_project("Alpha")).await.unwrap();
        let board = store
            .create_board(project.id, NewBoard { name: "Main".into() })
            .await
            .unwrap();
        let todo = store.create_column(board.id, new_column("To Do")).await.unwrap();
        let a = store
            .create_task(project.id, new_task(todo.id, "A"))
            .await
            .unwrap()
            .id;
        let b = store
            .create_task(project.id, new_task(todo.id, "B"))
            .await
            .unwrap()
            .id;
        DependencyGraph::new(store).add_dependency(a, b).await.unwrap();
        (a, b)
    };

    let store: Arc<dyn TaskStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let graph = DependencyGraph::new(store);
    let deps = graph.get_dependencies(a).await.unwrap();

    assert_eq!(deps.blocked_by.len(), 1);
    assert_eq!(deps.blocked_by[0].id, b);
    assert!(deps.is_blocked);
}
