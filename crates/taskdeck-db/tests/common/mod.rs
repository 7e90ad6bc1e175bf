// Backend-agnostic integration tests for the Database trait.
//
// Each public async function accepts `&dyn Database` so that the same logic
// can be exercised against both the SQLite and in-memory backends.

use chrono::NaiveDate;
use taskdeck_core::task::{CreateTask, Priority, Status, TaskFilter, UpdateTask};
use taskdeck_db::{Database, DbError};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_task(title: &str) -> CreateTask {
    CreateTask::new(title)
}

async fn set_status(db: &dyn Database, id: i64, status: Status) {
    db.update_task(
        id,
        &UpdateTask {
            status: Some(status),
            ..Default::default()
        },
    )
    .await
    .unwrap();
}

// ---------------------------------------------------------------------------
// Task tests
// ---------------------------------------------------------------------------

/// Test basic task CRUD: create, get, update, delete.
pub async fn test_task_crud(db: &dyn Database) {
    let task = db
        .create_task(&CreateTask {
            title: "Task 1".into(),
            description: Some("do something".into()),
            priority: Priority::Low,
            due_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        })
        .await
        .unwrap();
    assert_eq!(task.title, "Task 1");
    assert_eq!(task.description.as_deref(), Some("do something"));
    assert_eq!(task.status, Status::Pending);
    assert_eq!(task.priority, Priority::Low);
    assert_eq!(task.created_at, task.updated_at);

    // get
    let fetched = db.get_task(task.id).await.unwrap();
    assert_eq!(fetched, task);

    // update
    let updated = db
        .update_task(
            task.id,
            &UpdateTask {
                title: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");
    // unchanged fields preserved
    assert_eq!(updated.description, task.description);
    assert_eq!(updated.priority, task.priority);
    assert_eq!(updated.status, task.status);
    assert_eq!(updated.due_date, task.due_date);
    assert_eq!(updated.created_at, task.created_at);
    assert!(updated.updated_at > task.updated_at);

    // delete
    assert!(db.delete_task(task.id).await.unwrap());
    assert!(matches!(
        db.get_task(task.id).await,
        Err(DbError::NotFound(_))
    ));
    // second delete reports nothing removed
    assert!(!db.delete_task(task.id).await.unwrap());
}

/// Unique ids, pending status and medium priority by default.
pub async fn test_create_defaults(db: &dyn Database) {
    let a = db.create_task(&make_task("a")).await.unwrap();
    let b = db.create_task(&make_task("b")).await.unwrap();
    assert_ne!(a.id, b.id);
    for t in [&a, &b] {
        assert_eq!(t.status, Status::Pending);
        assert_eq!(t.priority, Priority::Medium);
        assert_eq!(t.due_date, None);
        assert_eq!(t.description, None);
        assert_eq!(t.created_at, t.updated_at);
    }
}

/// Every successive update strictly advances `updated_at`.
pub async fn test_updated_at_advances(db: &dyn Database) {
    let task = db.create_task(&make_task("bump")).await.unwrap();
    let mut last = task.updated_at;
    for status in [Status::InProgress, Status::Completed, Status::Pending] {
        let t = db
            .update_task(
                task.id,
                &UpdateTask {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(t.status, status);
        assert!(t.updated_at > last);
        assert!(t.updated_at >= t.created_at);
        last = t.updated_at;
    }
}

pub async fn test_update_missing(db: &dyn Database) {
    let err = db
        .update_task(
            4242,
            &UpdateTask {
                title: Some("nope".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

/// Status and priority filters combine as AND.
pub async fn test_task_filtering(db: &dyn Database) {
    for i in 0..6 {
        let t = db
            .create_task(&CreateTask {
                priority: if i % 2 == 0 { Priority::High } else { Priority::Low },
                ..make_task(&format!("Task {i}"))
            })
            .await
            .unwrap();
        if i < 3 {
            set_status(db, t.id, Status::Completed).await;
        }
    }

    let all = db.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(all.total, 6);
    assert_eq!(all.tasks.len(), 6);

    let completed = db
        .list_tasks(&TaskFilter {
            status: Some(Status::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(completed.total, 3);
    assert!(completed.tasks.iter().all(|t| t.status == Status::Completed));

    let completed_high = db
        .list_tasks(&TaskFilter {
            status: Some(Status::Completed),
            priority: Some(Priority::High),
            ..Default::default()
        })
        .await
        .unwrap();
    // Task 0 and Task 2
    assert_eq!(completed_high.total, 2);
    assert!(completed_high
        .tasks
        .iter()
        .all(|t| t.status == Status::Completed && t.priority == Priority::High));
}

/// Search is a case-insensitive substring match over title OR description.
pub async fn test_task_search(db: &dyn Database) {
    db.create_task(&make_task("Buy FOOD")).await.unwrap();
    db.create_task(&CreateTask {
        description: Some("remember the foo bar".into()),
        ..make_task("Errand")
    })
    .await
    .unwrap();
    db.create_task(&CreateTask {
        description: Some("unrelated".into()),
        ..make_task("Walk dog")
    })
    .await
    .unwrap();

    let page = db
        .list_tasks(&TaskFilter {
            search: Some("foo".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    let mut titles: Vec<_> = page.tasks.iter().map(|t| t.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, vec!["Buy FOOD", "Errand"]);

    // case folding is not limited to ASCII
    db.create_task(&make_task("École trip")).await.unwrap();
    let page = db
        .list_tasks(&TaskFilter {
            search: Some("école".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.tasks[0].title, "École trip");

    let page = db
        .list_tasks(&TaskFilter {
            search: Some("ÉCOLE".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

/// `limit=2&offset=2` over five tasks yields the 3rd and 4th newest; total
/// still reports five.
pub async fn test_pagination(db: &dyn Database) {
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(db.create_task(&make_task(&format!("T{i}"))).await.unwrap().id);
    }

    let first = db.list_tasks(&TaskFilter::default()).await.unwrap();
    let newest_first: Vec<i64> = first.tasks.iter().map(|t| t.id).collect();
    let mut expected = ids.clone();
    expected.reverse();
    assert_eq!(newest_first, expected);

    let page = db
        .list_tasks(&TaskFilter {
            limit: 2,
            offset: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    let got: Vec<i64> = page.tasks.iter().map(|t| t.id).collect();
    assert_eq!(got, vec![ids[2], ids[1]]);

    let past_end = db
        .list_tasks(&TaskFilter {
            offset: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(past_end.tasks.is_empty());
    assert_eq!(past_end.total, 5);
}

/// Both breakdowns sum to the total independently.
pub async fn test_task_stats(db: &dyn Database) {
    let empty = db.task_stats().await.unwrap();
    assert_eq!(empty.total_tasks, 0);

    let priorities = [Priority::Low, Priority::Medium, Priority::High, Priority::High];
    for (i, priority) in priorities.into_iter().enumerate() {
        let t = db
            .create_task(&CreateTask {
                priority,
                ..make_task(&format!("S{i}"))
            })
            .await
            .unwrap();
        if i == 0 {
            set_status(db, t.id, Status::InProgress).await;
        }
        if i == 1 {
            set_status(db, t.id, Status::Completed).await;
        }
    }

    let stats = db.task_stats().await.unwrap();
    assert_eq!(stats.total_tasks, 4);
    assert_eq!(stats.by_status.pending, 2);
    assert_eq!(stats.by_status.in_progress, 1);
    assert_eq!(stats.by_status.completed, 1);
    assert_eq!(stats.by_priority.low, 1);
    assert_eq!(stats.by_priority.medium, 1);
    assert_eq!(stats.by_priority.high, 2);
    assert_eq!(stats.by_status.sum(), stats.total_tasks);
    assert_eq!(stats.by_priority.sum(), stats.total_tasks);
}

pub async fn test_ping(db: &dyn Database) {
    db.ping().await.unwrap();
}
