use a2a_types::{Message, Task, TaskSendParams, TaskState, TaskStatus};
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-memory task table. Every operation takes the lock once, so a reader
/// never sees a reply without its terminal state.
#[derive(Default)]
pub struct TaskStore {
    tasks: Mutex<HashMap<String, Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the task, or append the message to an existing one with the same id.
    pub fn upsert(&self, params: &TaskSendParams) -> Task {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .entry(params.id.clone())
            .and_modify(|task| task.history.push(params.message.clone()))
            .or_insert_with(|| {
                let mut task = Task::submitted(
                    params.id.clone(),
                    params.session_id.clone(),
                    params.message.clone(),
                );
                task.metadata = params.metadata.clone();
                task
            });
        task.clone()
    }

    /// Copy of the task with at most `history_length` newest history entries.
    pub fn get(&self, task_id: &str, history_length: Option<usize>) -> Option<Task> {
        self.tasks
            .lock()
            .get(task_id)
            .map(|task| task.clone().with_history_limit(history_length))
    }

    pub fn transition(&self, task_id: &str, state: TaskState) -> Option<Task> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(task_id)?;
        task.status = TaskStatus::new(state);
        Some(task.clone())
    }

    /// Append the agent reply and set the final state in one step.
    pub fn complete(&self, task_id: &str, reply: Message, state: TaskState) -> Option<Task> {
        let mut tasks = self.tasks.lock();
        let task = tasks.get_mut(task_id)?;
        task.history.push(reply);
        task.status = TaskStatus::new(state);
        Some(task.clone())
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn params(id: &str, text: &str) -> TaskSendParams {
        TaskSendParams::new(id, "s1", Message::user(text))
    }

    #[test]
    fn test_upsert_creates_then_appends() {
        let store = TaskStore::new();
        let created = store.upsert(&params("t1", "I have a fever"));
        assert_eq!(created.state(), TaskState::Submitted);
        assert_eq!(created.history.len(), 1);

        let appended = store.upsert(&params("t1", "and a cough"));
        assert_eq!(appended.history.len(), 2);
        assert_eq!(appended.session_id, "s1");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_complete_appends_reply_and_state() {
        let store = TaskStore::new();
        store.upsert(&params("t1", "Get record for patient 101"));
        store.transition("t1", TaskState::Working).unwrap();

        let done = store
            .complete("t1", Message::agent("Patient 101: Diabetes Type 2, on Metformin."), TaskState::Completed)
            .unwrap();
        assert_eq!(done.state(), TaskState::Completed);
        assert_eq!(done.history.len(), 2);

        assert!(store.complete("t9", Message::agent("x"), TaskState::Completed).is_none());
        assert!(store.transition("t9", TaskState::Working).is_none());
    }

    #[test]
    fn test_history_limit_does_not_mutate_stored_task() {
        let store = TaskStore::new();
        store.upsert(&params("t1", "one"));
        store.complete("t1", Message::agent("two"), TaskState::Completed);

        let sliced = store.get("t1", Some(1)).unwrap();
        assert_eq!(sliced.history.len(), 1);
        assert_eq!(sliced.history[0].text(), "two");
        assert_eq!(store.get("t1", None).unwrap().history.len(), 2);
        assert!(store.get("t2", None).is_none());
    }

    #[test]
    fn test_concurrent_upserts_lose_nothing() {
        let store = Arc::new(TaskStore::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        store.upsert(&params(&format!("t{}", i), &format!("w{}", worker)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 50);
        for i in 0..50 {
            assert_eq!(store.get(&format!("t{}", i), None).unwrap().history.len(), 8);
        }
    }
}
