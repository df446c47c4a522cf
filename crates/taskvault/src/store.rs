use crate::{NewTask, OwnerId, Task, TaskId};
use parking_lot::RwLock;
use std::collections::HashMap;
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Storage for tasks, partitioned by owner and keyed by raw identifier.
///
/// All lookups are scoped to an owner: a task created under one owner is
/// invisible to every other owner, and such lookups report absence rather
/// than a permission failure. Implementations never see public identifiers.
pub trait TaskRepository: Send + Sync {
    /// Assigns the next raw identifier, stamps it and `owner` onto the task,
    /// and stores it.
    fn create(&self, owner: &OwnerId, task: NewTask) -> Task;

    /// Returns every task of `owner`, in no particular order.
    fn get_all(&self, owner: &OwnerId) -> Vec<Task>;

    /// Returns the task, or `None` if `owner` has no task `id`.
    fn get_by_id(&self, owner: &OwnerId, id: TaskId) -> Option<Task>;

    /// Overwrites the stored task. Returns `false` if it does not exist.
    fn update(&self, owner: &OwnerId, id: TaskId, task: Task) -> bool;

    /// Removes the task. Returns `false` if it does not exist, including when
    /// it was already deleted.
    fn delete(&self, owner: &OwnerId, id: TaskId) -> bool;
}

/// The first identifier handed out by a fresh store.
pub const FIRST_TASK_ID: TaskId = TaskId::new(1);

struct State {
    next_id: u64,
    partitions: HashMap<OwnerId, HashMap<TaskId, Task>>,
}

/// An in-memory [`TaskRepository`] guarded by a single reader/writer lock.
///
/// ## Concurrency
///
/// - Reads (`get_all`, `get_by_id`) share the lock.
/// - Writes (`create`, `update`, `delete`) hold it exclusively, so identifier
///   assignment is linearizable: concurrent creates never receive the same
///   identifier, and identifiers increase in real-time order across all
///   owners.
/// - The lock is never held across anything but the map operation itself.
///
/// Every read returns clones. Mutating a returned [`Task`] has no effect on
/// the store until it is passed back through [`TaskRepository::update`].
///
/// Nothing is persisted; all tasks are lost when the store is dropped.
pub struct MemoryTaskStore {
    state: RwLock<State>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_id: FIRST_TASK_ID.get(),
                partitions: HashMap::new(),
            }),
        }
    }

    /// Number of tasks across all owners.
    pub fn len(&self) -> usize {
        self.state.read().partitions.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRepository for MemoryTaskStore {
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, task)))]
    fn create(&self, owner: &OwnerId, task: NewTask) -> Task {
        let mut state = self.state.write();
        let id = TaskId::new(state.next_id);
        // 2^64 creates would be needed to wrap; treat it as unreachable.
        state.next_id += 1;

        let task = Task {
            id,
            owner: owner.clone(),
            title: task.title,
            description: task.description,
        };
        state
            .partitions
            .entry(owner.clone())
            .or_default()
            .insert(id, task.clone());
        task
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn get_all(&self, owner: &OwnerId) -> Vec<Task> {
        self.state
            .read()
            .partitions
            .get(owner)
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn get_by_id(&self, owner: &OwnerId, id: TaskId) -> Option<Task> {
        self.state
            .read()
            .partitions
            .get(owner)
            .and_then(|tasks| tasks.get(&id))
            .cloned()
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self, task)))]
    fn update(&self, owner: &OwnerId, id: TaskId, mut task: Task) -> bool {
        let mut state = self.state.write();
        let Some(slot) = state
            .partitions
            .get_mut(owner)
            .and_then(|tasks| tasks.get_mut(&id))
        else {
            return false;
        };

        task.id = id;
        task.owner = owner.clone();
        *slot = task;
        true
    }

    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    fn delete(&self, owner: &OwnerId, id: TaskId) -> bool {
        self.state
            .write()
            .partitions
            .get_mut(owner)
            .is_some_and(|tasks| tasks.remove(&id).is_some())
    }
}
