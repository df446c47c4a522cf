//! The task service: the store as seen from outside.
//!
//! [`TaskService`] is the only place where identifiers change representation.
//! Public identifiers are deobfuscated on the way in and raw identifiers are
//! obfuscated on the way out, so neither side can leak into the other.

use crate::{
    Error, IdObfuscator, MemoryTaskStore, NewTask, OwnerId, PublicId, Result, RotateXorObfuscator,
    Task, TaskPatch, TaskRepository, TaskView,
};
#[cfg(feature = "tracing")]
use tracing::instrument;

/// Task operations over a [`TaskRepository`], speaking only public
/// identifiers.
///
/// Every fallible operation fails only with [`Error::NotFound`], forwarded
/// from the repository's absence signal.
///
/// # Example
///
/// ```
/// use taskvault::{NewTask, OwnerId, TaskPatch, TaskService};
///
/// let service = TaskService::default();
/// let owner = OwnerId::from("u1");
///
/// let created = service.create_task(&owner, NewTask::new("Buy milk and eggs", "From the corner store"));
/// let updated = service
///     .update_task(&owner, created.id, TaskPatch::default().title("Buy bread"))
///     .unwrap();
/// assert_eq!(updated.description, "From the corner store");
///
/// service.delete_task(&owner, created.id).unwrap();
/// assert!(service.get_task_by_id(&owner, created.id).is_err());
/// ```
pub struct TaskService<R = MemoryTaskStore, O = RotateXorObfuscator>
where
    R: TaskRepository,
    O: IdObfuscator,
{
    store: R,
    obfuscator: O,
}

impl<R, O> TaskService<R, O>
where
    R: TaskRepository,
    O: IdObfuscator,
{
    pub fn new(store: R, obfuscator: O) -> Self {
        Self { store, obfuscator }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    fn view(&self, task: Task) -> TaskView {
        TaskView {
            id: self.obfuscator.obfuscate(task.id),
            title: task.title,
            description: task.description,
        }
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, task)))]
    pub fn create_task(&self, owner: &OwnerId, task: NewTask) -> TaskView {
        let created = self.store.create(owner, task);
        self.view(created)
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn get_all_tasks(&self, owner: &OwnerId) -> Vec<TaskView> {
        self.store
            .get_all(owner)
            .into_iter()
            .map(|task| self.view(task))
            .collect()
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn get_task_by_id(&self, owner: &OwnerId, id: PublicId) -> Result<TaskView> {
        let raw = self.obfuscator.deobfuscate(id);
        self.store
            .get_by_id(owner, raw)
            .map(|task| self.view(task))
            .ok_or(Error::NotFound { id })
    }

    /// Applies the fields present in `patch` to an existing task.
    ///
    /// This is a read-merge-write over two store calls; a concurrent delete
    /// between them surfaces as [`Error::NotFound`].
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, patch)))]
    pub fn update_task(&self, owner: &OwnerId, id: PublicId, patch: TaskPatch) -> Result<TaskView> {
        let raw = self.obfuscator.deobfuscate(id);
        let mut task = self
            .store
            .get_by_id(owner, raw)
            .ok_or(Error::NotFound { id })?;

        patch.apply_to(&mut task);
        if !self.store.update(owner, raw, task.clone()) {
            return Err(Error::NotFound { id });
        }
        Ok(self.view(task))
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn delete_task(&self, owner: &OwnerId, id: PublicId) -> Result<()> {
        let raw = self.obfuscator.deobfuscate(id);
        if self.store.delete(owner, raw) {
            Ok(())
        } else {
            Err(Error::NotFound { id })
        }
    }
}

impl Default for TaskService {
    fn default() -> Self {
        Self::new(MemoryTaskStore::new(), RotateXorObfuscator::default())
    }
}
