use crate::{OwnerId, PublicId, TaskId};

/// A stored task record.
///
/// `id` and `owner` are stamped by the store on creation and re-stamped on
/// every update, so callers cannot move a task between partitions or change
/// its identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub owner: OwnerId,
    pub title: String,
    pub description: String,
}

/// The caller-supplied fields of a task being created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
}

impl NewTask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// A partial update. Fields left as `None` keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Merges the present fields into `task`.
    pub fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
    }
}

/// A task as seen from outside the store: public identifier, no owner.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskView {
    pub id: PublicId,
    pub title: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            id: TaskId::new(1),
            owner: OwnerId::from("u1"),
            title: "Buy milk and eggs".into(),
            description: "From the corner store".into(),
        }
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut t = task();
        TaskPatch::default().title("New title only").apply_to(&mut t);
        assert_eq!(t.title, "New title only");
        assert_eq!(t.description, "From the corner store");

        TaskPatch::default()
            .description("From the market")
            .apply_to(&mut t);
        assert_eq!(t.title, "New title only");
        assert_eq!(t.description, "From the market");
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut t = task();
        TaskPatch::default().apply_to(&mut t);
        assert_eq!(t, task());
    }
}
