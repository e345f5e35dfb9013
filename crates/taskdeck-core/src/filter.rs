use crate::Task;

/// Case-insensitive substring matcher over task title and category.
///
/// Purely local; the store subscription only ever filters by owner.
pub struct TaskFilter {
    needle: String,
}

impl TaskFilter {
    /// Normalize a query string into a filter. Returns `None` for blank
    /// inputs, which match everything.
    #[must_use]
    pub fn new(query: &str) -> Option<Self> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            needle: trimmed.to_lowercase(),
        })
    }

    /// Determine whether the task's title or category contains the query.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.matches_field(&task.title) || self.matches_field(&task.category)
    }

    fn matches_field(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.needle)
    }
}

/// Retain the tasks matching an optional query, in their current order.
#[must_use]
pub fn apply<'a>(filter: Option<&TaskFilter>, tasks: &'a [Task]) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| filter.is_none_or(|f| f.matches(task)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{TaskId, UserId};
    use crate::{DEFAULT_CATEGORY, Priority};

    fn task(title: &str, category: &str) -> Task {
        Task {
            id: TaskId::new(),
            title: title.into(),
            description: String::new(),
            completed: false,
            priority: Priority::Medium,
            due_date: None,
            category: category.into(),
            user_id: UserId::new("u1"),
            order: 0,
        }
    }

    #[test]
    fn blank_queries_match_everything() {
        assert!(TaskFilter::new("").is_none());
        assert!(TaskFilter::new("   ").is_none());

        let tasks = vec![task("groceries", DEFAULT_CATEGORY)];
        assert_eq!(apply(None, &tasks).len(), 1);
    }

    #[test]
    fn matches_title_and_category_case_insensitively() {
        let groceries = task("Buy Groceries", "Errands");

        let by_title = TaskFilter::new("groceries")
            .unwrap_or_else(|| panic!("filter must exist for queries with content"));
        assert!(by_title.matches(&groceries));

        let by_category = TaskFilter::new("ERRANDS")
            .unwrap_or_else(|| panic!("filter must exist for queries with content"));
        assert!(by_category.matches(&groceries));

        let missing = TaskFilter::new("work")
            .unwrap_or_else(|| panic!("filter must exist for queries with content"));
        assert!(!missing.matches(&groceries));
    }

    #[test]
    fn apply_preserves_list_order() {
        let tasks = vec![
            task("alpha work", DEFAULT_CATEGORY),
            task("beta", "work"),
            task("gamma", "home"),
        ];
        let filter = TaskFilter::new("work");
        let matched = apply(filter.as_ref(), &tasks);
        let titles: Vec<&str> = matched.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha work", "beta"]);
    }
}
