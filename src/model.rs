//! Normalized value types produced by source adapters and persisted in the cache.
//!
//! Every adapter maps its provider-native wire format into these shapes before
//! handing data to the store. Work items are a tagged sum discriminated by the
//! `adapter_type` field on the wire, so the cache deserializer can dispatch
//! without knowing which provider wrote a row.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// Lifecycle state of a merge or pull request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
	/// Open and awaiting action.
	Open,
	/// Closed without merging.
	Closed,
	/// Merged.
	Merged,
}

/// Normalized code review record (merge request or pull request).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CodeReview {
	/// Provider-unique identifier.
	pub id: String,
	/// Human display key, e.g. `!123` or `#45`.
	pub key: String,
	/// Review title.
	pub title: String,
	/// Review lifecycle state.
	pub state: ReviewState,
	/// Author name or login.
	pub author: String,
	/// Source branch name.
	#[serde(default)]
	pub source_branch: String,
	/// Link to the review.
	pub url: String,
	/// Creation timestamp.
	#[serde(default)]
	pub created_at: Option<DateTime<Utc>>,
	/// Whether the review is a draft.
	#[serde(default)]
	pub draft: bool,
	/// Provider tag, e.g. `gitlab`.
	pub adapter_type: String,
	/// Display hint for the provider.
	pub adapter_icon: String,
}
impl CodeReview {
	/// Validate the record against the documented invariants.
	pub fn validate(&self) -> Result<()> {
		if self.title.is_empty() {
			return Err(Error::Validation {
				field: "title",
				reason: "Must not be empty.".into(),
			});
		}
		if self.adapter_type.is_empty() {
			return Err(Error::Validation {
				field: "adapter_type",
				reason: "Must not be empty.".into(),
			});
		}

		Ok(())
	}

	/// Formatted key for display.
	pub fn display_key(&self) -> &str {
		&self.key
	}

	/// Normalized status string for display.
	pub fn display_status(&self) -> &'static str {
		match self.state {
			ReviewState::Open => "OPEN",
			ReviewState::Closed => "CLOSED",
			ReviewState::Merged => "MERGED",
		}
	}

	/// Whether the review is open and awaiting action.
	pub fn is_open(&self) -> bool {
		self.state == ReviewState::Open
	}
}

/// Normalized work item, tagged by provider on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "adapter_type", rename_all = "lowercase")]
pub enum WorkItem {
	/// Jira issue.
	Jira(JiraIssue),
	/// Todoist task.
	Todoist(TodoistTask),
	/// GitHub issue.
	Github(GithubIssue),
	/// Azure DevOps work item.
	Azuredevops(AzureWorkItem),
}
impl WorkItem {
	/// Provider-unique identifier.
	pub fn id(&self) -> &str {
		match self {
			Self::Jira(issue) => &issue.key,
			Self::Todoist(task) => &task.id,
			Self::Github(issue) => &issue.id,
			Self::Azuredevops(item) => &item.id,
		}
	}

	/// Item title.
	pub fn title(&self) -> &str {
		match self {
			Self::Jira(issue) => &issue.summary,
			Self::Todoist(task) => &task.content,
			Self::Github(issue) => &issue.title,
			Self::Azuredevops(item) => &item.title,
		}
	}

	/// Provider-native status string.
	pub fn status(&self) -> &str {
		match self {
			Self::Jira(issue) => &issue.status,
			Self::Todoist(task) =>
				if task.is_completed {
					"done"
				} else {
					"open"
				},
			Self::Github(issue) => &issue.state,
			Self::Azuredevops(item) => &item.state,
		}
	}

	/// Normalized priority; higher is more urgent.
	pub fn priority(&self) -> Option<u8> {
		match self {
			Self::Jira(issue) => issue.priority.as_deref().and_then(jira_priority_rank),
			Self::Todoist(task) => Some(task.priority),
			Self::Github(_) => None,
			// Azure DevOps priority is 1 = highest natively; invert so higher
			// means more urgent across providers.
			Self::Azuredevops(item) => item.priority.map(|native| 5_u8.saturating_sub(native)),
		}
	}

	/// Browser URL for the item.
	pub fn url(&self) -> &str {
		match self {
			Self::Jira(issue) => &issue.url,
			Self::Todoist(task) => &task.url,
			Self::Github(issue) => &issue.url,
			Self::Azuredevops(item) => &item.url,
		}
	}

	/// Assignee display name, when the provider exposes one.
	pub fn assignee(&self) -> Option<&str> {
		match self {
			Self::Jira(issue) => issue.assignee.as_deref(),
			Self::Todoist(_) => None,
			Self::Github(issue) => issue.assignee.as_deref(),
			Self::Azuredevops(item) => item.assigned_to.as_deref(),
		}
	}

	/// Due date as an ISO date string, when the provider exposes one.
	pub fn due_date(&self) -> Option<&str> {
		match self {
			Self::Jira(_) => None,
			Self::Todoist(task) => task.due_date.as_deref(),
			Self::Github(_) => None,
			Self::Azuredevops(_) => None,
		}
	}

	/// Whether the item is still open.
	pub fn is_open(&self) -> bool {
		match self {
			Self::Jira(issue) => {
				let status = issue.status.to_lowercase();

				!matches!(status.as_str(), "done" | "closed" | "resolved")
			},
			Self::Todoist(task) => !task.is_completed,
			Self::Github(issue) => issue.state == "open",
			Self::Azuredevops(item) => {
				let state = item.state.to_lowercase();

				!matches!(state.as_str(), "closed" | "completed" | "done" | "removed")
			},
		}
	}

	/// Stable provider tag matching the wire discriminator.
	pub fn adapter_type(&self) -> &'static str {
		match self {
			Self::Jira(_) => "jira",
			Self::Todoist(_) => "todoist",
			Self::Github(_) => "github",
			Self::Azuredevops(_) => "azuredevops",
		}
	}

	/// Display hint for the provider.
	pub fn adapter_icon(&self) -> &'static str {
		match self {
			Self::Jira(_) => "🔴",
			Self::Todoist(_) => "📝",
			Self::Github(_) => "🐙",
			Self::Azuredevops(_) => "🔷",
		}
	}

	/// Formatted key for display.
	pub fn display_key(&self) -> String {
		match self {
			Self::Jira(issue) => issue.key.clone(),
			Self::Todoist(task) => format!("TD-{}", task.id),
			Self::Github(issue) => format!("#{}", issue.number),
			Self::Azuredevops(item) => format!("AB#{}", item.id),
		}
	}

	/// Normalized status string for display.
	pub fn display_status(&self) -> String {
		match self {
			Self::Jira(issue) => {
				let status = issue.status.to_uppercase();

				match status.as_str() {
					"TO DO" => "TODO".into(),
					"CLOSED" | "RESOLVED" => "DONE".into(),
					_ => status,
				}
			},
			Self::Todoist(task) =>
				if task.is_completed {
					"DONE".into()
				} else {
					"OPEN".into()
				},
			Self::Github(issue) => issue.state.to_uppercase(),
			Self::Azuredevops(item) => item.state.to_uppercase(),
		}
	}

	/// Validate the item against the documented invariants.
	pub fn validate(&self) -> Result<()> {
		if self.title().is_empty() {
			return Err(Error::Validation {
				field: "title",
				reason: "Must not be empty.".into(),
			});
		}

		Ok(())
	}
}

/// Jira issue projected to the capability set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JiraIssue {
	/// Issue key, e.g. `PROJ-123`.
	pub key: String,
	/// Issue summary.
	pub summary: String,
	/// Status name as reported by Jira, e.g. `In Progress`.
	pub status: String,
	/// Priority name, e.g. `High`.
	#[serde(default)]
	pub priority: Option<String>,
	/// Assignee display name.
	#[serde(default)]
	pub assignee: Option<String>,
	/// Browser URL.
	pub url: String,
}

/// Todoist task projected to the capability set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TodoistTask {
	/// Task identifier.
	pub id: String,
	/// Task content used as the title.
	pub content: String,
	/// Native priority, 1..=4 with 4 = urgent.
	pub priority: u8,
	/// Due date, when set.
	#[serde(default)]
	pub due_date: Option<String>,
	/// Project the task belongs to.
	pub project_name: String,
	/// Browser URL.
	pub url: String,
	/// Whether the task is completed.
	#[serde(default)]
	pub is_completed: bool,
}

/// GitHub issue projected to the capability set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GithubIssue {
	/// Node identifier.
	pub id: String,
	/// Issue number within the repository.
	pub number: u64,
	/// Issue title.
	pub title: String,
	/// Issue state, `open` or `closed`.
	pub state: String,
	/// Browser URL.
	pub url: String,
	/// First assignee login.
	#[serde(default)]
	pub assignee: Option<String>,
}

/// Azure DevOps work item projected to the capability set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AzureWorkItem {
	/// Work item identifier.
	pub id: String,
	/// Work item title.
	pub title: String,
	/// State name, e.g. `Active`.
	pub state: String,
	/// Assignee display name.
	#[serde(default)]
	pub assigned_to: Option<String>,
	/// Native priority, 1..=4 with 1 = highest.
	#[serde(default)]
	pub priority: Option<u8>,
	/// Browser URL.
	pub url: String,
}

fn jira_priority_rank(name: &str) -> Option<u8> {
	match name {
		"Lowest" => Some(1),
		"Low" => Some(2),
		"Medium" => Some(3),
		"High" => Some(4),
		"Highest" => Some(5),
		_ => None,
	}
}
