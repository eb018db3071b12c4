//! The tool-call surface AI agents drive over stdio: a thin `rmcp`
//! wrapper around the same service layer the HTTP routes call, so a
//! created task, a status change, or a priority recompute behaves
//! identically whichever transport asked for it.

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData, ServerHandler};
use serde::Deserialize;
use uuid::Uuid;

use kanban_core_db::models::{CreateNote, CreateTask, DependencyType, NoteCategory, Task, TaskFilters, TaskStatus};
use kanban_core_engine::next_task::NextTaskFilter;
use kanban_core_services::ServiceError;

use crate::state::AppState;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListTasksRequest {
    #[schemars(description = "Board to list tasks on")]
    pub board: Uuid,
    #[schemars(description = "Filter by status: todo, in_progress, done, blocked, archived")]
    pub status: Option<TaskStatus>,
    #[schemars(description = "Maximum number of tasks to return, default 50")]
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetTaskRequest {
    #[schemars(description = "Task id")]
    pub id: Uuid,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateTaskRequest {
    pub board_id: Uuid,
    pub column_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority_int: Option<i64>,
    pub assignee: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateTaskStatusRequest {
    pub id: Uuid,
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddDependencyRequest {
    #[schemars(description = "The task that is blocked")]
    pub task_id: Uuid,
    #[schemars(description = "The task it depends on / is blocked by")]
    pub depends_on_task_id: Uuid,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetNextTaskRequest {
    pub board: Uuid,
    pub assignee: Option<String>,
    #[schemars(description = "Minutes available; excludes tasks estimated longer")]
    pub time_available_minutes: Option<i64>,
    #[serde(default)]
    pub skill_tags: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddNoteRequest {
    pub task_id: Uuid,
    pub board_id: Uuid,
    pub content: String,
    #[schemars(description = "general, implementation, research, blocker, or idea")]
    pub category: Option<NoteCategory>,
}

#[derive(Debug, Clone)]
pub struct KanbanMcpServer {
    state: AppState,
    tool_router: ToolRouter<Self>,
}

impl KanbanMcpServer {
    pub fn new(state: AppState) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    fn success<T: serde::Serialize>(data: &T) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text(
            serde_json::to_string_pretty(data).unwrap_or_else(|_| "failed to serialize response".to_string()),
        )]))
    }

    fn error(error: ServiceError) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::error(vec![Content::text(serde_json::json!({
            "code": error.code(),
            "message": error.to_string(),
        })
        .to_string())]))
    }
}

#[tool_router]
impl KanbanMcpServer {
    #[tool(description = "List tasks on a board, optionally filtered by status.")]
    async fn list_tasks(
        &self,
        Parameters(req): Parameters<ListTasksRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let filters = TaskFilters { board_id: Some(req.board), status: req.status, ..Default::default() };
        let mut conn = match self.state.storage.pool().acquire().await {
            Ok(conn) => conn,
            Err(e) => return Self::error(ServiceError::from(e)),
        };
        match Task::search(&mut conn, &filters, "created_at", true, req.limit.unwrap_or(50), 0).await {
            Ok((tasks, _total)) => Self::success(&tasks),
            Err(e) => Self::error(ServiceError::from(e)),
        }
    }

    #[tool(description = "Get a single task by id.")]
    async fn get_task(&self, Parameters(req): Parameters<GetTaskRequest>) -> Result<CallToolResult, ErrorData> {
        match Task::find_by_id(self.state.storage.pool(), req.id).await {
            Ok(Some(task)) => Self::success(&task),
            Ok(None) => Self::error(ServiceError::TaskNotFound(req.id)),
            Err(e) => Self::error(ServiceError::from(e)),
        }
    }

    #[tool(description = "Create a new task on a board/column.")]
    async fn create_task(
        &self,
        Parameters(req): Parameters<CreateTaskRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let data = CreateTask {
            board_id: req.board_id,
            column_id: req.column_id,
            title: req.title,
            description: req.description,
            priority_int: req.priority_int,
            due_date: None,
            assignee: req.assignee,
            estimated_hours: None,
        };
        match self.state.tasks.create_task(&data).await {
            Ok(task) => Self::success(&task),
            Err(e) => Self::error(e),
        }
    }

    #[tool(description = "Transition a task to a new status.")]
    async fn update_task_status(
        &self,
        Parameters(req): Parameters<UpdateTaskStatusRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.state.tasks.update_task_status(req.id, req.status).await {
            Ok(task) => Self::success(&task),
            Err(e) => Self::error(e),
        }
    }

    #[tool(description = "Add a blocking dependency between two tasks.")]
    async fn add_dependency(
        &self,
        Parameters(req): Parameters<AddDependencyRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        match self.state.tasks.add_dependency(req.task_id, req.depends_on_task_id, DependencyType::Blocks).await {
            Ok(dependency) => Self::success(&dependency),
            Err(e) => Self::error(e),
        }
    }

    #[tool(description = "Recommend the next task to work on, with the reasoning behind the ranking.")]
    async fn get_next_task(
        &self,
        Parameters(req): Parameters<GetNextTaskRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let filter = NextTaskFilter {
            board_id: Some(req.board),
            assignee: req.assignee,
            skill_tags: req.skill_tags,
            time_available_minutes: req.time_available_minutes,
            exclude_blocked: true,
        };
        match self.state.tasks.get_next_task(&filter).await {
            Ok(result) => Self::success(&result),
            Err(e) => Self::error(e),
        }
    }

    #[tool(description = "Attach a free-form note to a task.")]
    async fn add_note(&self, Parameters(req): Parameters<AddNoteRequest>) -> Result<CallToolResult, ErrorData> {
        let data = CreateNote {
            task_id: req.task_id,
            board_id: req.board_id,
            content: req.content,
            category: req.category.unwrap_or(NoteCategory::General),
        };
        match self.state.tasks.add_note(&data).await {
            Ok(note) => Self::success(&note),
            Err(e) => Self::error(e),
        }
    }
}

#[tool_handler]
impl ServerHandler for KanbanMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation { name: "kanban-core-mcp".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
            instructions: Some(
                "Tools for managing a kanban board: list/get/create tasks, change status, \
                 add dependencies, recommend the next task, and attach notes."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

