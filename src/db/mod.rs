mod schema;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::DomainError;
use crate::models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "milepost")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("milepost.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Project operations
    // ============================================================

    pub fn get_all_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, description, progress_percentage, created_at, updated_at
             FROM projects WHERE deleted_at IS NULL ORDER BY name",
        )?;

        let projects = stmt
            .query_map([], project_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }

    pub fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, description, progress_percentage, created_at, updated_at
             FROM projects WHERE id = ? AND deleted_at IS NULL",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(project_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO projects (id, name, description, progress_percentage, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)",
            (
                id.to_string(),
                &input.name,
                &input.description,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(Project {
            id,
            name: input.name,
            description: input.description,
            progress_percentage: 0.0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_project(&self, id: Uuid, input: UpdateProjectInput) -> Result<Option<Project>> {
        let Some(existing) = self.get_project(id)? else {
            return Ok(None);
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let name = input.name.unwrap_or(existing.name);
        let description = input.description.or(existing.description);

        conn.execute(
            "UPDATE projects SET name = ?, description = ?, updated_at = ? WHERE id = ?",
            (&name, &description, now.to_rfc3339(), id.to_string()),
        )?;

        Ok(Some(Project {
            id,
            name,
            description,
            progress_percentage: existing.progress_percentage,
            created_at: existing.created_at,
            updated_at: now,
        }))
    }

    /// Soft-delete a project. Child milestones and time logs are left in
    /// place; cascade policy belongs to the surrounding system.
    pub fn soft_delete_project(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE projects SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            (&now, id.to_string()),
        )?;
        Ok(rows > 0)
    }

    pub fn set_project_progress(&self, id: Uuid, percentage: f64) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE projects SET progress_percentage = ?, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL",
            (percentage, &now, id.to_string()),
        )?;
        Ok(rows > 0)
    }

    // ============================================================
    // Milestone operations
    // ============================================================

    pub fn get_milestones_by_project(&self, project_id: Uuid) -> Result<Vec<Milestone>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {MILESTONE_COLUMNS} FROM milestones
             WHERE project_id = ? AND deleted_at IS NULL ORDER BY sort_order",
        ))?;

        let milestones = stmt
            .query_map([project_id.to_string()], milestone_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(milestones)
    }

    pub fn get_milestone(&self, id: Uuid) -> Result<Option<Milestone>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {MILESTONE_COLUMNS} FROM milestones WHERE id = ? AND deleted_at IS NULL",
        ))?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(milestone_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn create_milestone(&self, project_id: Uuid, input: CreateMilestoneInput) -> Result<Milestone> {
        // Verify project exists
        self.get_project(project_id)?
            .ok_or(DomainError::NotFound("Project"))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let priority = input.priority.unwrap_or(Priority::Medium);
        let risk_level = input.risk_level.unwrap_or(RiskLevel::Low);

        // Sequence numbers stay unique even across soft-deleted rows, so the
        // max is taken without the deleted_at filter.
        let sort_order = match input.sort_order {
            Some(order) => order,
            None => conn.query_row(
                "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM milestones WHERE project_id = ?",
                [project_id.to_string()],
                |row| row.get(0),
            )?,
        };

        conn.execute(
            "INSERT INTO milestones (id, project_id, assignee_id, name, description, status,
                priority, sort_order, progress_percentage, estimated_hours, actual_hours,
                due_date, budget_allocated, budget_used, risk_level, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 'pending', ?, ?, 0, ?, '0', ?, ?, '0', ?, ?, ?)",
            rusqlite::params![
                id.to_string(),
                project_id.to_string(),
                input.assignee_id.map(|u| u.to_string()),
                &input.name,
                &input.description,
                priority.as_str(),
                sort_order,
                input.estimated_hours.map(|d| d.to_string()),
                input.due_date.map(|d| d.to_rfc3339()),
                input.budget_allocated.map(|d| d.to_string()),
                risk_level.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(Milestone {
            id,
            project_id,
            assignee_id: input.assignee_id,
            name: input.name,
            description: input.description,
            status: MilestoneStatus::Pending,
            priority,
            sort_order,
            progress_percentage: 0,
            estimated_hours: input.estimated_hours,
            actual_hours: Decimal::ZERO,
            due_date: input.due_date,
            started_at: None,
            completed_at: None,
            budget_allocated: input.budget_allocated,
            budget_used: Decimal::ZERO,
            risk_level,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update_milestone(&self, id: Uuid, input: UpdateMilestoneInput) -> Result<Option<Milestone>> {
        let Some(existing) = self.get_milestone(id)? else {
            return Ok(None);
        };

        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now();
        let name = input.name.unwrap_or(existing.name);
        let description = input.description.or(existing.description);
        let assignee_id = input.assignee_id.or(existing.assignee_id);
        let priority = input.priority.unwrap_or(existing.priority);
        let sort_order = input.sort_order.unwrap_or(existing.sort_order);
        let estimated_hours = input.estimated_hours.or(existing.estimated_hours);
        let due_date = input.due_date.or(existing.due_date);
        let budget_allocated = input.budget_allocated.or(existing.budget_allocated);
        let risk_level = input.risk_level.unwrap_or(existing.risk_level);

        conn.execute(
            "UPDATE milestones SET assignee_id = ?, name = ?, description = ?, priority = ?,
                sort_order = ?, estimated_hours = ?, due_date = ?, budget_allocated = ?,
                risk_level = ?, updated_at = ?
             WHERE id = ?",
            rusqlite::params![
                assignee_id.map(|u| u.to_string()),
                &name,
                &description,
                priority.as_str(),
                sort_order,
                estimated_hours.map(|d| d.to_string()),
                due_date.map(|d| d.to_rfc3339()),
                budget_allocated.map(|d| d.to_string()),
                risk_level.as_str(),
                now.to_rfc3339(),
                id.to_string(),
            ],
        )?;

        Ok(Some(Milestone {
            id,
            project_id: existing.project_id,
            assignee_id,
            name,
            description,
            status: existing.status,
            priority,
            sort_order,
            progress_percentage: existing.progress_percentage,
            estimated_hours,
            actual_hours: existing.actual_hours,
            due_date,
            started_at: existing.started_at,
            completed_at: existing.completed_at,
            budget_allocated,
            budget_used: existing.budget_used,
            risk_level,
            created_at: existing.created_at,
            updated_at: now,
        }))
    }

    pub fn soft_delete_milestone(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE milestones SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL",
            (&now, id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// Persist the lifecycle columns of a milestone in one statement, so a
    /// status flip and its timestamps never land separately.
    pub fn save_milestone_lifecycle(&self, m: &Milestone) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE milestones SET status = ?, progress_percentage = ?, started_at = ?,
                completed_at = ?, updated_at = ?
             WHERE id = ?",
            rusqlite::params![
                m.status.as_str(),
                m.progress_percentage,
                m.started_at.map(|t| t.to_rfc3339()),
                m.completed_at.map(|t| t.to_rfc3339()),
                m.updated_at.to_rfc3339(),
                m.id.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn set_milestone_actual_hours(&self, id: Uuid, hours: Decimal) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE milestones SET actual_hours = ?, updated_at = ? WHERE id = ?",
            (hours.to_string(), &now, id.to_string()),
        )?;
        Ok(rows > 0)
    }

    pub fn set_milestone_budget_used(&self, id: Uuid, amount: Decimal) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let now = Utc::now().to_rfc3339();
        let rows = conn.execute(
            "UPDATE milestones SET budget_used = ?, updated_at = ? WHERE id = ?",
            (amount.to_string(), &now, id.to_string()),
        )?;
        Ok(rows > 0)
    }

    /// (total, completed) milestone counts for a project, excluding
    /// soft-deleted rows.
    pub fn milestone_counts(&self, project_id: Uuid) -> Result<(u32, u32)> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(status = 'completed'), 0)
             FROM milestones WHERE project_id = ? AND deleted_at IS NULL",
            [project_id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(Into::into)
    }

    // ============================================================
    // Time log operations
    // ============================================================

    pub fn get_time_log(&self, id: Uuid) -> Result<Option<TimeLog>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {TIME_LOG_COLUMNS} FROM time_logs WHERE id = ?",
        ))?;

        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(time_log_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_time_logs_by_project(&self, project_id: Uuid) -> Result<Vec<TimeLog>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {TIME_LOG_COLUMNS} FROM time_logs WHERE project_id = ? ORDER BY created_at",
        ))?;

        let logs = stmt
            .query_map([project_id.to_string()], time_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    pub fn get_time_logs_by_milestone(&self, milestone_id: Uuid) -> Result<Vec<TimeLog>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {TIME_LOG_COLUMNS} FROM time_logs WHERE milestone_id = ? ORDER BY created_at",
        ))?;

        let logs = stmt
            .query_map([milestone_id.to_string()], time_log_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(logs)
    }

    /// Insert a fully reconciled time log. Hours and rate resolution happen
    /// in the reconciler before this is called.
    pub fn insert_time_log(&self, log: &TimeLog) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "INSERT INTO time_logs (id, project_id, user_id, milestone_id, description, hours,
                hourly_rate, is_billable, start_time, end_time, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                log.id.to_string(),
                log.project_id.to_string(),
                log.user_id.to_string(),
                log.milestone_id.map(|u| u.to_string()),
                &log.description,
                log.hours.to_string(),
                log.hourly_rate.to_string(),
                log.is_billable as i32,
                log.start_time.map(|t| t.to_rfc3339()),
                log.end_time.map(|t| t.to_rfc3339()),
                log.created_at.to_rfc3339(),
                log.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn update_time_log(&self, log: &TimeLog) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        conn.execute(
            "UPDATE time_logs SET milestone_id = ?, description = ?, hours = ?, hourly_rate = ?,
                is_billable = ?, start_time = ?, end_time = ?, updated_at = ?
             WHERE id = ?",
            rusqlite::params![
                log.milestone_id.map(|u| u.to_string()),
                &log.description,
                log.hours.to_string(),
                log.hourly_rate.to_string(),
                log.is_billable as i32,
                log.start_time.map(|t| t.to_rfc3339()),
                log.end_time.map(|t| t.to_rfc3339()),
                log.updated_at.to_rfc3339(),
                log.id.to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn set_time_log_approval(
        &self,
        id: Uuid,
        approver: Uuid,
        approved_at: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "UPDATE time_logs SET approved_by = ?, approved_at = ?, updated_at = ?
             WHERE id = ? AND approved_at IS NULL",
            (
                approver.to_string(),
                approved_at.to_rfc3339(),
                approved_at.to_rfc3339(),
                id.to_string(),
            ),
        )?;
        Ok(rows > 0)
    }

    pub fn delete_time_log(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM time_logs WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Project member operations
    // ============================================================

    pub fn get_members_by_project(&self, project_id: Uuid) -> Result<Vec<ProjectMember>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, project_id, user_id, role, hourly_rate, created_at
             FROM project_members WHERE project_id = ? ORDER BY created_at",
        )?;

        let members = stmt
            .query_map([project_id.to_string()], member_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(members)
    }

    pub fn get_member(&self, project_id: Uuid, user_id: Uuid) -> Result<Option<ProjectMember>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, project_id, user_id, role, hourly_rate, created_at
             FROM project_members WHERE project_id = ? AND user_id = ?",
        )?;

        let mut rows = stmt.query([project_id.to_string(), user_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(member_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn add_member(&self, project_id: Uuid, input: AddMemberInput) -> Result<ProjectMember> {
        self.get_project(project_id)?
            .ok_or(DomainError::NotFound("Project"))?;

        if self.get_member(project_id, input.user_id)?.is_some() {
            return Err(DomainError::DuplicateMember.into());
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();
        let role = input.role.unwrap_or(MemberRole::Contributor);
        let hourly_rate = input.hourly_rate.unwrap_or(Decimal::ZERO);

        conn.execute(
            "INSERT INTO project_members (id, project_id, user_id, role, hourly_rate, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            (
                id.to_string(),
                project_id.to_string(),
                input.user_id.to_string(),
                role.as_str(),
                hourly_rate.to_string(),
                now.to_rfc3339(),
            ),
        )?;

        Ok(ProjectMember {
            id,
            project_id,
            user_id: input.user_id,
            role,
            hourly_rate,
            created_at: now,
        })
    }

    pub fn remove_member(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute("DELETE FROM project_members WHERE id = ?", [id.to_string()])?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

// ============================================================
// Row mapping
// ============================================================

const MILESTONE_COLUMNS: &str = "id, project_id, assignee_id, name, description, status, \
    priority, sort_order, progress_percentage, estimated_hours, actual_hours, due_date, \
    started_at, completed_at, budget_allocated, budget_used, risk_level, created_at, updated_at";

const TIME_LOG_COLUMNS: &str = "id, project_id, user_id, milestone_id, description, hours, \
    hourly_rate, is_billable, start_time, end_time, approved_by, approved_at, created_at, \
    updated_at";

fn project_from_row(row: &Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        progress_percentage: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
        updated_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn milestone_from_row(row: &Row) -> rusqlite::Result<Milestone> {
    Ok(Milestone {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        assignee_id: row.get::<_, Option<String>>(2)?.map(parse_uuid),
        name: row.get(3)?,
        description: row.get(4)?,
        status: MilestoneStatus::from_str(&row.get::<_, String>(5)?)
            .unwrap_or(MilestoneStatus::Pending),
        priority: Priority::from_str(&row.get::<_, String>(6)?).unwrap_or(Priority::Medium),
        sort_order: row.get(7)?,
        progress_percentage: row.get(8)?,
        estimated_hours: row.get::<_, Option<String>>(9)?.map(parse_decimal),
        actual_hours: parse_decimal(row.get::<_, String>(10)?),
        due_date: row.get::<_, Option<String>>(11)?.map(parse_datetime),
        started_at: row.get::<_, Option<String>>(12)?.map(parse_datetime),
        completed_at: row.get::<_, Option<String>>(13)?.map(parse_datetime),
        budget_allocated: row.get::<_, Option<String>>(14)?.map(parse_decimal),
        budget_used: parse_decimal(row.get::<_, String>(15)?),
        risk_level: RiskLevel::from_str(&row.get::<_, String>(16)?).unwrap_or(RiskLevel::Low),
        created_at: parse_datetime(row.get::<_, String>(17)?),
        updated_at: parse_datetime(row.get::<_, String>(18)?),
    })
}

fn time_log_from_row(row: &Row) -> rusqlite::Result<TimeLog> {
    Ok(TimeLog {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        user_id: parse_uuid(row.get::<_, String>(2)?),
        milestone_id: row.get::<_, Option<String>>(3)?.map(parse_uuid),
        description: row.get(4)?,
        hours: parse_decimal(row.get::<_, String>(5)?),
        hourly_rate: parse_decimal(row.get::<_, String>(6)?),
        is_billable: row.get::<_, i32>(7)? != 0,
        start_time: row.get::<_, Option<String>>(8)?.map(parse_datetime),
        end_time: row.get::<_, Option<String>>(9)?.map(parse_datetime),
        approved_by: row.get::<_, Option<String>>(10)?.map(parse_uuid),
        approved_at: row.get::<_, Option<String>>(11)?.map(parse_datetime),
        created_at: parse_datetime(row.get::<_, String>(12)?),
        updated_at: parse_datetime(row.get::<_, String>(13)?),
    })
}

fn member_from_row(row: &Row) -> rusqlite::Result<ProjectMember> {
    Ok(ProjectMember {
        id: parse_uuid(row.get::<_, String>(0)?),
        project_id: parse_uuid(row.get::<_, String>(1)?),
        user_id: parse_uuid(row.get::<_, String>(2)?),
        role: MemberRole::from_str(&row.get::<_, String>(3)?).unwrap_or(MemberRole::Contributor),
        hourly_rate: parse_decimal(row.get::<_, String>(4)?),
        created_at: parse_datetime(row.get::<_, String>(5)?),
    })
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_decimal(s: String) -> Decimal {
    Decimal::from_str(&s).unwrap_or_default()
}
