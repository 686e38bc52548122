use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use milepost::db::Database;
use milepost::models::*;
use milepost::services::{FixedClock, MilestoneLifecycle, ProjectAggregator, TimeLogReconciler};
use rust_decimal::Decimal;
use speculate2::speculate;
use uuid::Uuid;

fn t(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
}

fn create_test_project(db: &Database) -> Project {
    db.create_project(CreateProjectInput {
        name: "Test Project".to_string(),
        description: None,
    })
    .expect("Failed to create project")
}

fn create_test_milestone(db: &Database, project_id: Uuid, name: &str) -> Milestone {
    db.create_milestone(
        project_id,
        CreateMilestoneInput {
            name: name.to_string(),
            description: None,
            assignee_id: None,
            priority: None,
            sort_order: None,
            estimated_hours: None,
            due_date: None,
            budget_allocated: None,
            risk_level: None,
        },
    )
    .expect("Failed to create milestone")
}

fn log_input(project_id: Uuid, user_id: Uuid) -> CreateTimeLogInput {
    CreateTimeLogInput {
        project_id,
        user_id,
        milestone_id: None,
        description: None,
        hours: None,
        hourly_rate: None,
        is_billable: true,
        start_time: None,
        end_time: None,
    }
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
        let clock = Arc::new(FixedClock(t(9, 0)));
        let lifecycle = MilestoneLifecycle::new(db.clone(), clock.clone());
        let aggregator = ProjectAggregator::new(db.clone());
        let reconciler = TimeLogReconciler::new(db.clone(), clock);
        let project = create_test_project(&db);
    }

    describe "milestone lifecycle" {
        describe "update_progress" {
            it "clamps negative input to zero" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let updated = lifecycle.update_progress(milestone.id, -20).expect("Update failed");

                assert_eq!(updated.progress_percentage, 0);
                assert_eq!(updated.status, MilestoneStatus::Pending);
            }

            it "clamps oversized input to 100 and completes" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let updated = lifecycle.update_progress(milestone.id, 250).expect("Update failed");

                assert_eq!(updated.progress_percentage, 100);
                assert_eq!(updated.status, MilestoneStatus::Completed);
                assert_eq!(updated.completed_at, Some(t(9, 0)));
            }

            it "starts a pending milestone on the first nonzero report" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let updated = lifecycle.update_progress(milestone.id, 30).expect("Update failed");

                assert_eq!(updated.status, MilestoneStatus::InProgress);
                assert_eq!(updated.started_at, Some(t(9, 0)));
            }

            it "does not reset started_at on later reports" {
                let milestone = create_test_milestone(&db, project.id, "M");
                lifecycle.update_progress(milestone.id, 30).expect("Update failed");

                let later = MilestoneLifecycle::new(db.clone(), Arc::new(FixedClock(t(14, 0))));
                let updated = later.update_progress(milestone.id, 60).expect("Update failed");

                assert_eq!(updated.status, MilestoneStatus::InProgress);
                assert_eq!(updated.started_at, Some(t(9, 0)));
            }

            it "leaves a zero report pending" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let updated = lifecycle.update_progress(milestone.id, 0).expect("Update failed");

                assert_eq!(updated.status, MilestoneStatus::Pending);
                assert!(updated.started_at.is_none());
            }

            it "fails for a missing milestone" {
                assert!(lifecycle.update_progress(Uuid::new_v4(), 50).is_err());
            }
        }

        describe "complete" {
            it "snaps progress to 100 and stamps completed_at" {
                let milestone = create_test_milestone(&db, project.id, "M");
                lifecycle.update_progress(milestone.id, 40).expect("Update failed");

                let completed = lifecycle.complete(milestone.id).expect("Complete failed");
                assert_eq!(completed.status, MilestoneStatus::Completed);
                assert_eq!(completed.progress_percentage, 100);
                assert_eq!(completed.completed_at, Some(t(9, 0)));
            }

            it "is idempotent but refreshes the completion timestamp" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let first = lifecycle.complete(milestone.id).expect("Complete failed");
                assert_eq!(first.progress_percentage, 100);
                assert_eq!(first.completed_at, Some(t(9, 0)));

                let later = MilestoneLifecycle::new(db.clone(), Arc::new(FixedClock(t(16, 30))));
                let second = later.complete(milestone.id).expect("Complete failed");
                assert_eq!(second.progress_percentage, 100);
                assert_eq!(second.status, MilestoneStatus::Completed);
                assert_eq!(second.completed_at, Some(t(16, 30)));
            }
        }

        describe "hold and cancel" {
            it "parks an in-progress milestone" {
                let milestone = create_test_milestone(&db, project.id, "M");
                lifecycle.update_progress(milestone.id, 30).expect("Update failed");

                let held = lifecycle.hold(milestone.id).expect("Hold failed");
                assert_eq!(held.status, MilestoneStatus::OnHold);
            }

            it "cancels a pending milestone" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let cancelled = lifecycle.cancel(milestone.id).expect("Cancel failed");
                assert_eq!(cancelled.status, MilestoneStatus::Cancelled);
            }

            it "does not reopen a completed milestone" {
                let milestone = create_test_milestone(&db, project.id, "M");
                lifecycle.complete(milestone.id).expect("Complete failed");

                let after_hold = lifecycle.hold(milestone.id).expect("Hold failed");
                assert_eq!(after_hold.status, MilestoneStatus::Completed);

                let after_cancel = lifecycle.cancel(milestone.id).expect("Cancel failed");
                assert_eq!(after_cancel.status, MilestoneStatus::Completed);
            }
        }

        describe "roll-ups" {
            it "sums all hours into actual_hours regardless of billing" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let user = Uuid::new_v4();

                let mut billable = log_input(project.id, user);
                billable.milestone_id = Some(milestone.id);
                billable.hours = Some(Decimal::from(2));
                billable.hourly_rate = Some(Decimal::from(50));
                reconciler.log_time(billable).expect("Log failed");

                let mut free = log_input(project.id, user);
                free.milestone_id = Some(milestone.id);
                free.hours = Some(Decimal::from(3));
                free.hourly_rate = Some(Decimal::from(50));
                free.is_billable = false;
                reconciler.log_time(free).expect("Log failed");

                let total = lifecycle.recalculate_actual_hours(milestone.id).expect("Recalc failed");
                assert_eq!(total, Decimal::from(5));

                let stored = db.get_milestone(milestone.id).expect("Query failed").unwrap();
                assert_eq!(stored.actual_hours, Decimal::from(5));
            }

            it "sums only billable entries into budget_used" {
                let milestone = create_test_milestone(&db, project.id, "M");
                let user = Uuid::new_v4();

                let mut billable = log_input(project.id, user);
                billable.milestone_id = Some(milestone.id);
                billable.hours = Some(Decimal::from(2));
                billable.hourly_rate = Some(Decimal::from(50));
                reconciler.log_time(billable).expect("Log failed");

                let mut free = log_input(project.id, user);
                free.milestone_id = Some(milestone.id);
                free.hours = Some(Decimal::from(3));
                free.hourly_rate = Some(Decimal::from(50));
                free.is_billable = false;
                reconciler.log_time(free).expect("Log failed");

                let total = lifecycle.recalculate_budget_used(milestone.id).expect("Recalc failed");
                assert_eq!(total, Decimal::from(100));

                let stored = db.get_milestone(milestone.id).expect("Query failed").unwrap();
                assert_eq!(stored.budget_used, Decimal::from(100));
            }
        }
    }

    describe "project aggregation" {
        describe "completion_rate" {
            it "reports the completed share of milestones" {
                let m1 = create_test_milestone(&db, project.id, "A");
                let m2 = create_test_milestone(&db, project.id, "B");
                let m3 = create_test_milestone(&db, project.id, "C");
                create_test_milestone(&db, project.id, "D");

                lifecycle.complete(m1.id).expect("Complete failed");
                lifecycle.complete(m2.id).expect("Complete failed");
                lifecycle.update_progress(m3.id, 50).expect("Update failed");

                let rate = aggregator.completion_rate(project.id).expect("Rate failed");
                assert_eq!(rate, 50.0);
            }

            it "reports zero for a project with no milestones" {
                let rate = aggregator.completion_rate(project.id).expect("Rate failed");
                assert_eq!(rate, 0.0);
            }
        }

        describe "update_progress" {
            it "persists the recomputed rate onto the project" {
                let m1 = create_test_milestone(&db, project.id, "A");
                create_test_milestone(&db, project.id, "B");
                lifecycle.complete(m1.id).expect("Complete failed");

                let rate = aggregator.update_progress(project.id).expect("Update failed");
                assert_eq!(rate, 50.0);

                let stored = db.get_project(project.id).expect("Query failed").unwrap();
                assert_eq!(stored.progress_percentage, 50.0);
            }

            it "fails for a missing project" {
                assert!(aggregator.update_progress(Uuid::new_v4()).is_err());
            }
        }

        describe "budget_used" {
            it "prices hours at each user's membership rate" {
                let priced = Uuid::new_v4();
                let unpriced = Uuid::new_v4();

                db.add_member(project.id, AddMemberInput {
                    user_id: priced,
                    role: None,
                    hourly_rate: Some(Decimal::from(40)),
                }).expect("Failed to add member");

                let mut a = log_input(project.id, priced);
                a.hours = Some(Decimal::from(3));
                reconciler.log_time(a).expect("Log failed");

                // Hours from a non-member contribute nothing.
                let mut b = log_input(project.id, unpriced);
                b.hours = Some(Decimal::from(10));
                b.hourly_rate = Some(Decimal::from(99));
                reconciler.log_time(b).expect("Log failed");

                let total = aggregator.budget_used(project.id).expect("Budget failed");
                assert_eq!(total, Decimal::from(120));
            }
        }

        describe "total_hours_logged" {
            it "sums hours across billable and non-billable logs" {
                let user = Uuid::new_v4();
                let mut a = log_input(project.id, user);
                a.hours = Some(Decimal::new(15, 1)); // 1.5
                reconciler.log_time(a).expect("Log failed");

                let mut b = log_input(project.id, user);
                b.hours = Some(Decimal::new(25, 1)); // 2.5
                b.is_billable = false;
                reconciler.log_time(b).expect("Log failed");

                let total = aggregator.total_hours_logged(project.id).expect("Sum failed");
                assert_eq!(total, Decimal::from(4));
            }
        }

        describe "end to end" {
            it "rolls milestone completions up into project progress" {
                let milestones: Vec<Milestone> = (1..=4)
                    .map(|i| create_test_milestone(&db, project.id, &format!("M{i}")))
                    .collect();
                assert_eq!(
                    milestones.iter().map(|m| m.sort_order).collect::<Vec<_>>(),
                    vec![1, 2, 3, 4]
                );

                lifecycle.update_progress(milestones[0].id, 100).expect("Update failed");
                lifecycle.update_progress(milestones[1].id, 100).expect("Update failed");

                let rate = aggregator.update_progress(project.id).expect("Update failed");
                assert_eq!(rate, 50.0);

                let stored = db.get_project(project.id).expect("Query failed").unwrap();
                assert_eq!(stored.progress_percentage, 50.0);
            }
        }
    }

    describe "time log reconciliation" {
        describe "hours" {
            it "derives hours from the logged span" {
                let mut input = log_input(project.id, Uuid::new_v4());
                input.start_time = Some(t(9, 0));
                input.end_time = Some(t(11, 30));

                let log = reconciler.log_time(input).expect("Log failed");
                assert_eq!(log.hours, Decimal::new(25, 1)); // 2.5
            }

            it "re-derives hours when an update clears them" {
                let user = Uuid::new_v4();
                let mut input = log_input(project.id, user);
                input.hours = Some(Decimal::from(8));
                let log = reconciler.log_time(input).expect("Log failed");

                let updated = reconciler.update(log.id, UpdateTimeLogInput {
                    milestone_id: None,
                    description: None,
                    hours: None,
                    hourly_rate: None,
                    is_billable: None,
                    start_time: Some(t(13, 0)),
                    end_time: Some(t(15, 0)),
                }).expect("Update failed").unwrap();

                assert_eq!(updated.hours, Decimal::from(2));
            }
        }

        describe "hourly rate" {
            it "falls back to the membership rate" {
                let user = Uuid::new_v4();
                db.add_member(project.id, AddMemberInput {
                    user_id: user,
                    role: None,
                    hourly_rate: Some(Decimal::new(4500, 2)),
                }).expect("Failed to add member");

                let mut input = log_input(project.id, user);
                input.hours = Some(Decimal::from(2));
                let log = reconciler.log_time(input).expect("Log failed");

                assert_eq!(log.hourly_rate, Decimal::new(4500, 2));
                assert_eq!(log.total_amount(), Decimal::from(90));
            }

            it "defaults to zero without a membership" {
                let mut input = log_input(project.id, Uuid::new_v4());
                input.hours = Some(Decimal::from(2));
                let log = reconciler.log_time(input).expect("Log failed");

                assert_eq!(log.hourly_rate, Decimal::ZERO);
                assert_eq!(log.total_amount(), Decimal::ZERO);
            }

            it "keeps an explicit rate" {
                let user = Uuid::new_v4();
                db.add_member(project.id, AddMemberInput {
                    user_id: user,
                    role: None,
                    hourly_rate: Some(Decimal::from(45)),
                }).expect("Failed to add member");

                let mut input = log_input(project.id, user);
                input.hours = Some(Decimal::from(1));
                input.hourly_rate = Some(Decimal::from(60));
                let log = reconciler.log_time(input).expect("Log failed");

                assert_eq!(log.hourly_rate, Decimal::from(60));
            }
        }

        describe "approval" {
            it "records the approver once" {
                let mut input = log_input(project.id, Uuid::new_v4());
                input.hours = Some(Decimal::from(1));
                let log = reconciler.log_time(input).expect("Log failed");

                let approver = Uuid::new_v4();
                let approved = reconciler.approve(log.id, approver).expect("Approve failed");
                assert_eq!(approved.approved_by, Some(approver));
                assert_eq!(approved.approved_at, Some(t(9, 0)));
            }

            it "rejects a second approval" {
                let mut input = log_input(project.id, Uuid::new_v4());
                input.hours = Some(Decimal::from(1));
                let log = reconciler.log_time(input).expect("Log failed");

                reconciler.approve(log.id, Uuid::new_v4()).expect("Approve failed");
                assert!(reconciler.approve(log.id, Uuid::new_v4()).is_err());
            }
        }

        describe "validation" {
            it "fails for a missing project" {
                let input = log_input(Uuid::new_v4(), Uuid::new_v4());
                assert!(reconciler.log_time(input).is_err());
            }

            it "fails for a missing milestone" {
                let mut input = log_input(project.id, Uuid::new_v4());
                input.milestone_id = Some(Uuid::new_v4());
                assert!(reconciler.log_time(input).is_err());
            }
        }
    }
}
