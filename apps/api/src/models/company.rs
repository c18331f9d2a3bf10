use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::CounterField;

/// Company record with its denormalized counters. Counters are never the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Uuid,
    pub company_name: String,
    pub email: String,
    pub total_applications: i64,
    pub pending_applications: i64,
    pub reviewing_applications: i64,
    pub accepted_applications: i64,
    pub rejected_applications: i64,
    pub active_jobs_count: i64,
    pub total_jobs_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn counter(&self, field: CounterField) -> Option<i64> {
        match field {
            CounterField::TotalApplications => Some(self.total_applications),
            CounterField::PendingApplications => Some(self.pending_applications),
            CounterField::ReviewingApplications => Some(self.reviewing_applications),
            CounterField::AcceptedApplications => Some(self.accepted_applications),
            CounterField::RejectedApplications => Some(self.rejected_applications),
            CounterField::ActiveJobs => Some(self.active_jobs_count),
            CounterField::TotalJobs => Some(self.total_jobs_count),
            CounterField::Applicants => None,
        }
    }
}
