use std::fmt;

use serde_json::Value;

/// Job state announced through `job-update` messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Active,
    Completed,
    Failed,
}

impl JobPhase {
    /// Text sent to the client, e.g. `Job 7f3c... completed`.
    pub fn message(&self, job_id: &str) -> String {
        format!("Job {} {}", job_id, self)
    }

    pub fn payload(&self, job_id: &str) -> Value {
        Value::String(self.message(job_id))
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobPhase::Active => "active",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(JobPhase::Active.message("abc"), "Job abc active");
        assert_eq!(JobPhase::Completed.message("abc"), "Job abc completed");
        assert_eq!(
            JobPhase::Failed.payload("abc"),
            Value::String("Job abc failed".into())
        );
    }
}
